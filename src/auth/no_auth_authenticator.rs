use tokio::io::{AsyncRead, AsyncWrite};

use crate::{protocol::AuthMethod, Socks5Error};

use super::Authenticator;

/// Offers the "no authentication" method and fails if the server asks for
/// anything else.
pub struct NoAuthAuthenticator;

impl<T> Authenticator<T> for NoAuthAuthenticator
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn method(&self) -> AuthMethod {
        AuthMethod::NoAuthRequired
    }

    async fn authenticate(&self, _: &mut T, chosen: AuthMethod) -> crate::Result<()> {
        if chosen != AuthMethod::NoAuthRequired {
            return Err(Socks5Error::MethodNegotiationFailed {
                offered: AuthMethod::NoAuthRequired,
                chosen,
            });
        }
        Ok(())
    }
}
