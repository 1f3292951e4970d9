//! Method negotiation and authentication against a SOCKS5 server.
//!
//! [`handshake`] offers the single method of an [`Authenticator`], reads the
//! server's choice and lets the authenticator finish whatever the chosen
//! method requires.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, trace};

use crate::{
    protocol::{AuthMethod, VERSION},
    Socks5Error, Step, StepExt,
};

pub mod no_auth_authenticator;
pub mod username_password_authenticator;

pub use no_auth_authenticator::NoAuthAuthenticator;
pub use username_password_authenticator::{User, UsernamePasswordAuthenticator};

pub trait Authenticator<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// The method offered to the server
    fn method(&self) -> AuthMethod;

    /// Authenticator Should:
    /// use `conn` for communication,
    /// perform the sub-negotiation `chosen` calls for, if any,
    /// return an error when `chosen` can't be satisfied
    fn authenticate(
        &self,
        conn: &mut T,
        chosen: AuthMethod,
    ) -> impl Future<Output = crate::Result<()>> + Send;
}

/// Runs method negotiation and authentication over `conn`.
///
/// `tls` tells whether `conn` is already TLS-wrapped, which shifts the
/// offered method code by `0x80`. Returns the method the server chose.
#[instrument(skip_all, fields(tls = tls))]
pub async fn handshake<T, A>(conn: &mut T, authenticator: &A, tls: bool) -> crate::Result<AuthMethod>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
    A: Authenticator<T> + Sync,
{
    let offered = authenticator.method();
    let code = offered.wire_code(tls);
    trace!(?offered, code, "offering method");

    conn.write_all(&[VERSION, 1, code])
        .await
        .during(Step::MethodNegotiation)?;

    let version = conn.read_u8().await.during(Step::MethodNegotiation)?;
    if version != VERSION {
        return Err(Socks5Error::VersionMismatch(version));
    }

    let chosen = conn.read_u8().await.during(Step::MethodNegotiation)?;
    let chosen = AuthMethod::from_chosen(chosen, tls);
    debug!(?chosen, "server chose method");

    if chosen == AuthMethod::NoAcceptableMethods {
        return Err(Socks5Error::MethodNegotiationFailed { offered, chosen });
    }

    authenticator.authenticate(conn, chosen).await?;
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    fn user() -> User {
        User::new("alice", "secret")
    }

    fn credentials_frame() -> Vec<u8> {
        let mut frame = vec![1, 5];
        frame.extend_from_slice(b"alice");
        frame.push(6);
        frame.extend_from_slice(b"secret");
        frame
    }

    #[tokio::test]
    async fn no_auth_accepted() {
        let mut conn = Builder::new().write(&[5, 1, 0]).read(&[5, 0]).build();
        let chosen = handshake(&mut conn, &NoAuthAuthenticator, false)
            .await
            .unwrap();
        assert_eq!(chosen, AuthMethod::NoAuthRequired);
    }

    #[tokio::test]
    async fn no_auth_when_server_demands_password() {
        let mut conn = Builder::new().write(&[5, 1, 0]).read(&[5, 2]).build();
        let err = handshake(&mut conn, &NoAuthAuthenticator, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Socks5Error::MethodNegotiationFailed {
                offered: AuthMethod::NoAuthRequired,
                chosen: AuthMethod::UsernamePassword,
            }
        ));
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn version_mismatch() {
        let mut conn = Builder::new().write(&[5, 1, 0]).read(&[4]).build();
        let err = handshake(&mut conn, &NoAuthAuthenticator, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Socks5Error::VersionMismatch(4)));
    }

    #[tokio::test]
    async fn no_acceptable_methods() {
        let user = user();
        let mut conn = Builder::new().write(&[5, 1, 2]).read(&[5, 0xff]).build();
        let err = handshake(&mut conn, &UsernamePasswordAuthenticator::new(&user), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Socks5Error::MethodNegotiationFailed { .. }));
    }

    #[tokio::test]
    async fn password_accepted() {
        let user = user();
        let mut conn = Builder::new()
            .write(&[5, 1, 2])
            .read(&[5, 2])
            .write(&credentials_frame())
            .read(&[1, 0])
            .build();
        let chosen = handshake(&mut conn, &UsernamePasswordAuthenticator::new(&user), false)
            .await
            .unwrap();
        assert_eq!(chosen, AuthMethod::UsernamePassword);
    }

    #[tokio::test]
    async fn password_rejected() {
        let user = user();
        let mut conn = Builder::new()
            .write(&[5, 1, 2])
            .read(&[5, 2])
            .write(&credentials_frame())
            .read(&[1, 1])
            .build();
        let err = handshake(&mut conn, &UsernamePasswordAuthenticator::new(&user), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Socks5Error::AuthenticationFailed));
    }

    #[tokio::test]
    async fn password_response_with_wrong_version() {
        let user = user();
        let mut conn = Builder::new()
            .write(&[5, 1, 2])
            .read(&[5, 2])
            .write(&credentials_frame())
            .read(&[5, 0])
            .build();
        let err = handshake(&mut conn, &UsernamePasswordAuthenticator::new(&user), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Socks5Error::UnexpectedAuthResponse(5)));
    }

    #[tokio::test]
    async fn password_offered_but_not_required() {
        let user = user();
        let mut conn = Builder::new().write(&[5, 1, 2]).read(&[5, 0]).build();
        let chosen = handshake(&mut conn, &UsernamePasswordAuthenticator::new(&user), false)
            .await
            .unwrap();
        assert_eq!(chosen, AuthMethod::NoAuthRequired);
    }

    #[tokio::test]
    async fn tls_shifts_the_method_code() {
        let mut conn = Builder::new().write(&[5, 1, 0x80]).read(&[5, 0x80]).build();
        handshake(&mut conn, &NoAuthAuthenticator, true)
            .await
            .unwrap();

        let user = user();
        let mut conn = Builder::new()
            .write(&[5, 1, 0x82])
            .read(&[5, 0x82])
            .write(&credentials_frame())
            .read(&[1, 0])
            .build();
        handshake(&mut conn, &UsernamePasswordAuthenticator::new(&user), true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn transport_errors_name_the_step() {
        let mut conn = Builder::new().write(&[5, 1, 0]).build();
        let err = handshake(&mut conn, &NoAuthAuthenticator, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Socks5Error::Io {
                step: Step::MethodNegotiation,
                ..
            }
        ));
    }
}
