//! # Username/Password Authentication
//!
//! Client side of the RFC 1929 sub-negotiation:
//!
//! ```text
//! Client -> Server: [0x01][ULEN][USERNAME][PLEN][PASSWORD]
//! Server -> Client: [0x01][STATUS]   STATUS == 0x00 => success
//! ```

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::{protocol::AuthMethod, Socks5Error, Step, StepExt};

use super::Authenticator;

const USER_PASSWORD_VERSION: u8 = 0x01;
const AUTH_SUCCESS: u8 = 0x00;

/// Credentials for the proxy.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub password: String,
}

impl User {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        User {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Offers the username/password method and runs the sub-negotiation when the
/// server picks it.
pub struct UsernamePasswordAuthenticator<'a> {
    user: &'a User,
}

impl<'a> UsernamePasswordAuthenticator<'a> {
    pub fn new(user: &'a User) -> Self {
        UsernamePasswordAuthenticator { user }
    }

    fn credentials_frame(&self) -> crate::Result<Vec<u8>> {
        let username = self.user.username.as_bytes();
        let password = self.user.password.as_bytes();

        let username_len = u8::try_from(username.len())
            .map_err(|_| Socks5Error::InvalidCredentials("username is longer than 255 bytes"))?;
        let password_len = u8::try_from(password.len())
            .map_err(|_| Socks5Error::InvalidCredentials("password is longer than 255 bytes"))?;

        let mut frame = Vec::with_capacity(3 + username.len() + password.len());
        frame.push(USER_PASSWORD_VERSION);
        frame.push(username_len);
        frame.extend_from_slice(username);
        frame.push(password_len);
        frame.extend_from_slice(password);
        Ok(frame)
    }

    async fn send_credentials<T>(&self, conn: &mut T) -> crate::Result<()>
    where
        T: AsyncWrite + Unpin,
    {
        let frame = self.credentials_frame()?;
        trace!(username = %self.user.username, "sending credentials");
        conn.write_all(&frame).await.during(Step::Authentication)
    }

    async fn read_status<T>(&self, conn: &mut T) -> crate::Result<()>
    where
        T: AsyncRead + Unpin,
    {
        let mut response = [0u8; 2];
        conn.read_exact(&mut response)
            .await
            .during(Step::Authentication)?;

        if response[0] != USER_PASSWORD_VERSION {
            return Err(Socks5Error::UnexpectedAuthResponse(response[0]));
        }
        if response[1] != AUTH_SUCCESS {
            debug!(status = response[1], username = %self.user.username, "credentials rejected");
            return Err(Socks5Error::AuthenticationFailed);
        }
        Ok(())
    }
}

impl<T> Authenticator<T> for UsernamePasswordAuthenticator<'_>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn method(&self) -> AuthMethod {
        AuthMethod::UsernamePassword
    }

    /// Servers that waive authentication may pick any other method; only
    /// `UsernamePassword` needs a sub-negotiation.
    async fn authenticate(&self, conn: &mut T, chosen: AuthMethod) -> crate::Result<()> {
        if chosen != AuthMethod::UsernamePassword {
            return Ok(());
        }
        self.send_credentials(conn).await?;
        self.read_status(conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_frame_layout() {
        let user = User::new("u", "pw");
        let frame = UsernamePasswordAuthenticator::new(&user)
            .credentials_frame()
            .unwrap();
        assert_eq!(frame, [1, 1, b'u', 2, b'p', b'w']);
    }

    #[test]
    fn overlong_credentials_are_refused() {
        let user = User::new("x".repeat(256), "pw");
        let err = UsernamePasswordAuthenticator::new(&user)
            .credentials_frame()
            .unwrap_err();
        assert!(matches!(err, Socks5Error::InvalidCredentials(_)));

        let user = User::new("u", "x".repeat(256));
        assert!(UsernamePasswordAuthenticator::new(&user)
            .credentials_frame()
            .is_err());
    }

    #[test]
    fn debug_hides_the_password() {
        let user = User::new("alice", "secret");
        let printed = format!("{:?}", user);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("secret"));
    }
}
