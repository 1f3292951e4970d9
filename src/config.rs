//! Proxy endpoint parameters.
//!
//! Parsing proxy URLs is left to the `url` crate; [`ProxyConfig::from_url`]
//! only maps an already parsed URL onto the fields this crate needs.

use std::fmt;

use percent_encoding::percent_decode_str;
use url::{Host, Url};

use crate::{auth::User, Socks5Error};

pub const DEFAULT_PORT: u16 = 1080;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `socks5://`, plain TCP to the proxy
    Socks5,
    /// `socks5+tls://`, SOCKS5 carried over a TLS session
    Socks5Tls,
}

impl Scheme {
    pub fn from_name(name: &str) -> crate::Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "socks5" => Ok(Scheme::Socks5),
            "socks5+tls" => Ok(Scheme::Socks5Tls),
            _ => Err(Socks5Error::UnsupportedScheme(name.to_owned())),
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Scheme::Socks5Tls)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Socks5 => write!(f, "socks5"),
            Scheme::Socks5Tls => write!(f, "socks5+tls"),
        }
    }
}

/// Where the proxy is and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    scheme: Scheme,
    host: String,
    port: u16,
    user: Option<User>,
}

impl ProxyConfig {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        ProxyConfig {
            scheme,
            host: host.into(),
            port,
            user: None,
        }
    }

    /// Credentials with an empty username count as no credentials.
    pub fn with_user(mut self, user: User) -> Self {
        self.user = if user.username.is_empty() {
            None
        } else {
            Some(user)
        };
        self
    }

    pub fn from_url(url: &Url) -> crate::Result<Self> {
        let scheme = Scheme::from_name(url.scheme())?;
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_owned(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => {
                return Err(Socks5Error::InvalidAddress(format!(
                    "proxy URL {} has no host",
                    url
                )))
            }
        };
        let port = url.port().unwrap_or(DEFAULT_PORT);
        let user = User::new(
            decode_user_info(url.username(), "username is not utf8 once decoded")?,
            decode_user_info(
                url.password().unwrap_or_default(),
                "password is not utf8 once decoded",
            )?,
        );

        Ok(ProxyConfig::new(scheme, host, port).with_user(user))
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// `host:port` of the proxy, bracketing IPv6 hosts.
    pub fn server(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// `Url` keeps user info percent-encoded; the proxy expects the raw bytes.
fn decode_user_info(value: &str, invalid: &'static str) -> crate::Result<String> {
    percent_decode_str(value)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| Socks5Error::InvalidCredentials(invalid))
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.server())
    }
}
