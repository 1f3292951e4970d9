use std::{fmt, io, sync::Arc};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::{
    client::TlsStream,
    rustls::{pki_types::ServerName, ClientConfig, RootCertStore},
    TlsConnector,
};
use tracing::{debug, warn};

use crate::Socks5Error;

/// TLS settings for `socks5+tls` proxies.
///
/// Certificate and cipher policy live in the rustls [`ClientConfig`]; this
/// only adds an optional SNI override. Without one the proxy host is used.
#[derive(Clone)]
pub struct TlsConfig {
    client_config: Arc<ClientConfig>,
    server_name: Option<String>,
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("server_name", &self.server_name)
            .finish()
    }
}

impl TlsConfig {
    pub fn new(client_config: Arc<ClientConfig>) -> Self {
        TlsConfig {
            client_config,
            server_name: None,
        }
    }

    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    /// Trusts the platform's root certificates.
    pub fn native_roots() -> Self {
        let mut root_store = RootCertStore::empty();

        let native_certs = rustls_native_certs::load_native_certs();
        for err in &native_certs.errors {
            warn!(%err, "failed to load a native certificate");
        }
        let (added, ignored) = root_store.add_parsable_certificates(native_certs.certs);
        debug!(added, ignored, "loaded native root certificates");

        let client_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        TlsConfig::new(Arc::new(client_config))
    }

    pub(crate) async fn connect<S>(&self, host: &str, stream: S) -> crate::Result<TlsStream<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let name = self.server_name.as_deref().unwrap_or(host);
        let server_name = ServerName::try_from(name.to_owned()).map_err(|err| {
            Socks5Error::TlsHandshakeFailed(io::Error::new(io::ErrorKind::InvalidInput, err))
        })?;

        let tls_stream = TlsConnector::from(self.client_config.clone())
            .connect(server_name, stream)
            .await
            .map_err(Socks5Error::TlsHandshakeFailed)?;

        debug!(server_name = name, "TLS session established");
        Ok(tls_stream)
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        TlsConfig::native_roots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_name_override() {
        let config = TlsConfig::default().with_server_name("proxy.internal");
        assert_eq!(config.server_name.as_deref(), Some("proxy.internal"));
    }

    #[tokio::test]
    async fn handshake_failure_is_reported() {
        let (client, server) = tokio::io::duplex(1024);
        drop(server);

        let err = match TlsConfig::default()
            .connect("proxy.example.com", client)
            .await
        {
            Ok(_) => panic!("handshake with a closed peer succeeded"),
            Err(err) => err,
        };
        assert!(matches!(err, Socks5Error::TlsHandshakeFailed(_)));
        assert!(err.is_transport_failure());
    }
}
