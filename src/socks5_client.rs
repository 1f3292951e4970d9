use std::sync::OnceLock;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, trace, warn};

use crate::{
    auth::{handshake, NoAuthAuthenticator, UsernamePasswordAuthenticator},
    config::ProxyConfig,
    dialer::{Dialer, TcpDialer},
    packet::UdpAssociation,
    protocol::{AuthMethod, Command, SocksSocketAddr, RESERVED, VERSION},
    stream::ProxyStream,
    tls::TlsConfig,
    Step, StepExt,
};

mod associate;
mod connect;

/// What a successful [`Socks5Client::dial`] hands back.
#[derive(Debug)]
pub enum Connection<S> {
    /// CONNECT: a stream relayed to the destination.
    Stream(ProxyStream<S>),
    /// UDP ASSOCIATE: the relay endpoint plus the control stream.
    Associate(UdpAssociation<ProxyStream<S>>),
}

impl<S> Connection<S> {
    pub fn into_stream(self) -> Option<ProxyStream<S>> {
        match self {
            Connection::Stream(stream) => Some(stream),
            Connection::Associate(_) => None,
        }
    }

    pub fn into_association(self) -> Option<UdpAssociation<ProxyStream<S>>> {
        match self {
            Connection::Associate(association) => Some(association),
            Connection::Stream(_) => None,
        }
    }
}

/// Dials destinations through one SOCKS5 proxy.
///
/// Every dial opens its own connection to the proxy; nothing is shared or
/// pooled between calls.
#[derive(Debug)]
pub struct Socks5Client<D = TcpDialer> {
    proxy: ProxyConfig,
    tls: OnceLock<TlsConfig>,
    dialer: D,
}

impl Socks5Client<TcpDialer> {
    pub fn new(proxy: ProxyConfig) -> Self {
        Socks5Client::with_dialer(proxy, TcpDialer)
    }
}

impl<D> Socks5Client<D>
where
    D: Dialer,
{
    pub fn with_dialer(proxy: ProxyConfig, dialer: D) -> Self {
        Socks5Client {
            proxy,
            tls: OnceLock::new(),
            dialer,
        }
    }

    /// TLS settings for `socks5+tls` proxies. Defaults to the platform roots.
    pub fn with_tls_config(mut self, tls: TlsConfig) -> Self {
        self.tls = OnceLock::from(tls);
        self
    }

    pub fn proxy(&self) -> &ProxyConfig {
        &self.proxy
    }

    /// Dials `address` through the proxy.
    ///
    /// `tcp`, `tcp4` and `tcp6` issue CONNECT; `udp`, `udp4` and `udp6` issue
    /// UDP ASSOCIATE. Anything else is [`crate::Socks5Error::UnsupportedCommand`].
    #[instrument(skip(self), fields(proxy = %self.proxy))]
    pub async fn dial(&self, network: &str, address: &str) -> crate::Result<Connection<D::Stream>> {
        let destination = SocksSocketAddr::parse(network, address)?;
        match Command::from_network(network)? {
            Command::Connect => {
                let (stream, _) = self.request(Command::Connect, &destination).await?;
                Ok(Connection::Stream(stream))
            }
            Command::UdpAssociate => {
                let (stream, relay) = self.request(Command::UdpAssociate, &destination).await?;
                Ok(Connection::Associate(UdpAssociation::new(
                    stream,
                    relay,
                    self.proxy.host().to_owned(),
                )))
            }
        }
    }

    /// CONNECT to `address` (`host:port`).
    pub async fn connect(&self, address: &str) -> crate::Result<ProxyStream<D::Stream>> {
        let destination = SocksSocketAddr::parse("tcp", address)?;
        let (stream, _) = self.request(Command::Connect, &destination).await?;
        Ok(stream)
    }

    /// UDP ASSOCIATE for datagrams to `address` (`host:port`).
    pub async fn udp_associate(
        &self,
        address: &str,
    ) -> crate::Result<UdpAssociation<ProxyStream<D::Stream>>> {
        let destination = SocksSocketAddr::parse("udp", address)?;
        let (stream, relay) = self
            .request(Command::UdpAssociate, &destination)
            .await?;
        Ok(UdpAssociation::new(
            stream,
            relay,
            self.proxy.host().to_owned(),
        ))
    }

    /// Runs a whole exchange for `command` and returns the stream together
    /// with the address from the reply. The stream is shut down on failure.
    async fn request(
        &self,
        command: Command,
        destination: &SocksSocketAddr,
    ) -> crate::Result<(ProxyStream<D::Stream>, SocksSocketAddr)> {
        let mut stream = self.open(destination.network()).await?;

        match self.negotiate(&mut stream, command, destination).await {
            Ok(reply_addr) => Ok((stream, reply_addr)),
            Err(err) => {
                warn!(%err, ?command, %destination, "SOCKS5 exchange failed");
                close(&mut stream).await;
                Err(err)
            }
        }
    }

    async fn open(&self, network: &str) -> crate::Result<ProxyStream<D::Stream>> {
        let server = self.proxy.server();
        let conn = self.dialer.dial(network, &server).await.during(Step::Dial)?;
        debug!(%server, "connected to proxy");

        if !self.proxy.scheme().is_tls() {
            return Ok(ProxyStream::Plain(conn));
        }

        let tls = self.tls_config().connect(self.proxy.host(), conn).await?;
        Ok(ProxyStream::Tls(Box::new(tls)))
    }

    /// The platform roots are loaded on first use and kept for later dials.
    fn tls_config(&self) -> &TlsConfig {
        self.tls.get_or_init(TlsConfig::default)
    }

    async fn negotiate<T>(
        &self,
        conn: &mut T,
        command: Command,
        destination: &SocksSocketAddr,
    ) -> crate::Result<SocksSocketAddr>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.authenticate(conn).await?;

        trace!(?command, %destination, "sending request");
        conn.write_all(&request_bytes(command, destination))
            .await
            .during(Step::Request)?;

        match command {
            Command::Connect => connect::read_reply(conn).await,
            Command::UdpAssociate => associate::read_reply(conn).await,
        }
    }

    async fn authenticate<T>(&self, conn: &mut T) -> crate::Result<AuthMethod>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let tls = self.proxy.scheme().is_tls();
        match self.proxy.user() {
            Some(user) => handshake(conn, &UsernamePasswordAuthenticator::new(user), tls).await,
            None => handshake(conn, &NoAuthAuthenticator, tls).await,
        }
    }
}

/// `[VER][CMD][RSV][ADDRESS]`
///
/// The destination goes through the regular address encoding, so IP literals
/// are sent as IPv4/IPv6 rather than as a domain name.
fn request_bytes(command: Command, destination: &SocksSocketAddr) -> Vec<u8> {
    let mut request = vec![VERSION, command.to_u8(), RESERVED];
    request.extend(destination.to_bytes());
    request
}

async fn close<T>(conn: &mut T)
where
    T: AsyncWrite + Unpin,
{
    if let Err(err) = conn.shutdown().await {
        trace!(%err, "shutdown after failure");
    }
}
