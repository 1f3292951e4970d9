//! Datagram transports that tag every packet with a [`SocksSocketAddr`].
//!
//! One UDP association carries datagrams for many destinations, so each
//! send names its destination and each receive reports where it came from.

use std::{future::Future, net::SocketAddr};

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    net::UdpSocket,
};
use tracing::debug;

use crate::{protocol::SocksSocketAddr, Step, StepExt};

mod socks5_datagram;
mod udp_message;

pub use socks5_datagram::Socks5Datagram;
pub use udp_message::UdpMessage;

pub trait PacketTransport {
    /// Sends `buf` to `dst`, returning the payload length sent.
    fn send_to(
        &self,
        buf: &[u8],
        dst: &SocksSocketAddr,
    ) -> impl Future<Output = crate::Result<usize>> + Send;

    /// Receives one payload into `buf` along with the address it came from.
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = crate::Result<(usize, SocksSocketAddr)>> + Send;
}

/// The result of a UDP ASSOCIATE.
///
/// The proxy keeps the association for as long as the control stream stays
/// open, so keep this value alive while datagrams are exchanged.
#[derive(Debug)]
pub struct UdpAssociation<S> {
    control: S,
    relay: SocksSocketAddr,
    proxy_host: String,
}

impl<S> UdpAssociation<S> {
    pub(crate) fn new(control: S, relay: SocksSocketAddr, proxy_host: String) -> Self {
        UdpAssociation {
            control,
            relay,
            proxy_host,
        }
    }

    /// The relay endpoint the proxy answered with.
    pub fn relay_addr(&self) -> &SocksSocketAddr {
        &self.relay
    }

    pub fn into_parts(self) -> (S, SocksSocketAddr) {
        (self.control, self.relay)
    }

    /// The relay as a socket address. An unspecified relay IP (`0.0.0.0` or
    /// `::`) means "the proxy's own address".
    pub async fn relay_socket_addr(&self) -> crate::Result<SocketAddr> {
        let relay = self.relay.to_socket_addr().await?;
        if !relay.ip().is_unspecified() {
            return Ok(relay);
        }
        SocksSocketAddr::from_host_port("udp", &self.proxy_host, relay.port())?
            .to_socket_addr()
            .await
    }

    /// Uses `socket` to exchange datagrams with the relay.
    pub async fn bind(&self, socket: UdpSocket) -> crate::Result<Socks5Datagram> {
        let relay = self.relay_socket_addr().await?;
        debug!(%relay, "binding datagram transport");
        Ok(Socks5Datagram::new(socket, relay))
    }
}

impl<S> UdpAssociation<S>
where
    S: AsyncRead + Unpin,
{
    /// Resolves once the proxy closes the control stream, which ends the
    /// association.
    pub async fn wait_closed(&mut self) -> crate::Result<()> {
        let mut buf = [0u8; 1024];
        loop {
            let n = self.control.read(&mut buf).await.during(Step::UdpRelay)?;
            if n == 0 {
                debug!("udp association control stream closed");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    #[tokio::test]
    async fn unspecified_relay_means_the_proxy() {
        let association = UdpAssociation::new(
            (),
            "0.0.0.0:4000".parse().unwrap(),
            "192.0.2.1".to_owned(),
        );
        assert_eq!(
            association.relay_socket_addr().await.unwrap(),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 4000)
        );
    }

    #[tokio::test]
    async fn specified_relay_is_kept() {
        let association = UdpAssociation::new(
            (),
            "198.51.100.9:4000".parse().unwrap(),
            "192.0.2.1".to_owned(),
        );
        assert_eq!(
            association.relay_socket_addr().await.unwrap(),
            "198.51.100.9:4000".parse().unwrap()
        );
    }

    #[tokio::test]
    async fn wait_closed_returns_on_eof() {
        let (client, server) = tokio::io::duplex(64);
        let mut association =
            UdpAssociation::new(client, "127.0.0.1:1".parse().unwrap(), "127.0.0.1".to_owned());
        drop(server);
        association.wait_closed().await.unwrap();
    }
}
