use std::net::SocketAddr;

use tokio::{net::UdpSocket, sync::Mutex};
use tracing::trace;

use crate::{protocol::SocksSocketAddr, Step, StepExt};

use super::{PacketTransport, UdpMessage};

const MAX_DATAGRAM_SIZE: usize = 65_535;

/// A [`PacketTransport`] over a UDP socket talking to a SOCKS5 relay.
///
/// Receives share one packet buffer, so concurrent `recv_from` calls take turns.
#[derive(Debug)]
pub struct Socks5Datagram {
    socket: UdpSocket,
    relay: SocketAddr,
    packet: Mutex<Vec<u8>>,
}

impl Socks5Datagram {
    pub fn new(socket: UdpSocket, relay: SocketAddr) -> Self {
        Socks5Datagram {
            socket,
            relay,
            packet: Mutex::new(vec![0u8; MAX_DATAGRAM_SIZE]),
        }
    }

    pub fn relay(&self) -> SocketAddr {
        self.relay
    }

    pub fn local_addr(&self) -> crate::Result<SocketAddr> {
        self.socket.local_addr().during(Step::UdpRelay)
    }
}

impl PacketTransport for Socks5Datagram {
    async fn send_to(&self, buf: &[u8], dst: &SocksSocketAddr) -> crate::Result<usize> {
        let message = UdpMessage {
            fragment_number: 0,
            dst: dst.clone(),
            data: buf,
        };
        self.socket
            .send_to(&message.as_bytes(), self.relay)
            .await
            .during(Step::UdpRelay)?;
        Ok(buf.len())
    }

    /// Datagrams from anyone but the relay, and ones that don't parse, are dropped.
    async fn recv_from(&self, buf: &mut [u8]) -> crate::Result<(usize, SocksSocketAddr)> {
        let mut packet = self.packet.lock().await;
        loop {
            let (n, from) = self
                .socket
                .recv_from(&mut packet[..])
                .await
                .during(Step::UdpRelay)?;
            if from != self.relay {
                trace!(%from, "datagram not from the relay");
                continue;
            }

            let message = match UdpMessage::parse(&packet[..n]).await {
                Ok(message) => message,
                Err(err) => {
                    trace!(%err, "malformed datagram");
                    continue;
                }
            };

            let len = message.data.len().min(buf.len());
            buf[..len].copy_from_slice(&message.data[..len]);
            return Ok((len, message.dst));
        }
    }
}
