use std::{future::Future, io};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

/// Opens the raw transport to the proxy.
///
/// `network` is the network the caller asked to proxy (`tcp`, `udp6`, ...);
/// the SOCKS5 control connection itself is always a byte stream.
pub trait Dialer: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    fn dial(
        &self,
        network: &str,
        addr: &str,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Connects to the proxy over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self, _network: &str, addr: &str) -> io::Result<TcpStream> {
        TcpStream::connect(addr).await
    }
}
