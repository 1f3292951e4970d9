use std::{
    fmt, io,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_rustls::client::TlsStream;

/// A connection to the proxy, TLS-wrapped for `socks5+tls`.
pub enum ProxyStream<S> {
    Plain(S),
    Tls(Box<TlsStream<S>>),
}

impl<S> ProxyStream<S> {
    pub fn is_tls(&self) -> bool {
        matches!(self, ProxyStream::Tls(_))
    }
}

impl<S> fmt::Debug for ProxyStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyStream::Plain(_) => write!(f, "ProxyStream::Plain"),
            ProxyStream::Tls(_) => write!(f, "ProxyStream::Tls"),
        }
    }
}

impl<S> AsyncRead for ProxyStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ProxyStream::Plain(inner) => Pin::new(inner).poll_read(cx, buf),
            ProxyStream::Tls(inner) => Pin::new(inner.as_mut()).poll_read(cx, buf),
        }
    }
}

impl<S> AsyncWrite for ProxyStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, io::Error>> {
        match self.get_mut() {
            ProxyStream::Plain(inner) => Pin::new(inner).poll_write(cx, buf),
            ProxyStream::Tls(inner) => Pin::new(inner.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        match self.get_mut() {
            ProxyStream::Plain(inner) => Pin::new(inner).poll_flush(cx),
            ProxyStream::Tls(inner) => Pin::new(inner.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        match self.get_mut() {
            ProxyStream::Plain(inner) => Pin::new(inner).poll_shutdown(cx),
            ProxyStream::Tls(inner) => Pin::new(inner.as_mut()).poll_shutdown(cx),
        }
    }
}
