use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use crate::{protocol::SocksSocketAddr, Step, StepExt};

/// Reads the UDP ASSOCIATE reply and returns the relay address.
///
/// The three header bytes are skipped without inspection: two reserved
/// bytes and the fragment byte.
pub(super) async fn read_reply<T>(conn: &mut T) -> crate::Result<SocksSocketAddr>
where
    T: AsyncRead + Unpin,
{
    let mut header = [0u8; 3];
    conn.read_exact(&mut header).await.during(Step::Reply)?;
    trace!(?header, "skipped reply header");

    let relay = SocksSocketAddr::read(conn).await?;

    debug!(%relay, "udp associate established");
    Ok(relay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_the_relay_address() {
        let mut reply: &[u8] = &[0, 0, 0, 3, 5, b'r', b'e', b'l', b'a', b'y', 0x04, 0x38];
        let relay = read_reply(&mut reply).await.unwrap();
        assert_eq!(relay.to_string(), "relay:1080");
    }

    #[tokio::test]
    async fn short_header() {
        let mut reply: &[u8] = &[0, 0];
        let err = read_reply(&mut reply).await.unwrap_err();
        assert!(matches!(
            err,
            crate::Socks5Error::Io {
                step: Step::Reply,
                ..
            }
        ));
    }
}
