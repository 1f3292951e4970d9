use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::{
    protocol::{Reply, SocksSocketAddr, VERSION},
    Socks5Error, Step, StepExt,
};

/// Reads `[VER][REP][RSV][BND.ADDR]` and returns the bound address.
pub(super) async fn read_reply<T>(conn: &mut T) -> crate::Result<SocksSocketAddr>
where
    T: AsyncRead + Unpin,
{
    let version = conn.read_u8().await.during(Step::Reply)?;
    if version != VERSION {
        return Err(Socks5Error::VersionMismatch(version));
    }

    let status = conn.read_u8().await.during(Step::Reply)?;
    if status != Reply::Success.to_u8() {
        return Err(Socks5Error::ConnectFailed(status));
    }

    let _reserved = conn.read_u8().await.during(Step::Reply)?;
    let bound = SocksSocketAddr::read(conn).await?;

    debug!(%bound, "connect established");
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::AddressField;

    #[tokio::test]
    async fn reads_the_bound_address() {
        let mut reply: &[u8] = &[5, 0, 0, 1, 127, 0, 0, 1, 0x00, 0x50];
        let bound = read_reply(&mut reply).await.unwrap();
        assert_eq!(bound.to_string(), "127.0.0.1:80");
        assert!(reply.is_empty());
    }

    #[tokio::test]
    async fn rejects_other_versions() {
        let mut reply: &[u8] = &[4, 0, 0, 1, 127, 0, 0, 1, 0x00, 0x50];
        let err = read_reply(&mut reply).await.unwrap_err();
        assert!(matches!(err, Socks5Error::VersionMismatch(4)));
    }

    #[tokio::test]
    async fn carries_the_status() {
        let mut reply: &[u8] = &[5, 5, 0, 1, 0, 0, 0, 0, 0, 0];
        let err = read_reply(&mut reply).await.unwrap_err();
        assert!(matches!(err, Socks5Error::ConnectFailed(5)));
    }

    #[tokio::test]
    async fn short_bound_address() {
        let mut reply: &[u8] = &[5, 0, 0, 4, 0, 0];
        let err = read_reply(&mut reply).await.unwrap_err();
        assert!(matches!(
            err,
            Socks5Error::TruncatedAddress {
                field: AddressField::Ipv6,
                ..
            }
        ));
    }
}
