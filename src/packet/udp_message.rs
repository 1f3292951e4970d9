use std::io::Cursor;

use tokio::io::AsyncReadExt;

use crate::{
    protocol::{SocksSocketAddr, RESERVED_16},
    Step, StepExt,
};

/// A datagram as exchanged with a SOCKS5 UDP relay:
/// `[RSV 2][FRAG 1][ADDRESS][DATA]`.
#[derive(Debug)]
pub struct UdpMessage<'a> {
    pub fragment_number: u8,
    pub dst: SocksSocketAddr,
    pub data: &'a [u8],
}

impl<'a> UdpMessage<'a> {
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut res: Vec<u8> = Vec::with_capacity(self.data.len() + 32);
        res.extend_from_slice(&RESERVED_16.to_be_bytes());
        res.push(self.fragment_number);
        res.extend(self.dst.to_bytes());
        res.extend_from_slice(self.data);
        res
    }

    /// Reserved bytes are not checked; reassembly of fragments is up to the caller.
    pub async fn parse(buf: &'a [u8]) -> crate::Result<Self> {
        let mut cursor = Cursor::new(buf);

        let _reserved = cursor.read_u16().await.during(Step::UdpRelay)?;
        let fragment_number = cursor.read_u8().await.during(Step::UdpRelay)?;
        let dst = SocksSocketAddr::read(&mut cursor).await?;

        let current_pos = cursor.position() as usize;
        let data = &buf[current_pos..];
        Ok(UdpMessage {
            fragment_number,
            dst,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn layout() {
        let message = UdpMessage {
            fragment_number: 0,
            dst: "8.8.8.8:53".parse().unwrap(),
            data: b"query",
        };
        let bytes = message.as_bytes();
        assert_eq!(&bytes[..10], &[0, 0, 0, 1, 8, 8, 8, 8, 0, 53]);
        assert_eq!(&bytes[10..], b"query");

        let parsed = UdpMessage::parse(&bytes).await.unwrap();
        assert_eq!(parsed.dst, message.dst);
        assert_eq!(parsed.data, b"query");
    }

    #[tokio::test]
    async fn domain_destination_and_fragment() {
        let mut bytes = vec![0, 0, 2, 3, 4];
        bytes.extend_from_slice(b"a.io");
        bytes.extend_from_slice(&[0, 53]);
        bytes.extend_from_slice(b"x");

        let parsed = UdpMessage::parse(&bytes).await.unwrap();
        assert_eq!(parsed.fragment_number, 2);
        assert_eq!(parsed.dst.to_string(), "a.io:53");
        assert_eq!(parsed.data, b"x");
    }

    #[tokio::test]
    async fn too_short() {
        assert!(UdpMessage::parse(&[0, 0]).await.is_err());
        assert!(UdpMessage::parse(&[0, 0, 0, 1, 8, 8]).await.is_err());
    }
}
