use std::{
    fmt, io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    str::FromStr,
    sync::OnceLock,
};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::Socks5Error;

const MAX_DOMAIN_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Ipv4 = 0x01,
    DomainName = 0x03,
    Ipv6 = 0x04,
}

impl AddressType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(AddressType::Ipv4),
            0x03 => Some(AddressType::DomainName),
            0x04 => Some(AddressType::Ipv6),
            _ => None,
        }
    }

    pub fn to_u8(&self) -> u8 {
        *self as u8
    }
}

/// The part of an encoded address that was being read when the input ran short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressField {
    AddressType,
    Ipv4,
    Ipv6,
    DomainLength,
    DomainName,
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = match self {
            AddressField::AddressType => "address type",
            AddressField::Ipv4 => "IPv4 address",
            AddressField::Ipv6 => "IPv6 address",
            AddressField::DomainLength => "domain name length",
            AddressField::DomainName => "domain name",
        };
        write!(f, "{}", field)
    }
}

/// A host name of 1 to 255 bytes that is not an IP literal.
///
/// The first successful [`DomainName::resolve`] is cached; later calls reuse it.
#[derive(Debug, Clone)]
pub struct DomainName {
    name: String,
    resolved: OnceLock<IpAddr>,
}

impl DomainName {
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_DOMAIN_LEN {
            return Err(Socks5Error::InvalidAddress(format!(
                "domain name must be 1 to {} bytes long, got {}",
                MAX_DOMAIN_LEN,
                name.len()
            )));
        }
        if name.parse::<IpAddr>().is_ok() {
            return Err(Socks5Error::InvalidAddress(format!(
                "{} is an IP literal, not a domain name",
                name
            )));
        }
        Ok(DomainName {
            name,
            resolved: OnceLock::new(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The cached result of a previous resolution, if any.
    pub fn resolved(&self) -> Option<IpAddr> {
        self.resolved.get().copied()
    }

    pub async fn resolve(&self, port: u16) -> crate::Result<IpAddr> {
        if let Some(ip) = self.resolved.get() {
            return Ok(*ip);
        }

        let failed = |source: io::Error| Socks5Error::ResolutionFailed {
            host: self.name.clone(),
            source,
        };
        let ip = tokio::net::lookup_host((self.name.as_str(), port))
            .await
            .map_err(failed)?
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| {
                failed(io::Error::new(
                    io::ErrorKind::NotFound,
                    "lookup returned no addresses",
                ))
            })?;

        trace!(domain = %self.name, %ip, "resolved");
        Ok(*self.resolved.get_or_init(|| ip))
    }
}

impl PartialEq for DomainName {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for DomainName {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Addr {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Domain(DomainName),
}

impl Addr {
    pub fn addr_type(&self) -> AddressType {
        match self {
            Addr::Ipv4(_) => AddressType::Ipv4,
            Addr::Ipv6(_) => AddressType::Ipv6,
            Addr::Domain(_) => AddressType::DomainName,
        }
    }

    /// Classifies a textual host. IP literals become `Ipv4`/`Ipv6`
    /// (IPv4-mapped IPv6 literals count as IPv4), everything else is a domain.
    pub fn from_host(host: &str) -> crate::Result<Self> {
        match host.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => Ok(Addr::Ipv4(ip)),
            Ok(IpAddr::V6(ip)) => Ok(match ip.to_ipv4_mapped() {
                Some(ip) => Addr::Ipv4(ip),
                None => Addr::Ipv6(ip),
            }),
            Err(_) => DomainName::new(host).map(Addr::Domain),
        }
    }
}

impl From<IpAddr> for Addr {
    fn from(value: IpAddr) -> Self {
        match value {
            IpAddr::V4(ip) => Addr::Ipv4(ip),
            IpAddr::V6(ip) => Addr::Ipv6(ip),
        }
    }
}

/// A proxy destination: host, port and the network type it was requested for.
///
/// The network type is not part of the wire encoding and does not take part
/// in equality.
#[derive(Debug, Clone)]
pub struct SocksSocketAddr {
    addr: Addr,
    port: u16,
    network: String,
}

impl SocksSocketAddr {
    pub fn new(addr: Addr, port: u16) -> Self {
        SocksSocketAddr {
            addr,
            port,
            network: String::new(),
        }
    }

    /// Parses `host:port` (or `[v6]:port`).
    pub fn parse(network: &str, addr: &str) -> crate::Result<Self> {
        let (host, port) = split_host_port(addr)?;
        let port = port
            .parse::<u16>()
            .map_err(|_| Socks5Error::InvalidAddress(format!("invalid port in {}", addr)))?;
        Self::from_host_port(network, host, port)
    }

    pub fn from_host_port(network: &str, host: &str, port: u16) -> crate::Result<Self> {
        Ok(SocksSocketAddr::new(Addr::from_host(host)?, port).with_network(network))
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    pub fn addr(&self) -> &Addr {
        &self.addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn addr_type(&self) -> AddressType {
        self.addr.addr_type()
    }

    /// Reads ATYP+ADDR+PORT.
    ///
    /// A domain name holding an IP literal is reclassified as `Ipv4`/`Ipv6`;
    /// some clients (browsers in particular) put IP literals in the domain slot.
    pub async fn read<R>(reader: &mut R) -> crate::Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let atyp = reader
            .read_u8()
            .await
            .map_err(truncated(AddressField::AddressType))?;
        let addr_type = AddressType::from_u8(atyp).ok_or(Socks5Error::InvalidAddressType(atyp))?;

        let (addr, port) = match addr_type {
            AddressType::Ipv4 => {
                let mut buf = [0u8; 6];
                reader
                    .read_exact(&mut buf)
                    .await
                    .map_err(truncated(AddressField::Ipv4))?;
                let ip = Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]);
                (Addr::Ipv4(ip), u16::from_be_bytes([buf[4], buf[5]]))
            }
            AddressType::Ipv6 => {
                let mut buf = [0u8; 18];
                reader
                    .read_exact(&mut buf)
                    .await
                    .map_err(truncated(AddressField::Ipv6))?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&buf[..16]);
                (
                    Addr::Ipv6(Ipv6Addr::from(octets)),
                    u16::from_be_bytes([buf[16], buf[17]]),
                )
            }
            AddressType::DomainName => {
                let len = reader
                    .read_u8()
                    .await
                    .map_err(truncated(AddressField::DomainLength))? as usize;

                let mut buf = vec![0u8; len + 2];
                reader
                    .read_exact(&mut buf)
                    .await
                    .map_err(truncated(AddressField::DomainName))?;
                let port = u16::from_be_bytes([buf[len], buf[len + 1]]);
                buf.truncate(len);

                let host = String::from_utf8(buf).map_err(|_| {
                    Socks5Error::InvalidAddress("domain name is not valid utf8".to_owned())
                })?;
                let addr = Addr::from_host(&host)?;
                if !matches!(addr, Addr::Domain(_)) {
                    trace!(%host, "IP literal in domain name slot, reclassified");
                }
                (addr, port)
            }
        };

        Ok(SocksSocketAddr::new(addr, port))
    }

    /// Turns `Self` into: AddrType+ADDR+PORT
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(MAX_DOMAIN_LEN + 4);

        bytes.push(self.addr.addr_type().to_u8());

        match &self.addr {
            Addr::Ipv4(addr) => bytes.extend_from_slice(&addr.octets()[..]),
            Addr::Ipv6(addr) => bytes.extend_from_slice(&addr.octets()[..]),
            Addr::Domain(domain) => {
                // DomainName::new bounds the length to a single byte.
                bytes.push(domain.as_str().len() as u8);
                bytes.extend_from_slice(domain.as_str().as_bytes())
            }
        }
        bytes.extend_from_slice(&self.port.to_be_bytes());

        bytes
    }

    /// Writes AddrType+ADDR+PORT. Errors from `writer` are returned as is.
    pub async fn write_to<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.to_bytes()).await
    }

    /// IP literals are returned as they are, domains are looked up once and cached.
    pub async fn resolve(&self) -> crate::Result<IpAddr> {
        match &self.addr {
            Addr::Ipv4(ip) => Ok(IpAddr::V4(*ip)),
            Addr::Ipv6(ip) => Ok(IpAddr::V6(*ip)),
            Addr::Domain(domain) => domain.resolve(self.port).await,
        }
    }

    pub async fn to_socket_addr(&self) -> crate::Result<SocketAddr> {
        Ok(SocketAddr::new(self.resolve().await?, self.port))
    }
}

fn truncated(field: AddressField) -> impl FnOnce(io::Error) -> Socks5Error {
    move |source| Socks5Error::TruncatedAddress { field, source }
}

fn split_host_port(addr: &str) -> crate::Result<(&str, &str)> {
    let invalid = || Socks5Error::InvalidAddress(format!("expected host:port, got {}", addr));

    if let Some(rest) = addr.strip_prefix('[') {
        return rest.split_once("]:").ok_or_else(invalid);
    }

    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    if host.contains(':') {
        return Err(invalid());
    }
    Ok((host, port))
}

impl PartialEq for SocksSocketAddr {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr && self.port == other.port
    }
}

impl Eq for SocksSocketAddr {}

impl fmt::Display for SocksSocketAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.addr {
            Addr::Ipv4(ip) => write!(f, "{}:{}", ip, self.port),
            Addr::Ipv6(ip) => write!(f, "[{}]:{}", ip, self.port),
            Addr::Domain(domain) => write!(f, "{}:{}", domain.as_str(), self.port),
        }
    }
}

impl FromStr for SocksSocketAddr {
    type Err = Socks5Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SocksSocketAddr::parse("", s)
    }
}

impl From<SocketAddr> for SocksSocketAddr {
    fn from(value: SocketAddr) -> Self {
        SocksSocketAddr::new(value.ip().into(), value.port())
    }
}
