use crate::Socks5Error;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect = 0x01,
    UdpAssociate = 0x03,
}

impl Command {
    pub fn to_u8(&self) -> u8 {
        *self as u8
    }

    /// Maps a network name (`tcp`, `udp6`, ...) to the command that proxies it.
    pub fn from_network(network: &str) -> crate::Result<Self> {
        match network.to_ascii_lowercase().as_str() {
            "tcp" | "tcp4" | "tcp6" => Ok(Command::Connect),
            "udp" | "udp4" | "udp6" => Ok(Command::UdpAssociate),
            _ => Err(Socks5Error::UnsupportedCommand(network.to_owned())),
        }
    }
}
