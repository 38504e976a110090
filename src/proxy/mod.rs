//! SOCKS5 negotiation and the target address codec
//!
//! The address record parsed here doubles as the first payload on the
//! encrypted stream, so its wire form is preserved exactly on both paths.

pub mod socks5;

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// The address types defined in RFC 1928 section 5
pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const ATYP_IPV6: u8 = 0x04;

/// Longest possible encoded record: type + length byte + 255 host bytes + port
pub const MAX_ADDRESS_LEN: usize = 1 + 1 + 255 + 2;

/// Proxy errors
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SOCKS version: {0}")]
    InvalidVersion(u8),

    #[error("No acceptable authentication method")]
    NoAcceptableMethod,

    #[error("Unsupported command: {0}")]
    UnsupportedCommand(u8),

    #[error("Unsupported address type: {0}")]
    UnsupportedAddressType(u8),

    #[error("Malformed address record")]
    MalformedAddress,
}

/// Target address from RFC 1928 section 5, reused as the first payload on
/// the encrypted stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// IPv4 address and port
    Ipv4([u8; 4], u16),
    /// Domain name and port
    Domain(String, u16),
    /// IPv6 address and port
    Ipv6([u8; 16], u16),
}

impl Address {
    /// Read one address record from a stream, starting at the
    /// address-type byte.
    pub async fn read_from<R: AsyncRead + Unpin>(r: &mut R) -> Result<Self, ProxyError> {
        let atyp = r.read_u8().await?;

        match atyp {
            ATYP_IPV4 => {
                let mut ip = [0u8; 4];
                r.read_exact(&mut ip).await?;
                let port = r.read_u16().await?;
                Ok(Address::Ipv4(ip, port))
            }
            ATYP_DOMAIN => {
                let len = r.read_u8().await? as usize;
                let mut host = vec![0u8; len];
                r.read_exact(&mut host).await?;
                let port = r.read_u16().await?;
                Ok(Address::Domain(
                    String::from_utf8_lossy(&host).to_string(),
                    port,
                ))
            }
            ATYP_IPV6 => {
                let mut ip = [0u8; 16];
                r.read_exact(&mut ip).await?;
                let port = r.read_u16().await?;
                Ok(Address::Ipv6(ip, port))
            }
            other => Err(ProxyError::UnsupportedAddressType(other)),
        }
    }

    /// Parse a complete record from a buffer, rejecting trailing bytes.
    ///
    /// This is the first-payload path on the remote side: the client sends
    /// exactly one record as its first logical write.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, ProxyError> {
        let (&atyp, rest) = buf.split_first().ok_or(ProxyError::MalformedAddress)?;

        match atyp {
            ATYP_IPV4 if rest.len() == 4 + 2 => {
                let mut ip = [0u8; 4];
                ip.copy_from_slice(&rest[..4]);
                Ok(Address::Ipv4(ip, u16::from_be_bytes([rest[4], rest[5]])))
            }
            ATYP_DOMAIN if !rest.is_empty() && rest.len() == 1 + rest[0] as usize + 2 => {
                let len = rest[0] as usize;
                let host = String::from_utf8_lossy(&rest[1..1 + len]).to_string();
                let port = u16::from_be_bytes([rest[1 + len], rest[2 + len]]);
                Ok(Address::Domain(host, port))
            }
            ATYP_IPV6 if rest.len() == 16 + 2 => {
                let mut ip = [0u8; 16];
                ip.copy_from_slice(&rest[..16]);
                Ok(Address::Ipv6(ip, u16::from_be_bytes([rest[16], rest[17]])))
            }
            ATYP_IPV4 | ATYP_DOMAIN | ATYP_IPV6 => Err(ProxyError::MalformedAddress),
            other => Err(ProxyError::UnsupportedAddressType(other)),
        }
    }

    /// Encode the record in its RFC 1928 wire form
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Address::Ipv4(ip, port) => {
                let mut buf = Vec::with_capacity(1 + 4 + 2);
                buf.push(ATYP_IPV4);
                buf.extend_from_slice(ip);
                buf.extend_from_slice(&port.to_be_bytes());
                buf
            }
            Address::Domain(host, port) => {
                let mut buf = Vec::with_capacity(1 + 1 + host.len() + 2);
                buf.push(ATYP_DOMAIN);
                buf.push(host.len() as u8);
                buf.extend_from_slice(host.as_bytes());
                buf.extend_from_slice(&port.to_be_bytes());
                buf
            }
            Address::Ipv6(ip, port) => {
                let mut buf = Vec::with_capacity(1 + 16 + 2);
                buf.push(ATYP_IPV6);
                buf.extend_from_slice(ip);
                buf.extend_from_slice(&port.to_be_bytes());
                buf
            }
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ipv4(ip, port) => write!(f, "{}:{}", Ipv4Addr::from(*ip), port),
            Address::Domain(host, port) => write!(f, "{}:{}", host, port),
            Address::Ipv6(ip, port) => write!(f, "[{}]:{}", Ipv6Addr::from(*ip), port),
        }
    }
}
