//! SOCKS5 negotiation (RFC 1928 subset: no authentication, CONNECT only)

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::{Address, ProxyError};

/// SOCKS5 version byte
const VERSION: u8 = 0x05;

/// The methods defined in RFC 1928 section 3
const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_NO_ACCEPTABLE: u8 = 0xFF;

/// The commands defined in RFC 1928 section 4
const CMD_CONNECT: u8 = 0x01;

/// Reply: succeeded, bound to 0.0.0.0:0
const REPLY_SUCCEEDED: [u8; 10] = [VERSION, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];

/// Reply: command not supported
const REPLY_COMMAND_NOT_SUPPORTED: [u8; 10] = [VERSION, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0];

/// Negotiate with a SOCKS5 client and return the requested target address.
///
/// Accepts only the no-authentication method and the CONNECT command. The
/// success reply is sent after the address record parses, so a malformed
/// request aborts before the client is told to start writing payload.
pub async fn handshake<S>(stream: &mut S) -> Result<Address, ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // greeting: VER, NMETHODS, then the method list
    let mut head = [0u8; 2];
    stream.read_exact(&mut head).await?;

    if head[0] != VERSION {
        return Err(ProxyError::InvalidVersion(head[0]));
    }

    let nmethods = head[1] as usize;
    let mut methods = [0u8; 255];
    stream.read_exact(&mut methods[..nmethods]).await?;

    if !methods[..nmethods].contains(&METHOD_NO_AUTH) {
        stream.write_all(&[VERSION, METHOD_NO_ACCEPTABLE]).await?;
        return Err(ProxyError::NoAcceptableMethod);
    }

    stream.write_all(&[VERSION, METHOD_NO_AUTH]).await?;

    // request: VER, CMD, RSV, then the address record
    let mut request = [0u8; 3];
    stream.read_exact(&mut request).await?;

    if request[0] != VERSION {
        return Err(ProxyError::InvalidVersion(request[0]));
    }

    if request[1] != CMD_CONNECT {
        stream.write_all(&REPLY_COMMAND_NOT_SUPPORTED).await?;
        return Err(ProxyError::UnsupportedCommand(request[1]));
    }

    let addr = read_target_address(stream).await?;
    stream.write_all(&REPLY_SUCCEEDED).await?;

    debug!("SOCKS5 CONNECT to {}", addr);
    Ok(addr)
}

/// Read an RFC 1928 address record, starting at the address-type byte
pub async fn read_target_address<R: AsyncRead + Unpin>(r: &mut R) -> Result<Address, ProxyError> {
    Address::read_from(r).await
}
