//! Bidirectional copy between an established shadow stream and a plain
//! stream
//!
//! One task per direction; the pair is joined before the sockets are
//! released. When a direction reaches end of stream the opposite write half
//! is shut down, so a half-closed peer drains instead of hanging.

use thiserror::Error;
use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tracing::trace;

use crate::crypto::MAX_PAYLOAD_SIZE;
use crate::shadow::{ShadowError, ShadowReader, ShadowStream, ShadowWriter};

/// Relay errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shadow stream error: {0}")]
    Shadow(#[from] ShadowError),

    #[error("Relay task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Copy bytes both ways until each direction reaches end of stream or
/// fails. Returns the (plain-to-shadow, shadow-to-plain) byte counts.
pub async fn relay<S, T>(shadow: ShadowStream<S>, plain: T) -> Result<(u64, u64), RelayError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut shadow_reader, mut shadow_writer) = shadow.into_split();
    let (mut plain_reader, mut plain_writer) = split(plain);

    let outbound = tokio::spawn(async move {
        let result = copy_to_shadow(&mut plain_reader, &mut shadow_writer).await;
        shadow_writer.shutdown().await.ok();
        result
    });

    let inbound = tokio::spawn(async move {
        let result = copy_from_shadow(&mut shadow_reader, &mut plain_writer).await;
        plain_writer.shutdown().await.ok();
        result
    });

    // Both directions finish before the sockets are released.
    let (sent, received) = tokio::try_join!(outbound, inbound)?;
    let (sent, received) = (sent?, received?);

    trace!("relay done: {} bytes out, {} bytes in", sent, received);
    Ok((sent, received))
}

async fn copy_to_shadow<R, W>(
    reader: &mut ReadHalf<R>,
    writer: &mut ShadowWriter<W>,
) -> Result<u64, RelayError>
where
    R: AsyncRead,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; MAX_PAYLOAD_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        writer.write(&buf[..n]).await?;
        total += n as u64;
    }
}

async fn copy_from_shadow<R, W>(
    reader: &mut ShadowReader<R>,
    writer: &mut WriteHalf<W>,
) -> Result<u64, RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite,
{
    let mut buf = vec![0u8; MAX_PAYLOAD_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_relay_round_trip() {
        // tunnel wire between the relay and a peer shadow stream
        let (tunnel_a, tunnel_b) = tokio::io::duplex(65536);
        // plain side handed to the relay, and its application end
        let (plain_a, mut app) = tokio::io::duplex(65536);

        let relay_task = tokio::spawn(relay(ShadowStream::new(tunnel_a, b"pw"), plain_a));

        let mut peer = ShadowStream::new(tunnel_b, b"pw");

        // peer -> relay -> app
        peer.write(b"request").await.unwrap();
        let mut buf = [0u8; 32];
        let n = app.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"request");

        // app -> relay -> peer
        app.write_all(b"response").await.unwrap();
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"response");

        // closing both ends lets the relay join
        peer.shutdown().await.unwrap();
        app.shutdown().await.unwrap();

        let (sent, received) = relay_task.await.unwrap().unwrap();
        assert_eq!(sent, 8);
        assert_eq!(received, 7);
    }
}
