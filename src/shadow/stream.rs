//! Framed seal-and-send / receive-and-open over a wrapped byte stream
//!
//! Wire format per direction:
//!
//! ```text
//! [ 32 bytes salt ]
//! [ 18 bytes sealed length ] [ len+16 bytes sealed payload ]
//! [ 18 bytes sealed length ] [ len+16 bytes sealed payload ]
//! ...
//! ```
//!
//! The salt goes out lazily with the first write and is consumed lazily by
//! the first read. Payload lengths are 2-byte big-endian, masked with
//! 0x3FFF on read, so a frame carries at most 16383 plaintext bytes.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use super::ShadowError;
use crate::crypto::{self, ShadowCipher, MAX_PAYLOAD_SIZE, SALT_SIZE, TAG_SIZE};

/// Sealed length prefix size on the wire (2 bytes + tag)
const SEALED_LEN_SIZE: usize = 2 + TAG_SIZE;

fn truncated() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "stream closed mid-frame")
}

/// Decrypting half of a shadow stream.
///
/// Holds the read-direction AEAD state and the re-assembly buffer that
/// serves callers whose buffers are smaller than a frame.
pub struct ShadowReader<R> {
    inner: R,
    cipher: ShadowCipher,
    /// Unread tail of the most recently decrypted payload
    buffered: Bytes,
    /// Reusable ciphertext buffer, sized for the largest sealed payload
    frame: Vec<u8>,
    poisoned: bool,
}

impl<R: AsyncRead + Unpin> ShadowReader<R> {
    pub fn new(inner: R, cipher: ShadowCipher) -> Self {
        Self {
            inner,
            cipher,
            buffered: Bytes::new(),
            frame: vec![0u8; MAX_PAYLOAD_SIZE + TAG_SIZE],
            poisoned: false,
        }
    }

    /// Read decrypted bytes into `out`, fetching at most one frame from the
    /// underlying stream. Returns `Ok(0)` only at a clean end of stream.
    ///
    /// Any authentication failure, truncation, or underlying error poisons
    /// the reader; all subsequent reads fail.
    pub async fn read(&mut self, out: &mut [u8]) -> Result<usize, ShadowError> {
        if self.poisoned {
            return Err(ShadowError::Poisoned);
        }

        match self.read_inner(out).await {
            Ok(n) => Ok(n),
            Err(e) => {
                self.poisoned = true;
                Err(e)
            }
        }
    }

    async fn read_inner(&mut self, out: &mut [u8]) -> Result<usize, ShadowError> {
        self.read_salt().await?;

        if self.buffered.is_empty() {
            match self.next_frame().await? {
                Some(payload) => self.buffered = payload,
                None => return Ok(0),
            }
        }

        let n = self.buffered.len().min(out.len());
        out[..n].copy_from_slice(&self.buffered[..n]);
        self.buffered = self.buffered.slice(n..);

        Ok(n)
    }

    // The 32 salt bytes are a mandatory prefix; a peer that closes before
    // sending them is a protocol error.
    async fn read_salt(&mut self) -> Result<(), ShadowError> {
        if self.cipher.salt().is_some() {
            return Ok(());
        }

        let mut salt = [0u8; SALT_SIZE];
        self.inner.read_exact(&mut salt).await?;
        self.cipher.set_salt(salt);

        Ok(())
    }

    /// Fetch and open one (length, payload) frame pair. Returns `None` when
    /// the peer closed cleanly at a frame boundary.
    async fn next_frame(&mut self) -> Result<Option<Bytes>, ShadowError> {
        let mut filled = 0;
        while filled < SEALED_LEN_SIZE {
            let n = self.inner.read(&mut self.frame[filled..SEALED_LEN_SIZE]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(truncated().into());
            }
            filled += n;
        }

        let len_bytes = self.cipher.decrypt(&self.frame[..SEALED_LEN_SIZE])?;
        let payload_len = ((len_bytes[0] as usize) << 8 | len_bytes[1] as usize) & MAX_PAYLOAD_SIZE;

        let sealed = payload_len + TAG_SIZE;
        self.inner.read_exact(&mut self.frame[..sealed]).await?;

        let payload = self.cipher.decrypt(&self.frame[..sealed])?;
        Ok(Some(Bytes::from(payload)))
    }
}

/// Encrypting half of a shadow stream.
pub struct ShadowWriter<W> {
    inner: W,
    cipher: ShadowCipher,
    poisoned: bool,
}

impl<W: AsyncWrite + Unpin> ShadowWriter<W> {
    pub fn new(inner: W, cipher: ShadowCipher) -> Self {
        Self {
            inner,
            cipher,
            poisoned: false,
        }
    }

    /// Seal and send the whole buffer, splitting it into frames of at most
    /// 16383 plaintext bytes. Returns the plaintext byte count on success.
    ///
    /// Frames already on the wire cannot be unsent; any underlying failure
    /// poisons the writer and all subsequent writes fail.
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize, ShadowError> {
        if self.poisoned {
            return Err(ShadowError::Poisoned);
        }

        match self.write_inner(buf).await {
            Ok(n) => Ok(n),
            Err(e) => {
                self.poisoned = true;
                Err(e)
            }
        }
    }

    async fn write_inner(&mut self, buf: &[u8]) -> Result<usize, ShadowError> {
        self.write_salt().await?;

        for chunk in buf.chunks(MAX_PAYLOAD_SIZE) {
            let sealed_len = self.cipher.encrypt(&(chunk.len() as u16).to_be_bytes())?;
            let sealed_payload = self.cipher.encrypt(chunk)?;

            // A chunk's length and payload frames go out as one contiguous
            // write; the single writer task keeps pairs from interleaving.
            let mut wire = BytesMut::with_capacity(sealed_len.len() + sealed_payload.len());
            wire.extend_from_slice(&sealed_len);
            wire.extend_from_slice(&sealed_payload);
            self.inner.write_all(&wire).await?;
        }

        self.inner.flush().await?;
        Ok(buf.len())
    }

    // The salt is the first thing on the wire, minted once per connection.
    async fn write_salt(&mut self) -> Result<(), ShadowError> {
        if self.cipher.salt().is_some() {
            return Ok(());
        }

        let salt = crypto::random_salt();
        self.inner.write_all(&salt).await?;
        self.cipher.set_salt(salt);

        Ok(())
    }

    /// Shut down the underlying write half, signalling end of stream.
    pub async fn shutdown(&mut self) -> Result<(), ShadowError> {
        self.inner.shutdown().await?;
        Ok(())
    }

    /// Consume the writer, returning the wrapped stream
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// An encrypted byte stream over any bidirectional transport.
///
/// Both directions are keyed from the same password-derived master key but
/// carry independent salts and nonces, so after [`ShadowStream::into_split`]
/// the reader and writer tasks share no state.
pub struct ShadowStream<S> {
    reader: ShadowReader<ReadHalf<S>>,
    writer: ShadowWriter<WriteHalf<S>>,
}

impl<S: AsyncRead + AsyncWrite> ShadowStream<S> {
    /// Wrap `stream`, deriving the master key from `password`
    pub fn new(stream: S, password: &[u8]) -> Self {
        let (read_half, write_half) = split(stream);

        Self {
            reader: ShadowReader::new(read_half, ShadowCipher::with_password(password)),
            writer: ShadowWriter::new(write_half, ShadowCipher::with_password(password)),
        }
    }

    /// Read decrypted bytes; see [`ShadowReader::read`]
    pub async fn read(&mut self, out: &mut [u8]) -> Result<usize, ShadowError> {
        self.reader.read(out).await
    }

    /// Seal and send bytes; see [`ShadowWriter::write`]
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize, ShadowError> {
        self.writer.write(buf).await
    }

    /// Shut down the write direction
    pub async fn shutdown(&mut self) -> Result<(), ShadowError> {
        self.writer.shutdown().await
    }

    /// Split into independently-owned read and write halves, one per relay
    /// task
    pub fn into_split(self) -> (ShadowReader<ReadHalf<S>>, ShadowWriter<WriteHalf<S>>) {
        (self.reader, self.writer)
    }
}
