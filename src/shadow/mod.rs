//! The encrypted stream layer
//!
//! Wraps a reliable, ordered byte stream and re-exposes it as a byte
//! stream, with every chunk sealed into an AEAD (length, payload) frame
//! pair. Each direction owns its own salt and nonce, so the read and write
//! halves never contend.

mod stream;

pub use stream::{ShadowReader, ShadowStream, ShadowWriter};

use thiserror::Error;

use crate::crypto::CryptoError;

/// Shadow stream errors
#[derive(Debug, Error)]
pub enum ShadowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Stream poisoned by a previous error")]
    Poisoned,
}
