//! # Shadow Tunnel
//!
//! A Shadowsocks-compatible encrypted TCP tunnel. A local SOCKS5 front-end
//! accepts client connections, forwards them over AEAD-sealed frames to a
//! remote peer, and the remote peer decrypts and relays to arbitrary
//! destinations, hiding both traffic contents and destination addresses
//! from intermediate observers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  SOCKS5   ┌──────────────┐  encrypted  ┌──────────────┐
//! │  Application │ ────────► │ shadow-client│ ══════════► │ shadow-server│ ──► target
//! └──────────────┘ plaintext └──────────────┘   frames    └──────────────┘
//! ```
//!
//! Each direction of the tunnel carries a 32-byte salt followed by
//! ChaCha20-Poly1305 sealed (length, payload) frame pairs; the AEAD subkey
//! is HKDF-SHA1 derived from the password key and the salt.

pub mod config;
pub mod crypto;
pub mod proxy;
pub mod relay;
pub mod shadow;

pub use config::Config;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Shadow stream error: {0}")]
    Shadow(#[from] shadow::ShadowError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] proxy::ProxyError),

    #[error("Relay error: {0}")]
    Relay(#[from] relay::RelayError),

    #[error("Configuration error: {0}")]
    Config(String),
}
