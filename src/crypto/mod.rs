//! Cryptographic primitives for the shadow tunnel
//!
//! This module provides:
//! - Password-to-key stretching (EVP_BytesToKey-style MD5 chain)
//! - HKDF-SHA1 session subkey derivation
//! - ChaCha20-Poly1305 AEAD with a per-direction counter nonce
//! - Secure random number generation

mod cipher;
mod kdf;

pub use cipher::ShadowCipher;
pub use kdf::{derive_key, hkdf_sha1, increment};

use thiserror::Error;

/// Length of the master key and the session subkey in bytes
pub const KEY_SIZE: usize = 32;

/// Length of the per-direction salt in bytes
pub const SALT_SIZE: usize = 32;

/// Length of the AEAD nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Length of the authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Maximum plaintext bytes carried by a single payload frame
pub const MAX_PAYLOAD_SIZE: usize = 0x3FFF;

/// HKDF info string fixed by the protocol
pub(crate) const SUBKEY_INFO: &[u8] = b"ss-subkey";

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key length")]
    InvalidKeyLength,

    #[error("Salt not set before first use")]
    MissingSalt,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed")]
    Encryption,

    #[error("Authentication failed")]
    Authentication,
}

/// Generate cryptographically secure random bytes
pub fn random_bytes(buf: &mut [u8]) {
    use ring::rand::{SecureRandom, SystemRandom};
    let rng = SystemRandom::new();
    rng.fill(buf).expect("Failed to generate random bytes");
}

/// Mint a fresh random salt
pub fn random_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    random_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_salt() {
        let salt1 = random_salt();
        let salt2 = random_salt();
        assert_ne!(salt1, salt2);
    }
}
