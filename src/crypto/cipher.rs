//! ChaCha20-Poly1305 AEAD keyed from the session master key
//!
//! One `ShadowCipher` per direction. The salt is set exactly once, either
//! minted locally (write side) or received from the peer (read side); the
//! 12-byte little-endian nonce starts at zero and advances after every
//! successful seal or open.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, CHACHA20_POLY1305};

use super::kdf::{derive_key, hkdf_sha1, increment};
use super::{CryptoError, KEY_SIZE, NONCE_SIZE, SALT_SIZE, SUBKEY_INFO, TAG_SIZE};

/// Per-direction AEAD state: master key, salt slot, counter nonce.
pub struct ShadowCipher {
    key: [u8; KEY_SIZE],
    salt: Option<[u8; SALT_SIZE]>,
    nonce: [u8; NONCE_SIZE],
}

impl ShadowCipher {
    /// Create a cipher from a 32-byte master key
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength);
        }

        let mut k = [0u8; KEY_SIZE];
        k.copy_from_slice(key);

        Ok(Self {
            key: k,
            salt: None,
            nonce: [0u8; NONCE_SIZE],
        })
    }

    /// Create a cipher from a password, deriving the master key first
    pub fn with_password(password: &[u8]) -> Self {
        let derived = derive_key(password, KEY_SIZE);
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&derived);

        Self {
            key,
            salt: None,
            nonce: [0u8; NONCE_SIZE],
        }
    }

    /// The session salt, or `None` until the first send/receive sets it
    pub fn salt(&self) -> Option<&[u8; SALT_SIZE]> {
        self.salt.as_ref()
    }

    /// Fill the salt slot. The salt never rotates for the life of the
    /// connection; later calls are no-ops.
    pub fn set_salt(&mut self, salt: [u8; SALT_SIZE]) {
        if self.salt.is_none() {
            self.salt = Some(salt);
        }
    }

    /// Seal `plaintext` under the current nonce, then advance the nonce.
    ///
    /// Output is `plaintext.len() + 16` bytes. Requires the salt to be set.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = self.session_key()?;
        let nonce = Nonce::assume_unique_for_key(self.nonce);

        let mut out = Vec::with_capacity(plaintext.len() + TAG_SIZE);
        out.extend_from_slice(plaintext);
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut out)
            .map_err(|_| CryptoError::Encryption)?;

        increment(&mut self.nonce);
        Ok(out)
    }

    /// Open `ciphertext` under the current nonce, advancing the nonce only
    /// on success. An authentication failure leaves the nonce untouched and
    /// is fatal for the session.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = self.session_key()?;
        let nonce = Nonce::assume_unique_for_key(self.nonce);

        let mut buf = ciphertext.to_vec();
        let n = key
            .open_in_place(nonce, Aad::empty(), &mut buf)
            .map_err(|_| CryptoError::Authentication)?
            .len();

        increment(&mut self.nonce);
        buf.truncate(n);
        Ok(buf)
    }

    // The subkey is a pure function of (key, salt); recomputing it per call
    // keeps the state to exactly what the wire protocol defines.
    fn session_key(&self) -> Result<LessSafeKey, CryptoError> {
        let salt = self.salt.as_ref().ok_or(CryptoError::MissingSalt)?;
        let subkey = hkdf_sha1(&self.key, salt, SUBKEY_INFO)?;

        let unbound =
            UnboundKey::new(&CHACHA20_POLY1305, &subkey).map_err(|_| CryptoError::InvalidKeyLength)?;

        Ok(LessSafeKey::new(unbound))
    }
}
