//! Key derivation functions
//!
//! Password stretching and the HKDF-SHA1 subkey derivation used on the
//! wire, plus the little-endian nonce counter.

use hkdf::Hkdf;
use md5::{Digest, Md5};
use sha1::Sha1;

use super::CryptoError;

/// Generate a key of `size` bytes from a password.
///
/// Iterates `buf_{i+1} = MD5(buf_i || password)` starting from an empty
/// buffer and concatenates the digests until `size` bytes accumulate (the
/// OpenSSL EVP_BytesToKey construction with no salt and a single iteration).
/// Weak by design; the construction is fixed for interoperability.
pub fn derive_key(password: &[u8], size: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(size + 16);
    let mut digest: Vec<u8> = Vec::new();

    while key.len() < size {
        let mut h = Md5::new();
        h.update(&digest);
        h.update(password);
        digest = h.finalize().to_vec();
        key.extend_from_slice(&digest);
    }

    key.truncate(size);
    key
}

/// Derive a session subkey from a master key and a salt.
///
/// RFC 5869 HKDF with SHA-1. The output length equals the key length, and
/// `info` must be the fixed string `ss-subkey`.
pub fn hkdf_sha1(key: &[u8], salt: &[u8], info: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let hk = Hkdf::<Sha1>::new(Some(salt), key);
    let mut subkey = vec![0u8; key.len()];
    hk.expand(info, &mut subkey)
        .map_err(|_| CryptoError::KeyDerivation("HKDF expand failed".to_string()))?;

    Ok(subkey)
}

/// Add one to a little-endian counter of arbitrary width, wrapping past the
/// top. Byte 0 increments first; a carry ripples upward.
pub fn increment(num: &mut [u8]) {
    for b in num.iter_mut() {
        *b = b.wrapping_add(1);
        if *b != 0 {
            break;
        }
    }
}
