//! Cryptographic primitives for the keybox envelope and inner password
//! encryption.
//!
//! Design notes:
//!
//! - KDF: Argon2id derives the single 32-byte master key directly from the
//!   master passphrase + per-file salt. There is no DEK/KEK indirection: the
//!   same key authenticates and encrypts both the envelope payload and every
//!   individual password (see `crate::keybox::inner`).
//! - AEAD: the "secretbox" construction (XSalsa20 stream cipher + Poly1305
//!   one-time MAC) via `crypto_secretbox`. Nonces are 24 bytes and must never
//!   be reused under the same key.
//! - Integrity: callers also carry a CRC32 of the plaintext and a declared
//!   plaintext length (see `envelope.rs`), redundant with the MAC but kept
//!   per the format's diagnostic requirements.
//!
//! Security foot-guns to avoid:
//!
//! - Never reuse a `(key, nonce)` pair.
//! - Do not log or print keys or decrypted plaintext.
//! - Treat all returned plaintext bytes as sensitive; callers should prefer
//!   `Zeroizing` buffers for anything derived from them.

use argon2::{Algorithm, Argon2, Params as Argon2Params, Version};
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Nonce, XSalsa20Poly1305};
use rand::RngCore;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretSlice, SecretString};
use thiserror::Error;

/// Size (bytes) of the master key produced by the KDF and used directly by
/// secretbox.
pub const KEY_LEN: usize = 32;
/// Size (bytes) of an XSalsa20Poly1305 nonce.
pub const NONCE_LEN: usize = 24;
/// Size (bytes) of the Poly1305 authentication tag appended to ciphertext.
pub const MAC_LEN: usize = 16;
/// Default KDF salt size (bytes).
pub const SALT_LEN: usize = 16;
/// Argon2 version used by this format (0x13 == Argon2 v1.3).
pub const ARGON2_VERSION: u8 = 0x13;

/// Secret bytes held in memory with zeroize-on-drop semantics.
pub type SecretBytes = SecretSlice<u8>;

/// Argon2id tuning parameters, persisted in the envelope's KDF_PARAMS chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub version: u8,
    pub mem_cost_log2: u8,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl KdfParams {
    /// Spec-mandated defaults: version 0x13, 64 MiB, 3 passes, 1 lane.
    pub fn recommended() -> Self {
        Self {
            version: ARGON2_VERSION,
            mem_cost_log2: 16,
            time_cost: 3,
            parallelism: 1,
        }
    }

    /// Cheap parameters for tests, so the suite doesn't spend real
    /// wall-clock seconds per Argon2id run.
    pub fn for_tests() -> Self {
        Self {
            version: ARGON2_VERSION,
            mem_cost_log2: 13,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn mem_cost_kib(self) -> Result<u32, CryptoError> {
        // mem_cost_log2 comes straight from an on-disk chunk and may be any
        // byte value; a shift of 32 or more overflows `u32` instead of
        // producing a large-but-valid value, so it must be rejected rather
        // than shifted.
        if !(3..32).contains(&self.mem_cost_log2) {
            return Err(CryptoError::InvalidMemCostLog2(self.mem_cost_log2));
        }
        Ok(1u32 << self.mem_cost_log2)
    }

    fn to_argon2_params(self) -> Result<Argon2Params, CryptoError> {
        Ok(Argon2Params::new(
            self.mem_cost_kib()?,
            self.time_cost,
            self.parallelism,
            Some(KEY_LEN),
        )?)
    }

    fn argon2_version(self) -> Result<Version, CryptoError> {
        match self.version {
            ARGON2_VERSION => Ok(Version::V0x13),
            other => Err(CryptoError::UnsupportedArgon2Version(other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid nonce length")]
    InvalidNonceLength,

    #[error("argon2 error")]
    Argon2(#[from] argon2::Error),

    #[error("unsupported argon2 version byte {0:#04x}")]
    UnsupportedArgon2Version(u8),

    #[error("invalid kdf mem_cost_log2 {0} (must be in 3..32)")]
    InvalidMemCostLog2(u8),

    #[error("authentication failed")]
    Aead,
}

/// Generate `N` cryptographically-secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Derive the 32-byte master key from the passphrase using Argon2id.
pub fn kdf_argon2id(
    passphrase: &[u8],
    salt: &[u8],
    params: KdfParams,
) -> Result<SecretBytes, CryptoError> {
    let argon2_params = params.to_argon2_params()?;
    let argon2 = Argon2::new(Algorithm::Argon2id, params.argon2_version()?, argon2_params);

    let mut out = vec![0u8; KEY_LEN];
    argon2.hash_password_into(passphrase, salt, &mut out)?;
    Ok(SecretBytes::from(out))
}

/// Convenience wrapper over `kdf_argon2id` for a `SecretString` passphrase.
pub fn kdf_argon2id_from_passphrase(
    passphrase: &SecretString,
    salt: &[u8],
    params: KdfParams,
) -> Result<SecretBytes, CryptoError> {
    kdf_argon2id(passphrase.expose_secret().as_bytes(), salt, params)
}

/// Seal `plaintext` with `key`/`nonce`. Output length is
/// `plaintext.len() + MAC_LEN`.
pub fn secretbox_seal(
    key: &SecretBytes,
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher =
        XSalsa20Poly1305::new_from_slice(key.expose_secret()).map_err(|_| CryptoError::Aead)?;
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::Aead)
}

/// Open a secretbox ciphertext. Fails with `CryptoError::Aead` on any MAC
/// mismatch; never returns partial plaintext.
pub fn secretbox_open(
    key: &SecretBytes,
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher =
        XSalsa20Poly1305::new_from_slice(key.expose_secret()).map_err(|_| CryptoError::Aead)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Aead)
}

/// Parse a 24-byte nonce from an arbitrary slice.
pub fn nonce_from_slice(bytes: &[u8]) -> Result<[u8; NONCE_LEN], CryptoError> {
    let bytes: &[u8; NONCE_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidNonceLength)?;
    Ok(*bytes)
}

/// IEEE 802.3 CRC32 (zero seed), used for the envelope's integrity chunk.
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

/// Standard Base64, no line wrapping.
pub mod b64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;

    pub fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(s)
    }
}

/// Raw deflate (no zlib/gzip header) compression, window bits -15.
pub mod deflate {
    use flate2::Compression;
    use flate2::read::DeflateDecoder;
    use flate2::write::DeflateEncoder;
    use std::io::{Read, Write};

    pub fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        encoder.finish()
    }

    pub fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut decoder = DeflateDecoder::new(data);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_mem_cost_log2_errors_instead_of_panicking() {
        let params = KdfParams {
            version: ARGON2_VERSION,
            mem_cost_log2: 200,
            time_cost: 1,
            parallelism: 1,
        };
        let err = kdf_argon2id(b"whatever", &[0u8; SALT_LEN], params).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidMemCostLog2(200)));
    }

    #[test]
    fn secretbox_roundtrip() {
        let salt = random_bytes::<SALT_LEN>();
        let key =
            kdf_argon2id(b"correct horse battery staple", &salt, KdfParams::for_tests()).unwrap();
        let nonce = random_bytes::<NONCE_LEN>();

        let ct = secretbox_seal(&key, &nonce, b"hello keybox").unwrap();
        assert_eq!(ct.len(), b"hello keybox".len() + MAC_LEN);

        let pt = secretbox_open(&key, &nonce, &ct).unwrap();
        assert_eq!(pt, b"hello keybox");
    }

    #[test]
    fn secretbox_open_fails_on_tamper() {
        let key = SecretBytes::from(vec![7u8; KEY_LEN]);
        let nonce = random_bytes::<NONCE_LEN>();

        let mut ct = secretbox_seal(&key, &nonce, b"payload").unwrap();
        ct[0] ^= 0x01;

        let err = secretbox_open(&key, &nonce, &ct).unwrap_err();
        assert!(matches!(err, CryptoError::Aead));
    }

    #[test]
    fn secretbox_open_fails_on_wrong_key() {
        let nonce = random_bytes::<NONCE_LEN>();
        let key1 = SecretBytes::from(vec![1u8; KEY_LEN]);
        let key2 = SecretBytes::from(vec![2u8; KEY_LEN]);

        let ct = secretbox_seal(&key1, &nonce, b"payload").unwrap();
        let err = secretbox_open(&key2, &nonce, &ct).unwrap_err();
        assert!(matches!(err, CryptoError::Aead));
    }

    #[test]
    fn crc32_is_ieee_zero_seed() {
        // Known IEEE CRC32 of the ASCII string "123456789".
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn deflate_roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(8);
        let compressed = deflate::compress(&data).unwrap();
        let restored = deflate::decompress(&compressed).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn base64_roundtrip_and_not_equal_to_plaintext() {
        let plaintext = b"p@ss\x00word";
        let encoded = b64::encode(plaintext);
        assert_ne!(encoded.as_bytes(), plaintext);
        let decoded = b64::decode(&encoded).unwrap();
        assert_eq!(decoded, plaintext);
    }
}
