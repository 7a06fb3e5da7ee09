//! Per-password inner encryption (C4).
//!
//! Each password is encrypted independently with the *same* key as the
//! envelope, a fresh random nonce, and stored as
//! `base64(nonce(24) || secretbox(key, nonce, plaintext))`. This adds no
//! cryptographic security over the outer envelope; it exists so a decrypted
//! password only exists in memory when a caller explicitly asks for it,
//! rather than being recovered the moment the file is opened.

use crate::keybox::crypto::{self, CryptoError, SecretBytes};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InnerError {
    #[error("stored password is not valid base64")]
    InvalidBase64,

    #[error("stored password ciphertext is shorter than a nonce")]
    Truncated,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("decrypted password is not valid utf-8")]
    InvalidUtf8,
}

/// Encrypt a plaintext password, returning the Base64 string that gets
/// stored verbatim in the `password` column.
pub fn encrypt(key: &SecretBytes, plaintext: &str) -> Result<String, InnerError> {
    let nonce = crypto::random_bytes::<{ crypto::NONCE_LEN }>();
    let ciphertext = crypto::secretbox_seal(key, &nonce, plaintext.as_bytes())?;

    let mut combined = Vec::with_capacity(nonce.len() + ciphertext.len());
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&ciphertext);
    Ok(crypto::b64::encode(&combined))
}

/// Decrypt a stored Base64 password back to plaintext.
pub fn decrypt(key: &SecretBytes, stored: &str) -> Result<String, InnerError> {
    let combined = crypto::b64::decode(stored).map_err(|_| InnerError::InvalidBase64)?;
    if combined.len() < crypto::NONCE_LEN {
        return Err(InnerError::Truncated);
    }
    let nonce = crypto::nonce_from_slice(&combined[..crypto::NONCE_LEN])?;
    let ciphertext = &combined[crypto::NONCE_LEN..];

    let plaintext = crypto::secretbox_open(key, &nonce, ciphertext)?;
    String::from_utf8(plaintext).map_err(|_| InnerError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SecretBytes {
        SecretBytes::from(crypto::random_bytes::<{ crypto::KEY_LEN }>().to_vec())
    }

    #[test]
    fn roundtrip() {
        let key = key();
        let encrypted = encrypt(&key, "pa$$w0rD").unwrap();
        assert_ne!(encrypted, "pa$$w0rD");
        let decrypted = decrypt(&key, &encrypted).unwrap();
        assert_eq!(decrypted, "pa$$w0rD");
    }

    #[test]
    fn two_encryptions_of_the_same_password_differ() {
        let key = key();
        let a = encrypt(&key, "same").unwrap();
        let b = encrypt(&key, "same").unwrap();
        // Distinct nonces -> distinct ciphertexts, even for equal plaintext.
        assert_ne!(a, b);
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let a = key();
        let b = key();
        let encrypted = encrypt(&a, "hunter2").unwrap();
        let err = decrypt(&b, &encrypted).unwrap_err();
        assert!(matches!(err, InnerError::Crypto(_)));
    }
}
