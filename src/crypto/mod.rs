//! At-rest protection for stored portal credentials.
//!
//! AES-256-GCM with a fresh random nonce per message. The nonce is prepended
//! to the ciphertext and the whole blob is base64-encoded for storage. A
//! fixed-IV scheme is deliberately not supported.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption key must be {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("encryption key is not valid base64: {0}")]
    InvalidKeyEncoding(#[from] base64::DecodeError),
    #[error("failed to encrypt credential")]
    Encrypt,
    #[error("failed to decrypt credential")]
    Decrypt,
    #[error("ciphertext too short to contain a nonce")]
    CiphertextTooShort,
    #[error("decrypted credential is not valid utf-8")]
    InvalidPlaintext,
}

pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
        Ok(Self { cipher })
    }

    /// Build a cipher from a base64-encoded 32-byte key, the format used in
    /// the config file and the `SECRET_KEY` environment variable.
    pub fn from_base64_key(encoded: &str) -> Result<Self, CryptoError> {
        let key = BASE64.decode(encoded.trim())?;
        Self::new(&key)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let blob = BASE64
            .decode(encoded.trim())
            .map_err(|_| CryptoError::Decrypt)?;
        if blob.len() < NONCE_LEN {
            return Err(CryptoError::CiphertextTooShort);
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidPlaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> CredentialCipher {
        CredentialCipher::new(&[7u8; 32]).unwrap()
    }

    #[test]
    fn round_trips_arbitrary_strings() {
        let cipher = test_cipher();
        for input in ["", "a", "sega-id-1234", "パスワード!@#\u{1f3b5}"] {
            let encrypted = cipher.encrypt(input).unwrap();
            assert_eq!(cipher.decrypt(&encrypted).unwrap(), input);
        }
    }

    #[test]
    fn nonce_is_fresh_per_message() {
        let cipher = test_cipher();
        let a = cipher.encrypt("same input").unwrap();
        let b = cipher.encrypt("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_wrong_key() {
        let encrypted = test_cipher().encrypt("secret").unwrap();
        let other = CredentialCipher::new(&[8u8; 32]).unwrap();
        assert!(matches!(
            other.decrypt(&encrypted),
            Err(CryptoError::Decrypt)
        ));
    }

    #[test]
    fn rejects_truncated_blob() {
        let cipher = test_cipher();
        let short = BASE64.encode([1u8; 4]);
        assert!(matches!(
            cipher.decrypt(&short),
            Err(CryptoError::CiphertextTooShort)
        ));
    }

    #[test]
    fn rejects_bad_key_length() {
        assert!(matches!(
            CredentialCipher::new(&[1u8; 16]),
            Err(CryptoError::InvalidKeyLength(16))
        ));
    }
}
