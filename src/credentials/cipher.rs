//! AES-256-GCM encryption of the stored API key.
//!
//! The ciphertext is stored as base64 of `iv || ciphertext+tag` with a 12-byte
//! IV, and the raw key is exported as base64 next to it.

use std::fmt;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 12;

/// Error type for credential encryption.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The AEAD refused to seal the plaintext.
    #[error("Encryption failed: {0}")]
    Encrypt(String),
    /// Authentication failed or the plaintext was not UTF-8.
    #[error("Decryption failed: {0}")]
    Decrypt(String),
    /// Stored key material has the wrong length.
    #[error("Invalid key material: {0}")]
    KeyMaterial(String),
    /// Stored text is not valid base64.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Symmetric key used to encrypt the API key.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialKey([u8; KEY_LEN]);

impl fmt::Debug for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialKey(..)")
    }
}

impl CredentialKey {
    /// Generates a fresh random key.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Imports a key previously produced by [`export`](Self::export).
    pub fn import(material: &str) -> Result<Self, CryptoError> {
        let bytes = B64.decode(material.trim())?;
        let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::KeyMaterial(format!("wrong length {} (expected {KEY_LEN})", bytes.len()))
        })?;
        Ok(Self(key))
    }

    /// Exports the raw key as base64.
    pub fn export(&self) -> String {
        B64.encode(self.0)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }

    /// Encrypts `plaintext` under a fresh IV.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        let mut combined = Vec::with_capacity(IV_LEN + ciphertext.len());
        combined.extend_from_slice(&iv);
        combined.extend_from_slice(&ciphertext);
        Ok(B64.encode(combined))
    }

    /// Decrypts a value produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let combined = B64.decode(encoded.trim())?;
        if combined.len() <= IV_LEN {
            return Err(CryptoError::Decrypt("ciphertext too short".to_string()));
        }
        let (iv, ciphertext) = combined.split_at(IV_LEN);

        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::Decrypt(e.to_string()))
    }
}
