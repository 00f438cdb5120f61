//! Content encryption using AES-256-GCM
//!
//! Every message gets its own [`Secret`]. The subject, the body and each
//! attachment are encrypted under it independently, each with a fresh random
//! nonce, producing one [`Sealed`] value per field:
//! - **Per-message keys**: compromising one message key exposes nothing else
//! - **Per-field nonces**: a nonce is never reused under the same key
//! - **Detached nonces**: the nonce is stored beside the ciphertext, so the
//!   ciphertext bytes alone are what the sender signs

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an AES-GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of an AES-256 key in bytes
pub const SECRET_SIZE: usize = 32;

/// Errors that can occur during encryption/decryption
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("random source failure: {0}")]
    Entropy(getrandom::Error),
    #[error("invalid secret size, expected {SECRET_SIZE}, got {0}")]
    InvalidSize(usize),
    #[error("invalid nonce size, expected {NONCE_SIZE}, got {0}")]
    InvalidNonce(usize),
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed")]
    Decrypt,
}

/// Fill a fixed-size buffer from the OS entropy source
pub(crate) fn random_bytes<const N: usize>() -> Result<[u8; N], getrandom::Error> {
    let mut buff = [0u8; N];
    getrandom::getrandom(&mut buff)?;
    Ok(buff)
}

/// One AES-GCM output: ciphertext (tag appended) and the nonce used to produce it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sealed {
    ciphertext: Vec<u8>,
    nonce: [u8; NONCE_SIZE],
}

impl Sealed {
    pub fn new(ciphertext: Vec<u8>, nonce: [u8; NONCE_SIZE]) -> Self {
        Self { ciphertext, nonce }
    }

    /// Rebuild from stored columns
    ///
    /// # Errors
    ///
    /// Returns an error if `nonce` is not exactly [`NONCE_SIZE`] bytes.
    pub fn from_parts(ciphertext: Vec<u8>, nonce: &[u8]) -> Result<Self, SecretError> {
        let nonce: [u8; NONCE_SIZE] = nonce
            .try_into()
            .map_err(|_| SecretError::InvalidNonce(nonce.len()))?;
        Ok(Self { ciphertext, nonce })
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    pub fn into_parts(self) -> (Vec<u8>, [u8; NONCE_SIZE]) {
        (self.ciphertext, self.nonce)
    }
}

/// A 256-bit symmetric key for one message
///
/// Generated fresh for every outgoing message, wrapped once per recipient and
/// then dropped. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret([u8; SECRET_SIZE]);

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

impl From<[u8; SECRET_SIZE]> for Secret {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        Secret(bytes)
    }
}

impl Secret {
    /// Generate a new random secret using the OS entropy source
    pub fn generate() -> Result<Self, SecretError> {
        random_bytes().map(Self).map_err(SecretError::Entropy)
    }

    /// Create a secret from a byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not exactly `SECRET_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, SecretError> {
        let bytes: [u8; SECRET_SIZE] = data
            .try_into()
            .map_err(|_| SecretError::InvalidSize(data.len()))?;
        Ok(Self(bytes))
    }

    /// Get a reference to the secret key bytes
    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }

    /// Encrypt `data` under a fresh random nonce
    pub fn encrypt(&self, data: &[u8]) -> Result<Sealed, SecretError> {
        let nonce: [u8; NONCE_SIZE] = random_bytes().map_err(SecretError::Entropy)?;
        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), data)
            .map_err(|_| SecretError::Encrypt)?;
        Ok(Sealed::new(ciphertext, nonce))
    }

    /// Decrypt and authenticate a [`Sealed`] value
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Decrypt`] if the tag does not verify: the data
    /// was tampered with, or it was sealed under a different key.
    pub fn decrypt(&self, sealed: &Sealed) -> Result<Vec<u8>, SecretError> {
        self.cipher()
            .decrypt(Nonce::from_slice(sealed.nonce()), sealed.ciphertext())
            .map_err(|_| SecretError::Decrypt)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_secret_encrypt_decrypt() {
        let secret = Secret::generate().unwrap();
        let data = b"hello world, this is a test message for encryption";

        let sealed = secret.encrypt(data).unwrap();
        assert_ne!(sealed.ciphertext(), data.as_slice());
        let decrypted = secret.decrypt(&sealed).unwrap();

        assert_eq!(data.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let secret = Secret::generate().unwrap();
        let first = secret.encrypt(b"same").unwrap();
        let second = secret.encrypt(b"same").unwrap();
        assert_ne!(first.nonce(), second.nonce());
        assert_ne!(first.ciphertext(), second.ciphertext());
    }

    #[test]
    fn test_secret_size_validation() {
        assert!(Secret::from_slice(&[1u8; 16]).is_err());
        assert!(Secret::from_slice(&[1u8; 64]).is_err());
        assert!(Secret::from_slice(&[1u8; SECRET_SIZE]).is_ok());
    }

    #[test]
    fn test_tampering_is_detected() {
        let secret = Secret::generate().unwrap();
        let sealed = secret.encrypt(b"test data for integrity check").unwrap();

        let (mut ciphertext, nonce) = sealed.clone().into_parts();
        ciphertext[3] ^= 0xFF;
        let tampered = Sealed::new(ciphertext, nonce);
        assert!(matches!(
            secret.decrypt(&tampered),
            Err(SecretError::Decrypt)
        ));

        let other = Secret::generate().unwrap();
        assert!(matches!(other.decrypt(&sealed), Err(SecretError::Decrypt)));
    }

    #[test]
    fn test_from_parts_checks_nonce() {
        assert!(matches!(
            Sealed::from_parts(vec![0; 20], &[0; 8]),
            Err(SecretError::InvalidNonce(8))
        ));
        assert!(Sealed::from_parts(vec![0; 20], &[0; NONCE_SIZE]).is_ok());
    }

    #[test]
    fn test_empty_data_encryption() {
        let secret = Secret::generate().unwrap();
        let sealed = secret.encrypt(b"").unwrap();
        assert!(secret.decrypt(&sealed).unwrap().is_empty());
    }
}
