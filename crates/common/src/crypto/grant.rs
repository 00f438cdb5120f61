//! Per-recipient key wrapping with RSAES-OAEP
//!
//! A message's [`Secret`] is never stored in clear. Instead each recipient gets
//! a [`KeyGrant`]: the secret encrypted under their RSA public key with OAEP
//! (SHA-256, MGF1-SHA-256). Only the holder of the matching private key can
//! recover it.
//!
//! # Examples
//!
//! ```ignore
//! let message_secret = Secret::generate()?;
//! let grant = KeyGrant::new(&message_secret, &bob_secret_key.public())?;
//!
//! // Bob, and only Bob, can recover the secret
//! let recovered = grant.recover(&bob_secret_key)?;
//! assert_eq!(message_secret, recovered);
//! ```

use serde::{Deserialize, Serialize};

use super::keys::{PublicKey, SecretKey};
use super::secret::Secret;

/// Errors that can occur during grant creation or recovery
#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    #[error("failed to wrap key: {0}")]
    Wrap(rsa::Error),
    /// The grant was not made for this private key, or its bytes are corrupt
    #[error("failed to unwrap key")]
    Unwrap,
}

/// A message secret wrapped for exactly one recipient
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyGrant(Vec<u8>);

impl From<Vec<u8>> for KeyGrant {
    fn from(bytes: Vec<u8>) -> Self {
        KeyGrant(bytes)
    }
}

impl KeyGrant {
    /// Wrap `secret` for the owner of `recipient`
    pub fn new(secret: &Secret, recipient: &PublicKey) -> Result<Self, GrantError> {
        recipient
            .wrap(secret.bytes())
            .map(Self)
            .map_err(GrantError::Wrap)
    }

    /// Recover the wrapped secret with the recipient's private key
    pub fn recover(&self, secret_key: &SecretKey) -> Result<Secret, GrantError> {
        let unwrapped = secret_key.unwrap(&self.0).map_err(|_| GrantError::Unwrap)?;
        Secret::from_slice(&unwrapped).map_err(|_| GrantError::Unwrap)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}
