//! Password-based protection of private keys at rest
//!
//! A user's private key is stored as a [`LockedKey`]: the PKCS#8 DER bytes
//! encrypted with AES-256-GCM under a key derived from the user's password
//! with Argon2id. Salt and nonce are drawn fresh every time a key is locked.
//!
//! Unlocking is deliberately opaque. Whatever goes wrong (wrong password,
//! corrupted ciphertext, a salt or nonce of the wrong length, key bytes that
//! no longer parse) surfaces as [`CustodyError::AuthenticationFailure`], and
//! the KDF always runs first so every failure costs the same.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::keys::{KeyError, SecretKey};
use super::secret::{random_bytes, Sealed, Secret, SecretError, NONCE_SIZE, SECRET_SIZE};

/// Size of the Argon2 salt in bytes
pub const SALT_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CustodyError {
    #[error("authentication failure")]
    AuthenticationFailure,
    #[error("invalid kdf parameters: {0}")]
    InvalidParams(String),
    #[error("random source failure: {0}")]
    Entropy(getrandom::Error),
    #[error("secret error: {0}")]
    Secret(#[from] SecretError),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

/// Argon2id work factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    64 * 1024
}

fn default_iterations() -> u32 {
    3
}

fn default_parallelism() -> u32 {
    1
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl KdfParams {
    /// Smallest parameters Argon2 accepts. Only meant for tests.
    pub fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>, CustodyError> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(SECRET_SIZE),
        )
        .map_err(|e| CustodyError::InvalidParams(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Check the parameters without deriving anything
    pub fn validate(&self) -> Result<(), CustodyError> {
        self.argon2().map(|_| ())
    }
}

/// Derive a 32-byte content key from `password` and `salt`.
///
/// Deterministic for identical inputs and parameters.
pub fn derive_key(password: &[u8], salt: &[u8], params: &KdfParams) -> Result<Secret, CustodyError> {
    let mut output = Zeroizing::new([0u8; SECRET_SIZE]);
    params
        .argon2()?
        .hash_password_into(password, salt, &mut output[..])
        .map_err(|e| CustodyError::InvalidParams(e.to_string()))?;
    Ok(Secret::from(*output))
}

/// An encrypted private key as it is stored next to the user record
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedKey {
    pub ciphertext: Vec<u8>,
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
}

impl std::fmt::Debug for LockedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedKey")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

/// Encrypt raw private key bytes under a password-derived key
pub fn encrypt_private_key(
    private_key: &[u8],
    password: &[u8],
    params: &KdfParams,
) -> Result<LockedKey, CustodyError> {
    let salt: [u8; SALT_SIZE] = random_bytes().map_err(CustodyError::Entropy)?;
    let key = derive_key(password, &salt, params)?;
    let (ciphertext, nonce) = key.encrypt(private_key)?.into_parts();
    Ok(LockedKey {
        ciphertext,
        salt: salt.to_vec(),
        nonce: nonce.to_vec(),
    })
}

/// Recover raw private key bytes from a [`LockedKey`]
pub fn decrypt_private_key(
    locked: &LockedKey,
    password: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<Vec<u8>>, CustodyError> {
    // a malformed salt still pays for a full derivation
    let salt_ok = locked.salt.len() == SALT_SIZE;
    let salt: &[u8] = if salt_ok {
        locked.salt.as_slice()
    } else {
        &[0u8; SALT_SIZE]
    };
    let key = derive_key(password, salt, params)?;
    if !salt_ok || locked.nonce.len() != NONCE_SIZE {
        return Err(CustodyError::AuthenticationFailure);
    }

    let sealed = Sealed::from_parts(locked.ciphertext.clone(), &locked.nonce)
        .map_err(|_| CustodyError::AuthenticationFailure)?;
    key.decrypt(&sealed)
        .map(Zeroizing::new)
        .map_err(|_| CustodyError::AuthenticationFailure)
}

/// Lock a private key with a password
pub fn lock(
    secret_key: &SecretKey,
    password: &[u8],
    params: &KdfParams,
) -> Result<LockedKey, CustodyError> {
    let der = secret_key.to_der()?;
    encrypt_private_key(&der, password, params)
}

/// Unlock a private key with a password
pub fn unlock(
    locked: &LockedKey,
    password: &[u8],
    params: &KdfParams,
) -> Result<SecretKey, CustodyError> {
    let der = decrypt_private_key(locked, password, params)?;
    SecretKey::from_der(&der).map_err(|_| CustodyError::AuthenticationFailure)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testkit;

    const PASSWORD: &[u8] = b"correct horse battery staple";

    #[test]
    fn test_derive_key_is_deterministic() {
        let params = KdfParams::minimal();
        let salt = [9u8; SALT_SIZE];

        let first = derive_key(PASSWORD, &salt, &params).unwrap();
        let second = derive_key(PASSWORD, &salt, &params).unwrap();
        assert_eq!(first, second);

        let other_salt = derive_key(PASSWORD, &[8u8; SALT_SIZE], &params).unwrap();
        assert_ne!(first, other_salt);
        let other_password = derive_key(b"hunter22", &salt, &params).unwrap();
        assert_ne!(first, other_password);
    }

    #[test]
    fn test_default_params() {
        let params = KdfParams::default();
        assert_eq!(params.memory_kib, 65536);
        assert_eq!(params.iterations, 3);
        assert_eq!(params.parallelism, 1);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_invalid_params() {
        let params = KdfParams {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(matches!(
            params.validate(),
            Err(CustodyError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_lock_unlock_roundtrip() {
        let params = KdfParams::minimal();
        let secret_key = testkit::secret_key(0);

        let locked = lock(&secret_key, PASSWORD, &params).unwrap();
        assert_eq!(locked.salt.len(), SALT_SIZE);
        assert_eq!(locked.nonce.len(), NONCE_SIZE);

        let unlocked = unlock(&locked, PASSWORD, &params).unwrap();
        assert_eq!(
            unlocked.to_der().unwrap().as_slice(),
            secret_key.to_der().unwrap().as_slice()
        );
    }

    #[test]
    fn test_salt_and_nonce_are_fresh() {
        let params = KdfParams::minimal();
        let first = encrypt_private_key(b"key bytes", PASSWORD, &params).unwrap();
        let second = encrypt_private_key(b"key bytes", PASSWORD, &params).unwrap();
        assert_ne!(first.salt, second.salt);
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn test_wrong_password_is_authentication_failure() {
        let params = KdfParams::minimal();
        let locked = encrypt_private_key(b"key bytes", PASSWORD, &params).unwrap();
        assert!(matches!(
            decrypt_private_key(&locked, b"wrong password", &params),
            Err(CustodyError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_corruption_is_authentication_failure() {
        let params = KdfParams::minimal();
        let locked = encrypt_private_key(b"key bytes", PASSWORD, &params).unwrap();

        let mut corrupt = locked.clone();
        corrupt.ciphertext[0] ^= 0x01;
        assert!(matches!(
            decrypt_private_key(&corrupt, PASSWORD, &params),
            Err(CustodyError::AuthenticationFailure)
        ));

        let mut short_salt = locked.clone();
        short_salt.salt.truncate(4);
        assert!(matches!(
            decrypt_private_key(&short_salt, PASSWORD, &params),
            Err(CustodyError::AuthenticationFailure)
        ));

        let mut long_nonce = locked.clone();
        long_nonce.nonce.push(0);
        assert!(matches!(
            decrypt_private_key(&long_nonce, PASSWORD, &params),
            Err(CustodyError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_undecodable_key_is_authentication_failure() {
        let params = KdfParams::minimal();
        let locked = encrypt_private_key(b"not a pkcs8 document", PASSWORD, &params).unwrap();
        assert!(matches!(
            unlock(&locked, PASSWORD, &params),
            Err(CustodyError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_debug_does_not_leak() {
        let locked = LockedKey {
            ciphertext: vec![1, 2, 3],
            salt: vec![4; SALT_SIZE],
            nonce: vec![5; NONCE_SIZE],
        };
        let rendered = format!("{:?}", locked);
        assert!(rendered.contains("ciphertext_len: 3"));
        assert!(!rendered.contains("salt"));
    }
}
