use std::fmt;

use rand_core::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::pss::{BlindedSigningKey, Signature, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Default RSA modulus size for newly registered users
pub const DEFAULT_KEY_BITS: usize = 4096;
/// Smallest modulus we will generate or accept from configuration
pub const MIN_KEY_BITS: usize = 3072;
/// Identifier stored next to every message signature
pub const SIGNATURE_ALGORITHM: &str = "RSA-PSS-SHA256";

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key size {0} is below the {MIN_KEY_BITS}-bit minimum")]
    TooSmall(usize),
    #[error("key generation failed: {0}")]
    Generation(rsa::Error),
    #[error("signing failed: {0}")]
    Signing(rsa::signature::Error),
    #[error("key encoding error: {0}")]
    Encoding(String),
}

/// Public half of a user's RSA keypair
///
/// Stored in clear (SPKI PEM) next to the user record and handed to anyone who
/// needs to encrypt for, or verify a signature from, that user. It is used for:
/// - **Key wrapping**: RSAES-OAEP (SHA-256) over a per-message [`Secret`](super::Secret)
/// - **Verification**: RSASSA-PSS (SHA-256) over a message's ciphertext
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.fingerprint()).finish()
    }
}

impl From<RsaPublicKey> for PublicKey {
    fn from(key: RsaPublicKey) -> Self {
        PublicKey(key)
    }
}

impl PublicKey {
    /// Parse a public key from SPKI PEM
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        RsaPublicKey::from_public_key_pem(pem)
            .map(Self)
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }

    /// Encode the public key as SPKI PEM
    pub fn to_pem(&self) -> Result<String, KeyError> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }

    /// Short hex fingerprint (first 8 bytes of SHA-256 over the modulus),
    ///  safe to log
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.n().to_bytes_be());
        hex::encode(&digest[..8])
    }

    /// Modulus size in bits
    pub fn bits(&self) -> usize {
        self.0.size() * 8
    }

    /// Verify an RSASSA-PSS signature over `msg`.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature is malformed or does not match.
    pub fn verify(&self, msg: &[u8], signature: &[u8]) -> Result<(), rsa::signature::Error> {
        let signature = Signature::try_from(signature)?;
        let verifying_key = VerifyingKey::<Sha256>::new(self.0.clone());
        verifying_key.verify(msg, &signature)
    }

    /// Encrypt a short key under this public key with RSAES-OAEP
    pub(crate) fn wrap(&self, key: &[u8]) -> Result<Vec<u8>, rsa::Error> {
        self.0.encrypt(&mut OsRng, Oaep::new::<Sha256>(), key)
    }
}

/// Private half of a user's RSA keypair
///
/// Never persisted in clear. At rest it only exists as the PKCS#8 DER
/// plaintext inside a [`LockedKey`](super::LockedKey); in memory it lives in
/// the session cache for the lifetime of a login. The underlying key zeroizes
/// itself on drop.
#[derive(Clone)]
pub struct SecretKey(RsaPrivateKey);

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretKey")
            .field(&self.public().fingerprint())
            .finish()
    }
}

impl SecretKey {
    /// Generate a new keypair with [`DEFAULT_KEY_BITS`]
    pub fn generate() -> Result<Self, KeyError> {
        Self::generate_with_bits(DEFAULT_KEY_BITS)
    }

    /// Generate a new keypair with a custom modulus size.
    ///
    /// # Errors
    ///
    /// Fails when `bits` is below [`MIN_KEY_BITS`] or the entropy source fails.
    pub fn generate_with_bits(bits: usize) -> Result<Self, KeyError> {
        if bits < MIN_KEY_BITS {
            return Err(KeyError::TooSmall(bits));
        }
        RsaPrivateKey::new(&mut OsRng, bits)
            .map(Self)
            .map_err(KeyError::Generation)
    }

    /// Derive the public key from this secret key
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.to_public_key())
    }

    /// Encode as PKCS#8 DER. The buffer is wiped when dropped.
    pub fn to_der(&self) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        let document = self
            .0
            .to_pkcs8_der()
            .map_err(|e| KeyError::Encoding(e.to_string()))?;
        Ok(Zeroizing::new(document.as_bytes().to_vec()))
    }

    /// Parse from PKCS#8 DER
    pub fn from_der(der: &[u8]) -> Result<Self, KeyError> {
        RsaPrivateKey::from_pkcs8_der(der)
            .map(Self)
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }

    /// Encode as PKCS#8 PEM
    pub fn to_pem(&self) -> Result<Zeroizing<String>, KeyError> {
        self.0
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }

    /// Parse from PKCS#8 PEM
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .map(Self)
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }

    /// Sign `msg` with RSASSA-PSS over SHA-256.
    ///
    /// The salt is drawn from the OS RNG, so signing the same message twice
    /// yields different signatures.
    pub fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, KeyError> {
        let signing_key = BlindedSigningKey::<Sha256>::new(self.0.clone());
        signing_key
            .try_sign_with_rng(&mut OsRng, msg)
            .map(|signature| signature.to_vec())
            .map_err(KeyError::Signing)
    }

    /// Decrypt a key previously wrapped for our public key
    pub(crate) fn unwrap(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>, rsa::Error> {
        self.0
            .decrypt_blinded(&mut OsRng, Oaep::new::<Sha256>(), wrapped)
            .map(Zeroizing::new)
    }
}
