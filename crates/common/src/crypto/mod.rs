//! Cryptographic primitives for SecureMail
//!
//! - **Identity**: each user owns an RSA keypair (`SecretKey`/`PublicKey`),
//!   4096 bits by default and never below 3072
//! - **Custody**: the private key is stored encrypted under an Argon2id
//!   password-derived key (`LockedKey`)
//! - **Content encryption**: AES-256-GCM under a fresh per-message `Secret`
//! - **Key sharing**: the message secret is wrapped once per recipient with
//!   RSAES-OAEP (`KeyGrant`)
//! - **Authenticity**: the sender signs the message ciphertext with
//!   RSASSA-PSS over SHA-256
//!
//! # Key Custody
//!
//! At registration a keypair is generated and the private key is locked with
//! the user's password. At login the same password unlocks it; the unlocked
//! key then lives in the session cache until the session ends. The server
//! never stores a private key in clear.

pub mod custody;
mod grant;
mod keys;
mod secret;

pub use custody::{CustodyError, KdfParams, LockedKey, SALT_SIZE};
pub use grant::{GrantError, KeyGrant};
pub use keys::{
    KeyError, PublicKey, SecretKey, DEFAULT_KEY_BITS, MIN_KEY_BITS, SIGNATURE_ALGORITHM,
};
pub use secret::{Sealed, Secret, SecretError, NONCE_SIZE, SECRET_SIZE};
