/**
 * Cryptographic types and operations.
 *  - RSA identity keys, signing and key wrapping
 *  - Password-based custody of private keys
 *  - Per-message content encryption
 */
pub mod crypto;
/**
 * Sealing and opening of messages: one
 *  symmetric key per message, wrapped for
 *  every recipient, ciphertext signed by
 *  the sender.
 */
pub mod envelope;
/**
 * Sliding-window throttling of
 *  authentication attempts.
 */
pub mod rate_limiter;
/**
 * Unlocked private keys held for the
 *  lifetime of a login session.
 */
pub mod session_cache;

#[cfg(test)]
pub(crate) mod testkit;

pub mod prelude {
    pub use crate::crypto::{KdfParams, KeyGrant, LockedKey, PublicKey, SecretKey};
    pub use crate::envelope::{
        open, seal, AttachmentDraft, Draft, Envelope, EnvelopeError, Opened, Opener, Verification,
    };
    pub use crate::rate_limiter::{RateLimiter, RatePolicy};
    pub use crate::session_cache::{SessionId, SessionKeyCache};
}
