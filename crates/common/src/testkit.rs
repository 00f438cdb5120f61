//! Shared fixtures for unit tests

use std::sync::OnceLock;

use crate::crypto::{SecretKey, MIN_KEY_BITS};

const POOL_SIZE: usize = 3;

static KEYS: OnceLock<Vec<SecretKey>> = OnceLock::new();

/// A cached keypair from a small pool. Generating RSA keys is slow, so
/// every test shares the same few.
pub fn secret_key(index: usize) -> SecretKey {
    let keys = KEYS.get_or_init(|| {
        (0..POOL_SIZE)
            .map(|_| SecretKey::generate_with_bits(MIN_KEY_BITS).unwrap())
            .collect()
    });
    keys[index % POOL_SIZE].clone()
}
