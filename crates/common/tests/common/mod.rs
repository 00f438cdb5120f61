//! Shared fixtures for envelope and custody integration tests
#![allow(dead_code)]

use std::sync::OnceLock;

use ::common::crypto::{KdfParams, SecretKey, MIN_KEY_BITS};

static KEYS: OnceLock<Vec<SecretKey>> = OnceLock::new();

/// One of four cached 3072-bit keypairs
pub fn keypair(index: usize) -> SecretKey {
    KEYS.get_or_init(|| {
        (0..4)
            .map(|_| SecretKey::generate_with_bits(MIN_KEY_BITS).unwrap())
            .collect()
    })[index]
        .clone()
}

pub fn light_kdf() -> KdfParams {
    KdfParams::minimal()
}
