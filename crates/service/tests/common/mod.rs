#![allow(dead_code)]

use ::common::crypto::{KdfParams, MIN_KEY_BITS};
use service::database::models::User;
use service::mailbox::{self, LoginGrant, Session};
use service::{Config, ServiceState};

pub const PASSWORD: &str = "correct horse battery";

/// In-memory database, the cheapest KDF and smallest key size accepted
pub fn config() -> Config {
    Config {
        rsa_bits: MIN_KEY_BITS,
        kdf: KdfParams::minimal(),
        token_secret: Some("integration-test-token-secret-0123456789".to_string()),
        ..Default::default()
    }
}

pub async fn state() -> ServiceState {
    ServiceState::from_config(&config()).await.unwrap()
}

pub async fn register(state: &ServiceState, email: &str) {
    mailbox::register(state, email, PASSWORD).await.unwrap();
}

/// The code the user's authenticator would currently show
pub async fn totp_code(state: &ServiceState, email: &str) -> String {
    let user = User::by_email(email, state.database())
        .await
        .unwrap()
        .unwrap();
    state
        .totp()
        .current_code(&user.totp_secret, &user.email)
        .unwrap()
}

/// Logs in with the address as the rate-limit key so tests never share a bucket
pub async fn login(state: &ServiceState, email: &str) -> LoginGrant {
    let code = totp_code(state, email).await;
    mailbox::login(state, email, PASSWORD, &code, email)
        .await
        .unwrap()
}

pub async fn session(state: &ServiceState, email: &str) -> Session {
    let grant = login(state, email).await;
    mailbox::authenticate(state, &grant.access_token).unwrap()
}
