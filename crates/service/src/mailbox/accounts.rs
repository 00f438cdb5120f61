use zeroize::Zeroizing;

use common::crypto::{custody, SecretKey};
use common::rate_limiter::LOGIN;
use common::session_cache::SessionId;

use super::{
    blocking, check_len, normalize_email, LoginGrant, MailboxError, Registration, UserSummary,
    MAX_PASSWORD_LEN, MIN_PASSWORD_LEN,
};
use crate::auth::TotpFactory;
use crate::database::{is_unique_violation, RowId};
use crate::database::models::{NewUser, User};
use crate::ServiceState;

/// Create an account: keypair, locked private key, password hash and a
/// second-factor secret
pub async fn register(
    state: &ServiceState,
    email: &str,
    password: &str,
) -> Result<Registration, MailboxError> {
    let email = normalize_email(email)?;
    check_len("password", password, MIN_PASSWORD_LEN, MAX_PASSWORD_LEN)?;

    if User::by_email(&email, state.database()).await?.is_some() {
        return Err(MailboxError::UserExists);
    }

    let bits = state.config().rsa_bits;
    let kdf = state.config().kdf;
    let passwords = state.passwords().clone();
    let password = Zeroizing::new(password.to_string());
    let (public_key, locked_key, password_hash) = blocking(move || {
        let secret_key = SecretKey::generate_with_bits(bits)?;
        let locked_key = custody::lock(&secret_key, password.as_bytes(), &kdf)?;
        let password_hash = passwords.hash(&password)?;
        Ok((secret_key.public().to_pem()?, locked_key, password_hash))
    })
    .await?;

    let totp_secret = TotpFactory::new_secret();
    let totp_uri = state.totp().provisioning_uri(&totp_secret, &email)?;

    let new_user = NewUser {
        email,
        password_hash,
        totp_secret,
        public_key,
        locked_key,
    };
    let user = User::create(new_user, state.database())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                MailboxError::UserExists
            } else {
                MailboxError::Database(e)
            }
        })?;

    tracing::info!(user_id = %user.id, "registered user");
    Ok(Registration {
        user: UserSummary::from(&user),
        totp_uri,
    })
}

/// Authenticate with password and second factor, unlock the private key and
/// park it in the session cache
///
/// Every way this can fail after the rate limit check looks the same to the
/// caller: [`MailboxError::InvalidCredentials`].
pub async fn login(
    state: &ServiceState,
    email: &str,
    password: &str,
    totp_code: &str,
    client: &str,
) -> Result<LoginGrant, MailboxError> {
    if !state.limiter().check(LOGIN, client) {
        tracing::warn!(client = %client, "login rate limit exceeded");
        return Err(MailboxError::RateLimited);
    }

    let email = email.trim().to_lowercase();
    let user = User::by_email(&email, state.database()).await?;
    let passwords = state.passwords().clone();
    let password = Zeroizing::new(password.to_string());

    let Some(user) = user else {
        blocking(move || {
            passwords.verify_dummy(&password);
            Ok(())
        })
        .await?;
        tracing::debug!("login for unknown account");
        return Err(MailboxError::InvalidCredentials);
    };

    let password_hash = user.password_hash.clone();
    let candidate = password.clone();
    let password_ok = blocking(move || Ok(passwords.verify(&candidate, &password_hash))).await?;
    if !password_ok {
        tracing::debug!(user_id = %user.id, "login with wrong password");
        return Err(MailboxError::InvalidCredentials);
    }

    let totp_ok = state
        .totp()
        .verify(&user.totp_secret, &user.email, totp_code)
        .unwrap_or(false);
    if !totp_ok {
        tracing::debug!(user_id = %user.id, "login with wrong second factor");
        return Err(MailboxError::InvalidCredentials);
    }

    let locked_key = user.locked_key();
    let kdf = state.config().kdf;
    let secret_key = blocking(move || {
        custody::unlock(&locked_key, password.as_bytes(), &kdf)
            .map_err(|_| MailboxError::InvalidCredentials)
    })
    .await?;

    let session_id = SessionId::generate();
    let issued = state.tokens().issue(user.id.uuid(), &session_id)?;
    state
        .sessions()
        .put(session_id, secret_key, issued.expires_at);

    tracing::info!(user_id = %user.id, "user logged in");
    Ok(LoginGrant {
        access_token: issued.token,
        token_type: "bearer".to_string(),
        expires_at: issued.expires_at,
    })
}

/// Forget the unlocked key behind `token`. Only the token has to verify, so
/// logging out an already revoked or expired session still succeeds.
pub fn logout(state: &ServiceState, token: &str) -> Result<(), MailboxError> {
    let claims = state
        .tokens()
        .verify(token)
        .map_err(|_| MailboxError::InvalidToken)?;
    if state.sessions().revoke(&claims.jti) {
        tracing::info!(user_id = %RowId::from(claims.sub), "user logged out");
    }
    Ok(())
}
