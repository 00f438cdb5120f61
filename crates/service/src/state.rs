use std::sync::Arc;

use url::Url;

use common::rate_limiter::RateLimiter;
use common::session_cache::SessionKeyCache;

use super::auth::{PasswordError, Passwords, TokenError, TokenIssuer, TotpFactory};
use super::config::{Config, ConfigError};
use super::database::{Database, DatabaseSetupError};

/// Main service state, cheap to clone and shared with every handler
#[derive(Clone)]
pub struct State {
    database: Database,
    sessions: Arc<SessionKeyCache>,
    limiter: Arc<RateLimiter>,
    tokens: TokenIssuer,
    passwords: Passwords,
    totp: TotpFactory,
    config: Arc<Config>,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        config.validate()?;

        // 1. Setup database
        let sqlite_database_url = match config.sqlite_path {
            Some(ref path) => {
                // the file may be new, but its directory must exist
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        return Err(StateSetupError::DatabasePathDoesNotExist);
                    }
                }
                Url::parse(&format!("sqlite://{}", path.display()))
                    .map_err(|_| StateSetupError::InvalidDatabaseUrl)
            }
            // otherwise just set up an in-memory database
            None => Url::parse("sqlite::memory:").map_err(|_| StateSetupError::InvalidDatabaseUrl),
        }?;
        tracing::info!("Database URL: {}", sqlite_database_url);
        let database = Database::connect(&sqlite_database_url).await?;

        // 2. Setup token signing
        let lifetime = time::Duration::minutes(config.token_lifetime_minutes);
        let tokens = match config.token_secret {
            Some(ref secret) => TokenIssuer::new(secret.as_bytes(), lifetime),
            None => {
                tracing::warn!("no token_secret configured, tokens will not survive a restart");
                TokenIssuer::random(lifetime)?
            }
        };

        // 3. Setup in-memory session and throttling state
        let sessions = Arc::new(SessionKeyCache::new());
        let limiter = Arc::new(config.rate_limiter());

        let passwords = Passwords::new(&config.kdf)?;
        let totp = TotpFactory::new(config.totp_issuer.clone());

        Ok(Self {
            database,
            sessions,
            limiter,
            tokens,
            passwords,
            totp,
            config: Arc::new(config.clone()),
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn sessions(&self) -> &Arc<SessionKeyCache> {
        &self.sessions
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn passwords(&self) -> &Passwords {
        &self.passwords
    }

    pub fn totp(&self) -> &TotpFactory {
        &self.totp
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl AsRef<Database> for State {
    fn as_ref(&self) -> &Database {
        self.database()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Database path does not exist")]
    DatabasePathDoesNotExist,
    #[error("Database setup error: {0}")]
    DatabaseSetupError(#[from] DatabaseSetupError),
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,
    #[error("Token setup error: {0}")]
    Token(#[from] TokenError),
    #[error("Password hashing setup error: {0}")]
    Password(#[from] PasswordError),
}
