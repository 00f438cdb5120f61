use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use common::crypto::{KdfParams, DEFAULT_KEY_BITS, MIN_KEY_BITS};
use common::rate_limiter::{RateLimiter, RatePolicy, LOGIN};

/// Shortest HMAC key we accept for signing bearer tokens
pub const MIN_TOKEN_SECRET_LEN: usize = 32;

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    // http server configuration
    /// address for the API server to listen on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    // data store configuration
    /// a path to a sqlite database, if not set then an
    ///  in-memory database will be used
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,

    // logging
    #[serde(default = "default_log_level", with = "level")]
    pub log_level: tracing::Level,
    /// Directory for log files (logs to stdout only if not set)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    // sessions
    /// lifetime of a bearer token and of the cached key behind it
    #[serde(default = "default_token_lifetime_minutes")]
    pub token_lifetime_minutes: i64,
    /// HMAC key for bearer tokens. If not set a random one is
    ///  generated, and every token dies with the process.
    #[serde(default)]
    pub token_secret: Option<String>,
    /// how often expired sessions and idle rate-limit buckets are swept
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    // crypto
    #[serde(default = "default_rsa_bits")]
    pub rsa_bits: usize,
    /// Argon2id work factors, used for key custody and password hashes
    #[serde(default)]
    pub kdf: KdfParams,
    #[serde(default = "default_totp_issuer")]
    pub totp_issuer: String,

    /// action kind -> policy
    #[serde(default = "default_rate_limits")]
    pub rate_limits: HashMap<String, RatePolicy>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 8000)
}

fn default_log_level() -> tracing::Level {
    tracing::Level::INFO
}

fn default_token_lifetime_minutes() -> i64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_rsa_bits() -> usize {
    DEFAULT_KEY_BITS
}

fn default_totp_issuer() -> String {
    "SecureMail".to_string()
}

fn default_rate_limits() -> HashMap<String, RatePolicy> {
    HashMap::from([(LOGIN.to_string(), RatePolicy::new(5, 60))])
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            sqlite_path: None,
            log_level: default_log_level(),
            log_dir: None,
            token_lifetime_minutes: default_token_lifetime_minutes(),
            token_secret: None,
            sweep_interval_secs: default_sweep_interval_secs(),
            rsa_bits: default_rsa_bits(),
            kdf: KdfParams::default(),
            totp_issuer: default_totp_issuer(),
            rate_limits: default_rate_limits(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("sqlite_path", &self.sqlite_path)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .field("token_lifetime_minutes", &self.token_lifetime_minutes)
            .field("token_secret", &self.token_secret.as_ref().map(|_| ".."))
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("rsa_bits", &self.rsa_bits)
            .field("kdf", &self.kdf)
            .field("totp_issuer", &self.totp_issuer)
            .field("rate_limits", &self.rate_limits)
            .finish()
    }
}

impl Config {
    /// Load from a TOML file. Missing keys fall back to their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Reject settings that would weaken the service or cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rsa_bits < MIN_KEY_BITS {
            return Err(ConfigError::KeyTooSmall(self.rsa_bits));
        }
        if let Some(secret) = &self.token_secret {
            if secret.len() < MIN_TOKEN_SECRET_LEN {
                return Err(ConfigError::WeakTokenSecret);
            }
        }
        if self.token_lifetime_minutes <= 0 {
            return Err(ConfigError::InvalidTokenLifetime(
                self.token_lifetime_minutes,
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidSweepInterval);
        }
        self.kdf
            .validate()
            .map_err(|e| ConfigError::InvalidKdf(e.to_string()))?;
        if self.totp_issuer.is_empty() || self.totp_issuer.contains(':') {
            return Err(ConfigError::InvalidTotpIssuer(self.totp_issuer.clone()));
        }
        for (kind, policy) in &self.rate_limits {
            if policy.limit == 0 || policy.window_secs == 0 {
                return Err(ConfigError::InvalidRatePolicy(kind.clone()));
            }
        }
        Ok(())
    }

    /// Build the limiter described by `rate_limits`
    pub fn rate_limiter(&self) -> RateLimiter {
        self.rate_limits
            .iter()
            .fold(RateLimiter::new(), |limiter, (kind, policy)| {
                limiter.with_policy(kind.clone(), *policy)
            })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("rsa_bits {0} is below the {MIN_KEY_BITS}-bit minimum")]
    KeyTooSmall(usize),
    #[error("token_secret must be at least {MIN_TOKEN_SECRET_LEN} bytes")]
    WeakTokenSecret,
    #[error("token_lifetime_minutes must be positive, got {0}")]
    InvalidTokenLifetime(i64),
    #[error("sweep_interval_secs must be positive")]
    InvalidSweepInterval,
    #[error("invalid kdf parameters: {0}")]
    InvalidKdf(String),
    #[error("totp_issuer must be non-empty and contain no ':', got {0:?}")]
    InvalidTotpIssuer(String),
    #[error("invalid rate limit policy for {0}")]
    InvalidRatePolicy(String),
}

/// serde for `tracing::Level` as its lowercase name
mod level {
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(level: &tracing::Level, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&level.as_str().to_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<tracing::Level, D::Error> {
        let raw = String::deserialize(d)?;
        tracing::Level::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen_addr.port(), 8000);
        assert_eq!(config.token_lifetime_minutes, 60);
        assert_eq!(config.rsa_bits, 4096);
        assert_eq!(config.totp_issuer, "SecureMail");
        assert_eq!(config.rate_limits[LOGIN], RatePolicy::new(5, 60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            listen_addr = "127.0.0.1:9000"
            log_level = "debug"
            rsa_bits = 3072

            [kdf]
            memory_kib = 8
            iterations = 1

            [rate_limits.login]
            limit = 10
            window_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.log_level, tracing::Level::DEBUG);
        assert_eq!(config.rsa_bits, 3072);
        assert_eq!(config.kdf, KdfParams::minimal());
        assert_eq!(config.token_lifetime_minutes, 60);
        assert!(config.sqlite_path.is_none());

        let limiter = config.rate_limiter();
        assert_eq!(limiter.policy(LOGIN), Some(&RatePolicy::new(10, 30)));
    }

    #[test]
    fn test_rejects_weak_settings() {
        let config = Config {
            rsa_bits: 2048,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::KeyTooSmall(2048))
        ));

        let config = Config {
            token_secret: Some("too short".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WeakTokenSecret)
        ));

        let config = Config {
            token_lifetime_minutes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            rate_limits: HashMap::from([(LOGIN.to_string(), RatePolicy::new(0, 60))]),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRatePolicy(_))
        ));

        for issuer in ["", "Acme:Mail"] {
            let config = Config {
                totp_issuer: issuer.to_string(),
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidTotpIssuer(_))
            ));
        }
    }

    #[test]
    fn test_debug_hides_token_secret() {
        let config = Config {
            token_secret: Some("a".repeat(40)),
            ..Default::default()
        };
        assert!(!format!("{:?}", config).contains(&"a".repeat(40)));
    }
}
