//! Mailbox service for SecureMail.
//!
//! Wraps the cryptographic core in `common` with everything needed to run it:
//! - Config (TOML with defaults, validated at startup)
//! - Database (SQLite, migrations, row models)
//! - Auth collaborators (password hashes, TOTP, signed bearer tokens)
//! - Mailbox operations (register, login, send, read, delete)
//! - HTTP API (axum) and process lifecycle (logging, sweeper, shutdown)

pub mod auth;
pub mod config;
pub mod database;
pub mod http_server;
pub mod mailbox;
pub mod process;
pub mod state;

pub use config::{Config, ConfigError};
pub use database::{Database, DatabaseSetupError};
pub use state::{State as ServiceState, StateSetupError};
