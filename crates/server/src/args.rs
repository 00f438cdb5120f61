use std::net::SocketAddr;
use std::path::PathBuf;

pub use clap::Parser;

use service::Config;

#[derive(Parser, Debug)]
#[command(name = "securemail")]
#[command(version, about = "End-to-end encrypted mail server")]
pub struct Args {
    /// Path to a TOML config file. Unset keys take their defaults.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    pub listen_addr: Option<SocketAddr>,

    /// Path to the sqlite database (in-memory if unset anywhere)
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<tracing::Level>,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl Args {
    /// Load the config file, if any, and apply flag overrides on top
    pub fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(listen_addr) = self.listen_addr {
            config.listen_addr = listen_addr;
        }
        if let Some(database) = &self.database {
            config.sqlite_path = Some(database.clone());
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        if let Some(log_dir) = &self.log_dir {
            config.log_dir = Some(log_dir.clone());
        }

        config.validate()?;
        Ok(config)
    }
}
