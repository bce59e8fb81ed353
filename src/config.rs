//! Runtime configuration, read from environment variables.
//!
//! A `.env` file in the working directory is loaded first when present.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const SERVICE_ACCOUNT_VAR: &str = "SIGNTALK_SERVICE_ACCOUNT";
pub const API_KEY_VAR: &str = "SIGNTALK_API_KEY";
pub const STORAGE_BUCKET_VAR: &str = "SIGNTALK_STORAGE_BUCKET";
pub const BIND_ADDR_VAR: &str = "SIGNTALK_BIND_ADDR";
pub const LOG_LEVEL_VAR: &str = "SIGNTALK_LOG_LEVEL";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the service-account JSON key.
    pub service_account_path: PathBuf,
    /// Web API key used for password sign-in.
    pub api_key: String,
    /// Storage bucket; `None` means `<project>.appspot.com`.
    pub storage_bucket: Option<String>,
    pub bind_addr: SocketAddr,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let service_account_path = get(SERVICE_ACCOUNT_VAR)
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing(SERVICE_ACCOUNT_VAR))?;

        let api_key = get(API_KEY_VAR).ok_or(ConfigError::Missing(API_KEY_VAR))?;

        let storage_bucket = get(STORAGE_BUCKET_VAR);

        let bind_addr_raw = get(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr_raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            var: BIND_ADDR_VAR,
            value: bind_addr_raw.clone(),
            reason: e.to_string(),
        })?;

        let log_level = get(LOG_LEVEL_VAR).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&log_level) {
            return Err(ConfigError::Invalid {
                var: LOG_LEVEL_VAR,
                value: log_level,
                reason: e.to_string(),
            });
        }

        Ok(Self {
            service_account_path,
            api_key,
            storage_bucket,
            bind_addr,
            log_level,
        })
    }
}
