//! Process configuration from environment variables.
//!
//! Missing credentials are the only fatal startup condition in the
//! whole bot; everything past this boundary recovers and continues.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_OPERATOR_ID: &str = "TELEGRAM_USER_ID";
pub const ENV_CONFIG_PATH: &str = "GIFTS_BOT_CONFIG_PATH";
pub const ENV_LOG_FILTER: &str = "GIFTS_BOT_LOG_FILTER";

const DEFAULT_CONFIG_PATH: &str = "config.json";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("environment variable {0} must be an integer")]
    InvalidInteger(&'static str),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: String,
    /// The authorized operator; also the default gift recipient.
    pub operator_id: i64,
    pub config_path: PathBuf,
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, EnvConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EnvConfigError> {
        let bot_token = lookup(ENV_BOT_TOKEN)
            .filter(|token| !token.trim().is_empty())
            .ok_or(EnvConfigError::Missing(ENV_BOT_TOKEN))?;
        let operator_id = lookup(ENV_OPERATOR_ID)
            .ok_or(EnvConfigError::Missing(ENV_OPERATOR_ID))?
            .trim()
            .parse::<i64>()
            .map_err(|_| EnvConfigError::InvalidInteger(ENV_OPERATOR_ID))?;
        let config_path = lookup(ENV_CONFIG_PATH)
            .filter(|path| !path.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let log_filter =
            lookup(ENV_LOG_FILTER).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            bot_token,
            operator_id,
            config_path: PathBuf::from(config_path),
            log_filter,
        })
    }
}
