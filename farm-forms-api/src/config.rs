//! Service configuration loaded from environment variables

use thiserror::Error;

const DEFAULT_API_PORT: u16 = 4001;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("{var} has invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
    #[error("API_SECRET must not be empty")]
    EmptySecret,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub api_port: u16,
    pub api_secret: String,
    pub max_connections: u32,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let api_port = match lookup("API_PORT") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { var: "API_PORT", value })?,
            None => DEFAULT_API_PORT,
        };

        let api_secret = lookup("API_SECRET").ok_or(ConfigError::Missing("API_SECRET"))?;
        if api_secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(value) => match value.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "DB_MAX_CONNECTIONS",
                        value,
                    })
                }
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Config {
            database_url,
            api_port,
            api_secret,
            max_connections,
        })
    }
}
