//! Process configuration loaded from environment variables.
//!
//! # Responsibility
//! - Collect logger and database settings into one typed value.
//! - Render the active configuration for diagnostics.
//!
//! # Invariants
//! - Unset variables fall back to defaults; loading never fails on absence.
//! - `watch()` output is stable, 2-space indented JSON.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const LOG_ENV: &str = "LOG_ENV";
pub const LOG_FILENAME: &str = "LOG_FILENAME";
pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const DB_DIALECT: &str = "DB_DIALECT";
pub const DB_HOST: &str = "DB_HOST";
pub const DB_PORT: &str = "DB_PORT";
pub const DB_NAME: &str = "DB_NAME";
pub const DB_USER: &str = "DB_USER";
pub const DB_PASSWORD: &str = "DB_PASSWORD";

#[derive(Debug)]
pub enum ConfigError {
    Serialize(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialize(err) => write!(f, "failed to render config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialize(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

/// Logger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// `development` mirrors file output to stderr; `production` does not.
    pub env: String,
    /// Log file path. Empty logs to stderr only.
    pub filename: String,
    pub level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
            filename: String::new(),
            level: "debug".to_string(),
        }
    }
}

impl LoggerConfig {
    pub fn is_development(&self) -> bool {
        self.env.trim().eq_ignore_ascii_case("development")
    }
}

/// Storage connection settings.
///
/// For `sqlite`, `host` is the database file path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub dialect: String,
    pub host: String,
    pub port: String,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: "sqlite".to_string(),
            host: String::new(),
            port: String::new(),
            name: String::new(),
            user: String::new(),
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub logger: LoggerConfig,
    pub database: DatabaseConfig,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, keeping defaults for
    /// variables it does not resolve.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let fields: [(&str, &mut String); 9] = [
            (LOG_ENV, &mut config.logger.env),
            (LOG_FILENAME, &mut config.logger.filename),
            (LOG_LEVEL, &mut config.logger.level),
            (DB_DIALECT, &mut config.database.dialect),
            (DB_HOST, &mut config.database.host),
            (DB_PORT, &mut config.database.port),
            (DB_NAME, &mut config.database.name),
            (DB_USER, &mut config.database.user),
            (DB_PASSWORD, &mut config.database.password),
        ];
        for (key, slot) in fields {
            if let Some(value) = lookup(key) {
                *slot = value;
            }
        }
        config
    }

    /// Renders the active configuration as pretty JSON.
    pub fn watch(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
