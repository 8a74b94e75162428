//! Configuration loading
//!
//! Settings come from an optional TOML file (path in `ODOO_MCP_CONFIG`)
//! and are overridden by `ODOO_*` environment variables.

use super::profile::{ConnectionProfile, ConnectionSettings, Credential, DEFAULT_URL};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the path of the optional TOML file
pub const CONFIG_PATH_ENV: &str = "ODOO_MCP_CONFIG";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("Either a password or an API key must be set")]
    MissingCredential,

    #[error("Both a password and an API key are set; configure only one")]
    ConflictingCredentials,
}

/// Top-level config file layout
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub odoo: OdooSection,
}

/// `[odoo]` table. Every field is optional so the environment can fill gaps.
#[derive(Clone, Default, Deserialize)]
pub struct OdooSection {
    pub url: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    /// Seconds
    pub timeout: Option<u64>,
    pub max_retries: Option<u32>,
    /// Seconds, fractional values allowed
    pub retry_delay: Option<f64>,
}

impl fmt::Debug for OdooSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdooSection")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl Config {
    /// Load from the process environment (and the file it points at, if any)
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Override file values with non-empty `ODOO_*` variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let odoo = &mut self.odoo;

        if let Some(v) = get("ODOO_URL") {
            odoo.url = Some(v);
        }
        if let Some(v) = get("ODOO_DATABASE") {
            odoo.database = Some(v);
        }
        if let Some(v) = get("ODOO_USERNAME") {
            odoo.username = Some(v);
        }
        if let Some(v) = get("ODOO_PASSWORD") {
            odoo.password = Some(v);
        }
        if let Some(v) = get("ODOO_API_KEY") {
            odoo.api_key = Some(v);
        }
        if let Some(v) = get("ODOO_TIMEOUT") {
            odoo.timeout = Some(parse_env("ODOO_TIMEOUT", &v)?);
        }
        if let Some(v) = get("ODOO_MAX_RETRIES") {
            odoo.max_retries = Some(parse_env("ODOO_MAX_RETRIES", &v)?);
        }
        if let Some(v) = get("ODOO_RETRY_DELAY") {
            odoo.retry_delay = Some(parse_env("ODOO_RETRY_DELAY", &v)?);
        }

        Ok(())
    }

    /// Timeout and retry settings, falling back to defaults
    pub fn settings(&self) -> Result<ConnectionSettings, ConfigError> {
        let defaults = ConnectionSettings::default();
        let odoo = &self.odoo;

        let timeout = match odoo.timeout {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    key: "timeout",
                    value: "0".to_string(),
                })
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.timeout,
        };

        let retry_delay = match odoo.retry_delay {
            Some(secs) if !secs.is_finite() || secs < 0.0 => {
                return Err(ConfigError::Invalid {
                    key: "retry_delay",
                    value: secs.to_string(),
                })
            }
            Some(secs) => Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::Invalid {
                key: "retry_delay",
                value: secs.to_string(),
            })?,
            None => defaults.retry_delay,
        };

        Ok(ConnectionSettings {
            timeout,
            max_retries: odoo.max_retries.unwrap_or(defaults.max_retries),
            retry_delay,
        })
    }

    /// Validate and convert into a connection profile
    pub fn to_profile(&self) -> Result<ConnectionProfile, ConfigError> {
        let odoo = &self.odoo;

        let database = odoo
            .database
            .as_deref()
            .ok_or(ConfigError::Missing("database"))?;
        let username = odoo
            .username
            .as_deref()
            .ok_or(ConfigError::Missing("username"))?;
        let credential = Credential::from_parts(odoo.password.clone(), odoo.api_key.clone())?;

        let profile = ConnectionProfile::new(
            odoo.url.as_deref().unwrap_or(DEFAULT_URL),
            database,
            username,
            credential,
        )?;

        Ok(profile.with_settings(self.settings()?))
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
