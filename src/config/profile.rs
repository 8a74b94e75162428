//! Connection profile
//!
//! The validated, immutable set of parameters needed to reach one Odoo
//! database.

use super::ConfigError;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_URL: &str = "http://localhost:8069";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: f64 = 1.0;

/// Secret used for `authenticate` and every subsequent `execute_kw`.
///
/// Odoo accepts an API key anywhere a password is accepted, but a profile
/// carries exactly one of them.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Password(String),
    ApiKey(String),
}

impl Credential {
    /// Build a credential from optional password / API key values.
    ///
    /// Empty strings count as unset. Fails unless exactly one is present.
    pub fn from_parts(
        password: Option<String>,
        api_key: Option<String>,
    ) -> Result<Self, ConfigError> {
        let password = password.filter(|p| !p.is_empty());
        let api_key = api_key.filter(|k| !k.is_empty());

        match (password, api_key) {
            (Some(p), None) => Ok(Credential::Password(p)),
            (None, Some(k)) => Ok(Credential::ApiKey(k)),
            (None, None) => Err(ConfigError::MissingCredential),
            (Some(_), Some(_)) => Err(ConfigError::ConflictingCredentials),
        }
    }

    pub fn secret(&self) -> &str {
        match self {
            Credential::Password(s) | Credential::ApiKey(s) => s,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Password(_) => "password",
            Credential::ApiKey(_) => "api_key",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(<redacted>)", self.kind())
    }
}

/// Timeout and retry knobs, shared between the configured profile and
/// profiles built at runtime by `odoo_authenticate`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs_f64(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

/// Validated connection profile. Fields are read-only once built.
#[derive(Debug, Clone)]
pub struct ConnectionProfile {
    url: String,
    database: String,
    username: String,
    credential: Credential,
    settings: ConnectionSettings,
}

impl ConnectionProfile {
    /// Create a profile with default timeout and retry settings.
    ///
    /// The URL is normalized (see [`normalize_url`]); database and username
    /// must be non-empty.
    pub fn new(
        url: &str,
        database: &str,
        username: &str,
        credential: Credential,
    ) -> Result<Self, ConfigError> {
        if database.trim().is_empty() {
            return Err(ConfigError::Missing("database"));
        }
        if username.trim().is_empty() {
            return Err(ConfigError::Missing("username"));
        }

        Ok(Self {
            url: normalize_url(url),
            database: database.trim().to_string(),
            username: username.trim().to_string(),
            credential,
            settings: ConnectionSettings::default(),
        })
    }

    pub fn with_settings(mut self, settings: ConnectionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn settings(&self) -> ConnectionSettings {
        self.settings
    }

    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.settings.max_retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.settings.retry_delay
    }
}

/// Prefix `http://` when no scheme is given and strip trailing slashes.
/// An empty URL falls back to [`DEFAULT_URL`].
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return DEFAULT_URL.to_string();
    }

    let url = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    };

    url.trim_end_matches('/').to_string()
}
