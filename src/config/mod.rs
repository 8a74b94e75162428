//! Configuration module
//!
//! Connection settings for the Odoo instance.

#[allow(clippy::module_inception)]
pub mod config;
pub mod profile;

pub use config::{Config, ConfigError, OdooSection, CONFIG_PATH_ENV};
pub use profile::{normalize_url, ConnectionProfile, ConnectionSettings, Credential};
