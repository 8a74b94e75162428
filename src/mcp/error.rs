//! Tool-level errors

use crate::config::ConfigError;
use crate::odoo::OdooError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    Validation(String),

    #[error("Not connected to Odoo. Set the ODOO_* environment variables or call odoo_authenticate first.")]
    NotConfigured,

    #[error("Records not found in {model}: {ids:?}")]
    MissingRecords { model: String, ids: Vec<i64> },

    #[error(transparent)]
    Odoo(#[from] OdooError),
}

impl ToolError {
    pub fn validation(message: impl Into<String>) -> Self {
        ToolError::Validation(message.into())
    }

    /// Stable error category reported to MCP callers
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::Validation(_) => "validation_error",
            ToolError::NotConfigured => "not_configured",
            ToolError::MissingRecords { .. } => "remote_error",
            ToolError::Odoo(e) => e.kind(),
        }
    }

    pub fn attempts(&self) -> Option<u32> {
        match self {
            ToolError::Odoo(e) => e.attempts(),
            _ => None,
        }
    }
}

impl From<ConfigError> for ToolError {
    fn from(e: ConfigError) -> Self {
        ToolError::Odoo(OdooError::Config(e))
    }
}
