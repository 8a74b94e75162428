//! Odoo client errors

use crate::config::ConfigError;
use crate::xmlrpc::{Fault, XmlRpcError};
use thiserror::Error;

/// Login failures
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials for user '{username}' on database '{database}'")]
    InvalidCredentials { username: String, database: String },

    #[error("Odoo server at {url} is unreachable after {attempts} attempt(s): {reason}")]
    Unreachable {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Login rejected by server: {0}")]
    Rejected(String),
}

/// Errors surfaced by [`OdooClient`](super::OdooClient)
#[derive(Error, Debug)]
pub enum OdooError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The server rejected the operation; never retried
    #[error("Remote {0}")]
    Remote(Fault),

    #[error("Remote call failed after {attempts} attempt(s): {reason}")]
    RetriesExhausted { attempts: u32, reason: String },

    #[error("Unexpected response: {0}")]
    Protocol(String),
}

impl OdooError {
    /// Stable error category reported to MCP callers
    pub fn kind(&self) -> &'static str {
        match self {
            OdooError::Config(_) => "configuration_error",
            OdooError::Auth(_) => "authentication_error",
            OdooError::Remote(_) | OdooError::RetriesExhausted { .. } | OdooError::Protocol(_) => {
                "remote_error"
            }
        }
    }

    /// Number of attempts made, when retries were involved
    pub fn attempts(&self) -> Option<u32> {
        match self {
            OdooError::RetriesExhausted { attempts, .. } => Some(*attempts),
            OdooError::Auth(AuthError::Unreachable { attempts, .. }) => Some(*attempts),
            _ => None,
        }
    }
}

/// A failed call together with how many attempts it took
#[derive(Debug)]
pub struct CallFailure {
    pub error: XmlRpcError,
    pub attempts: u32,
}

impl From<CallFailure> for OdooError {
    fn from(failure: CallFailure) -> Self {
        if failure.error.is_transient() {
            return OdooError::RetriesExhausted {
                attempts: failure.attempts,
                reason: failure.error.to_string(),
            };
        }

        match failure.error {
            XmlRpcError::Fault(fault) => OdooError::Remote(fault),
            other => OdooError::Protocol(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_failure_becomes_retries_exhausted() {
        let err = OdooError::from(CallFailure {
            error: XmlRpcError::Transient("connection reset by peer".into()),
            attempts: 4,
        });
        assert!(matches!(err, OdooError::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(err.kind(), "remote_error");
        assert_eq!(err.attempts(), Some(4));
    }

    #[test]
    fn test_fault_becomes_remote() {
        let err = OdooError::from(CallFailure {
            error: XmlRpcError::Fault(Fault {
                code: "1".into(),
                message: "Object foo.bar doesn't exist".into(),
            }),
            attempts: 1,
        });
        assert!(matches!(err, OdooError::Remote(_)));
        assert_eq!(err.attempts(), None);
    }
}
