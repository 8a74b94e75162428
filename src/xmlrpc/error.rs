//! XML-RPC error types

use std::fmt;
use thiserror::Error;

/// Fault returned by the remote side inside a `methodResponse`
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    /// Integer codes are rendered as decimal strings
    pub code: String,
    pub message: String,
}

/// Odoo's XML-RPC fault code for `AccessDenied` (bad or revoked credentials)
pub const FAULT_ACCESS_DENIED: &str = "3";

impl Fault {
    /// True when the fault means the credentials were refused, as opposed to
    /// a permission error on a specific record or model.
    pub fn is_access_denied(&self) -> bool {
        self.code == FAULT_ACCESS_DENIED
            || self.message.contains("AccessDenied")
            || self.message.starts_with("Access Denied")
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Odoo puts a full traceback in faultString; the last line is the useful part
        let summary = self
            .message
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or(&self.message)
            .trim();
        write!(f, "fault {}: {}", self.code, summary)
    }
}

/// Errors from a single XML-RPC exchange
#[derive(Error, Debug)]
pub enum XmlRpcError {
    /// Network-level failure worth retrying
    #[error("Transport error: {0}")]
    Transient(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("HTTP error ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("Remote {0}")]
    Fault(Fault),

    #[error("Malformed XML-RPC response: {0}")]
    Malformed(String),
}

impl XmlRpcError {
    pub fn is_transient(&self) -> bool {
        match self {
            XmlRpcError::Transient(_) => true,
            // Gateway and throttling responses in front of Odoo
            XmlRpcError::Http { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            XmlRpcError::Request(_) | XmlRpcError::Fault(_) | XmlRpcError::Malformed(_) => false,
        }
    }
}

impl From<quick_xml::Error> for XmlRpcError {
    fn from(e: quick_xml::Error) -> Self {
        XmlRpcError::Malformed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(XmlRpcError::Transient("connection reset".into()).is_transient());
        assert!(XmlRpcError::Http {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!XmlRpcError::Http {
            status: 404,
            body: String::new()
        }
        .is_transient());
        assert!(!XmlRpcError::Malformed("eof".into()).is_transient());
    }

    #[test]
    fn test_fault_display_uses_last_line() {
        let fault = Fault {
            code: "2".into(),
            message: "Traceback (most recent call last):\n  File ...\nodoo.exceptions.ValidationError: Name is required\n".into(),
        };
        assert_eq!(
            fault.to_string(),
            "fault 2: odoo.exceptions.ValidationError: Name is required"
        );
    }

    #[test]
    fn test_access_denied_detection() {
        let denied = Fault {
            code: "3".into(),
            message: "Access Denied".into(),
        };
        assert!(denied.is_access_denied());

        let permission = Fault {
            code: "4".into(),
            message: "You are not allowed to access 'Contact' (res.partner) records.".into(),
        };
        assert!(!permission.is_access_denied());
    }
}
