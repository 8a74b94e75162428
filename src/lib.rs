//! Odoo XML-RPC MCP Library
//!
//! Model Context Protocol server for Odoo instances, speaking XML-RPC to
//! the `common` and `object` services.

pub mod config;
pub mod mcp;
pub mod odoo;
pub mod xmlrpc;

pub use config::{Config, ConfigError, ConnectionProfile, ConnectionSettings, Credential};
pub use mcp::OdooMcpServer;
pub use odoo::{OdooClient, OdooError, SearchOptions};
pub use xmlrpc::{HttpTransport, Transport, XmlRpcError};
