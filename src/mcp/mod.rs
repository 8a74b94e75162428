//! MCP Server implementation for Odoo
//!
//! Exposes tools for querying and modifying Odoo records over stdio

pub mod args;
pub mod error;
pub mod protocol;
mod server;
pub mod stdio;
pub mod tools;

pub use error::ToolError;
pub use protocol::*;
pub use server::{Connector, OdooMcpServer};
pub use stdio::{handle_request, parse_request, run_stdio_loop};
