//! Odoo XML-RPC MCP Server
//!
//! Entry point for the MCP server binary.
//! Implements MCP protocol over stdio using JSON-RPC 2.0.

use odoo_xmlrpc_mcp::config::Config;
use odoo_xmlrpc_mcp::mcp::{run_stdio_loop, OdooMcpServer};
use odoo_xmlrpc_mcp::odoo::OdooClient;
use std::io;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging to stderr (MCP uses stdout for protocol)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    tracing::info!("Starting Odoo XML-RPC MCP Server...");

    // A malformed config file or environment value is fatal
    let config = Config::load_default()?;
    let settings = config.settings()?;

    // An incomplete profile is not: the client can still connect via odoo_authenticate
    let client = match config.to_profile() {
        Ok(profile) => {
            tracing::info!(
                "Configured for database {} at {} as {}",
                profile.database(),
                profile.url(),
                profile.username()
            );
            Some(OdooClient::connect_http(profile)?)
        }
        Err(e) => {
            tracing::warn!("Starting without a connection: {}", e);
            None
        }
    };

    let server = Arc::new(OdooMcpServer::new(client, settings));

    tracing::info!("MCP Server ready, listening on stdio...");

    run_stdio_loop(server, tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}
