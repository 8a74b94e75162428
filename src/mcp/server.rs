//! MCP Server implementation for Odoo
//!
//! Exposes tools for searching, reading and modifying Odoo records

use crate::config::{ConnectionProfile, ConnectionSettings, Credential};
use crate::mcp::error::ToolError;
use crate::mcp::protocol::*;
use crate::mcp::tools::{tool_definitions, ConnectionArgs, ToolRequest};
use crate::odoo::{OdooClient, OdooError, SearchOptions};
use crate::xmlrpc::Value as RpcValue;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Builds a client for a profile; swapped out in tests
pub type Connector = Arc<dyn Fn(ConnectionProfile) -> Result<OdooClient, OdooError> + Send + Sync>;

/// MCP Server for Odoo
pub struct OdooMcpServer {
    client: RwLock<Option<Arc<OdooClient>>>,
    settings: ConnectionSettings,
    connector: Connector,
}

impl OdooMcpServer {
    /// Create a server. Without a client, only `odoo_authenticate` works
    /// until it establishes one.
    pub fn new(client: Option<OdooClient>, settings: ConnectionSettings) -> Self {
        Self {
            client: RwLock::new(client.map(Arc::new)),
            settings,
            connector: Arc::new(OdooClient::connect_http),
        }
    }

    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connector = connector;
        self
    }

    /// Get list of available tools
    pub fn get_tools(&self) -> Vec<Tool> {
        tool_definitions()
    }

    /// Current client, if one is configured
    pub async fn client(&self) -> Option<Arc<OdooClient>> {
        self.client.read().await.clone()
    }

    /// Handle a tool call
    pub async fn call_tool(&self, name: &str, args: &HashMap<String, Value>) -> CallToolResult {
        match self.dispatch(name, args).await {
            Ok(payload) => CallToolResult::json(&payload),
            Err(e) => {
                tracing::error!("Tool {} failed: {}", name, e);
                CallToolResult::structured_error(name, e.kind(), e.to_string(), e.attempts())
            }
        }
    }

    async fn dispatch(&self, name: &str, args: &HashMap<String, Value>) -> Result<Value, ToolError> {
        let request = ToolRequest::parse(name, args)?;

        match request {
            ToolRequest::Authenticate(connection) => self.authenticate(connection).await,
            ToolRequest::Search {
                model,
                domain,
                options,
            } => search(&*self.require_client().await?, &model, domain, options).await,
            ToolRequest::Read { model, ids, fields } => {
                read(&*self.require_client().await?, &model, &ids, fields.as_deref()).await
            }
            ToolRequest::Create { model, values } => {
                create(&*self.require_client().await?, &model, values).await
            }
            ToolRequest::Update { model, ids, values } => {
                update(&*self.require_client().await?, &model, &ids, values).await
            }
            ToolRequest::Delete { model, ids } => {
                delete(&*self.require_client().await?, &model, &ids).await
            }
            ToolRequest::Execute {
                model,
                method,
                args,
                kwargs,
            } => execute(&*self.require_client().await?, &model, &method, args, kwargs).await,
            ToolRequest::ListModels { filter } => Ok(self
                .require_client()
                .await?
                .list_models(filter.as_deref())
                .await?
                .into_json()),
            ToolRequest::GetFields { model, attributes } => Ok(self
                .require_client()
                .await?
                .fields_get(&model, attributes.as_deref())
                .await?
                .into_json()),
        }
    }

    async fn require_client(&self) -> Result<Arc<OdooClient>, ToolError> {
        self.client().await.ok_or(ToolError::NotConfigured)
    }

    async fn authenticate(&self, connection: Option<ConnectionArgs>) -> Result<Value, ToolError> {
        let client = match connection {
            Some(conn) => {
                let credential = Credential::from_parts(conn.password, conn.api_key)?;
                let profile =
                    ConnectionProfile::new(&conn.url, &conn.database, &conn.username, credential)?
                        .with_settings(self.settings);
                Arc::new((self.connector)(profile)?)
            }
            None => self.client().await.ok_or_else(|| {
                ToolError::validation("url, database, username and password or api_key are required when no connection is configured")
            })?,
        };

        let session = client.authenticate().await?;

        // Only a successful login replaces the active connection
        *self.client.write().await = Some(Arc::clone(&client));

        let profile = client.profile();
        Ok(json!({
            "success": true,
            "uid": session.uid(),
            "url": profile.url(),
            "database": profile.database(),
            "username": profile.username(),
            "version": session.server_version(),
            "authenticated_at": session.authenticated_at().to_rfc3339(),
        }))
    }
}

async fn search(
    client: &OdooClient,
    model: &str,
    domain: Vec<Value>,
    options: SearchOptions,
) -> Result<Value, ToolError> {
    let domain = RpcValue::from(Value::Array(domain));
    let records = client.search_read(model, domain, options).await?;
    Ok(records.into_json())
}

async fn read(
    client: &OdooClient,
    model: &str,
    ids: &[i64],
    fields: Option<&[String]>,
) -> Result<Value, ToolError> {
    let records = client.read(model, ids, fields).await?.into_json();

    // Older servers silently drop unknown ids instead of raising
    let found: HashSet<i64> = records
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r.get("id")?.as_i64()).collect())
        .unwrap_or_default();
    let missing: Vec<i64> = ids.iter().copied().filter(|id| !found.contains(id)).collect();
    if !missing.is_empty() {
        return Err(ToolError::MissingRecords {
            model: model.to_string(),
            ids: missing,
        });
    }

    Ok(records)
}

async fn create(
    client: &OdooClient,
    model: &str,
    values: Map<String, Value>,
) -> Result<Value, ToolError> {
    let id = client
        .create(model, RpcValue::from(Value::Object(values)))
        .await?;
    Ok(json!({
        "success": true,
        "id": id,
        "message": format!("Created record with ID {}", id),
    }))
}

async fn update(
    client: &OdooClient,
    model: &str,
    ids: &[i64],
    values: Map<String, Value>,
) -> Result<Value, ToolError> {
    let success = client
        .write(model, ids, RpcValue::from(Value::Object(values)))
        .await?;
    Ok(json!({
        "success": success,
        "ids": ids,
        "message": format!("Updated {} record(s)", ids.len()),
    }))
}

async fn delete(client: &OdooClient, model: &str, ids: &[i64]) -> Result<Value, ToolError> {
    let success = client.unlink(model, ids).await?;
    Ok(json!({
        "success": success,
        "ids": ids,
        "message": format!("Deleted {} record(s)", ids.len()),
    }))
}

async fn execute(
    client: &OdooClient,
    model: &str,
    method: &str,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
) -> Result<Value, ToolError> {
    let args = args.iter().map(RpcValue::from).collect();
    let kwargs: BTreeMap<String, RpcValue> = kwargs
        .iter()
        .map(|(k, v)| (k.clone(), RpcValue::from(v)))
        .collect();

    let result = client.execute_kw(model, method, args, kwargs).await?;
    Ok(result.into_json())
}
