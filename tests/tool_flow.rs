//! End-to-end tool calls against an in-memory Odoo

use async_trait::async_trait;
use odoo_xmlrpc_mcp::config::{ConnectionProfile, ConnectionSettings, Credential};
use odoo_xmlrpc_mcp::mcp::{CallToolResult, OdooMcpServer};
use odoo_xmlrpc_mcp::odoo::{OdooClient, OdooError};
use odoo_xmlrpc_mcp::xmlrpc::{Fault, Service, Transport, Value as RpcValue, XmlRpcError};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const UID: i64 = 2;
const PASSWORD: &str = "admin";

/// A single-database Odoo holding `res.partner` records
struct FakeOdoo {
    partners: Mutex<BTreeMap<i64, Map<String, Value>>>,
    next_id: Mutex<i64>,
    calls: AtomicU32,
}

impl FakeOdoo {
    fn new() -> Arc<Self> {
        let mut partners = BTreeMap::new();
        for id in 1..=25 {
            let mut record = Map::new();
            record.insert("id".into(), json!(id));
            record.insert("name".into(), json!(format!("Partner {}", id)));
            record.insert("email".into(), json!(format!("partner{}@example.com", id)));
            record.insert("is_company".into(), json!(id % 2 == 0));
            partners.insert(id, record);
        }

        Arc::new(Self {
            partners: Mutex::new(partners),
            next_id: Mutex::new(26),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn common(&self, method: &str, params: &[Value]) -> Result<Value, XmlRpcError> {
        match method {
            "version" => Ok(json!({"server_version": "17.0", "protocol_version": 1})),
            "authenticate" => {
                let ok = params.get(1) == Some(&json!("admin"))
                    && params.get(2) == Some(&json!(PASSWORD));
                Ok(if ok { json!(UID) } else { json!(false) })
            }
            other => Err(fault("1", &format!("unknown method {}", other))),
        }
    }

    fn object(&self, params: &[Value]) -> Result<Value, XmlRpcError> {
        if params.get(1) != Some(&json!(UID)) || params.get(2) != Some(&json!(PASSWORD)) {
            return Err(fault("3", "Access Denied"));
        }

        let model = params[3].as_str().unwrap_or_default();
        let method = params[4].as_str().unwrap_or_default();
        let args = params[5].as_array().cloned().unwrap_or_default();
        let kwargs = params[6].as_object().cloned().unwrap_or_default();

        if model != "res.partner" {
            return Err(fault("2", &format!("Object {} doesn't exist", model)));
        }

        let mut partners = self.partners.lock().unwrap();
        match method {
            "search_read" => {
                let domain = args.first().and_then(Value::as_array).cloned().unwrap_or_default();
                let offset = kwargs.get("offset").and_then(Value::as_u64).unwrap_or(0) as usize;
                let limit = kwargs
                    .get("limit")
                    .and_then(Value::as_u64)
                    .map(|l| l as usize)
                    .unwrap_or(usize::MAX);
                let rows: Vec<Value> = partners
                    .values()
                    .filter(|r| matches(r, &domain))
                    .skip(offset)
                    .take(limit)
                    .map(|r| project(r, kwargs.get("fields")))
                    .collect();
                Ok(Value::Array(rows))
            }
            "read" => {
                let ids = args[0].as_array().cloned().unwrap_or_default();
                let rows: Vec<Value> = ids
                    .iter()
                    .filter_map(|id| partners.get(&id.as_i64()?))
                    .map(|r| project(r, kwargs.get("fields")))
                    .collect();
                Ok(Value::Array(rows))
            }
            "create" => {
                let mut next = self.next_id.lock().unwrap();
                let id = *next;
                *next += 1;
                let mut record = args[0].as_object().cloned().unwrap_or_default();
                record.insert("id".into(), json!(id));
                partners.insert(id, record);
                Ok(json!(id))
            }
            "write" => {
                let values = args[1].as_object().cloned().unwrap_or_default();
                for id in args[0].as_array().into_iter().flatten() {
                    if let Some(record) = id.as_i64().and_then(|id| partners.get_mut(&id)) {
                        record.extend(values.clone());
                    }
                }
                Ok(json!(true))
            }
            "unlink" => {
                for id in args[0].as_array().into_iter().flatten() {
                    if let Some(id) = id.as_i64() {
                        partners.remove(&id);
                    }
                }
                Ok(json!(true))
            }
            "fields_get" => Ok(json!({
                "name": {"string": "Name", "type": "char", "required": true},
                "email": {"string": "Email", "type": "char", "required": false},
                "is_company": {"string": "Is a Company", "type": "boolean", "required": false},
            })),
            other => Err(fault(
                "1",
                &format!("Traceback (most recent call last):\nAttributeError: no method {}", other),
            )),
        }
    }
}

#[async_trait]
impl Transport for FakeOdoo {
    async fn call(
        &self,
        service: Service,
        method: &str,
        params: &[RpcValue],
    ) -> Result<RpcValue, XmlRpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let params: Vec<Value> = params.iter().cloned().map(RpcValue::into_json).collect();
        let result = match service {
            Service::Common => self.common(method, &params)?,
            Service::Object => self.object(&params)?,
        };
        Ok(RpcValue::from(result))
    }
}

fn fault(code: &str, message: &str) -> XmlRpcError {
    XmlRpcError::Fault(Fault {
        code: code.to_string(),
        message: message.to_string(),
    })
}

/// Implicit-AND evaluation of `=` and `ilike` conditions
fn matches(record: &Map<String, Value>, domain: &[Value]) -> bool {
    domain.iter().all(|term| {
        let Some([field, op, value]) = term.as_array().map(Vec::as_slice) else {
            return true;
        };
        let actual = record.get(field.as_str().unwrap_or_default());
        match op.as_str() {
            Some("=") => actual == Some(value),
            Some("ilike") => match (actual.and_then(Value::as_str), value.as_str()) {
                (Some(a), Some(v)) => a.to_lowercase().contains(&v.to_lowercase()),
                _ => false,
            },
            _ => false,
        }
    })
}

fn project(record: &Map<String, Value>, fields: Option<&Value>) -> Value {
    let Some(fields) = fields.and_then(Value::as_array) else {
        return Value::Object(record.clone());
    };
    let mut out = Map::new();
    out.insert("id".into(), record["id"].clone());
    for field in fields.iter().filter_map(Value::as_str) {
        out.insert(field.to_string(), record.get(field).cloned().unwrap_or(json!(false)));
    }
    Value::Object(out)
}

fn settings() -> ConnectionSettings {
    ConnectionSettings {
        timeout: Duration::from_secs(5),
        max_retries: 2,
        retry_delay: Duration::ZERO,
    }
}

fn server(odoo: Arc<FakeOdoo>) -> OdooMcpServer {
    let profile = ConnectionProfile::new(
        "http://localhost:8069",
        "demo",
        "admin",
        Credential::Password(PASSWORD.into()),
    )
    .unwrap()
    .with_settings(settings());

    let connector_odoo = odoo.clone();
    OdooMcpServer::new(Some(OdooClient::new(profile, odoo)), settings()).with_connector(Arc::new(
        move |profile: ConnectionProfile| -> Result<OdooClient, OdooError> {
            Ok(OdooClient::new(profile, connector_odoo.clone()))
        },
    ))
}

fn args(value: Value) -> HashMap<String, Value> {
    serde_json::from_value(value).unwrap()
}

fn ok_body(result: &CallToolResult) -> Value {
    assert!(!result.is_error(), "unexpected error: {}", result.text_content());
    serde_json::from_str(&result.text_content()).unwrap()
}

fn error_body(result: &CallToolResult) -> Value {
    assert!(result.is_error(), "expected error, got {}", result.text_content());
    serde_json::from_str(&result.text_content()).unwrap()
}

#[tokio::test]
async fn search_honours_domain_limit_and_fields() {
    let server = server(FakeOdoo::new());

    let result = server
        .call_tool(
            "odoo_search",
            &args(json!({
                "model": "res.partner",
                "domain": [["is_company", "=", true]],
                "fields": ["name", "email"],
                "limit": 10
            })),
        )
        .await;

    let rows = ok_body(&result);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 10);
    for row in rows {
        let mut keys: Vec<&str> = row.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["email", "id", "name"]);
        assert_eq!(row["id"].as_i64().unwrap() % 2, 0);
    }
}

#[tokio::test]
async fn create_then_read_round_trip() {
    let server = server(FakeOdoo::new());

    let created = ok_body(
        &server
            .call_tool(
                "odoo_create",
                &args(json!({
                    "model": "res.partner",
                    "values": {"name": "Acme Corp", "is_company": true}
                })),
            )
            .await,
    );
    assert_eq!(created["success"], true);
    let id = created["id"].as_i64().unwrap();
    assert_eq!(id, 26);

    let read = ok_body(
        &server
            .call_tool(
                "odoo_read",
                &args(json!({"model": "res.partner", "ids": [id], "fields": ["name"]})),
            )
            .await,
    );
    assert_eq!(read, json!([{"id": 26, "name": "Acme Corp"}]));
}

#[tokio::test]
async fn update_and_delete() {
    let server = server(FakeOdoo::new());

    let updated = ok_body(
        &server
            .call_tool(
                "odoo_update",
                &args(json!({"model": "res.partner", "ids": [3], "values": {"name": "Renamed"}})),
            )
            .await,
    );
    assert_eq!(updated["success"], true);

    let deleted = ok_body(
        &server
            .call_tool("odoo_delete", &args(json!({"model": "res.partner", "ids": [3]})))
            .await,
    );
    assert_eq!(deleted["ids"], json!([3]));

    let missing = error_body(
        &server
            .call_tool("odoo_read", &args(json!({"model": "res.partner", "ids": [3]})))
            .await,
    );
    assert_eq!(missing["error"], "remote_error");
}

#[tokio::test]
async fn invalid_arguments_never_reach_odoo() {
    let odoo = FakeOdoo::new();
    let server = server(odoo.clone());

    let body = error_body(
        &server
            .call_tool(
                "odoo_search",
                &args(json!({"model": "res.partner", "domain": [["name", "="]]})),
            )
            .await,
    );
    assert_eq!(body["error"], "validation_error");
    assert_eq!(odoo.calls(), 0);
}

#[tokio::test]
async fn remote_fault_is_reported_once() {
    let odoo = FakeOdoo::new();
    let server = server(odoo.clone());

    let body = error_body(
        &server
            .call_tool(
                "odoo_execute",
                &args(json!({"model": "res.partner", "method": "action_explode"})),
            )
            .await,
    );
    assert_eq!(body["error"], "remote_error");
    assert!(body["message"].as_str().unwrap().contains("no method action_explode"));
    // version + authenticate + one execute_kw, no retries for a fault
    assert_eq!(odoo.calls(), 3);
}

#[tokio::test]
async fn invalid_login_is_an_authentication_error() {
    let server = server(FakeOdoo::new());

    let body = error_body(
        &server
            .call_tool(
                "odoo_authenticate",
                &args(json!({
                    "url": "http://localhost:8069",
                    "database": "demo",
                    "username": "admin",
                    "password": "wrong"
                })),
            )
            .await,
    );
    assert_eq!(body["error"], "authentication_error");

    // The configured connection is untouched
    let fields = ok_body(
        &server
            .call_tool("odoo_get_fields", &args(json!({"model": "res.partner"})))
            .await,
    );
    assert_eq!(fields["name"]["type"], "char");
}

#[test]
fn list_models_on_unknown_model_is_remote_error() {
    let server = server(FakeOdoo::new());

    let result = tokio_test::block_on(server.call_tool("odoo_list_models", &HashMap::new()));
    assert_eq!(error_body(&result)["error"], "remote_error");
}
