//! Tool registry
//!
//! Declared input schemas for the nine Odoo tools and parsing of raw
//! arguments into typed requests. Parsing happens before any RPC call.

use super::args::ToolArgs;
use super::error::ToolError;
use super::protocol::{array_prop, create_tool_schema, integer_prop, object_prop, string_prop, Tool};
use crate::odoo::SearchOptions;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

pub const AUTHENTICATE: &str = "odoo_authenticate";
pub const SEARCH: &str = "odoo_search";
pub const READ: &str = "odoo_read";
pub const CREATE: &str = "odoo_create";
pub const UPDATE: &str = "odoo_update";
pub const DELETE: &str = "odoo_delete";
pub const EXECUTE: &str = "odoo_execute";
pub const LIST_MODELS: &str = "odoo_list_models";
pub const GET_FIELDS: &str = "odoo_get_fields";

/// Get list of available tools
pub fn tool_definitions() -> Vec<Tool> {
    let model = || string_prop("Model name, e.g. 'res.partner' or 'sale.order'");
    let ids = |description: &str| array_prop(description, json!({ "type": "integer" }));
    let fields = || array_prop("Fields to return (optional, all fields when omitted)", json!({ "type": "string" }));

    vec![
        Tool {
            name: AUTHENTICATE.to_string(),
            description: "Authenticate with an Odoo instance. Pass url, database, username and either password or api_key to connect to a new instance; call without arguments to log in again with the configured connection.".to_string(),
            input_schema: create_tool_schema(vec![
                ("url", string_prop("Odoo server URL, e.g. 'https://mycompany.odoo.com'"), false),
                ("database", string_prop("Database name"), false),
                ("username", string_prop("Login of the Odoo user"), false),
                ("password", string_prop("Password (use either password or api_key)"), false),
                ("api_key", string_prop("API key (Odoo 14+, use instead of password)"), false),
            ]),
        },
        Tool {
            name: SEARCH.to_string(),
            description: "Search for records in an Odoo model. Returns the matching records with the requested fields.".to_string(),
            input_schema: create_tool_schema(vec![
                ("model", model(), true),
                (
                    "domain",
                    array_prop(
                        "Search domain, e.g. [[\"is_company\", \"=\", true]]. Use [] to match all records.",
                        json!({}),
                    ),
                    true,
                ),
                ("fields", fields(), false),
                ("limit", integer_prop("Maximum number of records to return"), false),
                ("offset", integer_prop("Number of records to skip (default: 0)"), false),
                ("order", string_prop("Sort order, e.g. 'name asc, id desc'"), false),
            ]),
        },
        Tool {
            name: READ.to_string(),
            description: "Read specific records by their IDs. Fails if any ID does not exist.".to_string(),
            input_schema: create_tool_schema(vec![
                ("model", model(), true),
                ("ids", ids("List of record IDs"), true),
                ("fields", fields(), false),
            ]),
        },
        Tool {
            name: CREATE.to_string(),
            description: "Create a new record in an Odoo model. Returns the new record ID.".to_string(),
            input_schema: create_tool_schema(vec![
                ("model", model(), true),
                ("values", object_prop("Field values for the new record"), true),
            ]),
        },
        Tool {
            name: UPDATE.to_string(),
            description: "Update existing records in an Odoo model".to_string(),
            input_schema: create_tool_schema(vec![
                ("model", model(), true),
                ("ids", ids("List of record IDs to update"), true),
                ("values", object_prop("Field values to write"), true),
            ]),
        },
        Tool {
            name: DELETE.to_string(),
            description: "Delete records from an Odoo model".to_string(),
            input_schema: create_tool_schema(vec![
                ("model", model(), true),
                ("ids", ids("List of record IDs to delete"), true),
            ]),
        },
        Tool {
            name: EXECUTE.to_string(),
            description: "Execute an arbitrary method on an Odoo model (advanced use). Arguments are passed through unchanged.".to_string(),
            input_schema: create_tool_schema(vec![
                ("model", model(), true),
                ("method", string_prop("Method name, e.g. 'action_confirm'"), true),
                ("args", array_prop("Positional arguments for the method", json!({})), false),
                ("kwargs", object_prop("Keyword arguments for the method"), false),
            ]),
        },
        Tool {
            name: LIST_MODELS.to_string(),
            description: "List the models installed in the Odoo instance".to_string(),
            input_schema: create_tool_schema(vec![(
                "filter",
                string_prop("Optional case-insensitive filter on model technical or display name"),
                false,
            )]),
        },
        Tool {
            name: GET_FIELDS.to_string(),
            description: "Get field definitions for an Odoo model".to_string(),
            input_schema: create_tool_schema(vec![
                ("model", model(), true),
                (
                    "attributes",
                    array_prop(
                        "Field attributes to return, e.g. ['string', 'type', 'required'] (optional)",
                        json!({ "type": "string" }),
                    ),
                    false,
                ),
            ]),
        },
    ]
}

/// Connection parameters given to `odoo_authenticate`
#[derive(Clone)]
pub struct ConnectionArgs {
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: Option<String>,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ConnectionArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionArgs")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// A validated tool invocation
#[derive(Debug, Clone)]
pub enum ToolRequest {
    /// `None` re-authenticates the current connection
    Authenticate(Option<ConnectionArgs>),
    Search {
        model: String,
        domain: Vec<Value>,
        options: SearchOptions,
    },
    Read {
        model: String,
        ids: Vec<i64>,
        fields: Option<Vec<String>>,
    },
    Create {
        model: String,
        values: Map<String, Value>,
    },
    Update {
        model: String,
        ids: Vec<i64>,
        values: Map<String, Value>,
    },
    Delete {
        model: String,
        ids: Vec<i64>,
    },
    Execute {
        model: String,
        method: String,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    },
    ListModels {
        filter: Option<String>,
    },
    GetFields {
        model: String,
        attributes: Option<Vec<String>>,
    },
}

impl ToolRequest {
    /// Validate `args` against the shape declared for tool `name`
    pub fn parse(name: &str, args: &HashMap<String, Value>) -> Result<Self, ToolError> {
        let a = ToolArgs::new(args);

        let request = match name {
            AUTHENTICATE => ToolRequest::Authenticate(parse_connection(&a)?),
            SEARCH => ToolRequest::Search {
                model: a.required_str("model")?.to_string(),
                domain: a.domain("domain")?.clone(),
                options: SearchOptions {
                    fields: a.optional_string_list("fields")?,
                    limit: a.optional_u32("limit")?,
                    offset: a.optional_u32("offset")?,
                    order: a.optional_str("order")?.map(String::from),
                },
            },
            READ => ToolRequest::Read {
                model: a.required_str("model")?.to_string(),
                ids: a.required_ids("ids")?,
                fields: a.optional_string_list("fields")?,
            },
            CREATE => ToolRequest::Create {
                model: a.required_str("model")?.to_string(),
                values: a.required_object("values")?.clone(),
            },
            UPDATE => ToolRequest::Update {
                model: a.required_str("model")?.to_string(),
                ids: a.required_ids("ids")?,
                values: a.required_object("values")?.clone(),
            },
            DELETE => ToolRequest::Delete {
                model: a.required_str("model")?.to_string(),
                ids: a.required_ids("ids")?,
            },
            EXECUTE => ToolRequest::Execute {
                model: a.required_str("model")?.to_string(),
                method: a.required_str("method")?.to_string(),
                args: a.optional_array("args")?.cloned().unwrap_or_default(),
                kwargs: a.optional_object("kwargs")?.cloned().unwrap_or_default(),
            },
            LIST_MODELS => ToolRequest::ListModels {
                filter: a.optional_str("filter")?.map(String::from),
            },
            GET_FIELDS => ToolRequest::GetFields {
                model: a.required_str("model")?.to_string(),
                attributes: a.optional_string_list("attributes")?,
            },
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };

        Ok(request)
    }
}

fn parse_connection(a: &ToolArgs<'_>) -> Result<Option<ConnectionArgs>, ToolError> {
    const KEYS: [&str; 5] = ["url", "database", "username", "password", "api_key"];
    if !KEYS.iter().any(|k| a.contains(k)) {
        return Ok(None);
    }

    Ok(Some(ConnectionArgs {
        url: a.required_str("url")?.to_string(),
        database: a.required_str("database")?.to_string(),
        username: a.required_str("username")?.to_string(),
        password: a.optional_str("password")?.map(String::from),
        api_key: a.optional_str("api_key")?.map(String::from),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> HashMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_all_tools_declared() {
        let names: Vec<String> = tool_definitions().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                AUTHENTICATE, SEARCH, READ, CREATE, UPDATE, DELETE, EXECUTE, LIST_MODELS, GET_FIELDS
            ]
        );
    }

    #[test]
    fn test_declared_required_keys_are_enforced() {
        // Calling with no arguments must fail for exactly the tools that declare required keys
        let empty = HashMap::new();
        for tool in tool_definitions() {
            let required = tool.input_schema["required"].as_array().unwrap();
            let result = ToolRequest::parse(&tool.name, &empty);
            assert_eq!(
                result.is_err(),
                !required.is_empty(),
                "tool {} required {:?}",
                tool.name,
                required
            );
        }
    }

    #[test]
    fn test_parse_search() {
        let request = ToolRequest::parse(
            SEARCH,
            &args(json!({
                "model": "res.partner",
                "domain": [["is_company", "=", true]],
                "fields": ["name"],
                "limit": 10
            })),
        )
        .unwrap();

        match request {
            ToolRequest::Search {
                model,
                domain,
                options,
            } => {
                assert_eq!(model, "res.partner");
                assert_eq!(domain.len(), 1);
                assert_eq!(options.limit, Some(10));
                assert_eq!(options.offset, None);
                assert_eq!(options.fields, Some(vec!["name".to_string()]));
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_parse_execute_defaults() {
        let request = ToolRequest::parse(
            EXECUTE,
            &args(json!({"model": "sale.order", "method": "action_confirm"})),
        )
        .unwrap();
        match request {
            ToolRequest::Execute { args, kwargs, .. } => {
                assert!(args.is_empty());
                assert!(kwargs.is_empty());
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_parse_authenticate() {
        assert!(matches!(
            ToolRequest::parse(AUTHENTICATE, &HashMap::new()).unwrap(),
            ToolRequest::Authenticate(None)
        ));

        let err = ToolRequest::parse(AUTHENTICATE, &args(json!({"url": "https://erp"}))).unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        let request = ToolRequest::parse(
            AUTHENTICATE,
            &args(json!({
                "url": "https://erp",
                "database": "prod",
                "username": "admin",
                "api_key": "k"
            })),
        )
        .unwrap();
        match request {
            ToolRequest::Authenticate(Some(conn)) => {
                assert_eq!(conn.database, "prod");
                assert_eq!(conn.api_key.as_deref(), Some("k"));
                assert!(!format!("{:?}", conn).contains("\"k\""));
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_unknown_tool() {
        let err = ToolRequest::parse("odoo_drop_database", &HashMap::new()).unwrap_err();
        assert_eq!(err.kind(), "unknown_tool");
    }

    #[test]
    fn test_update_requires_object_values() {
        let err = ToolRequest::parse(
            UPDATE,
            &args(json!({"model": "res.partner", "ids": [1], "values": ["name", "x"]})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'values' must be an object"));
    }
}
