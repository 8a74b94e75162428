//! Tool argument extraction
//!
//! Every accessor checks presence and type and reports a
//! [`ToolError::Validation`] naming the offending key.

use super::error::ToolError;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Prefix logical operators allowed between domain conditions
const DOMAIN_OPERATORS: [&str; 3] = ["&", "|", "!"];

/// Borrowed view over a `tools/call` argument map
pub struct ToolArgs<'a> {
    args: &'a HashMap<String, Value>,
}

impl<'a> ToolArgs<'a> {
    pub fn new(args: &'a HashMap<String, Value>) -> Self {
        Self { args }
    }

    /// Value for `key`, with explicit `null` treated as absent
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.args.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Non-empty string
    pub fn required_str(&self, key: &str) -> Result<&'a str, ToolError> {
        match self.get(key) {
            None => Err(missing(key)),
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
            Some(Value::String(_)) => Err(ToolError::validation(format!("'{}' must not be empty", key))),
            Some(other) => Err(wrong_type(key, "a string", other)),
        }
    }

    pub fn optional_str(&self, key: &str) -> Result<Option<&'a str>, ToolError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(wrong_type(key, "a string", other)),
        }
    }

    /// Non-negative integer; numeric strings are accepted
    pub fn optional_u32(&self, key: &str) -> Result<Option<u32>, ToolError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };

        let parsed = match value {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse::<u32>().ok(),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| wrong_type(key, "a non-negative integer", value))
    }

    /// Non-empty array of positive record ids
    pub fn required_ids(&self, key: &str) -> Result<Vec<i64>, ToolError> {
        let items = match self.get(key) {
            None => return Err(missing(key)),
            Some(Value::Array(items)) => items,
            Some(other) => return Err(wrong_type(key, "an array of integers", other)),
        };

        if items.is_empty() {
            return Err(ToolError::validation(format!("'{}' must not be empty", key)));
        }

        items
            .iter()
            .map(|item| match item.as_i64() {
                Some(id) if id > 0 => Ok(id),
                _ => Err(ToolError::validation(format!(
                    "'{}' must contain positive integer ids, found {}",
                    key, item
                ))),
            })
            .collect()
    }

    pub fn optional_string_list(&self, key: &str) -> Result<Option<Vec<String>>, ToolError> {
        let items = match self.get(key) {
            None => return Ok(None),
            Some(Value::Array(items)) => items,
            Some(other) => return Err(wrong_type(key, "an array of strings", other)),
        };

        items
            .iter()
            .map(|item| {
                item.as_str().map(String::from).ok_or_else(|| {
                    ToolError::validation(format!("'{}' must contain only strings, found {}", key, item))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    pub fn required_object(&self, key: &str) -> Result<&'a Map<String, Value>, ToolError> {
        match self.get(key) {
            None => Err(missing(key)),
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(wrong_type(key, "an object", other)),
        }
    }

    pub fn optional_object(&self, key: &str) -> Result<Option<&'a Map<String, Value>>, ToolError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(wrong_type(key, "an object", other)),
        }
    }

    pub fn optional_array(&self, key: &str) -> Result<Option<&'a Vec<Value>>, ToolError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(other) => Err(wrong_type(key, "an array", other)),
        }
    }

    /// Search domain: `[field, operator, value]` triples, optionally mixed
    /// with the prefix operators `&`, `|` and `!`.
    pub fn domain(&self, key: &str) -> Result<&'a Vec<Value>, ToolError> {
        let terms = match self.get(key) {
            None => return Err(missing(key)),
            Some(Value::Array(terms)) => terms,
            Some(other) => return Err(wrong_type(key, "an array of [field, operator, value] triples", other)),
        };

        for (i, term) in terms.iter().enumerate() {
            let valid = match term {
                Value::String(op) => DOMAIN_OPERATORS.contains(&op.as_str()),
                Value::Array(parts) => {
                    parts.len() == 3 && parts[0].is_string() && parts[1].is_string()
                }
                _ => false,
            };
            if !valid {
                return Err(ToolError::validation(format!(
                    "'{}'[{}] must be a [field, operator, value] triple or one of &, |, !; found {}",
                    key, i, term
                )));
            }
        }

        Ok(terms)
    }
}

fn missing(key: &str) -> ToolError {
    ToolError::validation(format!("Missing required parameter: {}", key))
}

fn wrong_type(key: &str, expected: &str, found: &Value) -> ToolError {
    ToolError::validation(format!("'{}' must be {}, found {}", key, expected, type_name(found)))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> HashMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_required_str() {
        let map = args(json!({"model": "res.partner", "empty": " ", "num": 3}));
        let a = ToolArgs::new(&map);
        assert_eq!(a.required_str("model").unwrap(), "res.partner");
        assert!(a.required_str("empty").is_err());
        assert!(a.required_str("num").is_err());

        let err = a.required_str("absent").unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        assert!(err.to_string().contains("absent"));
    }

    #[test]
    fn test_ids() {
        let map = args(json!({"ids": [1, 2], "bad": [1, "x"], "zero": [0], "empty": []}));
        let a = ToolArgs::new(&map);
        assert_eq!(a.required_ids("ids").unwrap(), vec![1, 2]);
        assert!(a.required_ids("bad").is_err());
        assert!(a.required_ids("zero").is_err());
        assert!(a.required_ids("empty").is_err());
    }

    #[test]
    fn test_optional_u32_accepts_numeric_strings() {
        let map = args(json!({"limit": "25", "offset": 5, "neg": -1, "null": null}));
        let a = ToolArgs::new(&map);
        assert_eq!(a.optional_u32("limit").unwrap(), Some(25));
        assert_eq!(a.optional_u32("offset").unwrap(), Some(5));
        assert_eq!(a.optional_u32("null").unwrap(), None);
        assert!(a.optional_u32("neg").is_err());
    }

    #[test]
    fn test_domain_validation() {
        let map = args(json!({
            "ok": [["is_company", "=", true], "|", ["name", "ilike", "acme"], ["ref", "!=", false]],
            "empty": [],
            "pair": [["name", "="]],
            "op": ["xor"],
            "flat": "name = acme"
        }));
        let a = ToolArgs::new(&map);
        assert_eq!(a.domain("ok").unwrap().len(), 4);
        assert!(a.domain("empty").unwrap().is_empty());
        assert!(a.domain("pair").is_err());
        assert!(a.domain("op").is_err());
        assert!(a.domain("flat").is_err());
        assert!(a.domain("missing").is_err());
    }

    #[test]
    fn test_string_list() {
        let map = args(json!({"fields": ["name", "email"], "mixed": ["name", 1]}));
        let a = ToolArgs::new(&map);
        assert_eq!(
            a.optional_string_list("fields").unwrap(),
            Some(vec!["name".to_string(), "email".to_string()])
        );
        assert!(a.optional_string_list("mixed").is_err());
        assert_eq!(a.optional_string_list("absent").unwrap(), None);
    }
}
