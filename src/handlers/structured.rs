//! TOML and JSON handlers that flatten nested documents into dotted keys.

use std::path::Path;

use serde_json::{Map, Number, Value};

use super::ContentHandler;
use crate::error::HandlerError;
use crate::types::ConfigMap;

/// Parses TOML; `[server] port = 80` becomes `server.port = 80`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlHandler;

/// Parses a JSON object; `{"server": {"port": 80}}` becomes `server.port = 80`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonHandler;

impl ContentHandler for TomlHandler {
    fn name(&self) -> &str {
        "toml"
    }

    fn parse(&self, _path: &Path, content: &[u8]) -> Result<ConfigMap, HandlerError> {
        let text = std::str::from_utf8(content)?;
        let table: toml::Table = toml::from_str(text)?;
        let value = toml_to_json(toml::Value::Table(table));
        Ok(flatten_value(value))
    }
}

impl ContentHandler for JsonHandler {
    fn name(&self) -> &str {
        "json"
    }

    fn parse(&self, _path: &Path, content: &[u8]) -> Result<ConfigMap, HandlerError> {
        let value: Value = serde_json::from_slice(content)?;
        if !value.is_object() {
            return Err(HandlerError::new("top-level JSON value must be an object"));
        }
        Ok(flatten_value(value))
    }
}

/// Flatten nested objects into dotted keys.
///
/// Arrays and scalars are kept as leaf values. An empty nested object is kept
/// as an empty object under its own key.
pub fn flatten_value(value: Value) -> ConfigMap {
    let mut out = ConfigMap::new();
    match value {
        Value::Object(map) => flatten_object("", map, &mut out),
        other => {
            out.insert(String::new(), other);
        }
    }
    out
}

fn flatten_object(prefix: &str, map: Map<String, Value>, out: &mut ConfigMap) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };

        match value {
            Value::Object(nested) if !nested.is_empty() => flatten_object(&path, nested, out),
            leaf => {
                out.insert(path, leaf);
            }
        }
    }
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
