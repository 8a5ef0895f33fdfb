//! Terraform resource data
//!
//! An untyped attribute map plus the resource ID, mirroring what Terraform
//! hands a provider for one resource instance. Nested blocks are stored as
//! lists of maps.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceData {
    id: Option<String>,
    attributes: Map<String, Value>,
}

impl ResourceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_attributes(attributes: Map<String, Value>) -> Self {
        Self {
            id: None,
            attributes,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Get an attribute only if it is set to a non-zero value
    ///
    /// Null, empty strings, `false`, zero, and empty lists or maps all count
    /// as unset, the same way Terraform's `GetOk` treats them.
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !is_zero(v))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get_ok(key).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nested block instances stored under `key`
    ///
    /// A single map is accepted as a one-element block list.
    pub fn get_blocks(&self, key: &str) -> Vec<&Map<String, Value>> {
        blocks_of(self.attributes.get(key))
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    /// Set `key` only when `value` is present
    pub fn set_opt<V: Into<Value>>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    /// Copy every attribute of `other` into this data, keeping the ID
    pub fn merge(&mut self, other: ResourceData) {
        self.attributes.extend(other.attributes);
    }
}

/// Block instances of a block-typed value
pub fn blocks_of(value: Option<&Value>) -> Vec<&Map<String, Value>> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_object()).collect(),
        Some(Value::Object(map)) => vec![map],
        _ => vec![],
    }
}

/// String field of a block, treating empty strings as unset
pub fn block_str<'a>(block: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    block
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
