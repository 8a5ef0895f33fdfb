//! Resource schemas
//!
//! Each resource type declares the attributes Terraform may set on it.
//! Submitted configuration is validated against the schema before it is
//! decoded and sent to the API.

use super::data::ResourceData;
use anyhow::{bail, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Attribute value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int,
    Float,
    Bool,
    StringList,
    /// Arbitrary JSON kept as an encoded string
    Json,
    /// Nested block (stored as a list of maps)
    Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub attr_type: AttributeType,
    pub required: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub max_items: Option<usize>,
    pub nested: Option<Schema>,
}

impl Attribute {
    fn of(attr_type: AttributeType) -> Self {
        Self {
            attr_type,
            required: false,
            computed: false,
            sensitive: false,
            max_items: None,
            nested: None,
        }
    }

    pub fn string() -> Self {
        Self::of(AttributeType::String)
    }

    pub fn int() -> Self {
        Self::of(AttributeType::Int)
    }

    pub fn bool() -> Self {
        Self::of(AttributeType::Bool)
    }

    pub fn string_list() -> Self {
        Self::of(AttributeType::StringList)
    }

    pub fn json() -> Self {
        Self::of(AttributeType::Json)
    }

    pub fn block(nested: Schema) -> Self {
        Self {
            nested: Some(nested),
            ..Self::of(AttributeType::Block)
        }
    }

    pub fn typed(attr_type: AttributeType) -> Self {
        Self::of(attr_type)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: &str, attribute: Attribute) -> Self {
        self.attributes.insert(name.to_string(), attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attributes.iter()
    }

    /// Validate submitted configuration
    pub fn validate(&self, data: &ResourceData) -> Result<()> {
        self.validate_map(data.attributes(), "")
    }

    /// Copy of `data` with sensitive attribute values masked, for logging
    pub fn redacted(&self, data: &ResourceData) -> ResourceData {
        let mut redacted = data.clone();
        for (name, attribute) in &self.attributes {
            if attribute.sensitive && data.get_ok(name).is_some() {
                redacted.set(name, "(sensitive)");
            }
        }
        redacted
    }

    fn validate_map(&self, map: &Map<String, Value>, prefix: &str) -> Result<()> {
        for key in map.keys() {
            if !self.attributes.contains_key(key) {
                bail!("unsupported attribute \"{}{}\"", prefix, key);
            }
        }

        for (name, attribute) in &self.attributes {
            let path = format!("{}{}", prefix, name);
            let value = map.get(name).filter(|v| !v.is_null());

            let Some(value) = value else {
                if attribute.required {
                    bail!("missing required attribute \"{}\"", path);
                }
                continue;
            };

            if attribute.computed && !attribute.required {
                // Computed values come back from the API and are not checked
                continue;
            }

            check_type(attribute, value, &path)?;
        }

        Ok(())
    }
}

fn check_type(attribute: &Attribute, value: &Value, path: &str) -> Result<()> {
    let ok = match attribute.attr_type {
        AttributeType::String | AttributeType::Json => value.is_string(),
        AttributeType::Int => value.is_i64() || value.is_u64(),
        AttributeType::Float => value.is_number(),
        AttributeType::Bool => value.is_boolean(),
        AttributeType::StringList => value
            .as_array()
            .is_some_and(|items| items.iter().all(|v| v.is_string())),
        AttributeType::Block => {
            let blocks = super::data::blocks_of(Some(value));
            let is_block_value =
                value.is_object() || value.as_array().is_some_and(|a| a.len() == blocks.len());
            if !is_block_value {
                bail!("attribute \"{}\" must be a block", path);
            }
            if let Some(max) = attribute.max_items {
                if blocks.len() > max {
                    bail!(
                        "block \"{}\" allows at most {} item(s), got {}",
                        path,
                        max,
                        blocks.len()
                    );
                }
            }
            if let Some(nested) = &attribute.nested {
                for block in blocks {
                    nested.validate_map(block, &format!("{}.", path))?;
                }
            }
            true
        }
    };

    if !ok {
        bail!(
            "attribute \"{}\" has the wrong type, expected {:?}",
            path,
            attribute.attr_type
        );
    }

    if attribute.attr_type == AttributeType::Json {
        if let Some(s) = value.as_str() {
            if let Err(e) = serde_json::from_str::<Value>(s) {
                bail!("attribute \"{}\" is not valid JSON: {}", path, e);
            }
        }
    }

    Ok(())
}
