//! Table-driven configuration kinds
//!
//! One [`ConfigKind`] per registry entry. The payload stays an untyped JSON
//! object and attributes are mapped to API fields by their definition.

use crate::api::ApiClient;
use crate::download::InterventionInfo;
use crate::resource::registry::AttributeDef;
use crate::resource::{AttributeType, ResourceData, ResourceDef, ResourceKind, Schema};
use anyhow::{Context, Result};
use serde_json::{Map, Value};

#[derive(Clone)]
pub struct ConfigKind {
    client: ApiClient,
    type_name: String,
    def: ResourceDef,
}

impl ConfigKind {
    pub fn new(client: ApiClient, type_name: &str, def: ResourceDef) -> Self {
        Self {
            client,
            type_name: type_name.to_string(),
            def,
        }
    }

    pub fn def(&self) -> &ResourceDef {
        &self.def
    }

    fn object_id(&self, object: &Map<String, Value>) -> Option<String> {
        object
            .get(&self.def.id_field)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

/// API value -> attribute value
fn to_attribute(def: &AttributeDef, value: &Value) -> Result<Value> {
    Ok(match def.attr_type {
        AttributeType::Json => Value::String(serde_json::to_string(value)?),
        AttributeType::Block => match value {
            Value::Object(_) => Value::Array(vec![value.clone()]),
            _ => value.clone(),
        },
        _ => value.clone(),
    })
}

/// Attribute value -> API value
fn to_api(def: &AttributeDef, value: &Value) -> Result<Value> {
    match (def.attr_type, value) {
        (AttributeType::Json, Value::String(s)) => serde_json::from_str(s)
            .with_context(|| format!("attribute \"{}\" is not valid JSON", def.name)),
        _ => Ok(value.clone()),
    }
}

impl ResourceKind for ConfigKind {
    type Object = Map<String, Value>;

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn folder(&self) -> &str {
        &self.def.folder
    }

    fn schema(&self) -> Schema {
        self.def.schema()
    }

    fn intervention(&self) -> Option<InterventionInfo> {
        self.def.intervention.as_ref().map(|rule| InterventionInfo {
            message: rule.message.clone(),
        })
    }

    fn requires_intervention(&self, object: &Map<String, Value>) -> bool {
        match &self.def.intervention {
            None => false,
            Some(rule) => match &rule.missing_field {
                None => true,
                Some(field) => object.get(field).map_or(true, |v| v.is_null()),
            },
        }
    }

    fn decode(&self, data: &ResourceData) -> Result<Map<String, Value>> {
        let mut object = Map::new();

        for def in &self.def.attributes {
            if def.computed && !def.required {
                continue;
            }
            let Some(value) = data.get(&def.name).filter(|v| !v.is_null()) else {
                continue;
            };
            object.insert(def.api_field(), to_api(def, value)?);
        }

        if let Some(id) = data.id() {
            object.insert(self.def.id_field.clone(), Value::String(id.to_string()));
        }
        Ok(object)
    }

    fn encode(&self, object: &Map<String, Value>) -> Result<ResourceData> {
        let mut data = ResourceData::new();

        for def in &self.def.attributes {
            let Some(value) = object.get(&def.api_field()).filter(|v| !v.is_null()) else {
                continue;
            };
            data.set(&def.name, to_attribute(def, value)?);
        }
        Ok(data)
    }

    fn set_id(&self, object: &mut Map<String, Value>, id: Option<String>) {
        match id {
            Some(id) => {
                object.insert(self.def.id_field.clone(), Value::String(id));
            }
            None => {
                object.remove(&self.def.id_field);
            }
        }
    }

    fn display_name(&self, object: &Map<String, Value>) -> String {
        object
            .get(&self.def.name_field)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .or_else(|| self.object_id(object))
            .unwrap_or_default()
    }

    async fn get(&self, id: &str) -> Result<Map<String, Value>> {
        let response = self
            .client
            .get(&self.client.object_url(&self.def.api_path, id))
            .await?;
        match response {
            Value::Object(map) => Ok(map),
            other => anyhow::bail!(
                "expected an object for {} {}, got {}",
                self.type_name,
                id,
                other
            ),
        }
    }

    async fn create(&self, object: &Map<String, Value>) -> Result<String> {
        let body = Value::Object(object.clone());
        let response = self
            .client
            .post(&self.client.url(&self.def.api_path), &body)
            .await?;
        response
            .get(&self.def.id_field)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .with_context(|| format!("create response carries no {}", self.def.id_field))
    }

    async fn update(&self, id: &str, object: &Map<String, Value>) -> Result<()> {
        let body = Value::Object(object.clone());
        self.client
            .put(&self.client.object_url(&self.def.api_path, id), &body)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .delete(&self.client.object_url(&self.def.api_path, id))
            .await?;
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let items = self
            .client
            .list_all(&self.client.url(&self.def.api_path), &self.def.list_field)
            .await?;
        Ok(items
            .iter()
            .filter_map(|item| item.as_object().and_then(|o| self.object_id(o)))
            .collect())
    }
}
