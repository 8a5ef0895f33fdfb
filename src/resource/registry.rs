//! Resource Registry - Load table-driven resource definitions from JSON
//!
//! Most configuration endpoints share one shape: a list endpoint returning
//! `{id, name}` stubs, and GET/POST/PUT/DELETE on the object. Those kinds
//! are described in embedded JSON files instead of code. The loaded
//! [`Registry`] is passed explicitly to whoever needs it.

use super::schema::{Attribute, AttributeType, Schema};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[(&str, &str)] = &[
    ("config.json", include_str!("../resources/config.json")),
    ("monitoring.json", include_str!("../resources/monitoring.json")),
];

/// Attribute definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeDef {
    /// Attribute name in HCL
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Field name in the API payload (defaults to the camelCase form of `name`)
    #[serde(default)]
    pub api_field: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub sensitive: bool,
}

impl AttributeDef {
    pub fn api_field(&self) -> String {
        self.api_field
            .clone()
            .unwrap_or_else(|| to_camel_case(&self.name))
    }
}

/// When downloaded objects of a kind need manual attention
#[derive(Debug, Clone, Deserialize)]
pub struct InterventionRule {
    pub message: String,
    /// Only objects lacking this API field need attention; all do when unset
    #[serde(default)]
    pub missing_field: Option<String>,
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    pub folder: String,
    pub api_path: String,
    #[serde(default = "default_list_field")]
    pub list_field: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default = "default_name_field")]
    pub name_field: String,
    pub attributes: Vec<AttributeDef>,
    #[serde(default)]
    pub intervention: Option<InterventionRule>,
}

fn default_list_field() -> String {
    "values".to_string()
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_name_field() -> String {
    "name".to_string()
}

impl ResourceDef {
    pub fn schema(&self) -> Schema {
        self.attributes.iter().fold(Schema::new(), |schema, def| {
            let mut attribute = Attribute::typed(def.attr_type);
            if def.required {
                attribute = attribute.required();
            }
            if def.computed {
                attribute = attribute.computed();
            }
            if def.sensitive {
                attribute = attribute.sensitive();
            }
            schema.attribute(&def.name, attribute)
        })
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceDef>,
}

impl Registry {
    /// Load the definitions compiled into the binary
    pub fn embedded() -> Result<Self> {
        let mut registry = Self::default();

        for (file, content) in RESOURCE_FILES {
            let partial: Registry = serde_json::from_str(content)
                .with_context(|| format!("Failed to parse embedded resource file {}", file))?;
            registry.resources.extend(partial.resources);
        }

        Ok(registry)
    }

    /// Get a resource definition by Terraform type name
    pub fn get(&self, type_name: &str) -> Option<&ResourceDef> {
        self.resources.get(type_name)
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.resources.keys().map(|s| s.as_str()).collect()
    }
}

/// `management_zone_id` -> `managementZoneId`
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_loads_successfully() {
        let registry = Registry::embedded().unwrap();
        assert!(
            !registry.resources.is_empty(),
            "Registry should have resources"
        );
    }

    #[test]
    fn test_management_zone_resource_exists() {
        let registry = Registry::embedded().unwrap();
        let resource = registry
            .get("dynatrace_management_zone")
            .expect("management zones should exist");
        assert_eq!(resource.display_name, "Management Zones");
        assert_eq!(resource.folder, "management_zones");
        assert_eq!(resource.list_field, "values");
        assert_eq!(resource.id_field, "id");
    }

    #[test]
    fn test_every_resource_has_a_prefixed_name_and_attributes() {
        let registry = Registry::embedded().unwrap();
        for (name, def) in &registry.resources {
            assert!(name.starts_with("dynatrace_"), "{} lacks prefix", name);
            assert!(!def.attributes.is_empty(), "{} has no attributes", name);
            assert!(def.api_path.starts_with("/api/"), "{} has a bad path", name);
        }
    }

    #[test]
    fn test_api_field_defaults_to_camel_case() {
        let registry = Registry::embedded().unwrap();
        let naming = registry.get("dynatrace_processgroup_naming").unwrap();
        let format = naming.attributes.iter().find(|a| a.name == "format").unwrap();
        assert_eq!(format.api_field(), "nameFormat");

        let profile = registry.get("dynatrace_alerting_profile").unwrap();
        let mz = profile
            .attributes
            .iter()
            .find(|a| a.name == "management_zone_id")
            .unwrap();
        assert_eq!(mz.api_field(), "managementZoneId");
    }

    #[test]
    fn test_notifications_need_intervention() {
        let registry = Registry::embedded().unwrap();
        let rule = registry
            .get("dynatrace_notification")
            .and_then(|d| d.intervention.as_ref())
            .expect("notifications carry an intervention rule");
        assert_eq!(rule.missing_field.as_deref(), Some("password"));
    }

    #[test]
    fn test_to_camel_case() {
        assert_eq!(to_camel_case("name"), "name");
        assert_eq!(to_camel_case("suppress_synth_mon_exec"), "suppressSynthMonExec");
    }
}
