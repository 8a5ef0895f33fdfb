//! Provider registration
//!
//! Binds every resource type name to its schema, lifecycle handler and
//! importer.

use crate::api::ApiClient;
use crate::download::InterventionInfo;
use crate::kinds::{
    ConfigKind, CredentialsKind, DashboardKind, DashboardSharingKind, HttpMonitorKind,
};
use crate::resource::{
    CrudHandler, DeleteContext, Importer, Registry, ResourceData, ResourceHandler, ResourceKind,
    Schema,
};
use anyhow::{Context, Result};
use std::collections::BTreeMap;

/// One registered resource type
pub struct Registration {
    pub schema: Schema,
    pub importer: Importer,
    pub handler: Box<dyn ResourceHandler>,
}

#[derive(Default)]
pub struct Provider {
    resources: BTreeMap<String, Registration>,
}

impl Provider {
    /// Provider with every built-in and registry-defined resource type
    pub fn new(client: &ApiClient, registry: &Registry, ctx: DeleteContext) -> Self {
        let mut provider = Self::default();

        provider.register(CredentialsKind::new(client.clone()), ctx.clone());
        provider.register(DashboardKind::new(client.clone()), ctx.clone());
        provider.register(DashboardSharingKind::new(client.clone()), ctx.clone());
        provider.register(HttpMonitorKind::new(client.clone()), ctx.clone());

        for (type_name, def) in &registry.resources {
            provider.register(
                ConfigKind::new(client.clone(), type_name, def.clone()),
                ctx.clone(),
            );
        }

        provider
    }

    /// Type name and download folder of every supported type
    ///
    /// Needs no API client, so it works without credentials.
    pub fn catalog(registry: &Registry) -> Vec<(String, String)> {
        let builtin = [
            (CredentialsKind::TYPE_NAME, CredentialsKind::FOLDER),
            (DashboardKind::TYPE_NAME, DashboardKind::FOLDER),
            (DashboardSharingKind::TYPE_NAME, DashboardSharingKind::FOLDER),
            (HttpMonitorKind::TYPE_NAME, HttpMonitorKind::FOLDER),
        ];

        let mut kinds: BTreeMap<String, String> = builtin
            .iter()
            .map(|(name, folder)| (name.to_string(), folder.to_string()))
            .collect();
        kinds.extend(
            registry
                .resources
                .iter()
                .map(|(name, def)| (name.clone(), def.folder.clone())),
        );
        kinds.into_iter().collect()
    }

    pub fn register<K: ResourceKind + 'static>(&mut self, kind: K, ctx: DeleteContext) {
        let type_name = kind.type_name().to_string();
        let registration = Registration {
            schema: kind.schema(),
            importer: Importer::Passthrough,
            handler: Box::new(CrudHandler::new(kind, ctx)),
        };
        self.resources.insert(type_name, registration);
    }

    pub fn resource(&self, type_name: &str) -> Option<&Registration> {
        self.resources.get(type_name)
    }

    pub fn handler(&self, type_name: &str) -> Result<&dyn ResourceHandler> {
        self.resource(type_name)
            .map(|r| r.handler.as_ref())
            .with_context(|| format!("Unknown resource type: {}", type_name))
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.resources.keys().map(|s| s.as_str()).collect()
    }

    /// Resource types whose downloads may need manual review
    pub fn interventions(&self) -> BTreeMap<String, InterventionInfo> {
        self.resources
            .iter()
            .filter_map(|(name, r)| r.handler.intervention().map(|info| (name.clone(), info)))
            .collect()
    }

    /// Bring an existing object under management by its remote ID
    pub fn import(&self, type_name: &str, id: &str) -> Result<ResourceData> {
        let registration = self
            .resource(type_name)
            .with_context(|| format!("Unknown resource type: {}", type_name))?;
        Ok(registration.importer.import(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> Provider {
        let client = ApiClient::new("https://env.example.com", "token", false).unwrap();
        let registry = Registry::embedded().unwrap();
        Provider::new(&client, &registry, DeleteContext::default())
    }

    #[test]
    fn test_registers_builtin_and_registry_types() {
        let provider = provider();
        let names = provider.type_names();
        for name in [
            "dynatrace_credentials",
            "dynatrace_dashboard",
            "dynatrace_dashboard_sharing",
            "dynatrace_http_monitor",
            "dynatrace_management_zone",
        ] {
            assert!(names.contains(&name), "{} not registered", name);
        }
    }

    #[test]
    fn test_catalog_matches_registered_handlers() {
        let provider = provider();
        let catalog = Provider::catalog(&Registry::embedded().unwrap());

        let names: Vec<&str> = catalog.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, provider.type_names());
        for (name, folder) in &catalog {
            assert_eq!(provider.handler(name).unwrap().folder(), folder);
        }
    }

    #[test]
    fn test_import_is_passthrough() {
        let provider = provider();
        let data = provider
            .import("dynatrace_credentials", "CREDENTIALS_VAULT-42")
            .unwrap();
        assert_eq!(data.id(), Some("CREDENTIALS_VAULT-42"));
        assert!(data.attributes().is_empty());
        assert!(provider.import("dynatrace_nope", "x").is_err());
    }

    #[test]
    fn test_credentials_schema_is_registered() {
        let provider = provider();
        let registration = provider.resource("dynatrace_credentials").unwrap();
        assert!(registration.schema.get("name").unwrap().required);
        assert!(registration.schema.get("password").unwrap().sensitive);
        assert_eq!(registration.importer, Importer::Passthrough);
    }

    #[test]
    fn test_interventions_include_credentials_and_notifications() {
        let interventions = provider().interventions();
        assert!(interventions.contains_key("dynatrace_credentials"));
        assert!(interventions.contains_key("dynatrace_notification"));
        assert!(!interventions.contains_key("dynatrace_dashboard"));
    }
}
