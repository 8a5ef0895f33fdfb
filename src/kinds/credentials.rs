//! Credential vault entries
//!
//! Deleting a credential that is synchronized from an external vault has a
//! side effect: the environment keeps a synthetic HTTP monitor doing the
//! synchronization, and the credential cannot be removed while that monitor
//! references it. The monitor is deleted first, then the credential delete
//! is retried until the reference is gone.

use super::monitors::HttpMonitorKind;
use crate::api::ApiClient;
use crate::download::InterventionInfo;
use crate::resource::data::{block_str, blocks_of};
use crate::resource::{retry, Attribute, DeleteContext, ResourceData, ResourceKind, Schema};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const CREDENTIALS_PATH: &str = "/api/config/v1/credentials";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialsScope {
    #[default]
    All,
    Extension,
    Synthetic,
    AppEngine,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialsType {
    Certificate,
    PublicCertificate,
    Token,
    #[default]
    UsernamePassword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorType {
    HttpMonitor,
    BrowserMonitor,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialUsage {
    #[serde(rename = "type")]
    pub monitor_type: MonitorType,
    pub count: i32,
}

/// Synchronization of the credential from an external vault
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalVault {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_secret_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_secret_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_auth_method: Option<String>,
}

const EXTERNAL_FIELDS: &[&str] = &[
    "vault_url",
    "username_secret_name",
    "password_secret_name",
    "token_secret_name",
    "role_id",
    "certificate",
    "tenant_id",
    "client_id",
    "client_secret",
    "source_auth_method",
];

impl ExternalVault {
    fn field(&self, name: &str) -> Option<&String> {
        match name {
            "vault_url" => self.vault_url.as_ref(),
            "username_secret_name" => self.username_secret_name.as_ref(),
            "password_secret_name" => self.password_secret_name.as_ref(),
            "token_secret_name" => self.token_secret_name.as_ref(),
            "role_id" => self.role_id.as_ref(),
            "certificate" => self.certificate.as_ref(),
            "tenant_id" => self.tenant_id.as_ref(),
            "client_id" => self.client_id.as_ref(),
            "client_secret" => self.client_secret.as_ref(),
            "source_auth_method" => self.source_auth_method.as_ref(),
            _ => None,
        }
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "vault_url" => Some(&mut self.vault_url),
            "username_secret_name" => Some(&mut self.username_secret_name),
            "password_secret_name" => Some(&mut self.password_secret_name),
            "token_secret_name" => Some(&mut self.token_secret_name),
            "role_id" => Some(&mut self.role_id),
            "certificate" => Some(&mut self.certificate),
            "tenant_id" => Some(&mut self.tenant_id),
            "client_id" => Some(&mut self.client_id),
            "client_secret" => Some(&mut self.client_secret),
            "source_auth_method" => Some(&mut self.source_auth_method),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_access_only: bool,
    #[serde(default)]
    pub scope: CredentialsScope,
    #[serde(rename = "type", default)]
    pub credential_type: CredentialsType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalVault>,
    /// Read-only usage reported by the API
    #[serde(default, skip_serializing)]
    pub credential_usage_summary: Vec<CredentialUsage>,
}

impl Credentials {
    /// Whether the secret this credential needs is missing from the payload
    ///
    /// The API never returns secrets, so downloaded credentials without an
    /// external vault cannot be applied as-is.
    pub fn secret_missing(&self) -> bool {
        if self.external.is_some() {
            return false;
        }
        match self.credential_type {
            CredentialsType::UsernamePassword => self.password.is_none(),
            CredentialsType::Token => self.token.is_none(),
            CredentialsType::Certificate => self.password.is_none() || self.certificate.is_none(),
            CredentialsType::PublicCertificate => self.certificate.is_none(),
        }
    }
}

#[derive(Clone)]
pub struct CredentialsKind {
    client: ApiClient,
    monitors: HttpMonitorKind,
}

impl CredentialsKind {
    pub const TYPE_NAME: &'static str = "dynatrace_credentials";
    pub const FOLDER: &'static str = "credentials";

    pub fn new(client: ApiClient) -> Self {
        let monitors = HttpMonitorKind::new(client.clone());
        Self { client, monitors }
    }

    async fn delete_synchronizing_monitor(&self, name: &str) -> Result<bool> {
        let monitors = match self.monitors.list_http().await {
            Ok(monitors) => monitors,
            Err(e) => {
                tracing::warn!("could not list HTTP monitors: {:#}", e);
                return Ok(false);
            }
        };

        let Some(monitor) = monitors.iter().find(|m| m.name == name) else {
            return Ok(false);
        };

        tracing::info!("deleting monitor {} ({})", monitor.name, monitor.entity_id);
        if let Err(e) = self.monitors.delete(&monitor.entity_id).await {
            tracing::warn!("could not delete monitor {}: {:#}", monitor.entity_id, e);
        }
        Ok(true)
    }
}

/// Name of the monitor synchronizing credential `id` from the vault in `state`
///
/// Only returned when the credential is used by exactly one HTTP monitor.
pub fn synchronizing_monitor_name(state: &ResourceData, id: &str) -> Option<String> {
    let external = state.get_blocks("external");
    let external = external.first()?;

    let usage = blocks_of(state.get_ok("credential_usage_summary"));
    let [usage] = usage.as_slice() else {
        return None;
    };
    let is_single_http_monitor = usage.get("type").and_then(|v| v.as_str()) == Some("HTTP_MONITOR")
        && usage.get("count").and_then(|v| v.as_i64()) == Some(1);
    if !is_single_http_monitor {
        return None;
    }

    let vault = if ["client_secret", "client_id", "tenant_id"]
        .iter()
        .any(|k| block_str(external, k).is_some())
    {
        "Azure Key Vault"
    } else if ["role_id", "certificate"]
        .iter()
        .any(|k| block_str(external, k).is_some())
    {
        "HashiCorp Vault"
    } else {
        return None;
    };

    Some(format!(
        "Monitor synchronizing credentials with {} ({})",
        vault, id
    ))
}

fn external_schema() -> Schema {
    EXTERNAL_FIELDS.iter().fold(Schema::new(), |schema, name| {
        let attribute = if *name == "client_secret" {
            Attribute::string().sensitive()
        } else {
            Attribute::string()
        };
        schema.attribute(name, attribute)
    })
}

fn encode_external(external: &ExternalVault) -> Map<String, Value> {
    EXTERNAL_FIELDS
        .iter()
        .filter_map(|name| {
            external
                .field(name)
                .map(|v| (name.to_string(), Value::String(v.clone())))
        })
        .collect()
}

fn decode_external(block: &Map<String, Value>) -> ExternalVault {
    let mut external = ExternalVault::default();
    for name in EXTERNAL_FIELDS {
        if let Some(slot) = external.field_mut(name) {
            *slot = block_str(block, name).map(|s| s.to_string());
        }
    }
    external
}

fn enum_str<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_value(value)?
        .as_str()
        .map(|s| s.to_string())
        .context("enum did not serialize to a string")
}

fn parse_enum<T: for<'de> Deserialize<'de>>(value: &str, what: &str) -> Result<T> {
    serde_json::from_value(Value::String(value.to_string()))
        .with_context(|| format!("invalid {} \"{}\"", what, value))
}

impl ResourceKind for CredentialsKind {
    type Object = Credentials;

    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn folder(&self) -> &str {
        Self::FOLDER
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attribute("name", Attribute::string().required())
            .attribute("description", Attribute::string())
            .attribute("scope", Attribute::string().required())
            .attribute("type", Attribute::string().computed())
            .attribute("owner_access_only", Attribute::bool())
            .attribute("username", Attribute::string().sensitive())
            .attribute("password", Attribute::string().sensitive())
            .attribute("token", Attribute::string().sensitive())
            .attribute("certificate", Attribute::string().sensitive())
            .attribute("format", Attribute::string())
            .attribute("external", Attribute::block(external_schema()).max_items(1))
            .attribute(
                "credential_usage_summary",
                Attribute::block(
                    Schema::new()
                        .attribute("type", Attribute::string())
                        .attribute("count", Attribute::int()),
                )
                .computed(),
            )
    }

    fn intervention(&self) -> Option<InterventionInfo> {
        Some(InterventionInfo {
            message: "The API does not return credential secrets. Set them before applying."
                .to_string(),
        })
    }

    fn requires_intervention(&self, credentials: &Credentials) -> bool {
        credentials.secret_missing()
    }

    fn decode(&self, data: &ResourceData) -> Result<Credentials> {
        let name = data.get_str("name").context("name is required")?.to_string();
        let scope = match data.get_str("scope") {
            Some(s) => parse_enum(s, "scope")?,
            None => CredentialsScope::default(),
        };

        let external = data.get_blocks("external").first().map(|b| decode_external(b));
        let password = data.get_str("password").map(|s| s.to_string());
        let token = data.get_str("token").map(|s| s.to_string());
        let certificate = data.get_str("certificate").map(|s| s.to_string());

        let credential_type = match data.get_str("type") {
            Some(t) => parse_enum(t, "type")?,
            None if certificate.is_some() && password.is_none() => {
                CredentialsType::PublicCertificate
            }
            None if certificate.is_some() => CredentialsType::Certificate,
            None if token.is_some() => CredentialsType::Token,
            None => CredentialsType::UsernamePassword,
        };

        Ok(Credentials {
            id: data.id().map(|s| s.to_string()),
            name,
            description: data.get_str("description").map(|s| s.to_string()),
            owner_access_only: data.get_bool("owner_access_only"),
            scope,
            credential_type,
            username: data.get_str("username").map(|s| s.to_string()),
            password,
            token,
            certificate,
            certificate_format: data.get_str("format").map(|s| s.to_string()),
            external,
            credential_usage_summary: Vec::new(),
        })
    }

    fn encode(&self, credentials: &Credentials) -> Result<ResourceData> {
        let mut data = ResourceData::new();
        data.set("name", credentials.name.clone());
        data.set_opt("description", credentials.description.clone());
        data.set("scope", enum_str(&credentials.scope)?);
        data.set("type", enum_str(&credentials.credential_type)?);
        data.set("owner_access_only", credentials.owner_access_only);
        data.set_opt("username", credentials.username.clone());
        data.set_opt("password", credentials.password.clone());
        data.set_opt("token", credentials.token.clone());
        data.set_opt("certificate", credentials.certificate.clone());
        data.set_opt("format", credentials.certificate_format.clone());

        if let Some(external) = &credentials.external {
            data.set("external", vec![Value::Object(encode_external(external))]);
        }

        if !credentials.credential_usage_summary.is_empty() {
            let usage = credentials
                .credential_usage_summary
                .iter()
                .map(|u| {
                    Ok(serde_json::json!({
                        "type": enum_str(&u.monitor_type)?,
                        "count": u.count,
                    }))
                })
                .collect::<Result<Vec<_>>>()?;
            data.set("credential_usage_summary", usage);
        }

        Ok(data)
    }

    fn set_id(&self, credentials: &mut Credentials, id: Option<String>) {
        credentials.id = id;
    }

    fn display_name(&self, credentials: &Credentials) -> String {
        credentials.name.clone()
    }

    async fn get(&self, id: &str) -> Result<Credentials> {
        let response = self
            .client
            .get(&self.client.object_url(CREDENTIALS_PATH, id))
            .await?;
        serde_json::from_value(response).context("Failed to parse credentials")
    }

    async fn create(&self, credentials: &Credentials) -> Result<String> {
        let body = serde_json::to_value(credentials)?;
        let response = self.client.post(&self.client.url(CREDENTIALS_PATH), &body).await?;
        response
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .context("create response carries no id")
    }

    async fn update(&self, id: &str, credentials: &Credentials) -> Result<()> {
        let body = serde_json::to_value(credentials)?;
        self.client
            .put(&self.client.object_url(CREDENTIALS_PATH, id), &body)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .delete(&self.client.object_url(CREDENTIALS_PATH, id))
            .await?;
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let items = self
            .client
            .list_all(&self.client.url(CREDENTIALS_PATH), "credentials")
            .await?;
        Ok(items
            .iter()
            .filter_map(|item| item.get("id").and_then(|v| v.as_str()))
            .map(|s| s.to_string())
            .collect())
    }

    async fn delete_resource(&self, data: &ResourceData, ctx: &DeleteContext) -> Result<()> {
        let id = data.id().context("resource has no id")?;

        if let Some(monitor_name) = synchronizing_monitor_name(data, id) {
            if self.delete_synchronizing_monitor(&monitor_name).await? {
                return retry(&ctx.retry, &ctx.cancel, |attempt| {
                    tracing::debug!("deleting credentials {} (attempt {})", id, attempt);
                    self.delete(id)
                })
                .await;
            }
        }

        self.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kind() -> CredentialsKind {
        CredentialsKind::new(ApiClient::new("https://env.example.com", "t", false).unwrap())
    }

    fn state(value: Value) -> ResourceData {
        let mut data = ResourceData::from_attributes(value.as_object().cloned().unwrap());
        data.set_id("CREDENTIALS_VAULT-1");
        data
    }

    #[test]
    fn test_monitor_name_for_azure_vault() {
        let data = state(json!({
            "external": [{"vault_url": "https://kv", "client_id": "c", "tenant_id": "t"}],
            "credential_usage_summary": [{"type": "HTTP_MONITOR", "count": 1}]
        }));
        assert_eq!(
            synchronizing_monitor_name(&data, "CREDENTIALS_VAULT-1").as_deref(),
            Some("Monitor synchronizing credentials with Azure Key Vault (CREDENTIALS_VAULT-1)")
        );
    }

    #[test]
    fn test_monitor_name_for_hashicorp_vault() {
        let data = state(json!({
            "external": [{"vault_url": "https://hv", "role_id": "r", "client_id": ""}],
            "credential_usage_summary": [{"type": "HTTP_MONITOR", "count": 1}]
        }));
        assert_eq!(
            synchronizing_monitor_name(&data, "X").as_deref(),
            Some("Monitor synchronizing credentials with HashiCorp Vault (X)")
        );
    }

    #[test]
    fn test_no_monitor_name_without_single_http_usage() {
        let external = json!([{"role_id": "r"}]);
        for usage in [
            json!([]),
            json!([{"type": "HTTP_MONITOR", "count": 2}]),
            json!([{"type": "BROWSER_MONITOR", "count": 1}]),
            json!([{"type": "HTTP_MONITOR", "count": 1}, {"type": "BROWSER_MONITOR", "count": 1}]),
        ] {
            let data = state(json!({"external": external, "credential_usage_summary": usage}));
            assert_eq!(synchronizing_monitor_name(&data, "X"), None, "{}", usage);
        }

        let data = state(json!({
            "credential_usage_summary": [{"type": "HTTP_MONITOR", "count": 1}]
        }));
        assert_eq!(synchronizing_monitor_name(&data, "X"), None);

        let data = state(json!({
            "external": [{"vault_url": "https://v"}],
            "credential_usage_summary": [{"type": "HTTP_MONITOR", "count": 1}]
        }));
        assert_eq!(synchronizing_monitor_name(&data, "X"), None);
    }

    #[test]
    fn test_encode_decode_external() {
        let credentials: Credentials = serde_json::from_value(json!({
            "id": "CREDENTIALS_VAULT-1",
            "name": "vault",
            "scope": "SYNTHETIC",
            "type": "USERNAME_PASSWORD",
            "ownerAccessOnly": true,
            "external": {
                "vaultUrl": "https://hv",
                "roleId": "r",
                "usernameSecretName": "u",
                "passwordSecretName": "p",
                "sourceAuthMethod": "HASHICORP_VAULT_APPROLE"
            },
            "credentialUsageSummary": [{"type": "HTTP_MONITOR", "count": 1}]
        }))
        .unwrap();

        let data = kind().encode(&credentials).unwrap();
        assert_eq!(data.get_str("scope"), Some("SYNTHETIC"));
        assert_eq!(data.get_blocks("external")[0]["role_id"], json!("r"));
        assert_eq!(data.get_blocks("credential_usage_summary").len(), 1);
        assert!(kind().schema().validate(&data).is_ok());
        assert!(!kind().requires_intervention(&credentials));

        let decoded = kind().decode(&data).unwrap();
        assert_eq!(decoded.external, credentials.external);
        assert!(decoded.owner_access_only);
        assert!(decoded.credential_usage_summary.is_empty());
    }

    #[test]
    fn test_decode_infers_type() {
        let mut data = ResourceData::new();
        data.set("name", "t");
        data.set("scope", "ALL");
        data.set("token", "secret");
        assert_eq!(kind().decode(&data).unwrap().credential_type, CredentialsType::Token);

        data.remove("token");
        data.set("certificate", "pem");
        assert_eq!(
            kind().decode(&data).unwrap().credential_type,
            CredentialsType::PublicCertificate
        );

        data.set("password", "pw");
        assert_eq!(
            kind().decode(&data).unwrap().credential_type,
            CredentialsType::Certificate
        );
    }

    #[test]
    fn test_decode_rejects_unknown_scope() {
        let mut data = ResourceData::new();
        data.set("name", "t");
        data.set("scope", "EVERYWHERE");
        assert!(kind().decode(&data).is_err());
    }

    #[test]
    fn test_usage_summary_is_not_sent() {
        let credentials = Credentials {
            name: "n".to_string(),
            credential_usage_summary: vec![CredentialUsage {
                monitor_type: MonitorType::HttpMonitor,
                count: 1,
            }],
            ..Default::default()
        };
        let body = serde_json::to_value(&credentials).unwrap();
        assert!(body.get("credentialUsageSummary").is_none());
        assert!(body.get("id").is_none());
    }

    #[test]
    fn test_downloaded_password_credentials_need_attention() {
        let credentials: Credentials = serde_json::from_value(json!({
            "name": "basic",
            "type": "USERNAME_PASSWORD",
            "username": "admin"
        }))
        .unwrap();
        assert!(kind().requires_intervention(&credentials));
    }
}
