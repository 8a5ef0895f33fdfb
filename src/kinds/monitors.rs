//! Synthetic HTTP monitors

use crate::api::client::add_query_param;
use crate::api::ApiClient;
use crate::resource::{Attribute, ResourceData, ResourceKind, Schema};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MONITORS_PATH: &str = "/api/v1/synthetic/monitors";

/// Entry of the monitor list endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStub {
    pub name: String,
    pub entity_id: String,
    #[serde(rename = "type", default)]
    pub monitor_type: String,
}

#[derive(Debug, Deserialize)]
struct MonitorList {
    #[serde(default)]
    monitors: Vec<MonitorStub>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpMonitor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default = "http_type")]
    pub monitor_type: String,
    pub frequency_min: i64,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub script: Value,
}

fn http_type() -> String {
    "HTTP".to_string()
}

#[derive(Clone)]
pub struct HttpMonitorKind {
    client: ApiClient,
}

impl HttpMonitorKind {
    pub const TYPE_NAME: &'static str = "dynatrace_http_monitor";
    pub const FOLDER: &'static str = "http_monitors";

    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Every HTTP monitor of the environment
    pub async fn list_http(&self) -> Result<Vec<MonitorStub>> {
        let url = add_query_param(&self.client.url(MONITORS_PATH), "type", "HTTP");
        let response = self.client.get(&url).await?;
        let list: MonitorList =
            serde_json::from_value(response).context("Failed to parse monitor list")?;
        Ok(list.monitors)
    }
}

impl ResourceKind for HttpMonitorKind {
    type Object = HttpMonitor;

    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn folder(&self) -> &str {
        Self::FOLDER
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attribute("name", Attribute::string().required())
            .attribute("frequency", Attribute::int().required())
            .attribute("enabled", Attribute::bool())
            .attribute("locations", Attribute::string_list())
            .attribute("script", Attribute::json())
    }

    fn decode(&self, data: &ResourceData) -> Result<HttpMonitor> {
        let script = match data.get_str("script") {
            Some(s) => serde_json::from_str(s).context("script is not valid JSON")?,
            None => Value::Null,
        };

        Ok(HttpMonitor {
            entity_id: data.id().map(|s| s.to_string()),
            name: data.get_str("name").context("name is required")?.to_string(),
            monitor_type: http_type(),
            frequency_min: data.get_i64("frequency").context("frequency is required")?,
            enabled: data.get_bool("enabled"),
            locations: data.get_string_list("locations"),
            script,
        })
    }

    fn encode(&self, monitor: &HttpMonitor) -> Result<ResourceData> {
        let mut data = ResourceData::new();
        data.set("name", monitor.name.clone());
        data.set("frequency", monitor.frequency_min);
        data.set("enabled", monitor.enabled);
        data.set("locations", monitor.locations.clone());
        if !monitor.script.is_null() {
            data.set("script", serde_json::to_string(&monitor.script)?);
        }
        Ok(data)
    }

    fn set_id(&self, monitor: &mut HttpMonitor, id: Option<String>) {
        monitor.entity_id = id;
    }

    fn display_name(&self, monitor: &HttpMonitor) -> String {
        monitor.name.clone()
    }

    async fn get(&self, id: &str) -> Result<HttpMonitor> {
        let response = self.client.get(&self.client.object_url(MONITORS_PATH, id)).await?;
        serde_json::from_value(response).context("Failed to parse HTTP monitor")
    }

    async fn create(&self, monitor: &HttpMonitor) -> Result<String> {
        let body = serde_json::to_value(monitor)?;
        let response = self.client.post(&self.client.url(MONITORS_PATH), &body).await?;
        response
            .get("entityId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .context("create response carries no entityId")
    }

    async fn update(&self, id: &str, monitor: &HttpMonitor) -> Result<()> {
        let body = serde_json::to_value(monitor)?;
        self.client
            .put(&self.client.object_url(MONITORS_PATH, id), &body)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .delete(&self.client.object_url(MONITORS_PATH, id))
            .await?;
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .list_http()
            .await?
            .into_iter()
            .map(|m| m.entity_id)
            .collect())
    }
}
