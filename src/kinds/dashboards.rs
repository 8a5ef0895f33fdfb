//! Dashboards and their sharing settings
//!
//! Sharing settings are a separate resource type keyed by the dashboard ID.
//! They always exist on the server, so create and update are the same PUT
//! and delete resets them to "not shared".

use crate::api::ApiClient;
use crate::resource::data::{block_str, blocks_of};
use crate::resource::{Attribute, ResourceData, ResourceKind, Schema};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const DASHBOARDS_PATH: &str = "/api/config/v1/dashboards";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub preset: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub dashboard_metadata: DashboardMetadata,
    #[serde(default)]
    pub tiles: Value,
}

async fn list_dashboard_ids(client: &ApiClient) -> Result<Vec<String>> {
    let items = client
        .list_all(&client.url(DASHBOARDS_PATH), "dashboards")
        .await?;
    Ok(items
        .iter()
        .filter_map(|item| item.get("id").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .collect())
}

#[derive(Clone)]
pub struct DashboardKind {
    client: ApiClient,
}

impl DashboardKind {
    pub const TYPE_NAME: &'static str = "dynatrace_dashboard";
    pub const FOLDER: &'static str = "dashboards";

    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl ResourceKind for DashboardKind {
    type Object = Dashboard;

    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn folder(&self) -> &str {
        Self::FOLDER
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attribute(
                "dashboard_metadata",
                Attribute::block(
                    Schema::new()
                        .attribute("name", Attribute::string().required())
                        .attribute("owner", Attribute::string())
                        .attribute("preset", Attribute::bool())
                        .attribute("tags", Attribute::string_list()),
                )
                .required()
                .max_items(1),
            )
            .attribute("tiles", Attribute::json())
    }

    fn decode(&self, data: &ResourceData) -> Result<Dashboard> {
        let metadata = data.get_blocks("dashboard_metadata");
        let metadata = metadata
            .first()
            .context("dashboard_metadata is required")?;

        let tiles = match data.get_str("tiles") {
            Some(s) => serde_json::from_str(s).context("tiles is not valid JSON")?,
            None => json!([]),
        };

        Ok(Dashboard {
            id: data.id().map(|s| s.to_string()),
            dashboard_metadata: DashboardMetadata {
                name: block_str(metadata, "name")
                    .context("dashboard_metadata.name is required")?
                    .to_string(),
                owner: block_str(metadata, "owner").map(|s| s.to_string()),
                preset: metadata.get("preset").and_then(|v| v.as_bool()).unwrap_or(false),
                tags: metadata
                    .get("tags")
                    .and_then(|v| v.as_array())
                    .map(|tags| {
                        tags.iter()
                            .filter_map(|t| t.as_str().map(|s| s.to_string()))
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            tiles,
        })
    }

    fn encode(&self, dashboard: &Dashboard) -> Result<ResourceData> {
        let metadata = &dashboard.dashboard_metadata;
        let mut block = serde_json::Map::new();
        block.insert("name".to_string(), json!(metadata.name));
        if let Some(owner) = &metadata.owner {
            block.insert("owner".to_string(), json!(owner));
        }
        block.insert("preset".to_string(), json!(metadata.preset));
        if !metadata.tags.is_empty() {
            block.insert("tags".to_string(), json!(metadata.tags));
        }

        let mut data = ResourceData::new();
        data.set("dashboard_metadata", vec![Value::Object(block)]);
        if !dashboard.tiles.is_null() {
            data.set("tiles", serde_json::to_string(&dashboard.tiles)?);
        }
        Ok(data)
    }

    fn set_id(&self, dashboard: &mut Dashboard, id: Option<String>) {
        dashboard.id = id;
    }

    fn display_name(&self, dashboard: &Dashboard) -> String {
        dashboard.dashboard_metadata.name.clone()
    }

    async fn get(&self, id: &str) -> Result<Dashboard> {
        let response = self
            .client
            .get(&self.client.object_url(DASHBOARDS_PATH, id))
            .await?;
        serde_json::from_value(response).context("Failed to parse dashboard")
    }

    async fn create(&self, dashboard: &Dashboard) -> Result<String> {
        let body = serde_json::to_value(dashboard)?;
        let response = self.client.post(&self.client.url(DASHBOARDS_PATH), &body).await?;
        response
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .context("create response carries no id")
    }

    async fn update(&self, id: &str, dashboard: &Dashboard) -> Result<()> {
        let body = serde_json::to_value(dashboard)?;
        self.client
            .put(&self.client.object_url(DASHBOARDS_PATH, id), &body)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .delete(&self.client.object_url(DASHBOARDS_PATH, id))
            .await?;
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        list_dashboard_ids(&self.client).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePermission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub permission_type: String,
    #[serde(rename = "permission")]
    pub level: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSharing {
    /// ID of the shared dashboard
    #[serde(rename = "id", default)]
    pub dashboard_id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub preset: bool,
    #[serde(default)]
    pub permissions: Vec<SharePermission>,
    /// Name of the shared dashboard, resolved on read
    #[serde(skip)]
    pub dashboard_name: Option<String>,
}

#[derive(Clone)]
pub struct DashboardSharingKind {
    client: ApiClient,
}

impl DashboardSharingKind {
    pub const TYPE_NAME: &'static str = "dynatrace_dashboard_sharing";
    pub const FOLDER: &'static str = "dashboard_sharings";

    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn share_url(&self, dashboard_id: &str) -> String {
        format!(
            "{}/shareSettings",
            self.client.object_url(DASHBOARDS_PATH, dashboard_id)
        )
    }

    async fn put(&self, dashboard_id: &str, sharing: &DashboardSharing) -> Result<()> {
        let mut sharing = sharing.clone();
        sharing.dashboard_id = dashboard_id.to_string();
        let body = serde_json::to_value(&sharing)?;
        self.client.put(&self.share_url(dashboard_id), &body).await?;
        Ok(())
    }
}

impl ResourceKind for DashboardSharingKind {
    type Object = DashboardSharing;

    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn folder(&self) -> &str {
        Self::FOLDER
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attribute("dashboard_id", Attribute::string().required())
            .attribute("enabled", Attribute::bool())
            .attribute("preset", Attribute::bool())
            .attribute(
                "permission",
                Attribute::block(
                    Schema::new()
                        .attribute("id", Attribute::string())
                        .attribute("type", Attribute::string().required())
                        .attribute("level", Attribute::string().required()),
                ),
            )
    }

    fn decode(&self, data: &ResourceData) -> Result<DashboardSharing> {
        let dashboard_id = data
            .get_str("dashboard_id")
            .context("dashboard_id is required")?
            .to_string();

        let permissions = blocks_of(data.get("permission"))
            .into_iter()
            .map(|block| {
                Ok(SharePermission {
                    id: block_str(block, "id").map(|s| s.to_string()),
                    permission_type: block_str(block, "type")
                        .context("permission.type is required")?
                        .to_string(),
                    level: block_str(block, "level")
                        .context("permission.level is required")?
                        .to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DashboardSharing {
            dashboard_id,
            enabled: data.get_bool("enabled"),
            preset: data.get_bool("preset"),
            permissions,
            dashboard_name: None,
        })
    }

    fn encode(&self, sharing: &DashboardSharing) -> Result<ResourceData> {
        let mut data = ResourceData::new();
        data.set("dashboard_id", sharing.dashboard_id.clone());
        data.set("enabled", sharing.enabled);
        data.set("preset", sharing.preset);

        let permissions: Vec<Value> = sharing
            .permissions
            .iter()
            .map(|p| {
                let mut block = json!({"type": p.permission_type, "level": p.level});
                if let Some(id) = &p.id {
                    block["id"] = json!(id);
                }
                block
            })
            .collect();
        if !permissions.is_empty() {
            data.set("permission", permissions);
        }
        Ok(data)
    }

    fn set_id(&self, _sharing: &mut DashboardSharing, _id: Option<String>) {}

    fn display_name(&self, sharing: &DashboardSharing) -> String {
        sharing
            .dashboard_name
            .clone()
            .unwrap_or_else(|| sharing.dashboard_id.clone())
    }

    async fn get(&self, id: &str) -> Result<DashboardSharing> {
        let response = self.client.get(&self.share_url(id)).await?;
        let mut sharing: DashboardSharing =
            serde_json::from_value(response).context("Failed to parse share settings")?;
        sharing.dashboard_id = id.to_string();

        let dashboard = self
            .client
            .get(&self.client.object_url(DASHBOARDS_PATH, id))
            .await?;
        sharing.dashboard_name = dashboard
            .pointer("/dashboardMetadata/name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(sharing)
    }

    async fn create(&self, sharing: &DashboardSharing) -> Result<String> {
        self.put(&sharing.dashboard_id, sharing).await?;
        Ok(sharing.dashboard_id.clone())
    }

    async fn update(&self, id: &str, sharing: &DashboardSharing) -> Result<()> {
        self.put(id, sharing).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let unshared = DashboardSharing {
            dashboard_id: id.to_string(),
            ..Default::default()
        };
        self.put(id, &unshared).await
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        list_dashboard_ids(&self.client).await
    }
}
