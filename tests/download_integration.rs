//! End-to-end download against a mocked environment
//!
//! Fetches dashboards (with sharing settings) and credentials, then checks
//! the written folder layout and file contents.

use dtform::api::ApiClient;
use dtform::codec;
use dtform::download::{DownloadConfig, Downloader};
use dtform::provider::Provider;
use dtform::resource::{DeleteContext, Registry};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_get(server: &MockServer, url_path: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mock_environment() -> MockServer {
    let server = MockServer::start().await;

    mount_get(
        &server,
        "/api/config/v1/dashboards",
        json!({"dashboards": [
            {"id": "d-1", "name": "Overview", "owner": "me"},
            {"id": "d-2", "name": "Unshared", "owner": "me"}
        ]}),
    )
    .await;
    mount_get(
        &server,
        "/api/config/v1/dashboards/d-1",
        json!({
            "id": "d-1",
            "dashboardMetadata": {"name": "Overview", "owner": "me"},
            "tiles": []
        }),
    )
    .await;
    mount_get(
        &server,
        "/api/config/v1/dashboards/d-2",
        json!({
            "id": "d-2",
            "dashboardMetadata": {"name": "Unshared", "owner": "me"},
            "tiles": []
        }),
    )
    .await;
    mount_get(
        &server,
        "/api/config/v1/dashboards/d-1/shareSettings",
        json!({
            "id": "d-1",
            "enabled": true,
            "permissions": [{"type": "ALL", "permission": "VIEW"}]
        }),
    )
    .await;
    mount_get(
        &server,
        "/api/config/v1/dashboards/d-2/shareSettings",
        json!({"id": "d-2", "enabled": false, "permissions": []}),
    )
    .await;

    mount_get(
        &server,
        "/api/config/v1/credentials",
        json!({"credentials": [
            {"id": "CREDENTIALS_VAULT-1", "name": "vault"},
            {"id": "CREDENTIALS_VAULT-2", "name": "basic auth"}
        ]}),
    )
    .await;
    mount_get(
        &server,
        "/api/config/v1/credentials/CREDENTIALS_VAULT-1",
        json!({
            "id": "CREDENTIALS_VAULT-1",
            "name": "vault",
            "scope": "SYNTHETIC",
            "type": "USERNAME_PASSWORD",
            "external": {
                "vaultUrl": "https://vault.example.com",
                "roleId": "role",
                "usernameSecretName": "u",
                "passwordSecretName": "p"
            },
            "credentialUsageSummary": [{"type": "HTTP_MONITOR", "count": 1}]
        }),
    )
    .await;
    mount_get(
        &server,
        "/api/config/v1/credentials/CREDENTIALS_VAULT-2",
        json!({
            "id": "CREDENTIALS_VAULT-2",
            "name": "basic auth",
            "scope": "ALL",
            "type": "USERNAME_PASSWORD",
            "username": "admin"
        }),
    )
    .await;

    server
}

fn provider(server: &MockServer) -> Provider {
    let client = ApiClient::new(&server.uri(), "test-token", false).unwrap();
    Provider::new(
        &client,
        &Registry::embedded().unwrap(),
        DeleteContext::default(),
    )
}

fn kinds() -> Vec<String> {
    vec![
        "dynatrace_dashboard".to_string(),
        "dynatrace_credentials".to_string(),
    ]
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

#[tokio::test]
async fn test_download_writes_expected_layout() {
    let server = mock_environment().await;
    let provider = provider(&server);
    let target = TempDir::new().unwrap();

    let downloader = Downloader::new(
        &provider,
        DownloadConfig {
            target_folder: target.path().to_path_buf(),
            commented_id: false,
        },
    );
    let summary = downloader.run(&kinds()).await.unwrap();

    assert_eq!(summary.written.get("dynatrace_dashboard"), Some(&2));
    assert_eq!(summary.written.get("dynatrace_credentials"), Some(&1));
    assert!(!summary.written.contains_key("dynatrace_dashboard_sharing"));
    assert_eq!(summary.requires_attention, 1);

    let root = target.path();
    assert!(root.join("providers.tf").exists());
    assert!(!root.join("dashboard_sharings").exists());

    // sharing is appended to the dashboard's own file
    let overview = read(&root.join("dashboards/dashboards.Overview.tf"));
    let parsed = codec::parse_resources(&overview).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].res_type, "dynatrace_dashboard");
    assert_eq!(parsed[0].label, "Overview");
    assert_eq!(parsed[1].res_type, "dynatrace_dashboard_sharing");
    assert_eq!(parsed[1].label, "Overview");
    assert_eq!(parsed[1].data.get_str("dashboard_id"), Some("d-1"));
    assert!(!overview.starts_with('#'));

    let vault = read(&root.join("credentials/credentials.vault.tf"));
    let parsed = codec::parse_resources(&vault).unwrap();
    assert_eq!(parsed[0].label, "vault");
    assert_eq!(parsed[0].data.get_blocks("external").len(), 1);

    // no secret returned and no vault: quarantined
    let basic = root.join(".requires_attention/credentials.basic_auth.tf");
    let parsed = codec::parse_resources(&read(&basic)).unwrap();
    assert_eq!(parsed[0].res_type, "dynatrace_credentials");
    assert_eq!(parsed[0].label, "basic_auth");
    assert!(!root.join("credentials/credentials.basic_auth.tf").exists());
}

#[tokio::test]
async fn test_download_with_commented_ids() {
    let server = mock_environment().await;
    let provider = provider(&server);
    let target = TempDir::new().unwrap();

    let downloader = Downloader::new(
        &provider,
        DownloadConfig {
            target_folder: target.path().to_path_buf(),
            commented_id: true,
        },
    );
    downloader.run(&kinds()).await.unwrap();

    let root = target.path();
    let overview = read(&root.join("dashboards/dashboards.Overview.tf"));
    assert!(overview.starts_with("# id = \"d-1\"\n"), "{}", overview);

    let basic = read(&root.join(".requires_attention/credentials.basic_auth.tf"));
    assert!(basic.starts_with("# id = \"CREDENTIALS_VAULT-2\"\n"), "{}", basic);
}

#[tokio::test]
async fn test_download_replaces_existing_files() {
    let server = mock_environment().await;
    let provider = provider(&server);
    let target = TempDir::new().unwrap();

    let stale = target.path().join("dashboards/dashboards.Overview.tf");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "stale content that is much longer than anything written\n".repeat(50))
        .unwrap();

    let downloader = Downloader::new(
        &provider,
        DownloadConfig {
            target_folder: target.path().to_path_buf(),
            commented_id: false,
        },
    );
    downloader
        .run(&["dynatrace_dashboard".to_string()])
        .await
        .unwrap();

    let content = read(&stale);
    assert!(!content.contains("stale"));
    assert!(codec::parse_resources(&content).is_ok());
}

#[tokio::test]
async fn test_download_unknown_kind_fails_before_writing() {
    let server = MockServer::start().await;
    let provider = provider(&server);
    let target = TempDir::new().unwrap();
    let out = target.path().join("out");

    let downloader = Downloader::new(
        &provider,
        DownloadConfig {
            target_folder: out.clone(),
            commented_id: false,
        },
    );
    assert!(downloader
        .run(&["dynatrace_nope".to_string()])
        .await
        .is_err());
    assert!(!out.exists());
}
