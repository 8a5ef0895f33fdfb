//! API Client
//!
//! Main client for the configuration REST API, combining the environment
//! URL with the token-authenticated HTTP client.

use super::http::ApiHttpClient;
use anyhow::{Context, Result};
use serde_json::Value;
use url::Url;

/// Main API client
#[derive(Clone)]
pub struct ApiClient {
    pub http: ApiHttpClient,
    pub base_url: String,
}

/// Result of paginated fetch
pub struct PaginatedResult {
    pub items: Vec<Value>,
    pub next_page_key: Option<String>,
}

impl ApiClient {
    /// Create a new client for the environment at `env_url`
    pub fn new(env_url: &str, api_token: &str, verbose: bool) -> Result<Self> {
        let parsed = Url::parse(env_url)
            .with_context(|| format!("Invalid environment URL: {}", env_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Environment URL must use http or https: {}", env_url);
        }

        let http = ApiHttpClient::new(api_token, verbose)?;

        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Build an API URL from a path starting with `/`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build an API URL for a single object below a collection path
    pub fn object_url(&self, path: &str, id: &str) -> String {
        format!("{}{}/{}", self.base_url, path, urlencoding::encode(id))
    }

    pub async fn get(&self, url: &str) -> Result<Value> {
        self.http.get(url).await
    }

    pub async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        self.http.post(url, body).await
    }

    pub async fn put(&self, url: &str, body: &Value) -> Result<Value> {
        self.http.put(url, body).await
    }

    pub async fn delete(&self, url: &str) -> Result<Value> {
        self.http.delete(url).await
    }

    /// Fetch one page of a list endpoint
    pub async fn list_page(
        &self,
        url: &str,
        list_field: &str,
        page_key: Option<&str>,
    ) -> Result<PaginatedResult> {
        let url = match page_key {
            Some(key) => add_query_param(url, "nextPageKey", key),
            None => url.to_string(),
        };

        let response = self.get(&url).await?;
        let items = extract_items(&response, list_field);
        let next_page_key = response
            .get("nextPageKey")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(PaginatedResult {
            items,
            next_page_key,
        })
    }

    /// Fetch all items of a list endpoint (auto-paginate)
    pub async fn list_all(&self, url: &str, list_field: &str) -> Result<Vec<Value>> {
        let mut all_items = Vec::new();
        let mut page_key: Option<String> = None;

        loop {
            let result = self.list_page(url, list_field, page_key.as_deref()).await?;
            all_items.extend(result.items);

            if result.next_page_key.is_none() {
                break;
            }
            page_key = result.next_page_key;
        }

        Ok(all_items)
    }
}

/// Append a query parameter, keeping any existing query string
pub fn add_query_param(url: &str, key: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", url, separator, key, urlencoding::encode(value))
}

/// Extract list items using a dot-notation path; an empty path means the response is the list
fn extract_items(response: &Value, path: &str) -> Vec<Value> {
    if path.is_empty() {
        return response.as_array().cloned().unwrap_or_default();
    }

    let mut current = response;
    for part in path.split('.') {
        current = match current.get(part) {
            Some(v) => v,
            None => return vec![],
        };
    }

    current.as_array().cloned().unwrap_or_default()
}
