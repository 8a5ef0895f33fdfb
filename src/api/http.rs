//! HTTP utilities for the configuration REST API

use anyhow::{Context, Result};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize a body for logging
/// Truncates long bodies and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// Error returned for a non-2xx API response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "API request failed: {}", self.status)
    }
}

impl std::error::Error for ApiError {}

/// HTTP client wrapper authenticating with an API token
#[derive(Clone)]
pub struct ApiHttpClient {
    client: Client,
    token: String,
    verbose: bool,
}

impl ApiHttpClient {
    /// Create a new HTTP client
    pub fn new(token: &str, verbose: bool) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("dtform/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            token: token.to_string(),
            verbose,
        })
    }

    pub async fn get(&self, url: &str) -> Result<Value> {
        self.send(Method::GET, url, None).await
    }

    pub async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        self.send(Method::POST, url, Some(body)).await
    }

    pub async fn put(&self, url: &str, body: &Value) -> Result<Value> {
        self.send(Method::PUT, url, Some(body)).await
    }

    pub async fn delete(&self, url: &str) -> Result<Value> {
        self.send(Method::DELETE, url, None).await
    }

    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .header("Authorization", format!("Api-Token {}", self.token));

        if let Some(body) = body {
            if self.verbose {
                tracing::debug!("request body: {}", sanitize_for_log(&body.to_string()));
            }
            request = request.json(body);
        }

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if self.verbose {
            tracing::debug!("response {}: {}", status, sanitize_for_log(&response_body));
        }

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            return Err(ApiError { status }.into());
        }

        // Handle empty response
        if response_body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&response_body).context("Failed to parse response JSON")
    }
}

/// Status of the API error behind `error`, if any
pub fn api_status(error: &anyhow::Error) -> Option<StatusCode> {
    error.downcast_ref::<ApiError>().map(|e| e.status)
}

/// Format an API error for display
/// Security: Sanitizes error messages to avoid leaking API details
pub fn format_api_error(error: &anyhow::Error) -> String {
    if let Some(status) = api_status(error) {
        return match status.as_u16() {
            401 => "Authentication failed. Check the API token.".to_string(),
            403 => "Permission denied. The API token lacks the required scope.".to_string(),
            404 => "Resource not found.".to_string(),
            409 => "Resource conflict. The resource may already exist or be in use.".to_string(),
            429 => "Rate limit exceeded. Please try again later.".to_string(),
            400 => "Invalid request. Check the configuration.".to_string(),
            500..=599 => "Service temporarily unavailable. Please try again.".to_string(),
            _ => "Request failed. Check your network connection and try again.".to_string(),
        };
    }

    let error_str = error.to_string();
    let sanitized = error_str
        .chars()
        .filter(|c| !c.is_control())
        .take(80)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
