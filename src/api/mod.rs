//! REST API interaction module
//!
//! This module provides the transport used by every resource kind: an
//! HTTP client authenticating with an API token and a client bound to one
//! environment URL.
//!
//! # Module Structure
//!
//! - [`client`] - Environment-bound client with URL builders and pagination
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use dtform::api::client::ApiClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = ApiClient::new("https://abc123.live.example.com", "dt0c01.XXX", false)?;
//!     let dashboards = client.get(&client.url("/api/config/v1/dashboards")).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;

pub use client::ApiClient;
