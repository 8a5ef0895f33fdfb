//! dtform - Terraform-style management and bulk download of monitoring
//! environment configuration
//!
//! # Architecture
//!
//! - [`api`] - Token-authenticated REST client
//! - [`resource`] - Resource data, schemas, the generic CRUD handler and retry
//! - [`kinds`] - Concrete resource kinds (credentials, dashboards, monitors, registry kinds)
//! - [`provider`] - Type name -> schema, handler and importer
//! - [`codec`] - HCL rendering and parsing of resource blocks
//! - [`download`] - Bulk export of remote configuration into `.tf` files
//! - [`config`] - Persisted user defaults

pub mod api;
pub mod codec;
pub mod config;
pub mod download;
pub mod kinds;
pub mod provider;
pub mod resource;

/// Version injected at compile time via DTFORM_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("DTFORM_VERSION") {
    Some(v) => v,
    None => "dev",
};
