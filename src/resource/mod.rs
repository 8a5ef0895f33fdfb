//! Resource abstraction layer
//!
//! # Architecture
//!
//! - [`data`] - Terraform resource data (attribute map plus ID)
//! - [`schema`] - Attribute schemas and validation
//! - [`handler`] - Capability trait and the generic CRUD handler
//! - [`registry`] - Table-driven resource definitions loaded from JSON
//! - [`retry`] - Bounded retry used by deletes with dependents
//! - [`diag`] - Diagnostics reported by lifecycle operations

pub mod data;
pub mod diag;
pub mod handler;
pub mod registry;
pub mod retry;
pub mod schema;

pub use data::ResourceData;
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use handler::{CrudHandler, DeleteContext, Importer, ResourceHandler, ResourceKind};
pub use registry::{Registry, ResourceDef};
pub use retry::{retry, until_cancelled, RetryPolicy};
pub use schema::{Attribute, AttributeType, Schema};
