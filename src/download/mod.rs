//! Bulk download of remote configuration as HCL files
//!
//! # Architecture
//!
//! - [`fetch`] - Lists and fetches every selected resource kind
//! - [`write`] - Writes fetched resources into per-kind folders
//! - [`names`] - Label/file-name escaping and label deduplication
//!
//! # Layout
//!
//! ```text
//! <target>/providers.tf
//! <target>/<folder>/<folder>.<name>.tf
//! <target>/.requires_attention/<type without "dynatrace_">.<name>.tf
//! ```

pub mod fetch;
pub mod names;
pub mod write;

use crate::resource::ResourceData;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub use fetch::{DownloadSummary, Downloader};
pub use names::{escape, escf, NameCounter};

/// Prefix shared by every resource type name
pub const TYPE_PREFIX: &str = "dynatrace_";

/// Folder receiving resources that need manual review
pub const REQUIRES_ATTENTION_FOLDER: &str = ".requires_attention";

pub const DASHBOARD: &str = "dynatrace_dashboard";
pub const DASHBOARD_SHARING: &str = "dynatrace_dashboard_sharing";

/// One fetched remote object
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Display name
    pub name: String,
    /// Remote identifier
    pub id: String,
    /// Encoded payload
    pub rest_object: ResourceData,
    /// Needs manual review before Terraform can manage it
    pub req_inter: bool,
}

pub type Resources = Vec<Resource>;

/// Why resources of a type may need manual review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterventionInfo {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    pub target_folder: PathBuf,
    /// Annotate exported files with the remote ID
    pub commented_id: bool,
}

/// Fetched resources per resource type name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSet(BTreeMap<String, Resources>);

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, res_type: &str, resources: Resources) {
        self.0.insert(res_type.to_string(), resources);
    }

    pub fn get(&self, res_type: &str) -> Option<&Resources> {
        self.0.get(res_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Resources)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.values().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
