//! Resource kinds
//!
//! - [`credentials`] - Credential vault entries, with the monitor-aware delete
//! - [`dashboards`] - Dashboards and dashboard sharing settings
//! - [`monitors`] - Synthetic HTTP monitors
//! - [`config`] - Registry-defined configuration endpoints

pub mod config;
pub mod credentials;
pub mod dashboards;
pub mod monitors;

pub use config::ConfigKind;
pub use credentials::CredentialsKind;
pub use dashboards::{DashboardKind, DashboardSharingKind};
pub use monitors::HttpMonitorKind;
