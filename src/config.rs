//! Configuration Management
//!
//! Handles persistent configuration storage for dtform. The API token is
//! never written to disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Folder downloads are written to when nothing else is configured
pub const DEFAULT_TARGET_FOLDER: &str = "./configuration";

/// User configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Last used environment URL
    #[serde(default)]
    pub env_url: Option<String>,
    /// Last used download folder
    #[serde(default)]
    pub target_folder: Option<PathBuf>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("dtform").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from `path`, falling back to defaults when it is missing or unreadable
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Get effective environment URL (CLI/env > config)
    pub fn effective_env_url(&self, cli: Option<&str>) -> Option<String> {
        cli.map(|s| s.to_string()).or_else(|| self.env_url.clone())
    }

    /// Get effective download folder (CLI/env > config > default)
    pub fn effective_target_folder(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(|p| p.to_path_buf())
            .or_else(|| self.target_folder.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET_FOLDER))
    }

    /// Remember the values of a download run and save
    pub fn remember_download(&mut self, env_url: &str, target_folder: &Path) -> Result<()> {
        self.env_url = Some(env_url.to_string());
        self.target_folder = Some(target_folder.to_path_buf());
        self.save()
    }
}
