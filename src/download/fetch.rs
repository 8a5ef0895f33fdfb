//! Download pipeline: fetch selected kinds, then write them to disk

use super::write::write_providers_file;
use super::{DownloadConfig, NameCounter, ResourceSet, DASHBOARD, DASHBOARD_SHARING};
use crate::provider::Provider;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;

/// Kinds that are written inside another kind's files rather than on their own
const EMBEDDED_KINDS: &[&str] = &[DASHBOARD_SHARING];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Files written per resource type
    pub written: BTreeMap<String, usize>,
    /// Files written to the quarantine folder
    pub requires_attention: usize,
}

impl DownloadSummary {
    pub fn total(&self) -> usize {
        self.written.values().sum::<usize>() + self.requires_attention
    }
}

pub struct Downloader<'a> {
    provider: &'a Provider,
    config: DownloadConfig,
}

impl<'a> Downloader<'a> {
    pub fn new(provider: &'a Provider, config: DownloadConfig) -> Self {
        Self { provider, config }
    }

    /// Resolve the requested kinds; empty means all of them
    ///
    /// Dashboards pull in their sharing settings.
    pub fn select_kinds(&self, requested: &[String]) -> Result<Vec<String>> {
        if requested.is_empty() {
            return Ok(self
                .provider
                .type_names()
                .into_iter()
                .map(|s| s.to_string())
                .collect());
        }

        let mut kinds = Vec::new();
        for kind in requested {
            self.provider.handler(kind)?;
            if !kinds.contains(kind) {
                kinds.push(kind.clone());
            }
        }
        if kinds.iter().any(|k| k == DASHBOARD) && !kinds.iter().any(|k| k == DASHBOARD_SHARING) {
            kinds.push(DASHBOARD_SHARING.to_string());
        }
        Ok(kinds)
    }

    /// Fetch every object of the given kinds
    pub async fn fetch(&self, kinds: &[String]) -> Result<ResourceSet> {
        let mut data = ResourceSet::new();

        for kind in kinds {
            let handler = self.provider.handler(kind)?;
            let resources = handler.export().await?;
            tracing::info!("fetched {} {}", resources.len(), kind);
            data.insert(kind, resources);
        }

        Ok(data)
    }

    /// Write fetched resources below the target folder
    pub fn write(&self, data: &ResourceSet) -> Result<DownloadSummary> {
        let target = &self.config.target_folder;
        fs::create_dir_all(target)
            .with_context(|| format!("Failed to create {}", target.display()))?;

        let mut summary = DownloadSummary::default();

        for (res_type, resources) in data.iter() {
            if EMBEDDED_KINDS.contains(&res_type.as_str()) {
                continue;
            }
            if resources.iter().all(|r| r.req_inter) {
                continue;
            }

            let folder = self.provider.handler(res_type)?.folder().to_string();
            let path = target.join(&folder);
            fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;

            let mut counter = NameCounter::new();
            let written = data.write_resource_separate(
                &self.config,
                res_type,
                &folder,
                resources,
                &mut counter,
            )?;
            summary.written.insert(res_type.clone(), written);
        }

        summary.requires_attention =
            data.write_res_req_attn(&self.config, &self.provider.interventions())?;
        write_providers_file(&self.config)?;

        Ok(summary)
    }

    /// Fetch and write in one go
    pub async fn run(&self, requested: &[String]) -> Result<DownloadSummary> {
        let kinds = self.select_kinds(requested)?;
        let data = self.fetch(&kinds).await?;
        let summary = self.write(&data)?;
        tracing::info!(
            "download finished: {} files, {} requiring attention",
            summary.total(),
            summary.requires_attention
        );
        Ok(summary)
    }
}
