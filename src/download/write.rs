//! Writing fetched resources as `.tf` files
//!
//! Writes are fail-fast: the first filesystem or serialization error is
//! returned and files written before it stay on disk.

use super::names::{escape, escf, NameCounter};
use super::{
    DownloadConfig, InterventionInfo, Resource, ResourceSet, DASHBOARD, DASHBOARD_SHARING,
    REQUIRES_ATTENTION_FOLDER, TYPE_PREFIX,
};
use crate::codec;
use anyhow::{Context, Result};
use hcl::expr::{Expression, ObjectKey};
use hcl::{Attribute, Block, Body};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Registry source of the provider in generated `providers.tf`
pub const PROVIDER_SOURCE: &str = "dynatrace-oss/dynatrace";

impl ResourceSet {
    /// Write each resource not needing intervention to its own file in `res_folder`
    ///
    /// Returns the number of files written.
    pub fn write_resource_separate(
        &self,
        config: &DownloadConfig,
        res_type: &str,
        res_folder: &str,
        resources: &[Resource],
        counter: &mut NameCounter,
    ) -> Result<usize> {
        let folder = config.target_folder.join(res_folder);
        let mut file_names = NameCounter::new();
        let mut written = 0;

        for resource in resources.iter().filter(|r| !r.req_inter) {
            // Resources sharing a display name get suffixed files instead of replacing each other
            let stem = file_names.numbering(&escf(&resource.name), &resource.id);
            let file_name = folder.join(format!("{}.{}.tf", res_folder, stem));
            let mut writer = create_file(&file_name)?;

            if config.commented_id {
                let label = counter.numbering(&escape(&resource.name), &resource.id);
                codec::export(
                    &resource.rest_object,
                    &mut writer,
                    res_type,
                    &label,
                    &[id_comment(resource)],
                )?;
            } else {
                codec::export(
                    &resource.rest_object,
                    &mut writer,
                    res_type,
                    &escape(&resource.name),
                    &[],
                )?;
            }

            if res_type == DASHBOARD {
                self.write_dashboard_sharing(&mut writer, resource)?;
            }

            writer
                .flush()
                .with_context(|| format!("Failed to write {}", file_name.display()))?;
            tracing::debug!("wrote {}", file_name.display());
            written += 1;
        }

        Ok(written)
    }

    /// Append the sharing settings of `dashboard`, if any were downloaded
    ///
    /// Sharing settings carry the dashboard's ID, which tells apart
    /// dashboards with the same name; otherwise they are matched by name.
    fn write_dashboard_sharing<W: Write>(
        &self,
        writer: &mut W,
        dashboard: &Resource,
    ) -> Result<()> {
        let name = &dashboard.name;
        let Some(sharing) = self.get(DASHBOARD_SHARING).and_then(|resources| {
            resources
                .iter()
                .find(|r| r.id == dashboard.id)
                .or_else(|| resources.iter().find(|r| &r.name == name))
        }) else {
            return Ok(());
        };

        writeln!(writer)?;
        codec::export(
            &sharing.rest_object,
            writer,
            DASHBOARD_SHARING,
            &escape(name),
            &[],
        )
    }

    /// Write every resource flagged as needing intervention into the quarantine folder
    ///
    /// Only types present in `interventions` are considered. Returns the
    /// number of files written.
    pub fn write_res_req_attn(
        &self,
        config: &DownloadConfig,
        interventions: &BTreeMap<String, InterventionInfo>,
    ) -> Result<usize> {
        let folder = config.target_folder.join(REQUIRES_ATTENTION_FOLDER);
        let mut file_names = NameCounter::new();
        let mut written = 0;

        for (res_type, info) in interventions {
            let Some(resources) = self.get(res_type) else {
                continue;
            };

            for resource in resources.iter().filter(|r| r.req_inter) {
                if !folder.exists() {
                    fs::create_dir(&folder)
                        .with_context(|| format!("Failed to create {}", folder.display()))?;
                }

                let stem = format!(
                    "{}.{}",
                    res_type.strip_prefix(TYPE_PREFIX).unwrap_or(res_type),
                    escf(&resource.name)
                );
                let file_name =
                    folder.join(format!("{}.tf", file_names.numbering(&stem, &resource.id)));
                let mut writer = create_file(&file_name)?;

                let comments = if config.commented_id {
                    vec![id_comment(resource)]
                } else {
                    vec![]
                };
                codec::export(
                    &resource.rest_object,
                    &mut writer,
                    res_type,
                    &escape(&resource.name),
                    &comments,
                )?;
                writer
                    .flush()
                    .with_context(|| format!("Failed to write {}", file_name.display()))?;

                tracing::warn!(
                    "{} \"{}\" requires attention: {}",
                    res_type,
                    resource.name,
                    info.message
                );
                written += 1;
            }
        }

        Ok(written)
    }
}

/// Write `<target>/providers.tf` declaring the provider source
pub fn write_providers_file(config: &DownloadConfig) -> Result<()> {
    let source = Expression::Object(
        [(
            ObjectKey::Expression(Expression::String("source".to_string())),
            Expression::String(PROVIDER_SOURCE.to_string()),
        )]
        .into_iter()
        .collect(),
    );

    let body = Body::builder()
        .add_block(
            Block::builder("terraform")
                .add_block(
                    Block::builder("required_providers")
                        .add_attribute(Attribute::new("dynatrace", source))
                        .build(),
                )
                .build(),
        )
        .build();

    let text = hcl::to_string(&body).context("Failed to serialize providers.tf")?;
    let file_name = config.target_folder.join("providers.tf");
    fs::write(&file_name, text).with_context(|| format!("Failed to write {}", file_name.display()))
}

fn id_comment(resource: &Resource) -> String {
    format!("id = \"{}\"", resource.id)
}

/// Replace `path` with a new empty file
fn create_file(path: &Path) -> Result<BufWriter<File>> {
    let _ = fs::remove_file(path);
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceData;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn resource(name: &str, id: &str, req_inter: bool) -> Resource {
        let mut rest_object = ResourceData::new();
        rest_object.set("name", name);
        Resource {
            name: name.to_string(),
            id: id.to_string(),
            rest_object,
            req_inter,
        }
    }

    fn config(dir: &TempDir, commented_id: bool) -> DownloadConfig {
        DownloadConfig {
            target_folder: dir.path().to_path_buf(),
            commented_id,
        }
    }

    fn read(path: PathBuf) -> String {
        fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
    }

    #[test]
    fn test_write_resource_separate_skips_flagged() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("autotags")).unwrap();
        let resources = vec![resource("web", "A", false), resource("db", "B", true)];

        let written = ResourceSet::new()
            .write_resource_separate(
                &config(&dir, false),
                "dynatrace_autotag",
                "autotags",
                &resources,
                &mut NameCounter::new(),
            )
            .unwrap();

        assert_eq!(written, 1);
        let text = read(dir.path().join("autotags/autotags.web.tf"));
        assert!(text.starts_with("resource \"dynatrace_autotag\" \"web\""));
        assert!(!dir.path().join("autotags/autotags.db.tf").exists());
    }

    #[test]
    fn test_commented_id_uses_counter_labels() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("autotags")).unwrap();
        let resources = vec![resource("web", "A", false)];
        let mut counter = NameCounter::new();
        counter.numbering("web", "other");

        ResourceSet::new()
            .write_resource_separate(
                &config(&dir, true),
                "dynatrace_autotag",
                "autotags",
                &resources,
                &mut counter,
            )
            .unwrap();

        let text = read(dir.path().join("autotags/autotags.web.tf"));
        assert!(text.starts_with("# id = \"A\"\n"));
        assert!(text.contains("resource \"dynatrace_autotag\" \"web_2\""));
    }

    #[test]
    fn test_same_name_resources_get_distinct_files() {
        for commented_id in [false, true] {
            let dir = TempDir::new().unwrap();
            fs::create_dir(dir.path().join("autotags")).unwrap();
            let resources = vec![resource("web", "A", false), resource("web", "B", false)];

            let written = ResourceSet::new()
                .write_resource_separate(
                    &config(&dir, commented_id),
                    "dynatrace_autotag",
                    "autotags",
                    &resources,
                    &mut NameCounter::new(),
                )
                .unwrap();

            let mut files: Vec<String> = fs::read_dir(dir.path().join("autotags"))
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            files.sort();
            assert_eq!(written, files.len());
            assert_eq!(files, vec!["autotags.web.tf", "autotags.web_2.tf"]);

            let first = read(dir.path().join("autotags/autotags.web.tf"));
            let second = read(dir.path().join("autotags/autotags.web_2.tf"));
            if commented_id {
                assert!(first.starts_with("# id = \"A\"\n"), "{}", first);
                assert!(second.starts_with("# id = \"B\"\n"), "{}", second);
                assert!(second.contains("resource \"dynatrace_autotag\" \"web_2\""));
            } else {
                assert!(first.starts_with("resource \"dynatrace_autotag\" \"web\""));
                assert!(second.starts_with("resource \"dynatrace_autotag\" \"web\""));
            }
        }
    }

    #[test]
    fn test_dashboard_without_sharing_is_written_alone() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("dashboards")).unwrap();

        let mut set = ResourceSet::new();
        set.insert(DASHBOARD, vec![resource("Overview", "d-1", false)]);
        let mut elsewhere = ResourceSet::new();
        elsewhere.insert(DASHBOARD, vec![resource("Overview", "d-1", false)]);
        elsewhere.insert(DASHBOARD_SHARING, vec![resource("Other", "d-9", false)]);

        for set in [set, elsewhere] {
            let dashboards = set.get(DASHBOARD).cloned().unwrap();
            let written = set
                .write_resource_separate(
                    &config(&dir, false),
                    DASHBOARD,
                    "dashboards",
                    &dashboards,
                    &mut NameCounter::new(),
                )
                .unwrap();

            assert_eq!(written, 1);
            let text = read(dir.path().join("dashboards/dashboards.Overview.tf"));
            assert!(text.contains("resource \"dynatrace_dashboard\" \"Overview\""));
            assert!(!text.contains(DASHBOARD_SHARING));
        }
    }

    #[test]
    fn test_dashboard_sharing_is_matched_by_id_first() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("dashboards")).unwrap();

        let dashboards = vec![
            resource("Overview", "d-1", false),
            resource("Overview", "d-2", false),
        ];
        let mut first_sharing = resource("Overview", "d-1", false);
        first_sharing.rest_object.set("dashboard_id", "d-1");
        let mut second_sharing = resource("Overview", "d-2", false);
        second_sharing.rest_object.set("dashboard_id", "d-2");

        let mut set = ResourceSet::new();
        set.insert(DASHBOARD, dashboards.clone());
        set.insert(DASHBOARD_SHARING, vec![first_sharing, second_sharing]);

        set.write_resource_separate(
            &config(&dir, false),
            DASHBOARD,
            "dashboards",
            &dashboards,
            &mut NameCounter::new(),
        )
        .unwrap();

        let second = read(dir.path().join("dashboards/dashboards.Overview_2.tf"));
        let parsed = codec::parse_resources(&second).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].res_type, DASHBOARD_SHARING);
        assert_eq!(parsed[1].data.get_str("dashboard_id"), Some("d-2"));
    }

    #[test]
    fn test_existing_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("autotags")).unwrap();
        let path = dir.path().join("autotags/autotags.web.tf");
        fs::write(&path, "stale content that is longer than the new one ".repeat(20)).unwrap();

        ResourceSet::new()
            .write_resource_separate(
                &config(&dir, false),
                "dynatrace_autotag",
                "autotags",
                &[resource("web", "A", false)],
                &mut NameCounter::new(),
            )
            .unwrap();

        assert!(!read(path).contains("stale"));
    }

    #[test]
    fn test_missing_folder_fails_fast() {
        let dir = TempDir::new().unwrap();
        let result = ResourceSet::new().write_resource_separate(
            &config(&dir, false),
            "dynatrace_autotag",
            "autotags",
            &[resource("web", "A", false)],
            &mut NameCounter::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_res_req_attn_only_for_known_types() {
        let dir = TempDir::new().unwrap();
        let mut set = ResourceSet::new();
        set.insert("dynatrace_credentials", vec![resource("secret", "C-1", true)]);
        set.insert("dynatrace_autotag", vec![resource("tag", "T-1", true)]);

        let mut interventions = BTreeMap::new();
        interventions.insert(
            "dynatrace_credentials".to_string(),
            InterventionInfo {
                message: "set the password".to_string(),
            },
        );

        let written = set.write_res_req_attn(&config(&dir, false), &interventions).unwrap();
        assert_eq!(written, 1);

        let folder = dir.path().join(REQUIRES_ATTENTION_FOLDER);
        let text = read(folder.join("credentials.secret.tf"));
        assert!(text.starts_with("resource \"dynatrace_credentials\" \"secret\""));
        assert!(!folder.join("autotag.tag.tf").exists());
    }

    #[test]
    fn test_res_req_attn_same_name_gets_distinct_files() {
        let dir = TempDir::new().unwrap();
        let mut set = ResourceSet::new();
        set.insert(
            "dynatrace_credentials",
            vec![resource("basic", "C-1", true), resource("basic", "C-2", true)],
        );

        let mut interventions = BTreeMap::new();
        interventions.insert(
            "dynatrace_credentials".to_string(),
            InterventionInfo {
                message: "set the password".to_string(),
            },
        );

        let written = set.write_res_req_attn(&config(&dir, true), &interventions).unwrap();
        assert_eq!(written, 2);

        let folder = dir.path().join(REQUIRES_ATTENTION_FOLDER);
        assert!(read(folder.join("credentials.basic.tf")).starts_with("# id = \"C-1\""));
        assert!(read(folder.join("credentials.basic_2.tf")).starts_with("# id = \"C-2\""));
    }

    #[test]
    fn test_res_req_attn_without_flagged_resources_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let mut set = ResourceSet::new();
        set.insert("dynatrace_credentials", vec![resource("ok", "C-1", false)]);

        let mut interventions = BTreeMap::new();
        interventions.insert(
            "dynatrace_credentials".to_string(),
            InterventionInfo {
                message: "m".to_string(),
            },
        );

        assert_eq!(set.write_res_req_attn(&config(&dir, true), &interventions).unwrap(), 0);
        assert!(!dir.path().join(REQUIRES_ATTENTION_FOLDER).exists());
    }

    #[test]
    fn test_providers_file() {
        let dir = TempDir::new().unwrap();
        write_providers_file(&config(&dir, false)).unwrap();
        let text = read(dir.path().join("providers.tf"));
        assert!(text.contains("required_providers {"));
        assert!(text.contains(PROVIDER_SOURCE));
    }
}
