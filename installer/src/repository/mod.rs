// Repository reader (filesystem discovery)
//
// <projects_dir>/<application>/
//   database.toml          db_name + [parameters] (parameter -> files consuming it)
//   versions/<version>/    *.sql            -> first sub-version
//                          <subdir>/*.sql   -> one sub-version per subdirectory (name order)
//                          target.toml      -> optional `database = "<template>"` at either level;
//                                              a version-level one also covers its subdirectories
//                                              unless they declare their own
//
// File ids are `/`-separated paths relative to `versions/` (e.g. `1.0/001_init.sql`).

pub mod parameter_store;

use crate::models::project::{DatabaseProject, DatabaseVersion, SqlFile, SubVersion};
use crate::utils::validation::validate_application_name;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use parameter_store::{FileParameterStore, ParameterStore};

const MANIFEST_FILE: &str = "database.toml";
const TARGET_FILE: &str = "target.toml";
const VERSIONS_DIR: &str = "versions";

#[async_trait]
pub trait RepositoryReader: Send + Sync {
    /// `None` when the application has not been discovered (no project folder or manifest).
    async fn discover(&self, application_name: &str) -> Result<Option<DatabaseProject>>;
}

#[derive(Debug, Deserialize)]
struct DatabaseManifest {
    db_name: String,
    #[serde(default)]
    parameters: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct TargetManifest {
    database: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FsRepositoryReader {
    projects_dir: PathBuf,
}

impl FsRepositoryReader {
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
        }
    }

    async fn read_version(&self, name: &str, dir: &Path) -> Result<DatabaseVersion> {
        let (files, subdirs) = list_entries(dir).await?;
        let version_target = read_target(dir).await?;
        let mut sub_versions = Vec::new();

        if !files.is_empty() {
            sub_versions.push(build_sub_version(dir, name, files, version_target.as_deref()).await?);
        }

        for subdir in subdirs {
            let sub_name = file_name(&subdir);
            let (files, _) = list_entries(&subdir).await?;
            if files.is_empty() {
                debug!(
                    "[PHASE: discovery] [STEP: read_version] Skipping empty sub-version {}/{}",
                    name, sub_name
                );
                continue;
            }
            let prefix = format!("{}/{}", name, sub_name);
            sub_versions.push(
                build_sub_version(&subdir, &prefix, files, version_target.as_deref()).await?,
            );
        }

        Ok(DatabaseVersion::new(name, sub_versions))
    }
}

#[async_trait]
impl RepositoryReader for FsRepositoryReader {
    async fn discover(&self, application_name: &str) -> Result<Option<DatabaseProject>> {
        validate_application_name(application_name)?;

        let app_dir = self.projects_dir.join(application_name);
        let manifest_path = app_dir.join(MANIFEST_FILE);
        if !tokio::fs::try_exists(&manifest_path).await.unwrap_or(false) {
            info!(
                "[PHASE: discovery] [STEP: discover] No manifest at {:?}",
                manifest_path
            );
            return Ok(None);
        }

        let raw = tokio::fs::read_to_string(&manifest_path)
            .await
            .with_context(|| format!("Failed to read {:?}", manifest_path))?;
        let manifest: DatabaseManifest = toml::from_str(&raw)
            .with_context(|| format!("Invalid manifest {:?}", manifest_path))?;

        let versions_dir = app_dir.join(VERSIONS_DIR);
        let mut versions = Vec::new();
        if tokio::fs::try_exists(&versions_dir).await.unwrap_or(false) {
            let (_, version_dirs) = list_entries(&versions_dir).await?;
            for dir in version_dirs {
                let name = file_name(&dir);
                versions.push(self.read_version(&name, &dir).await?);
            }
        }

        info!(
            "[PHASE: discovery] [STEP: discover] Application '{}': {} version(s), {} declared parameter(s)",
            application_name,
            versions.len(),
            manifest.parameters.len()
        );

        Ok(Some(DatabaseProject {
            application_name: application_name.to_string(),
            db_name: manifest.db_name,
            parameter_files: manifest.parameters,
            versions,
        }))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// (`*.sql` files, subdirectories) of `dir`, each sorted by name.
async fn list_entries(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to list {:?}", dir))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
            dirs.push(path);
        } else if path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("sql"))
            .unwrap_or(false)
        {
            files.push(path);
        }
    }

    files.sort();
    dirs.sort();
    Ok((files, dirs))
}

/// `inherited` is the version-level template; a subdirectory's own `target.toml` wins over it.
async fn build_sub_version(
    dir: &Path,
    id_prefix: &str,
    files: Vec<PathBuf>,
    inherited: Option<&str>,
) -> Result<SubVersion> {
    let files = files
        .into_iter()
        .map(|path| {
            let id = format!("{}/{}", id_prefix, file_name(&path));
            SqlFile::from_path(id, path)
        })
        .collect();

    let mut sub_version = SubVersion::new(files);
    let template = match read_target(dir).await? {
        Some(own) => Some(own),
        None => inherited.map(str::to_string),
    };
    if let Some(template) = template {
        sub_version = sub_version.with_database(template);
    }
    Ok(sub_version)
}

async fn read_target(dir: &Path) -> Result<Option<String>> {
    let path = dir.join(TARGET_FILE);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(None);
    }
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;
    let target: TargetManifest =
        toml::from_str(&raw).with_context(|| format!("Invalid target file {:?}", path))?;
    Ok(target.database)
}
