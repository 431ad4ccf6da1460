// Discovered database project (versions -> sub-versions -> files)

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Version name that always installs last.
pub const CURRENT_VERSION: &str = "current";

/// Everything discovery knows about one application's database.
#[derive(Debug, Clone)]
pub struct DatabaseProject {
    pub application_name: String,
    /// Declared database name; the default target is `{environment}_{db_name}`.
    pub db_name: String,
    /// Parameter name -> file names consuming it (declaration order of files is kept).
    pub parameter_files: BTreeMap<String, Vec<String>>,
    /// Discovery order; not install order (see `database::versions`).
    pub versions: Vec<DatabaseVersion>,
}

#[derive(Debug, Clone)]
pub struct DatabaseVersion {
    pub name: String,
    pub sub_versions: Vec<SubVersion>,
}

impl DatabaseVersion {
    pub fn new(name: impl Into<String>, sub_versions: Vec<SubVersion>) -> Self {
        Self {
            name: name.into(),
            sub_versions,
        }
    }

    pub fn is_current(&self) -> bool {
        self.name == CURRENT_VERSION
    }
}

/// A contiguous batch of files sharing one connection target.
#[derive(Debug, Clone, Default)]
pub struct SubVersion {
    /// Explicit target database template (`${param}` placeholders allowed).
    pub database_to_use: Option<String>,
    pub files: Vec<SqlFile>,
}

impl SubVersion {
    pub fn new(files: Vec<SqlFile>) -> Self {
        Self {
            database_to_use: None,
            files,
        }
    }

    pub fn with_database(mut self, template: impl Into<String>) -> Self {
        self.database_to_use = Some(template.into());
        self
    }

    /// The explicit template, ignoring blank declarations.
    pub fn database_template(&self) -> Option<&str> {
        self.database_to_use
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
enum FileSource {
    Path(PathBuf),
    Inline(String),
}

/// One SQL artifact. Content is read when the orchestrator reaches the file.
#[derive(Debug, Clone)]
pub struct SqlFile {
    pub name: String,
    source: FileSource,
}

impl SqlFile {
    pub fn from_path(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Path(path),
        }
    }

    pub fn inline(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Inline(content.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            FileSource::Path(p) => Some(p.as_path()),
            FileSource::Inline(_) => None,
        }
    }

    /// Load the file content. An empty file is valid and yields an empty string.
    pub async fn load(&self) -> Result<String> {
        match &self.source {
            FileSource::Inline(content) => Ok(content.clone()),
            FileSource::Path(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read SQL file {}: {:?}", self.name, path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_database_template_counts_as_absent() {
        let sub = SubVersion::new(vec![]).with_database("   ");
        assert!(sub.database_template().is_none());

        let sub = SubVersion::new(vec![]).with_database("${env}_audit");
        assert_eq!(sub.database_template(), Some("${env}_audit"));
    }

    #[tokio::test]
    async fn load_reads_empty_file_as_empty_string() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("001_empty.sql");
        std::fs::write(&path, "").unwrap();

        let file = SqlFile::from_path("1.0/001_empty.sql", path);
        assert_eq!(file.load().await.unwrap(), "");
    }

    #[tokio::test]
    async fn load_missing_file_names_the_file() {
        let file = SqlFile::from_path("1.0/404.sql", PathBuf::from("/nonexistent/404.sql"));
        let err = file.load().await.unwrap_err();
        assert!(format!("{:#}", err).contains("1.0/404.sql"));
    }
}
