// Persisted parameters
//
// <state_dir>/<application>/parameters.json = { "<environment>": { "<key>": "<value>" } }
// Credential values are sealed by `SecretProtector` on save and opened on load.

use crate::models::parameters::ParameterMap;
use crate::security::secret_protector::{is_credential_key, SecretProtector};
use crate::utils::validation::validate_application_name;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

const PARAMETERS_FILE: &str = "parameters.json";

type ParameterDocument = BTreeMap<String, ParameterMap>;

#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Persisted parameters for one environment; empty when nothing was saved yet.
    async fn load(&self, application: &str, environment: &str) -> Result<ParameterMap>;

    /// Replace the environment's parameters, leaving other environments untouched.
    async fn save(&self, application: &str, environment: &str, values: &ParameterMap)
        -> Result<()>;
}

pub struct FileParameterStore {
    root: PathBuf,
    protector: Arc<SecretProtector>,
}

impl FileParameterStore {
    pub fn new(root: impl Into<PathBuf>, protector: Arc<SecretProtector>) -> Self {
        Self {
            root: root.into(),
            protector,
        }
    }

    fn document_path(&self, application: &str) -> Result<PathBuf> {
        validate_application_name(application)?;
        Ok(self.root.join(application).join(PARAMETERS_FILE))
    }

    async fn read_document(&self, path: &Path) -> Result<ParameterDocument> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(ParameterDocument::new());
        }
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read parameters: {:?}", path))?;
        if raw.trim().is_empty() {
            return Ok(ParameterDocument::new());
        }
        serde_json::from_str(&raw).with_context(|| format!("Invalid parameters file: {:?}", path))
    }
}

#[async_trait]
impl ParameterStore for FileParameterStore {
    async fn load(&self, application: &str, environment: &str) -> Result<ParameterMap> {
        let path = self.document_path(application)?;
        let mut document = self.read_document(&path).await?;
        let stored = document.remove(environment).unwrap_or_default();

        let mut values = ParameterMap::new();
        for (key, value) in stored {
            let opened = if self.protector.is_sealed(&value) {
                self.protector
                    .open(&value)
                    .await
                    .with_context(|| format!("Failed to decrypt stored parameter '{}'", key))?
            } else {
                value
            };
            values.insert(key, opened);
        }
        Ok(values)
    }

    async fn save(
        &self,
        application: &str,
        environment: &str,
        values: &ParameterMap,
    ) -> Result<()> {
        let path = self.document_path(application)?;
        let mut document = self.read_document(&path).await?;

        let mut sealed = ParameterMap::new();
        for (key, value) in values {
            let stored = if is_credential_key(key) {
                self.protector.seal(value).await?
            } else {
                value.clone()
            };
            sealed.insert(key.clone(), stored);
        }
        document.insert(environment.to_string(), sealed);

        let json = serde_json::to_string_pretty(&document)?;
        write_atomic(&path, json.as_bytes()).await?;

        info!(
            "[PHASE: parameters] [STEP: save] Saved {} parameter(s) for {}/{}",
            values.len(),
            application,
            environment
        );
        Ok(())
    }
}

/// Temp file + rename, retried on transient I/O errors.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .context("Parameters path has no parent directory")?;
    tokio::fs::create_dir_all(parent)
        .await
        .with_context(|| format!("Failed to create {:?}", parent))?;

    let tmp = path.with_extension("json.tmp");
    let write_once = || async {
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to replace {:?}", path))?;
        Ok::<(), anyhow::Error>(())
    };

    let strategy = ExponentialBackoff::from_millis(50)
        .factor(2)
        .max_delay(Duration::from_millis(750))
        .take(4)
        .map(jitter);

    RetryIf::spawn(strategy, write_once, is_transient_io_error)
        .await
        .map_err(|e| {
            warn!(
                "[PHASE: parameters] [STEP: save] Giving up writing {:?}: {:#}",
                path, e
            );
            e
        })
}

fn is_transient_io_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .map(|io| {
                matches!(
                    io.kind(),
                    std::io::ErrorKind::PermissionDenied
                        | std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::Interrupted
                )
            })
            .unwrap_or(false)
    })
}
