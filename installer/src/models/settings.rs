// Installer settings
//
// Layered with the `config` crate: optional TOML file, then `SCHEMA_INSTALLER_*` environment
// variables (e.g. `SCHEMA_INSTALLER_MAX_RESTARTS=3`,
// `SCHEMA_INSTALLER_SENSITIVE_ENVIRONMENTS=dev,prod`).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_NAME: &str = "schema-installer";
const ENV_PREFIX: &str = "SCHEMA_INSTALLER";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InstallerSettings {
    /// Root folder holding one sub-folder per application.
    pub projects_dir: PathBuf,
    /// Parameter store, master key and logs. Defaults to the platform data dir.
    pub state_dir: Option<PathBuf>,
    pub default_environment: String,
    /// Environments where installing every version needs two confirmations.
    pub sensitive_environments: Vec<String>,
    /// `None` keeps restarts unbounded.
    pub max_restarts: Option<u32>,
    /// `None` keeps per-file retries unbounded.
    pub max_file_retries: Option<u32>,
    pub open_editor_on_failure: bool,
    pub editor: Option<String>,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            projects_dir: PathBuf::from("."),
            state_dir: None,
            default_environment: "local".to_string(),
            sensitive_environments: vec!["dev".to_string(), "demo".to_string(), "prod".to_string()],
            max_restarts: None,
            max_file_retries: None,
            open_editor_on_failure: true,
            editor: None,
        }
    }
}

impl InstallerSettings {
    /// Load settings. An explicit `config_path` must exist; the default file is optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let file_source = match config_path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let cfg = config::Config::builder()
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("sensitive_environments"),
            )
            .build()
            .context("Failed to load installer settings")?;

        cfg.try_deserialize::<InstallerSettings>()
            .context("Invalid installer settings")
    }

    pub fn is_sensitive_environment(&self, environment: &str) -> bool {
        self.sensitive_environments
            .iter()
            .any(|e| e.trim().eq_ignore_ascii_case(environment.trim()))
    }
}
