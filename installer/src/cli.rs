// Command-line options
//
// schema-installer --app <name> [--env <env>] [--version <v> | --latest]
//                  [--set key=value]... [--config <path>] [--projects-dir <path>] [--verbose]
//
// Flags accept both `--flag value` and `--flag=value`.

use crate::installation::{InstallRequest, VersionRequest};
use crate::models::parameters::ParameterMap;
use crate::utils::validation::validate_parameter_name;
use std::path::PathBuf;

pub const USAGE: &str = "Usage: schema-installer --app <name> [--env <env>] [--version <v> | --latest] [--set key=value]... [--config <path>] [--projects-dir <path>] [--verbose]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub application: String,
    pub environment: Option<String>,
    pub version: VersionRequest,
    pub overrides: ParameterMap,
    pub config_path: Option<PathBuf>,
    pub projects_dir: Option<PathBuf>,
    pub verbose: bool,
    pub help: bool,
}

impl CliOptions {
    /// Parse arguments (program name excluded). Errors are usage messages.
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut application = None;
        let mut environment = None;
        let mut version = None;
        let mut latest = false;
        let mut overrides = ParameterMap::new();
        let mut config_path = None;
        let mut projects_dir = None;
        let mut verbose = false;
        let mut help = false;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((f, v)) if f.starts_with("--") => (f, Some(v.to_string())),
                _ => (arg.as_str(), None),
            };

            let mut value = |name: &str| -> Result<String, String> {
                match inline.clone() {
                    Some(v) => Ok(v),
                    None => iter
                        .next()
                        .cloned()
                        .ok_or_else(|| format!("{} requires a value", name)),
                }
            };

            match flag {
                "--app" => application = Some(value("--app")?),
                "--env" => environment = Some(value("--env")?),
                "--version" => version = Some(value("--version")?),
                "--latest" => latest = true,
                "--set" => {
                    let pair = value("--set")?;
                    let (key, val) = pair
                        .split_once('=')
                        .ok_or_else(|| format!("--set expects key=value, got '{}'", pair))?;
                    let key = key.trim();
                    validate_parameter_name(key).map_err(|e| e.to_string())?;
                    overrides.insert(key.to_string(), val.to_string());
                }
                "--config" => config_path = Some(PathBuf::from(value("--config")?)),
                "--projects-dir" => projects_dir = Some(PathBuf::from(value("--projects-dir")?)),
                "--verbose" | "-v" => verbose = true,
                "--help" | "-h" => help = true,
                other => return Err(format!("Unknown argument '{}'", other)),
            }
        }

        let version = match (version, latest) {
            (Some(_), true) => return Err("--version and --latest are mutually exclusive".into()),
            (Some(v), false) => VersionRequest::Exact(v),
            (None, true) => VersionRequest::Latest,
            (None, false) => VersionRequest::All,
        };

        let application = match application {
            Some(app) if !app.trim().is_empty() => app.trim().to_string(),
            _ if help => String::new(),
            _ => return Err("--app is required".into()),
        };

        Ok(Self {
            application,
            environment,
            version,
            overrides,
            config_path,
            projects_dir,
            verbose,
            help,
        })
    }

    pub fn to_request(&self) -> InstallRequest {
        InstallRequest {
            application_name: self.application.clone(),
            environment: self.environment.clone(),
            version: self.version.clone(),
            parameter_overrides: self.overrides.clone(),
        }
    }
}
