use crate::models::settings::InstallerSettings;
use anyhow::Result;
use std::path::{Path, PathBuf};

const STATE_FOLDER: &str = "schema-installer";

/// Resolve the installer state folder (parameter store, master key, logs)
pub fn resolve_state_dir(settings: &InstallerSettings) -> PathBuf {
    if let Some(dir) = settings.state_dir.as_ref() {
        return dir.clone();
    }

    // Prefer the platform data dir; fall back to the working directory.
    match dirs::data_local_dir() {
        Some(base) => base.join(STATE_FOLDER),
        None => std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(format!(".{}", STATE_FOLDER)),
    }
}

/// Resolve log folder (absolute path), creating it when missing
pub fn resolve_log_folder(state_dir: &Path) -> Result<PathBuf> {
    let log_dir = state_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create log folder {:?}: {}", log_dir, e))?;
    Ok(log_dir)
}
