// Installer error taxonomy
//
// Every `InstallError` is fatal for the run: the orchestrator releases executor connections and
// the binary exits non-zero. Per-file execution failures are NOT represented here; they use
// `database::executor::ExecutionError` and are always routed through failure recovery.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    /// Missing discovery, unknown version, invalid target database name, ...
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A value matched the secret-reference grammar but is not a usable reference.
    #[error("Syntax error for secret variable '{key}': {reason}")]
    SecretSyntax { key: String, reason: String },

    /// The backend had nothing for the reference, or the JSON path selected nothing.
    #[error("Secret lookup failed for '{key}': {reason}")]
    SecretLookup { key: String, reason: String },

    /// The interactive surface could not deliver an answer (e.g. stdin closed).
    #[error("Interactive prompt failed: {0}")]
    Prompt(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InstallError {
    pub fn configuration(message: impl Into<String>) -> Self {
        InstallError::Configuration(message.into())
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        1
    }
}
