// Interactive surface consumed by the orchestrator
//
// Every prompt blocks the run until answered (no timeout). `ConsoleUi` is the terminal
// implementation; tests use a scripted stub.

pub mod console;
pub mod editor;

use crate::error::InstallError;
use async_trait::async_trait;
use std::path::Path;

pub use console::ConsoleUi;
pub use editor::SystemEditor;

#[async_trait]
pub trait InteractiveUi: Send + Sync {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);

    /// Show file content to the operator. The text may carry resolved secrets, so
    /// implementations display it without logging it.
    fn show_content(&self, content: &str);

    /// Free-text answer (without the trailing newline).
    async fn question(&self, prompt: &str) -> Result<String, InstallError>;

    /// One of `options`, returned verbatim.
    async fn choose(&self, prompt: &str, options: &[&str]) -> Result<String, InstallError>;

    fn start_progress(&self, title: &str, length: u64, start: u64);
    /// `next` is the name of the file about to run, when there is one.
    fn progress(&self, position: u64, next: Option<&str>);
    fn stop_progress(&self);
}

/// Best-effort "show this file to the operator".
pub trait EditorSurface: Send + Sync {
    fn open(&self, path: &Path) -> anyhow::Result<()>;
}
