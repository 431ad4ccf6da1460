// Editor launcher
//
// Opens a failing SQL file for the operator. Never waits for the editor to exit.

use super::EditorSurface;
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const FALLBACK_EDITOR: &str = "code";

#[derive(Debug, Clone, Default)]
pub struct SystemEditor {
    configured: Option<String>,
}

impl SystemEditor {
    pub fn new(configured: Option<String>) -> Self {
        Self { configured }
    }

    /// Candidate commands in preference order: setting, `$VISUAL`, `code`.
    fn candidates(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(cmd) = self.configured.as_deref().filter(|c| !c.trim().is_empty()) {
            out.push(cmd.trim().to_string());
        }
        if let Ok(visual) = std::env::var("VISUAL") {
            if !visual.trim().is_empty() {
                out.push(visual.trim().to_string());
            }
        }
        out.push(FALLBACK_EDITOR.to_string());
        out
    }

    /// First candidate whose program is on PATH (or is an existing path).
    fn locate(&self) -> Option<(PathBuf, Vec<String>)> {
        self.candidates().into_iter().find_map(|candidate| {
            let mut parts = candidate.split_whitespace().map(str::to_string);
            let program = parts.next()?;
            let args: Vec<String> = parts.collect();
            match which::which(&program) {
                Ok(resolved) => Some((resolved, args)),
                Err(_) => {
                    debug!(
                        "[PHASE: recovery] [STEP: open_editor] Editor '{}' not found on PATH",
                        program
                    );
                    None
                }
            }
        })
    }
}

impl EditorSurface for SystemEditor {
    fn open(&self, path: &Path) -> Result<()> {
        let (program, args) = self
            .locate()
            .context("No editor available (set `editor` or $VISUAL)")?;

        Command::new(&program)
            .args(&args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch editor {:?}", program))?;

        info!(
            "[PHASE: recovery] [STEP: open_editor] Opened {:?} with {:?}",
            path, program
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_editor_comes_first_and_code_last() {
        let editor = SystemEditor::new(Some("  nano -w ".to_string()));
        let candidates = editor.candidates();
        assert_eq!(candidates.first().map(String::as_str), Some("nano -w"));
        assert_eq!(candidates.last().map(String::as_str), Some("code"));
    }

    #[test]
    fn blank_setting_is_ignored() {
        let editor = SystemEditor::new(Some("   ".to_string()));
        assert!(!editor.candidates().iter().any(|c| c.trim().is_empty()));
    }
}
