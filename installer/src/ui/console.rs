// Terminal implementation of the interactive surface
//
// Plain line-oriented prompts on stdin/stdout, coloured with crossterm, plus an indicatif bar per
// sub-version. Output printed while the bar is visible goes through `suspend` so lines are not
// torn by redraws.

use super::InteractiveUi;
use crate::error::InstallError;
use crate::security::crypto::sha256_hex;
use async_trait::async_trait;
use crossterm::style::Stylize;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::io::{BufRead, Write};
use std::sync::{Mutex, MutexGuard};

const BAR_TEMPLATE: &str = "{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}";

#[derive(Default)]
pub struct ConsoleUi {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self::default()
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn print(&self, line: String) {
        match self.bar().as_ref() {
            Some(bar) => bar.suspend(|| println!("{}", line)),
            None => println!("{}", line),
        }
    }

    async fn read_line(&self, prompt: String) -> Result<String, InstallError> {
        let answer = tokio::task::spawn_blocking(move || {
            let mut stdout = std::io::stdout();
            write!(stdout, "{}", prompt)?;
            stdout.flush()?;

            let mut line = String::new();
            let read = std::io::stdin().lock().read_line(&mut line)?;
            if read == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "stdin closed",
                ));
            }
            Ok(line.trim_end_matches(['\r', '\n']).to_string())
        })
        .await
        .map_err(|e| InstallError::Prompt(format!("prompt task failed: {}", e)))?;

        answer.map_err(|e| InstallError::Prompt(e.to_string()))
    }
}

/// `answer` as a 1-based index or a case-insensitive option label.
fn match_choice<'a>(answer: &str, options: &[&'a str]) -> Option<&'a str> {
    let answer = answer.trim();
    if let Ok(index) = answer.parse::<usize>() {
        return index.checked_sub(1).and_then(|i| options.get(i).copied());
    }
    options
        .iter()
        .copied()
        .find(|option| option.eq_ignore_ascii_case(answer))
}

#[async_trait]
impl InteractiveUi for ConsoleUi {
    fn info(&self, message: &str) {
        info!("[PHASE: ui] [STEP: info] {}", message);
        self.print(format!("{} {}", "info".green().bold(), message));
    }

    fn warning(&self, message: &str) {
        warn!("[PHASE: ui] [STEP: warning] {}", message);
        self.print(format!("{} {}", "warn".yellow().bold(), message));
    }

    fn error(&self, message: &str) {
        error!("[PHASE: ui] [STEP: error] {}", message);
        self.print(format!("{} {}", "error".red().bold(), message));
    }

    fn show_content(&self, content: &str) {
        debug!(
            "[PHASE: ui] [STEP: content] Displayed {} byte(s) (sha256={})",
            content.len(),
            sha256_hex(content.as_bytes())
        );
        self.print(content.to_string());
    }

    async fn question(&self, prompt: &str) -> Result<String, InstallError> {
        let formatted = if prompt.ends_with('\n') {
            format!("{}> ", prompt.cyan())
        } else {
            format!("{} ", prompt.cyan())
        };
        self.read_line(formatted).await
    }

    async fn choose(&self, prompt: &str, options: &[&str]) -> Result<String, InstallError> {
        if options.is_empty() {
            return Err(InstallError::Prompt(format!(
                "no options offered for '{}'",
                prompt
            )));
        }

        let mut menu = format!("{}\n", prompt.cyan());
        for (i, option) in options.iter().enumerate() {
            menu.push_str(&format!("  {}) {}\n", i + 1, option));
        }
        menu.push_str("> ");

        loop {
            let answer = self.read_line(menu.clone()).await?;
            if let Some(choice) = match_choice(&answer, options) {
                return Ok(choice.to_string());
            }
            self.print(format!("{} '{}' is not one of the options", "warn".yellow().bold(), answer));
        }
    }

    fn start_progress(&self, title: &str, length: u64, start: u64) {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");

        let bar = ProgressBar::new(length);
        bar.set_style(style);
        bar.set_prefix(title.to_string());
        bar.set_position(start.min(length));

        if let Some(previous) = self.bar().replace(bar) {
            previous.finish_and_clear();
        }
    }

    fn progress(&self, position: u64, next: Option<&str>) {
        if let Some(bar) = self.bar().as_ref() {
            bar.set_position(position);
            bar.set_message(next.unwrap_or_default().to_string());
        }
    }

    fn stop_progress(&self) {
        if let Some(bar) = self.bar().take() {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{capture_logs, captured_logs};

    #[test]
    fn choices_match_by_number_or_label() {
        let options = ["Yes", "Wait..."];
        assert_eq!(match_choice("1", &options), Some("Yes"));
        assert_eq!(match_choice(" 2 ", &options), Some("Wait..."));
        assert_eq!(match_choice("yes", &options), Some("Yes"));
        assert_eq!(match_choice("3", &options), None);
        assert_eq!(match_choice("0", &options), None);
        assert_eq!(match_choice("maybe", &options), None);
    }

    #[test]
    fn shown_content_is_logged_only_as_a_digest() {
        capture_logs();
        let content = "ALTER ROLE app PASSWORD 'Hunter2-console';";

        ConsoleUi::new().show_content(content);

        let logs = captured_logs();
        assert!(logs.iter().all(|line| !line.contains("Hunter2-console")));
        let digest = sha256_hex(content.as_bytes());
        assert!(logs.iter().any(|line| line.contains(&digest)));
    }

    #[test]
    fn progress_bar_lifecycle_without_terminal() {
        let ui = ConsoleUi::new();
        ui.start_progress("billing - 1.0", 3, 0);
        ui.progress(1, Some("1.0/002.sql"));
        assert_eq!(ui.bar().as_ref().map(|b| b.position()), Some(1));

        ui.start_progress("billing - 1.0", 3, 5);
        assert_eq!(ui.bar().as_ref().map(|b| b.position()), Some(3));

        ui.stop_progress();
        ui.stop_progress();
        assert!(ui.bar().is_none());
    }
}
