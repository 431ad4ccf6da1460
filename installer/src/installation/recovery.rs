// Failure recovery
//
// Shown when a file fails to execute. The operator sees the file content and the error, the file
// is opened in an editor when possible, and one free-text answer picks what happens next:
//   ""        -> retry the same file
//   "r" / "R" -> restart the whole installation (fresh attempt)
//   anything else, including "s" -> stop

use crate::database::executor::ExecutionError;
use crate::error::InstallError;
use crate::models::project::SqlFile;
use crate::ui::{EditorSurface, InteractiveUi};
use log::{info, warn};

pub const RECOVERY_PROMPT: &str = "There has been an issue with this file.\n\
Press \"Enter\" to retry this file\n\
Use \"r\" to restart the whole installation\n\
Use \"s\" to stop\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    RetrySameFile,
    RestartInstallation,
    Stop,
}

/// Map the operator's answer to a decision. Surrounding whitespace is ignored.
pub fn interpret_response(input: &str) -> RecoveryDecision {
    match input.trim().to_lowercase().as_str() {
        "" => RecoveryDecision::RetrySameFile,
        "r" => RecoveryDecision::RestartInstallation,
        _ => RecoveryDecision::Stop,
    }
}

pub struct FailureRecoveryController<'a> {
    ui: &'a dyn InteractiveUi,
    editor: Option<&'a dyn EditorSurface>,
}

impl<'a> FailureRecoveryController<'a> {
    pub fn new(ui: &'a dyn InteractiveUi, editor: Option<&'a dyn EditorSurface>) -> Self {
        Self { ui, editor }
    }

    pub async fn decide(
        &self,
        file: &SqlFile,
        content: &str,
        failure: &ExecutionError,
    ) -> Result<RecoveryDecision, InstallError> {
        self.ui.show_content(content);
        self.ui.error(&format!("Error on file {}", file.name));
        self.ui.error(&failure.message);

        if let (Some(editor), Some(path)) = (self.editor, file.path()) {
            if let Err(e) = editor.open(path) {
                warn!(
                    "[PHASE: recovery] [STEP: open_editor] Could not open {}: {:#}",
                    file.name, e
                );
            }
        }

        let answer = self.ui.question(RECOVERY_PROMPT).await?;
        let decision = interpret_response(&answer);
        info!(
            "[PHASE: recovery] [STEP: decide] File {} -> {:?}",
            file.name, decision
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingEditor, StubUi};
    use std::path::PathBuf;

    #[test]
    fn responses_map_to_decisions() {
        assert_eq!(interpret_response(""), RecoveryDecision::RetrySameFile);
        assert_eq!(interpret_response("  \n"), RecoveryDecision::RetrySameFile);
        assert_eq!(interpret_response("r"), RecoveryDecision::RestartInstallation);
        assert_eq!(interpret_response("R "), RecoveryDecision::RestartInstallation);
        assert_eq!(interpret_response("s"), RecoveryDecision::Stop);
        assert_eq!(interpret_response("S"), RecoveryDecision::Stop);
        assert_eq!(interpret_response("retry"), RecoveryDecision::Stop);
    }

    #[tokio::test]
    async fn decide_shows_content_opens_editor_and_asks() {
        let ui = StubUi::with_answers(&["r"]);
        let editor = RecordingEditor::default();
        let controller = FailureRecoveryController::new(&ui, Some(&editor as &dyn EditorSurface));

        let file = SqlFile::from_path("1.0/002.sql", PathBuf::from("/tmp/versions/1.0/002.sql"));
        let decision = controller
            .decide(&file, "CREATE TABLEE x;", &ExecutionError::new("syntax error"))
            .await
            .unwrap();

        assert_eq!(decision, RecoveryDecision::RestartInstallation);
        assert_eq!(ui.contents(), vec!["CREATE TABLEE x;".to_string()]);
        let errors = ui.errors();
        assert!(!errors.iter().any(|m| m.contains("CREATE TABLEE")));
        assert!(errors.iter().any(|m| m == "Error on file 1.0/002.sql"));
        assert_eq!(ui.questions(), vec![RECOVERY_PROMPT.to_string()]);
        assert_eq!(
            editor.opened(),
            vec![PathBuf::from("/tmp/versions/1.0/002.sql")]
        );
    }

    #[tokio::test]
    async fn editor_failure_does_not_block_the_decision() {
        let ui = StubUi::with_answers(&[""]);
        let editor = RecordingEditor::failing();
        let controller = FailureRecoveryController::new(&ui, Some(&editor as &dyn EditorSurface));

        let file = SqlFile::from_path("1.0/001.sql", PathBuf::from("/nowhere/001.sql"));
        let decision = controller
            .decide(&file, "SELECT 1", &ExecutionError::new("boom"))
            .await
            .unwrap();
        assert_eq!(decision, RecoveryDecision::RetrySameFile);
    }

    #[tokio::test]
    async fn closed_input_is_a_prompt_error() {
        let ui = StubUi::with_answers(&[]);
        let controller = FailureRecoveryController::new(&ui, None);
        let file = SqlFile::inline("current/001.sql", "SELECT 1");

        let err = controller
            .decide(&file, "SELECT 1", &ExecutionError::new("boom"))
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Prompt(_)));
    }
}
