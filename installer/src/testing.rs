// Test doubles for the orchestrator's collaborators

use crate::database::connection::ConnectionTarget;
use crate::database::executor::{ExecutionError, SqlExecutor};
use crate::error::InstallError;
use crate::models::parameters::ParameterMap;
use crate::models::project::DatabaseProject;
use crate::repository::{ParameterStore, RepositoryReader};
use crate::secrets::reference::SecretService;
use crate::secrets::store::{SecretFetchError, SecretStoreClient};
use crate::ui::{EditorSurface, InteractiveUi};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};

static CAPTURED_LOGS: Mutex<Vec<String>> = Mutex::new(Vec::new());
static CAPTURE: Once = Once::new();

struct CapturingLogger;

impl log::Log for CapturingLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        CAPTURED_LOGS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(format!("{}", record.args()));
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger;

/// Route every log record of the test binary into memory. Safe to call from any test.
pub fn capture_logs() {
    CAPTURE.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
}

/// Everything logged since `capture_logs`, by every test running in this binary.
pub fn captured_logs() -> Vec<String> {
    CAPTURED_LOGS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Scripted UI: `question` and `choose` pop answers in order; an empty script acts like closed stdin.
#[derive(Default)]
pub struct StubUi {
    answers: Mutex<VecDeque<String>>,
    infos: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    contents: Mutex<Vec<String>>,
    questions: Mutex<Vec<String>>,
    choices: Mutex<Vec<String>>,
    progress_starts: Mutex<Vec<(String, u64, u64)>>,
    progress: Mutex<Vec<(u64, Option<String>)>>,
}

impl StubUi {
    pub fn with_answers(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(strings(answers).into()),
            ..Self::default()
        }
    }

    fn next_answer(&self, prompt: &str) -> Result<String, InstallError> {
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| InstallError::Prompt(format!("no scripted answer for '{}'", prompt)))
    }

    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn contents(&self) -> Vec<String> {
        self.contents.lock().unwrap().clone()
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }

    pub fn choices_asked(&self) -> Vec<String> {
        self.choices.lock().unwrap().clone()
    }

    pub fn progress_starts(&self) -> Vec<(String, u64, u64)> {
        self.progress_starts.lock().unwrap().clone()
    }

    /// (position, next file) per progress signal.
    pub fn progress_signals(&self) -> Vec<(u64, Option<String>)> {
        self.progress.lock().unwrap().clone()
    }

    pub fn remaining_answers(&self) -> usize {
        self.answers.lock().unwrap().len()
    }
}

#[async_trait]
impl InteractiveUi for StubUi {
    fn info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn show_content(&self, content: &str) {
        self.contents.lock().unwrap().push(content.to_string());
    }

    async fn question(&self, prompt: &str) -> Result<String, InstallError> {
        self.questions.lock().unwrap().push(prompt.to_string());
        self.next_answer(prompt)
    }

    async fn choose(&self, prompt: &str, options: &[&str]) -> Result<String, InstallError> {
        self.choices.lock().unwrap().push(prompt.to_string());
        let answer = self.next_answer(prompt)?;
        if options.contains(&answer.as_str()) {
            Ok(answer)
        } else {
            Err(InstallError::Prompt(format!(
                "scripted answer '{}' is not one of {:?}",
                answer, options
            )))
        }
    }

    fn start_progress(&self, title: &str, length: u64, start: u64) {
        self.progress_starts
            .lock()
            .unwrap()
            .push((title.to_string(), length, start));
    }

    fn progress(&self, position: u64, next: Option<&str>) {
        self.progress
            .lock()
            .unwrap()
            .push((position, next.map(str::to_string)));
    }

    fn stop_progress(&self) {}
}

#[derive(Default)]
pub struct RecordingEditor {
    opened: Mutex<Vec<PathBuf>>,
    fail: bool,
}

impl RecordingEditor {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().unwrap().clone()
    }
}

impl EditorSurface for RecordingEditor {
    fn open(&self, path: &Path) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("no editor");
        }
        self.opened.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

#[derive(Default)]
struct ExecutorLog {
    targets: Vec<ConnectionTarget>,
    /// (database, sql) per successful execution.
    executed: Vec<(String, String)>,
    attempts: Vec<String>,
    /// sql -> remaining failures
    failures: HashMap<String, u32>,
    closes: u32,
}

/// Executor that records everything and fails scripted statements a fixed number of times.
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    log: Arc<Mutex<ExecutorLog>>,
}

impl RecordingExecutor {
    pub fn failing(sql: &str, times: u32) -> Self {
        let executor = Self::default();
        executor
            .log
            .lock()
            .unwrap()
            .failures
            .insert(sql.to_string(), times);
        executor
    }

    pub fn targets(&self) -> Vec<ConnectionTarget> {
        self.log.lock().unwrap().targets.clone()
    }

    pub fn executed(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().executed.clone()
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.executed().into_iter().map(|(_, sql)| sql).collect()
    }

    /// Every execute call, failed ones included.
    pub fn attempts(&self) -> Vec<String> {
        self.log.lock().unwrap().attempts.clone()
    }

    pub fn close_count(&self) -> u32 {
        self.log.lock().unwrap().closes
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn set_target(&mut self, target: &ConnectionTarget) -> anyhow::Result<()> {
        self.log.lock().unwrap().targets.push(target.clone());
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<(), ExecutionError> {
        let mut log = self.log.lock().unwrap();
        log.attempts.push(sql.to_string());
        if let Some(remaining) = log.failures.get_mut(sql) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ExecutionError::new(format!("scripted failure for '{}'", sql)));
            }
        }
        let database = log
            .targets
            .last()
            .map(|t| t.database_name.clone())
            .unwrap_or_default();
        log.executed.push((database, sql.to_string()));
        Ok(())
    }

    async fn close_all(&mut self) {
        self.log.lock().unwrap().closes += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRequest {
    pub service: SecretService,
    pub parameter: String,
    pub profile: Option<String>,
    pub region: Option<String>,
}

/// In-memory secret store counting backend calls. Unknown parameters are `NotFound`.
#[derive(Default)]
pub struct CountingSecretStore {
    values: HashMap<String, String>,
    calls: AtomicU32,
    last: Mutex<Option<SecretRequest>>,
}

impl CountingSecretStore {
    pub fn with_value(parameter: &str, value: &str) -> Self {
        Self::default().and(parameter, value)
    }

    pub fn and(mut self, parameter: &str, value: &str) -> Self {
        self.values.insert(parameter.to_string(), value.to_string());
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<SecretRequest> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecretStoreClient for CountingSecretStore {
    async fn fetch(
        &self,
        service: SecretService,
        parameter: &str,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> Result<String, SecretFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(SecretRequest {
            service,
            parameter: parameter.to_string(),
            profile: profile.map(str::to_string),
            region: region.map(str::to_string),
        });

        self.values
            .get(parameter)
            .cloned()
            .ok_or_else(|| SecretFetchError::NotFound {
                service,
                parameter: parameter.to_string(),
            })
    }
}

/// Repository returning a fixed project (or nothing) and counting discoveries.
#[derive(Default)]
pub struct MemoryRepository {
    project: Option<DatabaseProject>,
    discoveries: AtomicU32,
}

impl MemoryRepository {
    pub fn with_project(project: DatabaseProject) -> Self {
        Self {
            project: Some(project),
            discoveries: AtomicU32::new(0),
        }
    }

    pub fn discoveries(&self) -> u32 {
        self.discoveries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryReader for MemoryRepository {
    async fn discover(&self, application_name: &str) -> anyhow::Result<Option<DatabaseProject>> {
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .project
            .clone()
            .filter(|p| p.application_name == application_name))
    }
}

/// (application, environment) -> parameters, with a log of saves.
#[derive(Default)]
pub struct MemoryParameterStore {
    values: Mutex<HashMap<(String, String), ParameterMap>>,
    saves: Mutex<Vec<(String, String, ParameterMap)>>,
}

impl MemoryParameterStore {
    pub fn with(application: &str, environment: &str, pairs: &[(&str, &str)]) -> Self {
        let store = Self::default();
        let map: ParameterMap = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        store
            .values
            .lock()
            .unwrap()
            .insert((application.to_string(), environment.to_string()), map);
        store
    }

    pub fn saves(&self) -> Vec<(String, String, ParameterMap)> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl ParameterStore for MemoryParameterStore {
    async fn load(&self, application: &str, environment: &str) -> anyhow::Result<ParameterMap> {
        Ok(self
            .values
            .lock()
            .unwrap()
            .get(&(application.to_string(), environment.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn save(
        &self,
        application: &str,
        environment: &str,
        values: &ParameterMap,
    ) -> anyhow::Result<()> {
        let key = (application.to_string(), environment.to_string());
        self.values.lock().unwrap().insert(key, values.clone());
        self.saves.lock().unwrap().push((
            application.to_string(),
            environment.to_string(),
            values.clone(),
        ));
        Ok(())
    }
}
