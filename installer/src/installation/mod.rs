// Installation orchestration
//
// One `install` call drives attempts until the plan completes, the operator stops, or a fatal
// error occurs. Each attempt:
//   1. defaults the environment, loads the discovered project and persisted parameters
//   2. gates on root credentials (prompting and persisting when missing)
//   3. resolves secret references with a fresh per-attempt cache
//   4. selects and orders versions (double confirmation for "all" on sensitive environments)
//   5. walks versions -> sub-versions -> files, executing each file against its sub-version's
//      target and routing execution failures through `FailureRecoveryController`
// A restart ends the attempt and starts a new one from scratch. Connections are released after
// every attempt, whatever its outcome.
//
// IMPORTANT:
// - Never log parameter values; secrets are only ever logged as fingerprints.
// - Substituted file content may hold secrets: it goes to `show_content` only, and execution
//   errors have secret values redacted before they are logged or shown.
// - Execution is strictly sequential (file N may depend on file N-1).

pub mod cursor;
pub mod recovery;

use crate::database::connection::build_target;
use crate::database::context::RunContext;
use crate::database::executor::{ExecutionError, SqlExecutor};
use crate::database::parameters::{bindings_by_file, substitute_placeholders, ParameterBinding};
use crate::database::versions::order_versions;
use crate::error::InstallError;
use crate::models::parameters::{EnvironmentParameters, ParameterMap, PASSWORD_ROOT, SERVER};
use crate::models::project::{DatabaseProject, DatabaseVersion, SqlFile};
use crate::models::settings::InstallerSettings;
use crate::repository::{ParameterStore, RepositoryReader};
use crate::secrets::store::SecretStoreClient;
use crate::secrets::ParameterResolver;
use crate::security::crypto::sha256_hex;
use crate::ui::{EditorSurface, InteractiveUi};
use cursor::InstallationCursor;
use log::{debug, error, info, warn};
use recovery::{FailureRecoveryController, RecoveryDecision};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

const CONFIRM_ALL_PROMPT: &str = "You are probably about to drop and recreate the database you are working with. Is it something you are ok about ?";
const CONFIRM_ALL_AGAIN_PROMPT: &str = "You really sure ?";

/// Which versions an install covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequest {
    All,
    Latest,
    Exact(String),
}

#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub application_name: String,
    /// `None` (or blank) falls back to the configured default environment.
    pub environment: Option<String>,
    pub version: VersionRequest,
    /// Applied over the persisted parameters for this run only.
    pub parameter_overrides: ParameterMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Completed,
    /// Declined confirmation, operator stop, or an exceeded retry/restart bound.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub run_id: Uuid,
    pub status: InstallStatus,
    /// 1 + number of restarts.
    pub attempts: u32,
    /// Totals across all attempts.
    pub files_executed: usize,
    pub files_skipped: usize,
}

/// Everything the orchestrator talks to besides the SQL executor.
#[derive(Clone)]
pub struct Collaborators {
    pub repository: Arc<dyn RepositoryReader>,
    pub parameter_store: Arc<dyn ParameterStore>,
    pub secret_store: Arc<dyn SecretStoreClient>,
    pub ui: Arc<dyn InteractiveUi>,
    pub editor: Option<Arc<dyn EditorSurface>>,
}

pub struct InstallationOrchestrator {
    deps: Collaborators,
    settings: InstallerSettings,
    executor: Box<dyn SqlExecutor>,
    run_id: Uuid,
}

enum AttemptOutcome {
    Finished(InstallStatus),
    Restart,
}

enum FileOutcome {
    Executed,
    Skipped,
    Failed {
        content: String,
        error: ExecutionError,
    },
}

#[derive(Debug, Default)]
struct RunCounters {
    executed: usize,
    skipped: usize,
}

impl InstallationOrchestrator {
    pub fn new(
        deps: Collaborators,
        settings: InstallerSettings,
        executor: Box<dyn SqlExecutor>,
    ) -> Self {
        Self {
            deps,
            settings,
            executor,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub async fn install(&mut self, request: &InstallRequest) -> Result<InstallReport, InstallError> {
        let mut attempts: u32 = 0;
        let mut counters = RunCounters::default();

        loop {
            attempts += 1;
            info!(
                "[PHASE: install] [STEP: attempt] Run {} attempt {} for application '{}'",
                self.run_id, attempts, request.application_name
            );

            let attempt = Attempt {
                deps: &self.deps,
                settings: &self.settings,
                request,
            };
            let mut ctx = RunContext::new(&mut self.executor);
            let outcome = attempt.run(&mut ctx, &mut counters).await;
            ctx.release().await;

            let status = match outcome {
                Err(e) => {
                    error!(
                        "[PHASE: install] [STEP: attempt] Run {} failed: {}",
                        self.run_id, e
                    );
                    return Err(e);
                }
                Ok(AttemptOutcome::Finished(status)) => status,
                Ok(AttemptOutcome::Restart) => match self.settings.max_restarts {
                    Some(max) if attempts > max => {
                        let msg = format!(
                            "Restart limit reached ({}); stopping the installation",
                            max
                        );
                        warn!("[PHASE: install] [STEP: restart] {}", msg);
                        self.deps.ui.warning(&msg);
                        InstallStatus::Stopped
                    }
                    _ => {
                        info!(
                            "[PHASE: install] [STEP: restart] Restarting installation from scratch"
                        );
                        continue;
                    }
                },
            };

            info!(
                "[PHASE: install] [STEP: finish] Run {} {:?} after {} attempt(s): {} executed, {} skipped",
                self.run_id, status, attempts, counters.executed, counters.skipped
            );
            return Ok(InstallReport {
                run_id: self.run_id,
                status,
                attempts,
                files_executed: counters.executed,
                files_skipped: counters.skipped,
            });
        }
    }
}

/// One pass over the plan with its own parameters, secret cache and cursor.
struct Attempt<'a> {
    deps: &'a Collaborators,
    settings: &'a InstallerSettings,
    request: &'a InstallRequest,
}

impl Attempt<'_> {
    fn ui(&self) -> &dyn InteractiveUi {
        self.deps.ui.as_ref()
    }

    async fn run(
        &self,
        ctx: &mut RunContext<'_>,
        counters: &mut RunCounters,
    ) -> Result<AttemptOutcome, InstallError> {
        let application = self.request.application_name.as_str();
        let environment = self.environment();

        let project = self
            .deps
            .repository
            .discover(application)
            .await?
            .ok_or_else(|| {
                InstallError::configuration(format!(
                    "Unknown application '{}': must run discovery first",
                    application
                ))
            })?;

        if !self.request.parameter_overrides.is_empty() {
            self.ui()
                .info("Overriding parameters temporarily with provided ones!");
        }
        let base = self
            .deps
            .parameter_store
            .load(application, &environment)
            .await?;
        let mut params =
            EnvironmentParameters::merged(&environment, &base, &self.request.parameter_overrides);
        self.ensure_root_credentials(application, &base, &mut params)
            .await?;

        self.ui().info("Handling secrets retrieval!");
        let mut resolver = ParameterResolver::new(self.deps.secret_store.clone())?;
        let params = resolver.resolve(&params).await?;
        let mut sensitive: Vec<String> = resolver.cache().values().map(str::to_string).collect();
        sensitive.extend(params.password_root().map(str::to_string));

        let Some(plan) = self.select_versions(&project, &environment).await? else {
            return Ok(AttemptOutcome::Finished(InstallStatus::Stopped));
        };
        self.ui()
            .info(&format!("Found {} versions to install", plan.len()));

        let bindings = bindings_by_file(&project.parameter_files, &params);
        self.execute_plan(ctx, &project, &plan, &params, &bindings, &sensitive, counters)
            .await
    }

    fn environment(&self) -> String {
        match self
            .request
            .environment
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
        {
            Some(env) => env.to_string(),
            None => {
                let fallback = self.settings.default_environment.clone();
                self.ui().warning(&format!(
                    "No environment provided, the installation will be ran for {}",
                    fallback
                ));
                fallback
            }
        }
    }

    /// Prompt until `password_root` and `server` are non-empty, then persist them.
    async fn ensure_root_credentials(
        &self,
        application: &str,
        base: &ParameterMap,
        params: &mut EnvironmentParameters,
    ) -> Result<(), InstallError> {
        if params.has_root_credentials() {
            return Ok(());
        }

        while params.password_root().is_none() {
            let answer = self
                .ui()
                .question("Please provide the root password")
                .await?;
            params.set(PASSWORD_ROOT, answer);
        }
        while params.server().is_none() {
            let answer = self.ui().question("Please provide the server").await?;
            params.set(SERVER, answer.trim());
        }

        let mut persisted = base.clone();
        for key in [PASSWORD_ROOT, SERVER] {
            if let Some(value) = params.get(key) {
                persisted.insert(key.to_string(), value.to_string());
            }
        }
        self.deps
            .parameter_store
            .save(application, params.environment(), &persisted)
            .await?;
        info!(
            "[PHASE: parameters] [STEP: root_credentials] Root credentials stored for {}/{}",
            application,
            params.environment()
        );
        Ok(())
    }

    /// Ordered plan, or `None` when the operator declined.
    async fn select_versions(
        &self,
        project: &DatabaseProject,
        environment: &str,
    ) -> Result<Option<Vec<DatabaseVersion>>, InstallError> {
        let ordered = order_versions(project.versions.clone());

        let selected: Vec<DatabaseVersion> = match &self.request.version {
            VersionRequest::Exact(name) => ordered
                .into_iter()
                .filter(|v| &v.name == name)
                .take(1)
                .collect(),
            VersionRequest::Latest => ordered.last().cloned().into_iter().collect(),
            VersionRequest::All => {
                if self.settings.is_sensitive_environment(environment)
                    && !self.confirm_all_versions().await?
                {
                    info!(
                        "[PHASE: plan] [STEP: confirm] Installation of all versions on '{}' declined",
                        environment
                    );
                    return Ok(None);
                }
                ordered
            }
        };

        if selected.is_empty() {
            let what = match &self.request.version {
                VersionRequest::Exact(name) => format!("version '{}'", name),
                _ => "any version".to_string(),
            };
            return Err(InstallError::configuration(format!(
                "Application '{}' has no {}; run discovery again if it is missing",
                project.application_name, what
            )));
        }

        let names: Vec<&str> = selected.iter().map(|v| v.name.as_str()).collect();
        info!(
            "[PHASE: plan] [STEP: select_versions] Install order: {:?}",
            names
        );
        Ok(Some(selected))
    }

    async fn confirm_all_versions(&self) -> Result<bool, InstallError> {
        let first = self
            .ui()
            .choose(CONFIRM_ALL_PROMPT, &["Yes", "Wait..."])
            .await?;
        if first != "Yes" {
            return Ok(false);
        }
        let second = self
            .ui()
            .choose(CONFIRM_ALL_AGAIN_PROMPT, &["Yes", "No"])
            .await?;
        Ok(second == "Yes")
    }

    async fn execute_plan(
        &self,
        ctx: &mut RunContext<'_>,
        project: &DatabaseProject,
        plan: &[DatabaseVersion],
        params: &EnvironmentParameters,
        bindings: &HashMap<String, ParameterBinding>,
        sensitive: &[String],
        counters: &mut RunCounters,
    ) -> Result<AttemptOutcome, InstallError> {
        let ui = self.ui();
        let editor = self
            .deps
            .editor
            .as_deref()
            .filter(|_| self.settings.open_editor_on_failure);
        let recovery = FailureRecoveryController::new(ui, editor);

        let mut cursor = InstallationCursor::start();
        let mut active_unit: Option<(usize, usize)> = None;
        let mut consecutive_retries: u32 = 0;

        while cursor.carry_on {
            let Some(version) = plan.get(cursor.version_index) else {
                break;
            };
            let Some(sub_version) = version.sub_versions.get(cursor.sub_version_index) else {
                cursor.next_version();
                continue;
            };
            let title = format!("{} - {}", project.application_name, version.name);

            if active_unit != Some(cursor.unit()) {
                let count = version.sub_versions.len();
                let position = if count > 1 {
                    format!(" ({} of {})", cursor.sub_version_index + 1, count)
                } else {
                    String::new()
                };
                ui.info(&format!(
                    "Installing {} {}{}",
                    project.application_name, version.name, position
                ));

                let target = build_target(
                    sub_version,
                    params,
                    &project.db_name,
                    params.environment(),
                )?;
                ctx.point_at(target).await?;
                ui.start_progress(&title, sub_version.files.len() as u64, 0);
                active_unit = Some(cursor.unit());
            }

            let Some(file) = sub_version.files.get(cursor.file_index) else {
                ui.stop_progress();
                cursor.next_sub_version();
                continue;
            };

            match self.run_file(ctx, file, bindings, sensitive).await? {
                FileOutcome::Executed => {
                    counters.executed += 1;
                    consecutive_retries = 0;
                    cursor.advance_file();
                }
                FileOutcome::Skipped => {
                    counters.skipped += 1;
                    consecutive_retries = 0;
                    cursor.advance_file();
                }
                FileOutcome::Failed { content, error } => {
                    ui.stop_progress();
                    match recovery.decide(file, &content, &error).await? {
                        RecoveryDecision::RetrySameFile => {
                            consecutive_retries += 1;
                            if let Some(max) = self.settings.max_file_retries {
                                if consecutive_retries > max {
                                    let msg = format!(
                                        "Retry limit reached for {} ({}); stopping the installation",
                                        file.name, max
                                    );
                                    warn!("[PHASE: recovery] [STEP: retry] {}", msg);
                                    ui.warning(&msg);
                                    cursor.stop();
                                    continue;
                                }
                            }
                            ui.start_progress(
                                &title,
                                sub_version.files.len() as u64,
                                cursor.file_index as u64,
                            );
                            continue;
                        }
                        RecoveryDecision::RestartInstallation => {
                            return Ok(AttemptOutcome::Restart);
                        }
                        RecoveryDecision::Stop => {
                            cursor.stop();
                            continue;
                        }
                    }
                }
            }

            let next = sub_version.files.get(cursor.file_index).map(|f| f.name.as_str());
            ui.progress(cursor.file_index as u64, next);
        }

        ui.stop_progress();
        let status = if cursor.carry_on {
            InstallStatus::Completed
        } else {
            InstallStatus::Stopped
        };
        Ok(AttemptOutcome::Finished(status))
    }

    async fn run_file(
        &self,
        ctx: &mut RunContext<'_>,
        file: &SqlFile,
        bindings: &HashMap<String, ParameterBinding>,
        sensitive: &[String],
    ) -> Result<FileOutcome, InstallError> {
        let raw = file.load().await?;
        let content = match bindings.get(&file.name) {
            Some(binding) => substitute_placeholders(&raw, binding),
            None => raw,
        };

        if content.trim().is_empty() {
            self.ui()
                .warning(&format!("File \"{}\" is empty - ignoring", file.name));
            return Ok(FileOutcome::Skipped);
        }

        let started = Instant::now();
        match ctx.execute(&content).await {
            Ok(()) => {
                info!(
                    "[PHASE: execute] [STEP: file] Executed {} (sha256={}, {} ms)",
                    file.name,
                    sha256_hex(content.as_bytes()),
                    started.elapsed().as_millis()
                );
                Ok(FileOutcome::Executed)
            }
            Err(error) => {
                let error = error.redacted(sensitive);
                warn!(
                    "[PHASE: execute] [STEP: file] {} failed after {} ms: {}",
                    file.name,
                    started.elapsed().as_millis(),
                    error
                );
                debug!(
                    "[PHASE: execute] [STEP: file] Failed content digest sha256={}",
                    sha256_hex(content.as_bytes())
                );
                Ok(FileOutcome::Failed { content, error })
            }
        }
    }
}
