// Schema installer
// Library entry point: wires settings, logging and collaborators, then runs one installation

pub mod cli;
pub mod database;
pub mod error;
pub mod installation;
pub mod models;
pub mod repository;
pub mod secrets;
pub mod security;
pub mod ui;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use cli::CliOptions;
use database::executor::PostgresExecutor;
use installation::{Collaborators, InstallStatus, InstallationOrchestrator};
use log::{error, info};
use models::settings::InstallerSettings;
use repository::{FileParameterStore, FsRepositoryReader};
use secrets::store::AwsSecretStore;
use security::secret_protector::{default_key_path, SecretProtector};
use std::path::Path;
use std::sync::Arc;
use ui::{ConsoleUi, EditorSurface, InteractiveUi, SystemEditor};
use uuid::Uuid;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FATAL: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Initialize logging system with dual format (JSON + human-readable)
fn init_logging(
    log_dir: &Path,
    with_stdout: bool,
    run_id: Uuid,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");
    let json_log_file = log_dir.join(format!("installer-{}.log", timestamp));
    let txt_log_file = log_dir.join(format!("installer-{}.txt", timestamp));
    let run_id = run_id.to_string();

    let mut dispatch = fern::Dispatch::new()
        .level(log::LevelFilter::Debug)
        // sqlx and the AWS SDK are chatty at debug
        .level_for("sqlx", log::LevelFilter::Warn)
        .level_for("aws_config", log::LevelFilter::Warn)
        .level_for("aws_smithy_runtime", log::LevelFilter::Warn);

    if with_stdout {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .level(log::LevelFilter::Info)
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}", txt_line));
                })
                .chain(std::io::stderr()),
        );
    }

    dispatch = dispatch
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_utc = chrono::Utc::now().to_rfc3339();
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let json_line = utils::logging::format_json_log(
                        &timestamp_utc,
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                        Some(&run_id),
                    );
                    out.finish(format_args!("{}\n", json_line));
                })
                .chain(fern::log_file(json_log_file)?),
        )
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}\n", txt_line));
                })
                .chain(fern::log_file(txt_log_file)?),
        );

    dispatch.apply()?;

    log::info!(
        "[PHASE: initialization] Logging initialized, log directory: {:?}",
        log_dir
    );
    Ok(())
}

/// Parse arguments, run one installation and return the process exit code.
pub fn run(args: Vec<String>) -> i32 {
    let options = match CliOptions::parse(args.get(1..).unwrap_or_default()) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}\n{}", message, cli::USAGE);
            return EXIT_USAGE;
        }
    };
    if options.help {
        println!("{}", cli::USAGE);
        return EXIT_OK;
    }

    let mut settings = match InstallerSettings::load(options.config_path.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings: {:#}", e);
            return EXIT_FATAL;
        }
    };
    if let Some(dir) = options.projects_dir.clone() {
        settings.projects_dir = dir;
    }

    let run_id = Uuid::new_v4();
    let state_dir = utils::path_resolver::resolve_state_dir(&settings);
    match utils::path_resolver::resolve_log_folder(&state_dir) {
        Ok(log_dir) => {
            if let Err(e) = init_logging(&log_dir, options.verbose, run_id) {
                eprintln!("Failed to initialize logging: {}", e);
            }
        }
        Err(e) => eprintln!("Failed to resolve log folder: {:#}", e),
    }

    info!(
        "[PHASE: initialization] Installer run {} starting at {} (state dir {:?})",
        run_id,
        chrono::Utc::now(),
        state_dir
    );

    let console: Arc<dyn InteractiveUi> = Arc::new(ConsoleUi::new());
    let editor: Arc<dyn EditorSurface> = Arc::new(SystemEditor::new(settings.editor.clone()));
    let protector = Arc::new(SecretProtector::new(default_key_path(&state_dir)));
    let deps = Collaborators {
        repository: Arc::new(FsRepositoryReader::new(settings.projects_dir.clone())),
        parameter_store: Arc::new(FileParameterStore::new(state_dir.clone(), protector)),
        secret_store: Arc::new(AwsSecretStore::new()),
        ui: console.clone(),
        editor: Some(editor),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("[PHASE: initialization] Failed to build tokio runtime: {}", e);
            eprintln!("Failed to start async runtime: {}", e);
            return EXIT_FATAL;
        }
    };

    let request = options.to_request();
    let mut orchestrator =
        InstallationOrchestrator::new(deps, settings, Box::new(PostgresExecutor::default()))
            .with_run_id(run_id);

    match runtime.block_on(orchestrator.install(&request)) {
        Ok(report) => {
            let summary = format!(
                "{:?}: {} file(s) executed, {} skipped, {} attempt(s)",
                report.status, report.files_executed, report.files_skipped, report.attempts
            );
            match report.status {
                InstallStatus::Completed => console.info(&summary),
                InstallStatus::Stopped => console.warning(&summary),
            }
            EXIT_OK
        }
        Err(e) => {
            console.error(&e.to_string());
            e.exit_code()
        }
    }
}
