use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::{fmt::Debug, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use schedule_task_log::actors::AdminDirectory;
use schedule_task_log::background_jobs::jobs::PruneTaskEventsJob;
use schedule_task_log::background_jobs::{JobExecutor, JobScheduler};
use schedule_task_log::clock::{Clock, SystemClock};
use schedule_task_log::config::{self, AppConfig, FileConfig};
use schedule_task_log::event_log::{RetentionPruner, SettingsHandle, SqliteEventStore};
use schedule_task_log::server::{make_app, metrics, run_server, RequestsLoggingLevel};
use schedule_task_log::server::{ServerConfig, ServerState};
use schedule_task_log::tasks::{
    install_prune_task, seed_configured_tasks, uninstall_prune_task, SqliteTaskRegistry,
};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing database files (event_log.db, tasks.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3002)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9092)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Default UTC offset, in minutes, dates are displayed in.
    #[clap(long, default_value_t = 0, allow_negative_numbers = true)]
    pub display_utc_offset_minutes: i32,

    /// Do not start the task scheduler. Tasks only run when triggered over HTTP.
    #[clap(long)]
    pub no_scheduler: bool,

    /// Days of task run events to keep. Only applied on first start.
    #[clap(long, default_value_t = 14)]
    pub retention_days: u32,

    /// Start with task run logging disabled. Only applied on first start.
    #[clap(long)]
    pub logging_disabled: bool,

    /// Interval in hours of the prune task, when it gets installed.
    #[clap(long, default_value_t = 24)]
    pub prune_interval_hours: u64,

    /// Remove the prune task and the persisted event log settings, then exit.
    #[clap(long)]
    pub uninstall: bool,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            display_utc_offset_minutes: args.display_utc_offset_minutes,
            scheduler_enabled: !args.no_scheduler,
            retention_days: args.retention_days,
            logging_disabled: args.logging_disabled,
            prune_interval_hours: args.prune_interval_hours,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&config::CliConfig::from(&cli_args), file_config)?;

    info!("Opening event log at {:?}", app_config.event_log_db_path());
    let event_store = Arc::new(SqliteEventStore::new(app_config.event_log_db_path())?);
    info!("Opening task registry at {:?}", app_config.tasks_db_path());
    let registry = Arc::new(SqliteTaskRegistry::new(app_config.tasks_db_path())?);

    if cli_args.uninstall {
        uninstall_prune_task(registry.as_ref())?;
        SettingsHandle::uninstall(event_store.as_ref())?;
        info!("Event log uninstalled");
        return Ok(());
    }

    SettingsHandle::install_defaults(event_store.as_ref(), &app_config.event_log_defaults)?;
    install_prune_task(registry.as_ref(), app_config.prune_interval_hours)?;
    let seeded = seed_configured_tasks(registry.as_ref(), &app_config.tasks)?;
    if seeded > 0 {
        info!("Registered {} configured tasks", seeded);
    }
    let settings = SettingsHandle::load(event_store.clone(), app_config.event_log_defaults)?;
    let current = settings.snapshot();
    info!(
        "Event log settings: logging_disabled={}, retention_days={}",
        current.logging_disabled, current.retention_days
    );

    metrics::init_metrics();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let shutdown_token = CancellationToken::new();

    let mut executor = JobExecutor::new(registry.clone(), clock.clone(), shutdown_token.clone());
    executor.register_job(Arc::new(PruneTaskEventsJob::new(
        RetentionPruner::new(event_store.clone(), clock.clone()),
        settings.clone(),
    )));

    if app_config.admins.is_empty() {
        warn!("No admins configured, every admin route will respond 403");
    }
    let admins = Arc::new(AdminDirectory::new(app_config.admins.clone()));

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        display_offset: app_config.display_offset,
    };
    let state = ServerState::new(
        server_config.clone(),
        event_store,
        settings,
        Arc::new(executor),
        admins,
        clock.clone(),
    );
    let app = make_app(state);

    let scheduler_handle = if app_config.scheduler_enabled {
        let mut scheduler =
            JobScheduler::new(registry, app.clone(), clock, shutdown_token.clone());
        Some(tokio::spawn(async move { scheduler.run().await }))
    } else {
        info!("Scheduler disabled");
        None
    };

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);

    let result = tokio::select! {
        result = run_server(app, &server_config, shutdown_token.clone()) => {
            info!("HTTP server stopped: {:?}", result);
            result
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            Ok(())
        }
    };

    shutdown_token.cancel();
    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            error!("Scheduler task failed: {}", e);
        }
    }

    result
}
