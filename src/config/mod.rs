mod file_config;

pub use file_config::{FileConfig, TaskConfig};

use crate::actors::AdminIdentity;
use crate::event_log::{EventLogSettings, MAX_RETENTION_DAYS};
use crate::server::RequestsLoggingLevel;
use crate::tasks::NewTask;
use anyhow::{anyhow, bail, Result};
use chrono::FixedOffset;
use clap::ValueEnum;
use std::collections::HashSet;
use std::path::PathBuf;

/// Largest display offset accepted, in minutes (UTC+14:00).
const MAX_DISPLAY_OFFSET_MINUTES: i32 = 14 * 60;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub display_utc_offset_minutes: i32,
    pub scheduler_enabled: bool,
    pub retention_days: u32,
    pub logging_disabled: bool,
    pub prune_interval_hours: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub display_offset: FixedOffset,
    pub scheduler_enabled: bool,

    /// Settings written on first start. Persisted settings win afterwards.
    pub event_log_defaults: EventLogSettings,
    pub prune_interval_hours: u64,

    pub admins: Vec<AdminIdentity>,
    pub tasks: Vec<NewTask>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| anyhow!("db_dir must be specified via --db-dir or in config file"))?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let offset_minutes = file
            .display_utc_offset_minutes
            .unwrap_or(cli.display_utc_offset_minutes);
        let display_offset = parse_display_offset(offset_minutes)?;

        let scheduler_enabled = file.scheduler_enabled.unwrap_or(cli.scheduler_enabled);

        let retention_days = file.retention_days.unwrap_or(cli.retention_days);
        if retention_days == 0 {
            bail!("retention_days must be greater than zero");
        }
        if retention_days > MAX_RETENTION_DAYS {
            bail!("retention_days must be at most {}", MAX_RETENTION_DAYS);
        }
        let logging_disabled = file.logging_disabled.unwrap_or(cli.logging_disabled);

        let prune_interval_hours = file
            .prune_interval_hours
            .unwrap_or(cli.prune_interval_hours);
        if prune_interval_hours == 0 {
            bail!("prune_interval_hours must be greater than zero");
        }

        validate_admins(&file.admins)?;
        let tasks = resolve_tasks(file.tasks)?;

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            display_offset,
            scheduler_enabled,
            event_log_defaults: EventLogSettings {
                logging_disabled,
                retention_days,
            },
            prune_interval_hours,
            admins: file.admins,
            tasks,
        })
    }

    pub fn event_log_db_path(&self) -> PathBuf {
        self.db_dir.join("event_log.db")
    }

    pub fn tasks_db_path(&self) -> PathBuf {
        self.db_dir.join("tasks.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

pub fn parse_display_offset(minutes: i32) -> Result<FixedOffset> {
    if minutes.abs() > MAX_DISPLAY_OFFSET_MINUTES {
        bail!(
            "Display UTC offset of {} minutes is out of range (max +/-{})",
            minutes,
            MAX_DISPLAY_OFFSET_MINUTES
        );
    }
    FixedOffset::east_opt(minutes * 60)
        .ok_or_else(|| anyhow!("Invalid display UTC offset: {} minutes", minutes))
}

fn validate_admins(admins: &[AdminIdentity]) -> Result<()> {
    let mut tokens = HashSet::new();
    let mut actor_ids = HashSet::new();
    for admin in admins {
        if admin.token.trim().is_empty() {
            bail!("Admin {} has an empty token", admin.label);
        }
        if admin.actor_id <= 0 {
            bail!("Admin {} must have a positive actor_id", admin.label);
        }
        if !tokens.insert(admin.token.as_str()) {
            bail!("Duplicate admin token for {}", admin.label);
        }
        if !actor_ids.insert(admin.actor_id) {
            bail!("Duplicate admin actor_id {}", admin.actor_id);
        }
    }
    Ok(())
}

fn resolve_tasks(tasks: Vec<TaskConfig>) -> Result<Vec<NewTask>> {
    let mut types = HashSet::new();
    tasks
        .into_iter()
        .map(|task| {
            if task.task_type.trim().is_empty() {
                bail!("Task {} has an empty task_type", task.name);
            }
            if task.interval_secs == 0 {
                bail!("Task {} must have interval_secs greater than zero", task.name);
            }
            if !types.insert(task.task_type.clone()) {
                bail!("Duplicate task_type {}", task.task_type);
            }
            Ok(NewTask {
                name: task.name,
                task_type: task.task_type,
                interval_secs: task.interval_secs,
                enabled: task.enabled,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_temp_db_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn cli_for(dir: &TempDir) -> CliConfig {
        CliConfig {
            db_dir: Some(dir.path().to_path_buf()),
            port: 3002,
            metrics_port: 9092,
            logging_level: RequestsLoggingLevel::Path,
            display_utc_offset_minutes: 0,
            scheduler_enabled: true,
            retention_days: 14,
            logging_disabled: false,
            prune_interval_hours: 24,
        }
    }

    fn admin(token: &str, actor_id: i64) -> AdminIdentity {
        AdminIdentity {
            token: token.to_string(),
            actor_id,
            label: format!("admin{}@example.com", actor_id),
        }
    }

    #[test]
    fn test_parse_logging_level() {
        assert!(matches!(
            parse_logging_level("none"),
            Some(RequestsLoggingLevel::None)
        ));
        assert!(matches!(
            parse_logging_level("PATH"),
            Some(RequestsLoggingLevel::Path)
        ));
        assert!(matches!(
            parse_logging_level("body"),
            Some(RequestsLoggingLevel::Body)
        ));
        assert!(parse_logging_level("invalid").is_none());
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = make_temp_db_dir();
        let config = AppConfig::resolve(&cli_for(&temp_dir), None).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 3002);
        assert_eq!(config.metrics_port, 9092);
        assert_eq!(config.display_offset, FixedOffset::east_opt(0).unwrap());
        assert_eq!(config.event_log_defaults, EventLogSettings::default());
        assert_eq!(config.prune_interval_hours, 24);
        assert!(config.scheduler_enabled);
        assert!(config.admins.is_empty());
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/should/be/overridden")),
            ..cli_for(&temp_dir)
        };
        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            port: Some(4000),
            logging_level: Some("body".to_string()),
            retention_days: Some(30),
            logging_disabled: Some(true),
            display_utc_offset_minutes: Some(120),
            admins: vec![admin("t1", 1)],
            tasks: vec![TaskConfig {
                name: "Send emails".to_string(),
                task_type: "send_emails".to_string(),
                interval_secs: 60,
                enabled: true,
            }],
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 4000);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Body);
        assert_eq!(config.event_log_defaults.retention_days, 30);
        assert!(config.event_log_defaults.logging_disabled);
        assert_eq!(config.display_offset, FixedOffset::east_opt(7200).unwrap());
        assert_eq!(config.admins.len(), 1);
        assert_eq!(config.tasks[0].task_type, "send_emails");
        // CLI value used when TOML doesn't specify
        assert_eq!(config.metrics_port, 9092);
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            retention_days: 14,
            prune_interval_hours: 24,
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_zero_retention_rejected() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            retention_days: 0,
            ..cli_for(&temp_dir)
        };
        assert!(AppConfig::resolve(&cli, None).is_err());

        let file_config = FileConfig {
            prune_interval_hours: Some(0),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli_for(&temp_dir), Some(file_config)).is_err());

        let file_config = FileConfig {
            retention_days: Some(MAX_RETENTION_DAYS + 1),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli_for(&temp_dir), Some(file_config)).is_err());
    }

    #[test]
    fn test_display_offset_bounds() {
        assert!(parse_display_offset(14 * 60).is_ok());
        assert!(parse_display_offset(-14 * 60).is_ok());
        assert!(parse_display_offset(14 * 60 + 1).is_err());
        assert_eq!(
            parse_display_offset(-90).unwrap(),
            FixedOffset::west_opt(90 * 60).unwrap()
        );
    }

    #[test]
    fn test_duplicate_admins_rejected() {
        let temp_dir = make_temp_db_dir();
        for admins in [
            vec![admin("same", 1), admin("same", 2)],
            vec![admin("a", 1), admin("b", 1)],
            vec![admin("  ", 1)],
            vec![admin("a", 0)],
        ] {
            let file_config = FileConfig {
                admins,
                ..Default::default()
            };
            assert!(AppConfig::resolve(&cli_for(&temp_dir), Some(file_config)).is_err());
        }
    }

    #[test]
    fn test_invalid_tasks_rejected() {
        let temp_dir = make_temp_db_dir();
        let task = |task_type: &str, interval_secs| TaskConfig {
            name: "t".to_string(),
            task_type: task_type.to_string(),
            interval_secs,
            enabled: true,
        };
        for tasks in [
            vec![task("a", 0)],
            vec![task("", 10)],
            vec![task("a", 10), task("a", 20)],
        ] {
            let file_config = FileConfig {
                tasks,
                ..Default::default()
            };
            assert!(AppConfig::resolve(&cli_for(&temp_dir), Some(file_config)).is_err());
        }
    }

    #[test]
    fn test_db_path_helpers() {
        let temp_dir = make_temp_db_dir();
        let config = AppConfig::resolve(&cli_for(&temp_dir), None).unwrap();

        assert_eq!(config.event_log_db_path(), temp_dir.path().join("event_log.db"));
        assert_eq!(config.tasks_db_path(), temp_dir.path().join("tasks.db"));
    }
}
