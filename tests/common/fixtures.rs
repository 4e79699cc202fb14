//! Test fixture creation
//!
//! Creates the databases a test server runs against, seeded with a known set
//! of tasks, and the task bodies registered for them.

use super::constants::*;
use anyhow::Result;
use schedule_task_log::background_jobs::{BackgroundJob, JobContext, JobError};
use schedule_task_log::event_log::{EventLogSettings, SettingsHandle, SqliteEventStore};
use schedule_task_log::tasks::{
    install_prune_task, seed_configured_tasks, NewTask, SqliteTaskRegistry,
};
use std::sync::Arc;
use tempfile::TempDir;

/// A task body with a fixed outcome
pub struct ScriptedJob {
    task_type: &'static str,
    failure: Option<&'static str>,
}

impl BackgroundJob for ScriptedJob {
    fn task_type(&self) -> &str {
        self.task_type
    }

    fn name(&self) -> &str {
        self.task_type
    }

    fn description(&self) -> &str {
        "Scripted test job"
    }

    fn execute(&self, _ctx: &JobContext) -> Result<(), JobError> {
        match self.failure {
            Some(message) => Err(JobError::failed(message)),
            None => Ok(()),
        }
    }
}

pub fn test_jobs() -> Vec<Arc<dyn BackgroundJob>> {
    vec![
        Arc::new(ScriptedJob {
            task_type: SEND_EMAILS_TASK_TYPE,
            failure: None,
        }),
        Arc::new(ScriptedJob {
            task_type: SYNC_FEEDS_TASK_TYPE,
            failure: Some(FAILING_TASK_MESSAGE),
        }),
    ]
}

fn seeded_task(name: &str, task_type: &str) -> NewTask {
    NewTask {
        name: name.to_string(),
        task_type: task_type.to_string(),
        interval_secs: 3600,
        enabled: true,
    }
}

/// Creates both databases in a fresh temp dir, installed the way the server
/// binary installs them on first start.
pub fn create_test_stores(
    settings: EventLogSettings,
) -> Result<(TempDir, Arc<SqliteEventStore>, Arc<SqliteTaskRegistry>)> {
    let temp_dir = TempDir::new()?;
    let event_store = Arc::new(SqliteEventStore::new(temp_dir.path().join("event_log.db"))?);
    let registry = Arc::new(SqliteTaskRegistry::new(temp_dir.path().join("tasks.db"))?);

    SettingsHandle::install_defaults(event_store.as_ref(), &settings)?;
    install_prune_task(registry.as_ref(), 24)?;
    seed_configured_tasks(
        registry.as_ref(),
        &[
            seeded_task(SEND_EMAILS_TASK_NAME, SEND_EMAILS_TASK_TYPE),
            seeded_task(SYNC_FEEDS_TASK_NAME, SYNC_FEEDS_TASK_TYPE),
            seeded_task(ORPHAN_TASK_NAME, ORPHAN_TASK_TYPE),
        ],
    )?;

    Ok((temp_dir, event_store, registry))
}
