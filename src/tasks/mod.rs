//! Scheduled task definitions as known to the host.

mod install;
mod schema;
mod sqlite_task_registry;

pub use install::{
    install_prune_task, seed_configured_tasks, uninstall_prune_task, PRUNE_TASK_NAME,
    PRUNE_TASK_TYPE,
};
pub use sqlite_task_registry::SqliteTaskRegistry;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDefinition {
    pub id: i64,
    pub name: String,
    /// Identifies the body that runs this task. Unique across tasks.
    pub task_type: String,
    pub interval_secs: u64,
    pub enabled: bool,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_ended_at: Option<DateTime<Utc>>,
    pub last_succeeded_at: Option<DateTime<Utc>>,
}

impl TaskDefinition {
    /// Whether the scheduler should start this task at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_due_at().is_some_and(|due| due <= now)
    }

    /// The next instant this task becomes due. A task that never ran is due
    /// from the beginning of time; a disabled one never is.
    pub fn next_due_at(&self) -> Option<DateTime<Utc>> {
        if !self.enabled {
            return None;
        }
        match self.last_started_at {
            None => Some(DateTime::<Utc>::MIN_UTC),
            Some(last) => i64::try_from(self.interval_secs)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .and_then(|interval| last.checked_add_signed(interval)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub name: String,
    pub task_type: String,
    pub interval_secs: u64,
    pub enabled: bool,
}

pub trait TaskRegistry: Send + Sync {
    /// Returns Ok(None) if the task does not exist.
    fn get_task(&self, id: i64) -> Result<Option<TaskDefinition>>;

    /// Exact, case-sensitive match on the task type.
    fn get_task_by_type(&self, task_type: &str) -> Result<Option<TaskDefinition>>;

    /// All tasks ordered by id.
    fn list_tasks(&self) -> Result<Vec<TaskDefinition>>;

    /// Inserts a new task and returns its id. Fails if the type is taken.
    fn insert_task(&self, task: &NewTask) -> Result<i64>;

    /// Returns false if there was nothing to delete.
    fn delete_task(&self, id: i64) -> Result<bool>;

    fn record_task_started(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    fn record_task_finished(&self, id: i64, at: DateTime<Utc>, succeeded: bool) -> Result<()>;
}
