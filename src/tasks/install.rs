//! Registration of the tasks the event log itself depends on.

use super::{NewTask, TaskRegistry};
use anyhow::Result;
use tracing::info;

pub const PRUNE_TASK_NAME: &str = "Prune schedule task log";
pub const PRUNE_TASK_TYPE: &str = "schedule_task_log.prune_events";

/// Registers the prune task unless a task of its type already exists.
/// Returns the id of the newly inserted task.
pub fn install_prune_task(registry: &dyn TaskRegistry, interval_hours: u64) -> Result<Option<i64>> {
    if registry.get_task_by_type(PRUNE_TASK_TYPE)?.is_some() {
        return Ok(None);
    }
    let id = registry.insert_task(&NewTask {
        name: PRUNE_TASK_NAME.to_string(),
        task_type: PRUNE_TASK_TYPE.to_string(),
        interval_secs: interval_hours.saturating_mul(60 * 60),
        enabled: true,
    })?;
    info!("Installed prune task with id {}", id);
    Ok(Some(id))
}

pub fn uninstall_prune_task(registry: &dyn TaskRegistry) -> Result<bool> {
    match registry.get_task_by_type(PRUNE_TASK_TYPE)? {
        Some(task) => {
            let deleted = registry.delete_task(task.id)?;
            info!("Removed prune task {}", task.id);
            Ok(deleted)
        }
        None => Ok(false),
    }
}

/// Inserts every task whose type is not registered yet. Existing tasks are
/// left as they are. Returns how many were inserted.
pub fn seed_configured_tasks(registry: &dyn TaskRegistry, tasks: &[NewTask]) -> Result<usize> {
    let mut inserted = 0;
    for task in tasks {
        if registry.get_task_by_type(&task.task_type)?.is_none() {
            registry.insert_task(task)?;
            inserted += 1;
        }
    }
    Ok(inserted)
}
