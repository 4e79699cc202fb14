//! Deletes task run events that fell out of the retention window.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError},
};
use crate::event_log::{RetentionPruner, SettingsHandle};
use crate::tasks::{PRUNE_TASK_NAME, PRUNE_TASK_TYPE};
use tracing::info;

pub struct PruneTaskEventsJob {
    pruner: RetentionPruner,
    settings: SettingsHandle,
}

impl PruneTaskEventsJob {
    pub fn new(pruner: RetentionPruner, settings: SettingsHandle) -> Self {
        Self { pruner, settings }
    }
}

impl BackgroundJob for PruneTaskEventsJob {
    fn task_type(&self) -> &str {
        PRUNE_TASK_TYPE
    }

    fn name(&self) -> &str {
        PRUNE_TASK_NAME
    }

    fn description(&self) -> &str {
        "Delete task run events older than the configured retention"
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let retention_days = self.settings.snapshot().retention_days;
        let deleted = self
            .pruner
            .prune(retention_days)
            .map_err(|e| JobError::from_error(&e))?;

        if deleted == 0 {
            info!("No task run events to prune");
        }
        Ok(())
    }
}
