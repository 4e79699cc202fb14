//! Best-effort recording of task runs.
//!
//! Every method here swallows its own failures: they are reported through
//! `tracing` and the recorder-failure metric, and the caller gets `None`
//! back. A broken log store must never stop the task being logged.

use super::{EventStore, TaskFailure, TaskRunEvent};
use crate::clock::Clock;
use crate::server::metrics;
use crate::tasks::TaskDefinition;
use std::sync::Arc;
use tracing::{debug, error};

pub struct EventRecorder {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
}

impl EventRecorder {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Opens an in-memory event for a run of `task`. Nothing is persisted yet.
    ///
    /// `None` means this run will not be logged; the task should still run.
    pub fn record_start(
        &self,
        task: &TaskDefinition,
        actor_id: Option<i64>,
    ) -> Option<TaskRunEvent> {
        match TaskRunEvent::start(self.clock.as_ref(), task.id) {
            Ok(event) => Some(match actor_id {
                Some(actor_id) => event.mark_manual(actor_id),
                None => event,
            }),
            Err(e) => {
                error!(
                    "Failed to start event for task {} ({}): {}",
                    task.id, task.name, e
                );
                metrics::record_recorder_failure("start");
                None
            }
        }
    }

    pub fn record_end(&self, event: Option<TaskRunEvent>) -> Option<TaskRunEvent> {
        let event = event?;
        let task_id = event.task_id;
        let finished = event.end(self.clock.as_ref());
        self.persist(task_id, "end", finished)
    }

    pub fn record_error(
        &self,
        event: Option<TaskRunEvent>,
        failure: Option<&TaskFailure>,
    ) -> Option<TaskRunEvent> {
        let event = event?;
        let task_id = event.task_id;
        let finished = event.fail(self.clock.as_ref(), failure);
        self.persist(task_id, "error", finished)
    }

    fn persist(
        &self,
        task_id: i64,
        operation: &'static str,
        finished: Result<TaskRunEvent, super::EventLogError>,
    ) -> Option<TaskRunEvent> {
        let mut event = match finished {
            Ok(event) => event,
            Err(e) => {
                error!("Failed to {} event for task {}: {}", operation, task_id, e);
                metrics::record_recorder_failure(operation);
                return None;
            }
        };

        match self.store.insert_event(&event) {
            Ok(id) => {
                event.id = Some(id);
                debug!(
                    "Recorded task run event {} for task {} ({}ms, error={})",
                    id,
                    task_id,
                    event.duration_ms.unwrap_or_default(),
                    event.is_error
                );
                Some(event)
            }
            Err(e) => {
                error!(
                    "Failed to persist {} event for task {}: {:#}",
                    operation, task_id, e
                );
                metrics::record_recorder_failure(operation);
                None
            }
        }
    }
}
