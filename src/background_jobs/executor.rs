use super::context::{JobContext, RunTrigger};
use super::job::{BackgroundJob, JobError};
use crate::clock::Clock;
use crate::server::metrics;
use crate::tasks::{TaskDefinition, TaskRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs task bodies on behalf of the host.
///
/// Knows nothing about the event log: it keeps the registry's own
/// bookkeeping (last start, end and success) and reports the outcome.
pub struct JobExecutor {
    jobs: HashMap<String, Arc<dyn BackgroundJob>>,
    registry: Arc<dyn TaskRegistry>,
    clock: Arc<dyn Clock>,
    shutdown_token: CancellationToken,
}

impl JobExecutor {
    pub fn new(
        registry: Arc<dyn TaskRegistry>,
        clock: Arc<dyn Clock>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            jobs: HashMap::new(),
            registry,
            clock,
            shutdown_token,
        }
    }

    pub fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        info!(
            "Registering job for task type {}: {} - {}",
            job.task_type(),
            job.name(),
            job.description()
        );
        if self.jobs.insert(job.task_type().to_string(), job).is_some() {
            warn!("A previously registered job was replaced");
        }
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn registry(&self) -> &Arc<dyn TaskRegistry> {
        &self.registry
    }

    /// Runs the body of `task` exactly once.
    pub async fn run(&self, task: &TaskDefinition, trigger: RunTrigger) -> Result<(), JobError> {
        if let Err(e) = self.registry.record_task_started(task.id, self.clock.now()) {
            warn!("Failed to record start of task {}: {:#}", task.id, e);
        }

        info!(
            "Running task {} ({}) triggered by {}",
            task.id,
            task.task_type,
            trigger.label()
        );
        let start_time = Instant::now();
        let result = match self.jobs.get(&task.task_type) {
            None => Err(JobError::NotRegistered(task.task_type.clone())),
            Some(job) => {
                let job = Arc::clone(job);
                let ctx = JobContext::new(self.shutdown_token.child_token(), task.clone(), trigger);
                match tokio::task::spawn_blocking(move || job.execute(&ctx)).await {
                    Ok(result) => result,
                    Err(e) => Err(JobError::Panicked(e.to_string())),
                }
            }
        };
        let elapsed = start_time.elapsed();

        let outcome = match &result {
            Ok(()) => {
                info!("Task {} completed successfully in {:?}", task.id, elapsed);
                "success"
            }
            Err(e) => {
                error!("Task {} failed after {:?}: {}", task.id, elapsed, e);
                e.outcome()
            }
        };
        metrics::record_task_run(&task.task_type, trigger.label(), outcome, elapsed);

        if let Err(e) = self
            .registry
            .record_task_finished(task.id, self.clock.now(), result.is_ok())
        {
            warn!("Failed to record end of task {}: {:#}", task.id, e);
        }

        result
    }
}
