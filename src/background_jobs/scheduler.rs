use crate::clock::Clock;
use crate::tasks::{TaskDefinition, TaskRegistry};
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

/// Longest the scheduler sleeps without re-reading the registry.
const MAX_SLEEP: Duration = Duration::from_secs(60);
/// Re-check interval while something is in flight.
const IN_FLIGHT_POLL: Duration = Duration::from_secs(1);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Starts due tasks on a timer.
///
/// Runs are dispatched as `POST /scheduletask/runtask?taskType=..` against
/// the in-process router, exactly like an external caller would.
pub struct JobScheduler {
    registry: Arc<dyn TaskRegistry>,
    router: Router,
    clock: Arc<dyn Clock>,
    shutdown_token: CancellationToken,

    /// Dispatches that have not completed yet, by task id.
    in_flight: HashMap<i64, JoinHandle<()>>,
}

impl JobScheduler {
    pub fn new(
        registry: Arc<dyn TaskRegistry>,
        router: Router,
        clock: Arc<dyn Clock>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            registry,
            router,
            clock,
            shutdown_token,
            in_flight: HashMap::new(),
        }
    }

    /// Main scheduler loop.
    pub async fn run(&mut self) {
        info!("Starting task scheduler");

        loop {
            self.cleanup_completed().await;

            let sleep_duration = self.time_until_next_due();
            debug!(
                "Scheduler sleeping for {:?} until next due task",
                sleep_duration
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.dispatch_due_tasks();
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Task scheduler stopped");
    }

    fn load_tasks(&self) -> Vec<TaskDefinition> {
        match self.registry.list_tasks() {
            Ok(tasks) => tasks,
            Err(e) => {
                error!("Failed to load tasks: {:#}", e);
                Vec::new()
            }
        }
    }

    fn time_until_next_due(&self) -> Duration {
        let mut min_duration = if self.in_flight.is_empty() {
            MAX_SLEEP
        } else {
            IN_FLIGHT_POLL
        };

        let now = self.clock.now();
        for task in self.load_tasks() {
            if self.in_flight.contains_key(&task.id) {
                continue;
            }
            if let Some(next_run) = task.next_due_at() {
                if next_run <= now {
                    return Duration::ZERO;
                }
                let duration = (next_run - now).to_std().unwrap_or(Duration::from_secs(1));
                min_duration = min_duration.min(duration);
            }
        }

        min_duration
    }

    /// Dispatches every due task that is not already in flight.
    /// Returns the ids of the dispatched tasks.
    fn dispatch_due_tasks(&mut self) -> Vec<i64> {
        let now = self.clock.now();
        let due: Vec<TaskDefinition> = self
            .load_tasks()
            .into_iter()
            .filter(|task| !self.in_flight.contains_key(&task.id) && task.is_due(now))
            .collect();

        let mut dispatched = Vec::with_capacity(due.len());
        for task in due {
            dispatched.push(task.id);
            self.dispatch(task);
        }
        dispatched
    }

    fn dispatch(&mut self, task: TaskDefinition) {
        let uri = format!(
            "/scheduletask/runtask?taskType={}",
            urlencoding::encode(&task.task_type)
        );
        let request = match Request::builder()
            .method(Method::POST)
            .uri(&uri)
            .body(Body::empty())
        {
            Ok(request) => request,
            Err(e) => {
                error!("Failed to build dispatch request for task {}: {}", task.id, e);
                return;
            }
        };

        info!("Dispatching task {} ({})", task.id, task.name);
        let router = self.router.clone();
        let task_id = task.id;
        let handle = tokio::spawn(async move {
            match router.oneshot(request).await {
                Ok(response) if response.status().is_success() => {
                    debug!("Task {} dispatch returned {}", task_id, response.status());
                }
                Ok(response) => {
                    warn!("Task {} dispatch returned {}", task_id, response.status());
                }
                Err(e) => {
                    error!("Task {} dispatch failed: {}", task_id, e);
                }
            }
        });
        self.in_flight.insert(task_id, handle);
    }

    async fn cleanup_completed(&mut self) {
        let completed: Vec<i64> = self
            .in_flight
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(task_id, _)| *task_id)
            .collect();

        for task_id in completed {
            if let Some(handle) = self.in_flight.remove(&task_id) {
                if let Err(e) = handle.await {
                    error!("Dispatch of task {} panicked: {}", task_id, e);
                }
            }
        }
    }

    async fn shutdown(&mut self) {
        info!(
            "Shutting down scheduler, waiting for {} in-flight tasks",
            self.in_flight.len()
        );
        let (task_ids, handles): (Vec<i64>, Vec<JoinHandle<()>>) = self.in_flight.drain().unzip();
        match tokio::time::timeout(SHUTDOWN_GRACE, join_all(handles)).await {
            Ok(results) => {
                for (task_id, result) in task_ids.iter().zip(results) {
                    if let Err(e) = result {
                        error!("Dispatch of task {} panicked: {}", task_id, e);
                    }
                }
            }
            Err(_) => {
                warn!("Tasks {:?} did not finish before shutdown", task_ids);
            }
        }
        info!("Scheduler shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::tasks::{NewTask, SqliteTaskRegistry};
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use chrono::{TimeZone, Utc};
    use serde::Deserialize;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Deserialize)]
    struct RunTaskParams {
        #[serde(rename = "taskType")]
        task_type: String,
    }

    #[derive(Clone)]
    struct HostState {
        registry: Arc<SqliteTaskRegistry>,
        clock: Arc<ManualClock>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    async fn run_task(State(state): State<HostState>, Query(params): Query<RunTaskParams>) -> StatusCode {
        if let Some(task) = state.registry.get_task_by_type(&params.task_type).unwrap() {
            state
                .registry
                .record_task_started(task.id, state.clock.now())
                .unwrap();
        }
        state.calls.lock().unwrap().push(params.task_type);
        StatusCode::NO_CONTENT
    }

    struct TestScheduler {
        scheduler: JobScheduler,
        registry: Arc<SqliteTaskRegistry>,
        clock: Arc<ManualClock>,
        calls: Arc<Mutex<Vec<String>>>,
        shutdown_token: CancellationToken,
        _temp_dir: TempDir,
    }

    fn create_test_scheduler() -> TestScheduler {
        let temp_dir = TempDir::new().unwrap();
        let registry = Arc::new(SqliteTaskRegistry::new(temp_dir.path().join("tasks.db")).unwrap());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 5, 5, 0, 0).unwrap(),
        ));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new()
            .route("/scheduletask/runtask", post(run_task))
            .with_state(HostState {
                registry: registry.clone(),
                clock: clock.clone(),
                calls: calls.clone(),
            });
        let shutdown_token = CancellationToken::new();
        let scheduler = JobScheduler::new(
            registry.clone(),
            router,
            clock.clone(),
            shutdown_token.clone(),
        );
        TestScheduler {
            scheduler,
            registry,
            clock,
            calls,
            shutdown_token,
            _temp_dir: temp_dir,
        }
    }

    fn add_task(registry: &SqliteTaskRegistry, task_type: &str, interval_secs: u64, enabled: bool) -> i64 {
        registry
            .insert_task(&NewTask {
                name: task_type.to_string(),
                task_type: task_type.to_string(),
                interval_secs,
                enabled,
            })
            .unwrap()
    }

    async fn settle(scheduler: &mut JobScheduler) {
        while !scheduler.in_flight.values().all(|h| h.is_finished()) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        scheduler.cleanup_completed().await;
        assert!(scheduler.in_flight.is_empty());
    }

    #[tokio::test]
    async fn dispatches_never_run_tasks_immediately() {
        let mut t = create_test_scheduler();
        let id = add_task(&t.registry, "send emails", 60, true);
        add_task(&t.registry, "disabled", 60, false);

        assert_eq!(t.scheduler.time_until_next_due(), Duration::ZERO);
        assert_eq!(t.scheduler.dispatch_due_tasks(), vec![id]);
        settle(&mut t.scheduler).await;

        assert_eq!(*t.calls.lock().unwrap(), vec!["send emails".to_string()]);
    }

    #[tokio::test]
    async fn waits_for_interval_before_next_dispatch() {
        let mut t = create_test_scheduler();
        add_task(&t.registry, "tick", 60, true);

        t.scheduler.dispatch_due_tasks();
        settle(&mut t.scheduler).await;
        assert!(t.scheduler.dispatch_due_tasks().is_empty());
        assert_eq!(t.scheduler.time_until_next_due(), Duration::from_secs(60));

        t.clock.advance(chrono::Duration::seconds(60));
        assert_eq!(t.scheduler.dispatch_due_tasks().len(), 1);
        settle(&mut t.scheduler).await;
        assert_eq!(t.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn in_flight_task_is_not_dispatched_twice() {
        let mut t = create_test_scheduler();
        let id = add_task(&t.registry, "slow", 60, true);
        // simulate a dispatch that has not completed yet
        t.scheduler
            .in_flight
            .insert(id, tokio::spawn(std::future::pending::<()>()));

        assert!(t.scheduler.dispatch_due_tasks().is_empty());
        assert_eq!(t.scheduler.time_until_next_due(), IN_FLIGHT_POLL);

        if let Some(handle) = t.scheduler.in_flight.remove(&id) {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn run_loop_stops_on_shutdown() {
        let mut t = create_test_scheduler();
        add_task(&t.registry, "once", 3600, true);
        let calls = t.calls.clone();
        let token = t.shutdown_token.clone();

        let handle = tokio::spawn(async move {
            t.scheduler.run().await;
        });

        for _ in 0..100 {
            if !calls.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["once".to_string()]);
    }
}
