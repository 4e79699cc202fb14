//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own databases.

use super::constants::*;
use super::fixtures::{create_test_stores, test_jobs};
use axum::Router;
use schedule_task_log::actors::{AdminDirectory, AdminIdentity};
use schedule_task_log::background_jobs::jobs::PruneTaskEventsJob;
use schedule_task_log::background_jobs::JobExecutor;
use schedule_task_log::clock::SystemClock;
use schedule_task_log::event_log::{
    EventLogSettings, RetentionPruner, SettingsHandle, SqliteEventStore,
};
use schedule_task_log::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use schedule_task_log::tasks::{SqliteTaskRegistry, TaskRegistry};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Test server instance with isolated databases
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// The served router, for driving a scheduler in-process
    pub app: Router,

    /// Direct database access in tests
    pub event_store: Arc<SqliteEventStore>,
    pub registry: Arc<SqliteTaskRegistry>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    shutdown_token: CancellationToken,
}

impl TestServer {
    /// Spawns a new test server on a random port with default settings
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(EventLogSettings::default()).await
    }

    /// Spawns a new test server whose persisted settings start as `settings`
    ///
    /// # Panics
    ///
    /// Panics if:
    /// - Database creation fails
    /// - Port binding fails
    /// - Server doesn't become ready within timeout
    pub async fn spawn_with_settings(settings: EventLogSettings) -> Self {
        let (temp_db_dir, event_store, registry) =
            create_test_stores(settings).expect("Failed to create test databases");

        let clock = Arc::new(SystemClock);
        let shutdown_token = CancellationToken::new();
        let settings = SettingsHandle::load(event_store.clone(), settings)
            .expect("Failed to load event log settings");

        let mut executor = JobExecutor::new(registry.clone(), clock.clone(), shutdown_token.clone());
        executor.register_job(Arc::new(PruneTaskEventsJob::new(
            RetentionPruner::new(event_store.clone(), clock.clone()),
            settings.clone(),
        )));
        for job in test_jobs() {
            executor.register_job(job);
        }
        let admins = Arc::new(AdminDirectory::new(vec![AdminIdentity {
            token: ADMIN_TOKEN.to_string(),
            actor_id: ADMIN_ACTOR_ID,
            label: ADMIN_LABEL.to_string(),
        }]));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            ..Default::default()
        };
        let state = ServerState::new(
            config,
            event_store.clone(),
            settings,
            Arc::new(executor),
            admins,
            clock,
        );
        let app = make_app(state);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        // Spawn server in background task with graceful shutdown
        let served_app = app.clone();
        tokio::spawn(async move {
            axum::serve(listener, served_app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            app,
            event_store,
            registry,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
            shutdown_token,
        };

        server.wait_for_ready().await;

        server
    }

    /// Id of the seeded task with the given type
    pub fn task_id(&self, task_type: &str) -> i64 {
        self.registry
            .get_task_by_type(task_type)
            .expect("Failed to query task registry")
            .unwrap_or_else(|| panic!("No seeded task of type {}", task_type))
            .id
    }

    /// Waits for the server to become ready by polling the / endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    // Server is ready
                    return;
                }
                _ => {
                    // Server not ready yet, wait and retry
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
