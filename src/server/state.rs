use axum::extract::FromRef;

use crate::actors::AdminDirectory;
use crate::background_jobs::JobExecutor;
use crate::clock::Clock;
use crate::event_log::{AnalyticsEngine, EventRecorder, EventStore, RetentionPruner, SettingsHandle};
use crate::tasks::TaskRegistry;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedJobExecutor = Arc<JobExecutor>;
pub type GuardedTaskRegistry = Arc<dyn TaskRegistry>;
pub type GuardedEventRecorder = Arc<EventRecorder>;
pub type GuardedAnalyticsEngine = Arc<AnalyticsEngine>;
pub type GuardedRetentionPruner = Arc<RetentionPruner>;
pub type GuardedAdminDirectory = Arc<AdminDirectory>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub executor: GuardedJobExecutor,
    pub registry: GuardedTaskRegistry,
    pub recorder: GuardedEventRecorder,
    pub analytics: GuardedAnalyticsEngine,
    pub pruner: GuardedRetentionPruner,
    pub settings: SettingsHandle,
    pub admins: GuardedAdminDirectory,
}

impl ServerState {
    /// Wires the event log components around a single event store.
    pub fn new(
        config: ServerConfig,
        event_store: Arc<dyn EventStore>,
        settings: SettingsHandle,
        executor: GuardedJobExecutor,
        admins: GuardedAdminDirectory,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = executor.registry().clone();
        let recorder = EventRecorder::new(event_store.clone(), clock.clone());
        let analytics = AnalyticsEngine::new(
            event_store.clone(),
            registry.clone(),
            admins.clone(),
            clock.clone(),
        );
        let pruner = RetentionPruner::new(event_store, clock);

        Self {
            config,
            start_time: Instant::now(),
            executor,
            registry,
            recorder: Arc::new(recorder),
            analytics: Arc::new(analytics),
            pruner: Arc::new(pruner),
            settings,
            admins,
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedJobExecutor {
    fn from_ref(input: &ServerState) -> Self {
        input.executor.clone()
    }
}

impl FromRef<ServerState> for GuardedTaskRegistry {
    fn from_ref(input: &ServerState) -> Self {
        input.registry.clone()
    }
}

impl FromRef<ServerState> for GuardedAnalyticsEngine {
    fn from_ref(input: &ServerState) -> Self {
        input.analytics.clone()
    }
}

impl FromRef<ServerState> for GuardedRetentionPruner {
    fn from_ref(input: &ServerState) -> Self {
        input.pruner.clone()
    }
}

impl FromRef<ServerState> for SettingsHandle {
    fn from_ref(input: &ServerState) -> Self {
        input.settings.clone()
    }
}

impl FromRef<ServerState> for GuardedAdminDirectory {
    fn from_ref(input: &ServerState) -> Self {
        input.admins.clone()
    }
}
