pub mod analytics;
mod error;
mod event_store;
mod memory_event_store;
pub mod models;
mod predicate;
mod recorder;
mod retention;
mod schema;
pub mod settings;
mod sqlite_event_store;

pub use analytics::{
    AnalyticsEngine, EventFilter, EventPage, EventSummary, FilterOption, RunState, TriggerType,
};
pub use error::EventLogError;
pub use event_store::EventStore;
pub use memory_event_store::InMemoryEventStore;
pub use models::{truncate_error_message, TaskFailure, TaskRunEvent, MAX_ERROR_MESSAGE_CHARS};
pub use predicate::EventPredicate;
pub use recorder::EventRecorder;
pub use retention::RetentionPruner;
pub use settings::{
    EventLogSettings, SettingsHandle, SettingsStore, SettingsUpdate, MAX_RETENTION_DAYS,
};
pub use sqlite_event_store::SqliteEventStore;
