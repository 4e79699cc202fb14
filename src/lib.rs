//! Execution event log for a scheduled task runner.
//!
//! This library exposes the internal modules for the server binary and tests.

pub mod actors;
pub mod background_jobs;
pub mod clock;
pub mod config;
pub mod event_log;
pub mod interceptor;
pub mod server;
pub mod sqlite_persistence;
pub mod tasks;

// Re-export commonly used types for convenience
pub use event_log::{EventStore, SqliteEventStore};
pub use server::{make_app, run_server, RequestsLoggingLevel};
pub use tasks::{SqliteTaskRegistry, TaskRegistry};
