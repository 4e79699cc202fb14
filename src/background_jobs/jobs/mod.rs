//! Task bodies shipped with the server.

pub mod prune_task_events;

pub use prune_task_events::PruneTaskEventsJob;
