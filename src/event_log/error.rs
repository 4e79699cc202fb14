use thiserror::Error;

/// Errors surfaced by the event log to its callers.
#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("Event not found: {0}")]
    EventNotFound(i64),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl EventLogError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        EventLogError::InvalidArgument(msg.into())
    }
}
