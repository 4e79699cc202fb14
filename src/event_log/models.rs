use super::EventLogError;
use crate::clock::Clock;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Longest error summary kept on an event, in characters.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 200;

/// Cuts an error summary down to its first [`MAX_ERROR_MESSAGE_CHARS`] characters.
/// A missing message becomes the empty string.
pub fn truncate_error_message(message: Option<&str>) -> String {
    match message {
        None => String::new(),
        Some(msg) => msg.chars().take(MAX_ERROR_MESSAGE_CHARS).collect(),
    }
}

/// What is known about a failed run: a short message and the full detail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFailure {
    pub message: Option<String>,
    pub detail: Option<String>,
}

impl TaskFailure {
    pub fn new(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            detail: Some(detail.into()),
        }
    }

    /// Builds a failure from any error, rendering its source chain as the detail.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        let mut detail = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            detail.push_str(&format!("\ncaused by: {}", cause));
            source = cause.source();
        }
        Self {
            message: Some(err.to_string()),
            detail: Some(detail),
        }
    }
}

/// One recorded execution attempt of a scheduled task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRunEvent {
    /// Assigned by the store on insert.
    pub id: Option<i64>,
    pub task_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub is_error: bool,
    pub error_message: Option<String>,
    pub error_detail: Option<String>,
    pub is_manual: bool,
    pub triggered_by: Option<i64>,
}

impl TaskRunEvent {
    /// Opens a new, unpersisted run of `task_id` stamped with the clock's current instant.
    ///
    /// Task ids are assigned by the registry starting at 1, so anything lower
    /// means no task was supplied.
    pub fn start(clock: &dyn Clock, task_id: i64) -> Result<Self, EventLogError> {
        if task_id <= 0 {
            return Err(EventLogError::invalid("a task id is required to start an event"));
        }
        Ok(Self {
            id: None,
            task_id,
            started_at: clock.now(),
            ended_at: None,
            duration_ms: None,
            is_error: false,
            error_message: None,
            error_detail: None,
            is_manual: false,
            triggered_by: None,
        })
    }

    pub fn mark_manual(mut self, actor_id: i64) -> Self {
        self.is_manual = true;
        self.triggered_by = Some(actor_id);
        self
    }

    pub fn end(self, clock: &dyn Clock) -> Result<Self, EventLogError> {
        self.finalize(clock)
    }

    /// Marks the run as failed, then finalizes it like [`TaskRunEvent::end`].
    ///
    /// Without a failure the event is still flagged as errored but carries no
    /// message or detail.
    pub fn fail(
        mut self,
        clock: &dyn Clock,
        failure: Option<&TaskFailure>,
    ) -> Result<Self, EventLogError> {
        if self.is_finished() {
            return Err(self.already_finished());
        }
        if let Some(failure) = failure {
            self.error_message = Some(truncate_error_message(failure.message.as_deref()));
            self.error_detail = failure.detail.clone();
        }
        self.is_error = true;
        self.finalize(clock)
    }

    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    fn finalize(mut self, clock: &dyn Clock) -> Result<Self, EventLogError> {
        if self.is_finished() {
            return Err(self.already_finished());
        }
        let ended_at = clock.now();
        self.duration_ms = Some((ended_at - self.started_at).num_milliseconds());
        self.ended_at = Some(ended_at);
        Ok(self)
    }

    fn already_finished(&self) -> EventLogError {
        EventLogError::invalid(format!(
            "event for task {} started at {} is already finished",
            self.task_id, self.started_at
        ))
    }
}
