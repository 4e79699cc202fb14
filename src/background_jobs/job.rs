use super::context::JobContext;
use crate::event_log::TaskFailure;

/// Errors that can occur during job execution.
#[derive(Debug)]
pub enum JobError {
    /// No body is registered for the task type.
    NotRegistered(String),
    ExecutionFailed {
        message: String,
        detail: Option<String>,
    },
    Cancelled,
    Panicked(String),
}

impl JobError {
    pub fn failed(message: impl Into<String>) -> Self {
        JobError::ExecutionFailed {
            message: message.into(),
            detail: None,
        }
    }

    /// Keeps the top-level message and renders the whole source chain as detail.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        let failure = TaskFailure::from_error(err);
        JobError::ExecutionFailed {
            message: failure.message.unwrap_or_default(),
            detail: failure.detail,
        }
    }

    /// Everything known about the failure, for the event's error detail.
    pub fn detail(&self) -> String {
        match self {
            JobError::ExecutionFailed {
                detail: Some(detail),
                ..
            } => detail.clone(),
            other => other.to_string(),
        }
    }

    /// Short label used for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            JobError::NotRegistered(_) => "not_registered",
            JobError::ExecutionFailed { .. } => "failed",
            JobError::Cancelled => "cancelled",
            JobError::Panicked(_) => "panic",
        }
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::NotRegistered(task_type) => {
                write!(f, "No job registered for task type {}", task_type)
            }
            JobError::ExecutionFailed { message, .. } => write!(f, "{}", message),
            JobError::Cancelled => write!(f, "Job was cancelled"),
            JobError::Panicked(msg) => write!(f, "Job panicked: {}", msg),
        }
    }
}

impl std::error::Error for JobError {}

impl From<&JobError> for TaskFailure {
    fn from(err: &JobError) -> Self {
        TaskFailure {
            message: Some(err.to_string()),
            detail: Some(err.detail()),
        }
    }
}

/// The body of a scheduled task.
///
/// Jobs are executed synchronously in a blocking context.
/// Long-running work should check for cancellation.
pub trait BackgroundJob: Send + Sync {
    /// Task type this job is the body of.
    fn task_type(&self) -> &str;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Called from `spawn_blocking`. Long-running implementations should poll
    /// `ctx.is_cancelled()` and return `JobError::Cancelled`.
    fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}
