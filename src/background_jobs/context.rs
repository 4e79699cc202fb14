use crate::tasks::TaskDefinition;
use tokio_util::sync::CancellationToken;

/// What caused a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTrigger {
    Scheduler,
    Operator { actor_id: i64 },
}

impl RunTrigger {
    pub fn label(&self) -> &'static str {
        match self {
            RunTrigger::Scheduler => "scheduler",
            RunTrigger::Operator { .. } => "operator",
        }
    }

    pub fn actor_id(&self) -> Option<i64> {
        match self {
            RunTrigger::Scheduler => None,
            RunTrigger::Operator { actor_id } => Some(*actor_id),
        }
    }
}

/// Context provided to jobs during execution.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    /// The task definition being run.
    pub task: TaskDefinition,

    pub trigger: RunTrigger,
}

impl JobContext {
    pub fn new(
        cancellation_token: CancellationToken,
        task: TaskDefinition,
        trigger: RunTrigger,
    ) -> Self {
        Self {
            cancellation_token,
            task,
            trigger,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
