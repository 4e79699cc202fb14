mod requests_logging;
mod task_interceptor;

pub use requests_logging::{log_requests, RequestsLoggingLevel};
pub use task_interceptor::intercept_task_runs;
