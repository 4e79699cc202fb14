//! Task bodies and the machinery that runs them.
//!
//! `JobExecutor` is the host's unlogged way of running a task body.
//! `JobScheduler` decides when tasks are due and dispatches them through the
//! HTTP surface, so whatever wraps that surface (event logging) applies to
//! scheduled runs too.

mod context;
mod executor;
mod job;
pub mod jobs;
mod scheduler;

pub use context::{JobContext, RunTrigger};
pub use executor::JobExecutor;
pub use job::{BackgroundJob, JobError};
pub use scheduler::JobScheduler;
