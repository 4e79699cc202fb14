//! Run-task entry points.
//!
//! `scheduletask` is the host's own surface and never touches the event log.
//! `taskrunner` does the same work wrapped in event recording; requests only
//! reach it through the task interceptor or by calling it directly.

use super::session::AdminSession;
use super::state::ServerState;
use crate::background_jobs::{JobError, RunTrigger};
use crate::event_log::{EventLogError, TaskFailure};
use crate::tasks::TaskDefinition;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

#[derive(Deserialize, Debug)]
struct RunTaskParams {
    #[serde(rename = "taskType")]
    task_type: Option<String>,
}

fn find_task_by_type(
    state: &ServerState,
    task_type: Option<&str>,
) -> Result<Option<TaskDefinition>, EventLogError> {
    match task_type {
        Some(task_type) => Ok(state.registry.get_task_by_type(task_type)?),
        None => Ok(None),
    }
}

fn find_task_by_id(state: &ServerState, id: i64) -> Result<TaskDefinition, EventLogError> {
    state
        .registry
        .get_task(id)?
        .ok_or(EventLogError::TaskNotFound(id))
}

fn job_failure_response(err: &JobError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string() })),
    )
        .into_response()
}

async fn run_task(
    State(state): State<ServerState>,
    Query(params): Query<RunTaskParams>,
) -> Response {
    let task = match find_task_by_type(&state, params.task_type.as_deref()) {
        Ok(Some(task)) => task,
        Ok(None) => return StatusCode::NO_CONTENT.into_response(),
        Err(e) => return e.into_response(),
    };

    match state.executor.run(&task, RunTrigger::Scheduler).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => job_failure_response(&e),
    }
}

async fn run_task_now(
    session: AdminSession,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Response {
    let task = match find_task_by_id(&state, id) {
        Ok(task) => task,
        Err(e) => return e.into_response(),
    };

    let trigger = RunTrigger::Operator {
        actor_id: session.actor_id,
    };
    match state.executor.run(&task, trigger).await {
        Ok(()) => Json(json!({ "status": "completed" })).into_response(),
        Err(e) => job_failure_response(&e),
    }
}

async fn run_logged_task(
    State(state): State<ServerState>,
    Query(params): Query<RunTaskParams>,
) -> Response {
    let task = match find_task_by_type(&state, params.task_type.as_deref()) {
        Ok(Some(task)) => task,
        Ok(None) => return StatusCode::NO_CONTENT.into_response(),
        Err(e) => return e.into_response(),
    };

    let event = state.recorder.record_start(&task, None);
    match state.executor.run(&task, RunTrigger::Scheduler).await {
        Ok(()) => {
            state.recorder.record_end(event);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            state
                .recorder
                .record_error(event, Some(&TaskFailure::from(&e)));
            job_failure_response(&e)
        }
    }
}

async fn run_logged_task_now(
    session: AdminSession,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Response {
    // nothing is recorded for a task that does not exist
    let task = match find_task_by_id(&state, id) {
        Ok(task) => task,
        Err(e) => return e.into_response(),
    };

    info!(
        "Operator {} ({}) started task {} ({})",
        session.actor_id, session.label, task.id, task.name
    );
    let event = state.recorder.record_start(&task, Some(session.actor_id));
    let trigger = RunTrigger::Operator {
        actor_id: session.actor_id,
    };
    match state.executor.run(&task, trigger).await {
        Ok(()) => {
            let stored = state.recorder.record_end(event);
            Json(json!({
                "status": "completed",
                "event_id": stored.and_then(|event| event.id),
            }))
            .into_response()
        }
        Err(e) => {
            error!("Operator run of task {} failed: {}", task.id, e);
            state
                .recorder
                .record_error(event, Some(&TaskFailure::from(&e)));
            job_failure_response(&e)
        }
    }
}

pub fn make_task_routes(state: ServerState) -> Router {
    Router::new()
        .route("/scheduletask/runtask", post(run_task))
        .route("/taskrunner/runtask", post(run_logged_task))
        .route("/admin/scheduletask/runnow/{id}", post(run_task_now))
        .route("/admin/taskrunner/runnow/{id}", post(run_logged_task_now))
        .with_state(state)
}
