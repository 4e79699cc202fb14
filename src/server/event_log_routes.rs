//! Admin surface of the task run event log.

use super::session::AdminSession;
use super::state::ServerState;
use crate::config::parse_display_offset;
use crate::event_log::{
    AnalyticsEngine, EventFilter, EventLogError, RunState, SettingsUpdate, TriggerType,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{FixedOffset, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

const DEFAULT_PAGE_SIZE: usize = 15;

impl IntoResponse for EventLogError {
    fn into_response(self) -> Response {
        let status = match &self {
            EventLogError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            EventLogError::TaskNotFound(_) | EventLogError::EventNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            EventLogError::Store(e) => {
                error!("Event log store failure: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct ListEventsQuery {
    task_id: i64,
    state: i64,
    trigger_type: i64,
    started_from: Option<String>,
    started_to: Option<String>,
    page: Option<usize>,
    page_size: Option<usize>,
    tz_offset_minutes: Option<i32>,
}

fn parse_date(name: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, EventLogError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| EventLogError::invalid(format!("{} must be YYYY-MM-DD, got {}", name, s))),
    }
}

impl ListEventsQuery {
    fn to_filter(&self) -> Result<EventFilter, EventLogError> {
        if self.task_id < 0 {
            return Err(EventLogError::invalid(format!(
                "unknown task id {}",
                self.task_id
            )));
        }
        Ok(EventFilter {
            task_id: (self.task_id != 0).then_some(self.task_id),
            is_error: RunState::from_id(self.state)?.map(RunState::is_error),
            is_manual: TriggerType::from_id(self.trigger_type)?.map(TriggerType::is_manual),
            started_from: parse_date("started_from", self.started_from.as_deref())?,
            started_to: parse_date("started_to", self.started_to.as_deref())?,
        })
    }

    fn page_index(&self) -> Result<usize, EventLogError> {
        match self.page {
            None => Ok(0),
            Some(0) => Err(EventLogError::invalid("page starts at 1")),
            Some(page) => Ok(page - 1),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct DisplayQuery {
    tz_offset_minutes: Option<i32>,
}

fn display_offset(state: &ServerState, minutes: Option<i32>) -> Result<FixedOffset, EventLogError> {
    match minutes {
        None => Ok(state.config.display_offset),
        Some(minutes) => {
            parse_display_offset(minutes).map_err(|e| EventLogError::invalid(e.to_string()))
        }
    }
}

async fn list_events(
    _session: AdminSession,
    State(state): State<ServerState>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Response, EventLogError> {
    let filter = query.to_filter()?;
    let page_index = query.page_index()?;
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    let tz = display_offset(&state, query.tz_offset_minutes)?;

    let page = state.analytics.list_events(&filter, page_index, page_size, tz)?;
    Ok(Json(page).into_response())
}

async fn get_event(
    _session: AdminSession,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Query(query): Query<DisplayQuery>,
) -> Result<Response, EventLogError> {
    let tz = display_offset(&state, query.tz_offset_minutes)?;
    match state.analytics.get_event_detail(id, tz)? {
        Some(summary) => Ok(Json(summary).into_response()),
        None => Err(EventLogError::EventNotFound(id)),
    }
}

async fn clear_events(
    session: AdminSession,
    State(state): State<ServerState>,
) -> Result<Response, EventLogError> {
    let deleted = state.pruner.clear_all()?;
    info!(
        "Admin activity: actor {} ({}) cleared the task run log, {} events removed",
        session.actor_id, session.label, deleted
    );
    Ok(Json(json!({ "deleted": deleted })).into_response())
}

async fn get_options(
    _session: AdminSession,
    State(state): State<ServerState>,
    Path(kind): Path<String>,
) -> Result<Response, EventLogError> {
    let options = match kind.as_str() {
        "tasks" => state.analytics.available_tasks()?,
        "states" => AnalyticsEngine::available_states(),
        "trigger-types" => AnalyticsEngine::available_trigger_types(),
        _ => return Ok(StatusCode::NOT_FOUND.into_response()),
    };
    Ok(Json(options).into_response())
}

async fn get_settings(_session: AdminSession, State(state): State<ServerState>) -> Response {
    Json(state.settings.snapshot()).into_response()
}

async fn put_settings(
    session: AdminSession,
    State(state): State<ServerState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Response, EventLogError> {
    let settings = state.settings.update(&update)?;
    info!(
        "Admin activity: actor {} ({}) updated task run log settings",
        session.actor_id, session.label
    );
    Ok(Json(settings).into_response())
}

pub fn make_event_log_routes(state: ServerState) -> Router {
    Router::new()
        .route("/list", get(list_events))
        .route("/events/{id}", get(get_event))
        .route("/clear", post(clear_events))
        .route("/options/{kind}", get(get_options))
        .route("/settings", get(get_settings).put(put_settings))
        .with_state(state)
}
