use anyhow::{Context, Result};
use std::time::Duration;

use axum::{
    extract::State,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::Layer;
use tracing::info;

use super::event_log_routes::make_event_log_routes;
use super::metrics::metrics_handler;
use super::session::AdminSession;
use super::task_routes::make_task_routes;
use super::{intercept_task_runs, log_requests, state::ServerState, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub registered_jobs: usize,
    pub logging_disabled: bool,
    pub operator: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(session: Option<AdminSession>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        registered_jobs: state.executor.job_count(),
        logging_disabled: state.settings.snapshot().logging_disabled,
        operator: session.map(|s| s.label),
    };
    Json(stats)
}

/// Builds the application router.
///
/// The task interceptor wraps the routed service itself so that a rewritten
/// URI is what gets routed.
pub fn make_app(state: ServerState) -> Router {
    let home_router: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone());

    let routes: Router = home_router
        .merge(make_task_routes(state.clone()))
        .nest("/admin/scheduletasklog", make_event_log_routes(state.clone()));

    let intercepted =
        middleware::from_fn_with_state(state.clone(), intercept_task_runs).layer(routes);

    Router::new()
        .fallback_service(intercepted)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serves `app` and the metrics endpoint until `shutdown_token` is cancelled.
pub async fn run_server(
    app: Router,
    config: &ServerConfig,
    shutdown_token: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    let metrics_listener = TcpListener::bind(format!("127.0.0.1:{}", config.metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", config.metrics_port))?;

    let app_server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_token.clone().cancelled_owned());
    let metrics_server = axum::serve(metrics_listener, make_metrics_app())
        .with_graceful_shutdown(shutdown_token.cancelled_owned());

    tokio::try_join!(
        async { app_server.await.context("HTTP server failed") },
        async { metrics_server.await.context("Metrics server failed") },
    )?;

    info!("HTTP servers stopped");
    Ok(())
}
