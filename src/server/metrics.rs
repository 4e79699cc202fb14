use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Metric name prefix for all task log metrics
const PREFIX: &str = "schedule_task_log";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Task Run Metrics
    pub static ref TASK_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_task_runs_total"), "Total task runs by outcome"),
        &["task_type", "trigger", "outcome"]
    ).expect("Failed to create task_runs_total metric");

    pub static ref TASK_RUN_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_task_run_duration_seconds"),
            "Task run duration in seconds"
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 1800.0]),
        &["task_type"]
    ).expect("Failed to create task_run_duration_seconds metric");

    // Event Log Metrics
    pub static ref RECORDER_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_recorder_failures_total"),
            "Task run events that could not be recorded"
        ),
        &["operation"]
    ).expect("Failed to create recorder_failures_total metric");

    pub static ref INTERCEPTOR_REDIRECTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_interceptor_redirects_total"),
            "Task run calls redirected to the logging runner"
        ),
        &["action"]
    ).expect("Failed to create interceptor_redirects_total metric");

    pub static ref EVENTS_PRUNED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_events_pruned_total"), "Task run events deleted"),
        &["reason"]
    ).expect("Failed to create events_pruned_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(TASK_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TASK_RUN_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(RECORDER_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(INTERCEPTOR_REDIRECTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(EVENTS_PRUNED_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Maps a request path to the route template it targets, so that ids never
/// become label values. Paths outside the route set share one label.
pub fn categorize_endpoint(path: &str) -> &'static str {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [] => "/",
        ["scheduletask", "runtask"] => "/scheduletask/runtask",
        ["taskrunner", "runtask"] => "/taskrunner/runtask",
        ["admin", "scheduletask", "runnow", _] => "/admin/scheduletask/runnow/{id}",
        ["admin", "taskrunner", "runnow", _] => "/admin/taskrunner/runnow/{id}",
        ["admin", "scheduletasklog", "list"] => "/admin/scheduletasklog/list",
        ["admin", "scheduletasklog", "events", _] => "/admin/scheduletasklog/events/{id}",
        ["admin", "scheduletasklog", "clear"] => "/admin/scheduletasklog/clear",
        ["admin", "scheduletasklog", "options", _] => "/admin/scheduletasklog/options/{kind}",
        ["admin", "scheduletasklog", "settings"] => "/admin/scheduletasklog/settings",
        _ => "unmatched",
    }
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

pub fn record_task_run(task_type: &str, trigger: &str, outcome: &str, duration: Duration) {
    TASK_RUNS_TOTAL
        .with_label_values(&[task_type, trigger, outcome])
        .inc();
    TASK_RUN_DURATION_SECONDS
        .with_label_values(&[task_type])
        .observe(duration.as_secs_f64());
}

pub fn record_recorder_failure(operation: &str) {
    RECORDER_FAILURES_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn record_interceptor_redirect(action: &str) {
    INTERCEPTOR_REDIRECTS_TOTAL
        .with_label_values(&[action])
        .inc();
}

pub fn record_events_pruned(reason: &str, count: usize) {
    EVENTS_PRUNED_TOTAL
        .with_label_values(&[reason])
        .inc_by(count as f64);
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
