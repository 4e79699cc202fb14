//! Routes calls to the host's unlogged run-task entry points to their
//! logging-aware counterparts.
//!
//! Must wrap the router rather than be added as a route layer: the URI is
//! rewritten before routing happens.

use super::super::state::ServerState;
use crate::interceptor::{CallTarget, ExecutionInterceptor, InterceptDecision};
use crate::server::metrics::record_interceptor_redirect;
use axum::extract::State;
use axum::{
    body::Body,
    http::{Request, Uri},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

pub async fn intercept_task_runs(
    State(state): State<ServerState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let target = CallTarget::from_path_and_query(request.uri().path(), request.uri().query());

    if let Some(target) = target {
        let logging_disabled = state.settings.snapshot().logging_disabled;
        if let InterceptDecision::Redirect(redirect) =
            ExecutionInterceptor::decide(logging_disabled, &target)
        {
            let rewritten = redirect.path_and_query();
            match rewritten.parse::<Uri>() {
                Ok(uri) => {
                    debug!("Redirecting {} to {}", request.uri(), uri);
                    record_interceptor_redirect(redirect.action());
                    *request.uri_mut() = uri;
                }
                Err(e) => {
                    warn!("Not redirecting {}: invalid target {}: {}", request.uri(), rewritten, e);
                }
            }
        }
    }

    next.run(request).await
}
