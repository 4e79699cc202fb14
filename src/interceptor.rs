//! Decides whether a call to one of the host's unlogged "run task" entry points
//! should be redirected to its logging-aware counterpart.
//!
//! The decision is pure: it looks at the logical call target and the current
//! `logging_disabled` flag and nothing else. Rewriting the request is left to
//! the HTTP layer.

use std::borrow::Cow;

const HOST_CONTROLLER: &str = "scheduletask";
const LOGGING_CONTROLLER: &str = "taskrunner";
const RUN_BY_TYPE_ACTION: &str = "runtask";
const RUN_BY_ID_ACTION: &str = "runnow";
const TASK_TYPE_ARG: &str = "taskType";
const ID_ARG: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteScope {
    Root,
    Admin,
}

impl RouteScope {
    fn prefix(self) -> &'static str {
        match self {
            RouteScope::Root => "",
            RouteScope::Admin => "/admin",
        }
    }
}

/// The logical entry point a request is about to reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    pub scope: RouteScope,
    pub controller: String,
    pub action: String,
    /// Decoded arguments in the order they appeared. A trailing path segment
    /// is exposed as `id`.
    pub args: Vec<(String, String)>,
}

impl CallTarget {
    /// Parses `[/admin]/{controller}/{action}[/{id}]` plus an optional query.
    /// Returns None for paths of any other shape.
    pub fn from_path_and_query(path: &str, query: Option<&str>) -> Option<Self> {
        let mut segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| decode(s).into_owned())
            .collect();

        let scope = match segments.first() {
            Some(first) if first.eq_ignore_ascii_case("admin") => {
                segments.remove(0);
                RouteScope::Admin
            }
            _ => RouteScope::Root,
        };

        let mut args = Vec::new();
        let (controller, action) = match segments.as_slice() {
            [controller, action] => (controller.clone(), action.clone()),
            [controller, action, id] => {
                args.push((ID_ARG.to_string(), id.clone()));
                (controller.clone(), action.clone())
            }
            _ => return None,
        };

        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                args.push((decode(name).into_owned(), decode(value).into_owned()));
            }
        }

        Some(Self {
            scope,
            controller,
            action,
            args,
        })
    }

    /// First argument with the given name, compared case-insensitively.
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(arg_name, _)| arg_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn is(&self, scope: RouteScope, controller: &str, action: &str) -> bool {
        self.scope == scope
            && self.controller.eq_ignore_ascii_case(controller)
            && self.action.eq_ignore_ascii_case(action)
    }
}

fn decode(raw: &str) -> Cow<'_, str> {
    let spaced: Cow<'_, str> = if raw.contains('+') {
        Cow::Owned(raw.replace('+', " "))
    } else {
        Cow::Borrowed(raw)
    };
    let decoded = urlencoding::decode(&spaced).map(Cow::into_owned).ok();
    match decoded {
        Some(decoded) => Cow::Owned(decoded),
        None => spaced,
    }
}

/// Where a redirected call ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Logging-aware run by type, scheduler triggered, outside the admin scope.
    RunTaskByType { task_type: String },
    /// Logging-aware run by id, operator triggered, inside the admin scope.
    RunTaskById { id: String },
}

impl Redirect {
    pub fn scope(&self) -> RouteScope {
        match self {
            Redirect::RunTaskByType { .. } => RouteScope::Root,
            Redirect::RunTaskById { .. } => RouteScope::Admin,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Redirect::RunTaskByType { .. } => RUN_BY_TYPE_ACTION,
            Redirect::RunTaskById { .. } => RUN_BY_ID_ACTION,
        }
    }

    /// Path and query of the logging-aware entry point.
    pub fn path_and_query(&self) -> String {
        let base = format!(
            "{}/{}/{}",
            self.scope().prefix(),
            LOGGING_CONTROLLER,
            self.action()
        );
        match self {
            Redirect::RunTaskByType { task_type } => format!(
                "{}?{}={}",
                base,
                TASK_TYPE_ARG,
                urlencoding::encode(task_type)
            ),
            Redirect::RunTaskById { id } => format!("{}/{}", base, urlencoding::encode(id)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptDecision {
    Redirect(Redirect),
    PassThrough,
}

pub struct ExecutionInterceptor;

impl ExecutionInterceptor {
    pub fn decide(logging_disabled: bool, target: &CallTarget) -> InterceptDecision {
        if logging_disabled {
            return InterceptDecision::PassThrough;
        }

        if target.is(RouteScope::Root, HOST_CONTROLLER, RUN_BY_TYPE_ACTION) {
            if let Some(task_type) = target.arg(TASK_TYPE_ARG) {
                return InterceptDecision::Redirect(Redirect::RunTaskByType {
                    task_type: task_type.to_string(),
                });
            }
        } else if target.is(RouteScope::Admin, HOST_CONTROLLER, RUN_BY_ID_ACTION) {
            if let Some(id) = target.arg(ID_ARG) {
                return InterceptDecision::Redirect(Redirect::RunTaskById { id: id.to_string() });
            }
        }

        InterceptDecision::PassThrough
    }
}
