//! Filter clauses over stored events.
//!
//! A query is a list of clauses combined with AND. Stores either evaluate
//! them in memory with [`EventPredicate::matches`] or push them down to SQL
//! with [`EventPredicate::to_sql`].

use super::TaskRunEvent;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum EventPredicate {
    TaskIs(i64),
    IsError(bool),
    IsManual(bool),
    /// `started_at >= instant`
    StartedAtOrAfter(DateTime<Utc>),
    /// `started_at < instant`
    StartedBefore(DateTime<Utc>),
    /// `ended_at > instant`; runs that have not ended never match.
    EndedAfter(DateTime<Utc>),
}

/// Text form used for every stored instant. Fixed width, so lexical order is time order.
pub(crate) fn format_instant(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl EventPredicate {
    pub fn matches(&self, event: &TaskRunEvent) -> bool {
        match self {
            EventPredicate::TaskIs(task_id) => event.task_id == *task_id,
            EventPredicate::IsError(is_error) => event.is_error == *is_error,
            EventPredicate::IsManual(is_manual) => event.is_manual == *is_manual,
            EventPredicate::StartedAtOrAfter(at) => event.started_at >= *at,
            EventPredicate::StartedBefore(at) => event.started_at < *at,
            EventPredicate::EndedAfter(at) => event.ended_at.is_some_and(|ended| ended > *at),
        }
    }

    pub fn matches_all(predicates: &[EventPredicate], event: &TaskRunEvent) -> bool {
        predicates.iter().all(|p| p.matches(event))
    }

    /// SQL fragment with a single positional parameter, plus its value.
    pub(crate) fn to_sql(&self) -> (&'static str, Value) {
        match self {
            EventPredicate::TaskIs(task_id) => ("task_id = ?", Value::Integer(*task_id)),
            EventPredicate::IsError(is_error) => {
                ("is_error = ?", Value::Integer(*is_error as i64))
            }
            EventPredicate::IsManual(is_manual) => {
                ("is_manual = ?", Value::Integer(*is_manual as i64))
            }
            EventPredicate::StartedAtOrAfter(at) => {
                ("started_at >= ?", Value::Text(format_instant(at)))
            }
            EventPredicate::StartedBefore(at) => {
                ("started_at < ?", Value::Text(format_instant(at)))
            }
            EventPredicate::EndedAfter(at) => ("ended_at > ?", Value::Text(format_instant(at))),
        }
    }

    /// Builds a `WHERE ...` clause (empty when there are no predicates).
    pub(crate) fn where_clause(predicates: &[EventPredicate]) -> (String, Vec<Value>) {
        if predicates.is_empty() {
            return (String::new(), Vec::new());
        }
        let (fragments, values): (Vec<&str>, Vec<Value>) =
            predicates.iter().map(EventPredicate::to_sql).unzip();
        (format!(" WHERE {}", fragments.join(" AND ")), values)
    }
}
