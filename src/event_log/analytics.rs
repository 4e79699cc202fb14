//! Read side of the event log: filtered pages, single-event detail, rolling
//! duration baselines and the vocabularies used to build filters.

use super::{EventLogError, EventPredicate, EventStore, TaskRunEvent};
use crate::actors::ActorResolver;
use crate::clock::Clock;
use crate::tasks::TaskRegistry;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Width of the window used for per-task average durations. Not configurable.
pub const AVERAGE_WINDOW_DAYS: i64 = 14;

/// Outcome filter vocabulary. The numeric ids are what clients send back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Success = 1,
    Error = 2,
}

impl RunState {
    /// `0` means "any state".
    pub fn from_id(id: i64) -> Result<Option<Self>, EventLogError> {
        match id {
            0 => Ok(None),
            1 => Ok(Some(RunState::Success)),
            2 => Ok(Some(RunState::Error)),
            other => Err(EventLogError::invalid(format!("unknown state id {}", other))),
        }
    }

    pub fn is_error(self) -> bool {
        self == RunState::Error
    }
}

/// Trigger filter vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerType {
    Scheduler = 1,
    Actor = 2,
}

impl TriggerType {
    /// `0` means "any trigger".
    pub fn from_id(id: i64) -> Result<Option<Self>, EventLogError> {
        match id {
            0 => Ok(None),
            1 => Ok(Some(TriggerType::Scheduler)),
            2 => Ok(Some(TriggerType::Actor)),
            other => Err(EventLogError::invalid(format!(
                "unknown trigger type id {}",
                other
            ))),
        }
    }

    pub fn is_manual(self) -> bool {
        self == TriggerType::Actor
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOption {
    pub value: i64,
    pub label: String,
}

/// Optional constraints on a list query. Unset fields match everything.
///
/// Dates are calendar days in the caller's display timezone; `started_to`
/// covers the whole of that day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub task_id: Option<i64>,
    pub is_error: Option<bool>,
    pub is_manual: Option<bool>,
    pub started_from: Option<NaiveDate>,
    pub started_to: Option<NaiveDate>,
}

impl EventFilter {
    pub fn to_predicates(&self, tz: FixedOffset) -> Result<Vec<EventPredicate>, EventLogError> {
        let mut predicates = Vec::new();
        if let Some(task_id) = self.task_id {
            predicates.push(EventPredicate::TaskIs(task_id));
        }
        if let Some(is_error) = self.is_error {
            predicates.push(EventPredicate::IsError(is_error));
        }
        if let Some(is_manual) = self.is_manual {
            predicates.push(EventPredicate::IsManual(is_manual));
        }
        if let Some(from) = self.started_from {
            predicates.push(EventPredicate::StartedAtOrAfter(local_midnight_utc(
                from, tz,
            )?));
        }
        if let Some(to) = self.started_to {
            let end_of_day = local_midnight_utc(to, tz)?
                .checked_add_signed(Duration::days(1))
                .ok_or_else(|| {
                    EventLogError::invalid(format!("date {} cannot be represented", to))
                })?;
            predicates.push(EventPredicate::StartedBefore(end_of_day));
        }
        Ok(predicates)
    }
}

fn local_midnight_utc(date: NaiveDate, tz: FixedOffset) -> Result<DateTime<Utc>, EventLogError> {
    date.and_hms_opt(0, 0, 0)
        .and_then(|midnight| tz.from_local_datetime(&midnight).single())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| EventLogError::invalid(format!("date {} cannot be represented", date)))
}

/// A stored event as presented to operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub id: i64,
    pub task_id: i64,
    pub task_name: Option<String>,
    pub started_at: DateTime<FixedOffset>,
    pub ended_at: Option<DateTime<FixedOffset>>,
    pub duration_ms: Option<i64>,
    pub is_error: bool,
    pub error_message: Option<String>,
    pub error_detail: Option<String>,
    pub is_manual: bool,
    pub triggered_by: Option<i64>,
    pub triggered_by_label: Option<String>,
    /// Signed distance from the task's rolling average, in percent.
    pub deviation_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventPage {
    pub items: Vec<EventSummary>,
    pub total: usize,
    pub page_index: usize,
    pub page_size: usize,
}

/// `(duration - average) / average * 100`, or `None` without a usable baseline.
pub fn deviation_pct(duration_ms: Option<i64>, average_ms: Option<f64>) -> Option<f64> {
    let duration = duration_ms? as f64;
    let average = average_ms?;
    if average == 0.0 {
        return None;
    }
    Some((duration - average) / average * 100.0)
}

pub struct AnalyticsEngine {
    store: Arc<dyn EventStore>,
    tasks: Arc<dyn TaskRegistry>,
    actors: Arc<dyn ActorResolver>,
    clock: Arc<dyn Clock>,
}

impl AnalyticsEngine {
    pub fn new(
        store: Arc<dyn EventStore>,
        tasks: Arc<dyn TaskRegistry>,
        actors: Arc<dyn ActorResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            tasks,
            actors,
            clock,
        }
    }

    /// One page of events, newest start first, ties broken by newest id.
    ///
    /// `page_index` is zero-based and `page_size` is clamped to at least 1.
    pub fn list_events(
        &self,
        filter: &EventFilter,
        page_index: usize,
        page_size: usize,
        tz: FixedOffset,
    ) -> Result<EventPage, EventLogError> {
        let page_size = page_size.max(1);
        let predicates = filter.to_predicates(tz)?;
        let (events, total) = self.store.query_events(&predicates, page_index, page_size)?;

        let task_names: HashMap<i64, String> = self
            .tasks
            .list_tasks()?
            .into_iter()
            .map(|task| (task.id, task.name))
            .collect();
        let averages = self.task_averages(filter.task_id)?;

        let items = events
            .into_iter()
            .filter_map(|event| {
                let name = task_names.get(&event.task_id).cloned();
                let average = averages.get(&event.task_id).copied();
                self.summarize(event, name, average, tz)
            })
            .collect();

        Ok(EventPage {
            items,
            total,
            page_index,
            page_size,
        })
    }

    pub fn get_event_detail(
        &self,
        id: i64,
        tz: FixedOffset,
    ) -> Result<Option<EventSummary>, EventLogError> {
        let event = match self.store.get_event(id)? {
            Some(event) => event,
            None => return Ok(None),
        };
        let name = self.tasks.get_task(event.task_id)?.map(|task| task.name);
        let average = self
            .task_averages(Some(event.task_id))?
            .get(&event.task_id)
            .copied();
        Ok(self.summarize(event, name, average, tz))
    }

    /// Mean duration per task over events that ended within the rolling window.
    pub fn task_averages(&self, task_id: Option<i64>) -> Result<HashMap<i64, f64>, EventLogError> {
        let window_start = self.clock.now() - Duration::days(AVERAGE_WINDOW_DAYS);
        let mut predicates = vec![EventPredicate::EndedAfter(window_start)];
        if let Some(task_id) = task_id {
            predicates.push(EventPredicate::TaskIs(task_id));
        }

        let mut sums: HashMap<i64, (f64, u32)> = HashMap::new();
        for event in self.store.scan_events(&predicates)? {
            if let Some(duration_ms) = event.duration_ms {
                let entry = sums.entry(event.task_id).or_insert((0.0, 0));
                entry.0 += duration_ms as f64;
                entry.1 += 1;
            }
        }

        Ok(sums
            .into_iter()
            .map(|(task_id, (sum, count))| (task_id, sum / count as f64))
            .collect())
    }

    /// All known tasks, ordered by name and then id.
    pub fn available_tasks(&self) -> Result<Vec<FilterOption>, EventLogError> {
        let mut tasks = self.tasks.list_tasks()?;
        tasks.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(tasks
            .into_iter()
            .map(|task| FilterOption {
                value: task.id,
                label: task.name,
            })
            .collect())
    }

    pub fn available_states() -> Vec<FilterOption> {
        vec![
            FilterOption {
                value: RunState::Success as i64,
                label: "Success".to_string(),
            },
            FilterOption {
                value: RunState::Error as i64,
                label: "Error".to_string(),
            },
        ]
    }

    pub fn available_trigger_types() -> Vec<FilterOption> {
        vec![
            FilterOption {
                value: TriggerType::Scheduler as i64,
                label: "By scheduler".to_string(),
            },
            FilterOption {
                value: TriggerType::Actor as i64,
                label: "By user".to_string(),
            },
        ]
    }

    fn summarize(
        &self,
        event: TaskRunEvent,
        task_name: Option<String>,
        average_ms: Option<f64>,
        tz: FixedOffset,
    ) -> Option<EventSummary> {
        // stored events always carry an id
        let id = event.id?;
        let triggered_by_label = match (event.is_manual, event.triggered_by) {
            (true, Some(actor_id)) => self.actors.resolve_display_label(actor_id),
            _ => None,
        };
        Some(EventSummary {
            id,
            task_id: event.task_id,
            task_name,
            started_at: event.started_at.with_timezone(&tz),
            ended_at: event.ended_at.map(|at| at.with_timezone(&tz)),
            duration_ms: event.duration_ms,
            is_error: event.is_error,
            error_message: event.error_message,
            error_detail: event.error_detail,
            is_manual: event.is_manual,
            triggered_by: event.triggered_by,
            triggered_by_label,
            deviation_pct: deviation_pct(event.duration_ms, average_ms),
        })
    }
}
