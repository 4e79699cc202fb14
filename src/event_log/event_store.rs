use super::{EventPredicate, TaskRunEvent};
use anyhow::Result;

pub trait EventStore: Send + Sync {
    /// Persists a finished event and returns its new id.
    fn insert_event(&self, event: &TaskRunEvent) -> Result<i64>;

    /// Returns Ok(None) if no event has the given id.
    fn get_event(&self, id: i64) -> Result<Option<TaskRunEvent>>;

    /// Returns one page of events matching every predicate, together with the
    /// total number of matches.
    /// Pages are ordered by start time descending, ties broken by id descending.
    /// A page past the end is empty but still reports the total.
    fn query_events(
        &self,
        predicates: &[EventPredicate],
        page_index: usize,
        page_size: usize,
    ) -> Result<(Vec<TaskRunEvent>, usize)>;

    /// Returns every matching event in no particular order.
    fn scan_events(&self, predicates: &[EventPredicate]) -> Result<Vec<TaskRunEvent>>;

    /// Deletes every matching event and returns how many were removed.
    /// An empty predicate list matches everything.
    fn delete_events(&self, predicates: &[EventPredicate]) -> Result<usize>;

    fn truncate_events(&self) -> Result<usize>;
}
