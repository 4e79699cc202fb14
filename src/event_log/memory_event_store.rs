use super::predicate::EventPredicate;
use super::settings::SettingsStore;
use super::{EventStore, TaskRunEvent};
use anyhow::Result;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Inner {
    events: Vec<TaskRunEvent>,
    next_id: i64,
    settings: HashMap<String, String>,
}

/// Event store that filters a plain vector. Handy in tests and for throwaway runs.
#[derive(Default)]
pub struct InMemoryEventStore {
    inner: Mutex<Inner>,
}

impl InMemoryEventStore {
    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventStore for InMemoryEventStore {
    fn insert_event(&self, event: &TaskRunEvent) -> Result<i64> {
        let mut inner = self.inner();
        inner.next_id += 1;
        let id = inner.next_id;
        let mut stored = event.clone();
        stored.id = Some(id);
        inner.events.push(stored);
        Ok(id)
    }

    fn get_event(&self, id: i64) -> Result<Option<TaskRunEvent>> {
        Ok(self
            .inner()
            .events
            .iter()
            .find(|e| e.id == Some(id))
            .cloned())
    }

    fn query_events(
        &self,
        predicates: &[EventPredicate],
        page_index: usize,
        page_size: usize,
    ) -> Result<(Vec<TaskRunEvent>, usize)> {
        let mut matching = self.scan_events(predicates)?;
        matching.sort_by_key(|e| Reverse((e.started_at, e.id)));
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(page_index.saturating_mul(page_size))
            .take(page_size)
            .collect();
        Ok((items, total))
    }

    fn scan_events(&self, predicates: &[EventPredicate]) -> Result<Vec<TaskRunEvent>> {
        Ok(self
            .inner()
            .events
            .iter()
            .filter(|e| EventPredicate::matches_all(predicates, e))
            .cloned()
            .collect())
    }

    fn delete_events(&self, predicates: &[EventPredicate]) -> Result<usize> {
        let mut inner = self.inner();
        let before = inner.events.len();
        inner
            .events
            .retain(|e| !EventPredicate::matches_all(predicates, e));
        Ok(before - inner.events.len())
    }

    fn truncate_events(&self) -> Result<usize> {
        let mut inner = self.inner();
        let removed = inner.events.len();
        inner.events.clear();
        Ok(removed)
    }
}

impl SettingsStore for InMemoryEventStore {
    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner().settings.get(key).cloned())
    }

    fn set_settings(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut inner = self.inner();
        for (key, value) in entries {
            inner.settings.insert(key.to_string(), value.clone());
        }
        Ok(())
    }

    fn delete_setting(&self, key: &str) -> Result<()> {
        self.inner().settings.remove(key);
        Ok(())
    }
}
