use super::{EventLogError, EventPredicate, EventStore};
use crate::clock::Clock;
use crate::server::metrics;
use chrono::Duration;
use std::sync::Arc;
use tracing::info;

/// Deletes events that fell out of the retention window.
pub struct RetentionPruner {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
}

impl RetentionPruner {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Removes every event that started strictly before `now - retention_days`.
    pub fn prune(&self, retention_days: u32) -> Result<usize, EventLogError> {
        if retention_days == 0 {
            return Err(EventLogError::invalid(
                "retention_days must be greater than zero",
            ));
        }
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(Duration::days(i64::from(retention_days)))
            .ok_or_else(|| {
                EventLogError::invalid(format!(
                    "retention of {} days reaches before the earliest representable date",
                    retention_days
                ))
            })?;
        let deleted = self
            .store
            .delete_events(&[EventPredicate::StartedBefore(cutoff)])?;
        metrics::record_events_pruned("retention", deleted);
        info!(
            "Pruned {} task run events started before {} ({} days retention)",
            deleted, cutoff, retention_days
        );
        Ok(deleted)
    }

    /// Removes every event regardless of age.
    pub fn clear_all(&self) -> Result<usize, EventLogError> {
        let deleted = self.store.truncate_events()?;
        metrics::record_events_pruned("clear", deleted);
        info!("Cleared {} task run events", deleted);
        Ok(deleted)
    }
}
