use super::predicate::{format_instant, EventPredicate};
use super::schema::EVENT_LOG_VERSIONED_SCHEMAS;
use super::settings::SettingsStore;
use super::{EventStore, TaskRunEvent};
use crate::sqlite_persistence::open_versioned_db;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const EVENT_COLUMNS: &str = "id, task_id, started_at, ended_at, duration_ms, is_error, \
     error_message, error_detail, is_manual, triggered_by";

pub struct SqliteEventStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEventStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_db(db_path, EVENT_LOG_VERSIONED_SCHEMAS, "event log")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn parse_instant(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    column,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
    }

    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<TaskRunEvent> {
        let started_at: String = row.get("started_at")?;
        let ended_at: Option<String> = row.get("ended_at")?;

        Ok(TaskRunEvent {
            id: Some(row.get("id")?),
            task_id: row.get("task_id")?,
            started_at: Self::parse_instant(2, &started_at)?,
            ended_at: ended_at
                .map(|raw| Self::parse_instant(3, &raw))
                .transpose()?,
            duration_ms: row.get("duration_ms")?,
            is_error: row.get("is_error")?,
            error_message: row.get("error_message")?,
            error_detail: row.get("error_detail")?,
            is_manual: row.get("is_manual")?,
            triggered_by: row.get("triggered_by")?,
        })
    }

    fn select_events(
        conn: &Connection,
        predicates: &[EventPredicate],
        suffix: &str,
        extra: Vec<Value>,
    ) -> Result<Vec<TaskRunEvent>> {
        let (where_sql, mut values) = EventPredicate::where_clause(predicates);
        values.extend(extra);
        let sql = format!(
            "SELECT {} FROM task_run_events{}{}",
            EVENT_COLUMNS, where_sql, suffix
        );
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params_from_iter(values), Self::row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }
}

impl EventStore for SqliteEventStore {
    fn insert_event(&self, event: &TaskRunEvent) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO task_run_events (task_id, started_at, ended_at, duration_ms, is_error, \
             error_message, error_detail, is_manual, triggered_by) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.task_id,
                format_instant(&event.started_at),
                event.ended_at.as_ref().map(format_instant),
                event.duration_ms,
                event.is_error,
                event.error_message,
                event.error_detail,
                event.is_manual,
                event.triggered_by,
            ],
        )
        .context("Failed to insert task run event")?;
        Ok(conn.last_insert_rowid())
    }

    fn get_event(&self, id: i64) -> Result<Option<TaskRunEvent>> {
        let conn = self.conn();
        let event = conn
            .query_row(
                &format!("SELECT {} FROM task_run_events WHERE id = ?1", EVENT_COLUMNS),
                params![id],
                Self::row_to_event,
            )
            .optional()?;
        Ok(event)
    }

    fn query_events(
        &self,
        predicates: &[EventPredicate],
        page_index: usize,
        page_size: usize,
    ) -> Result<(Vec<TaskRunEvent>, usize)> {
        let conn = self.conn();

        let (where_sql, values) = EventPredicate::where_clause(predicates);
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM task_run_events{}", where_sql),
            params_from_iter(values),
            |row| row.get(0),
        )?;

        let offset = page_index.saturating_mul(page_size);
        let items = Self::select_events(
            &conn,
            predicates,
            " ORDER BY started_at DESC, id DESC LIMIT ? OFFSET ?",
            vec![
                Value::Integer(page_size.min(i64::MAX as usize) as i64),
                Value::Integer(offset.min(i64::MAX as usize) as i64),
            ],
        )?;

        Ok((items, total as usize))
    }

    fn scan_events(&self, predicates: &[EventPredicate]) -> Result<Vec<TaskRunEvent>> {
        let conn = self.conn();
        Self::select_events(&conn, predicates, "", Vec::new())
    }

    fn delete_events(&self, predicates: &[EventPredicate]) -> Result<usize> {
        let conn = self.conn();
        let (where_sql, values) = EventPredicate::where_clause(predicates);
        let deleted = conn
            .execute(
                &format!("DELETE FROM task_run_events{}", where_sql),
                params_from_iter(values),
            )
            .context("Failed to delete task run events")?;
        Ok(deleted)
    }

    fn truncate_events(&self) -> Result<usize> {
        let conn = self.conn();
        let deleted = conn
            .execute("DELETE FROM task_run_events", [])
            .context("Failed to clear task run events")?;
        Ok(deleted)
    }
}

impl SettingsStore for SqliteEventStore {
    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        let value = conn
            .query_row(
                "SELECT value FROM event_log_settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_settings(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let updated_at = format_instant(&Utc::now());
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO event_log_settings (key, value, updated_at) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, updated_at],
            )
            .with_context(|| format!("Failed to store setting {}", key))?;
        }
        tx.commit().context("Failed to commit settings")?;
        Ok(())
    }

    fn delete_setting(&self, key: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM event_log_settings WHERE key = ?1", params![key])?;
        Ok(())
    }
}
