use super::schema::TASKS_VERSIONED_SCHEMAS;
use super::{NewTask, TaskDefinition, TaskRegistry};
use crate::sqlite_persistence::open_versioned_db;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

const TASK_COLUMNS: &str = "id, name, task_type, interval_secs, enabled, \
     last_started_at, last_ended_at, last_succeeded_at";

pub struct SqliteTaskRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskRegistry {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_db(db_path, TASKS_VERSIONED_SCHEMAS, "task registry")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    fn parse_datetime(column: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        column,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
        })
        .transpose()
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<TaskDefinition> {
        let interval_secs: i64 = row.get("interval_secs")?;
        Ok(TaskDefinition {
            id: row.get("id")?,
            name: row.get("name")?,
            task_type: row.get("task_type")?,
            interval_secs: u64::try_from(interval_secs).unwrap_or(0),
            enabled: row.get("enabled")?,
            last_started_at: Self::parse_datetime(5, row.get("last_started_at")?)?,
            last_ended_at: Self::parse_datetime(6, row.get("last_ended_at")?)?,
            last_succeeded_at: Self::parse_datetime(7, row.get("last_succeeded_at")?)?,
        })
    }
}

impl TaskRegistry for SqliteTaskRegistry {
    fn get_task(&self, id: i64) -> Result<Option<TaskDefinition>> {
        let conn = self.conn();
        let task = conn
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                params![id],
                Self::row_to_task,
            )
            .optional()
            .with_context(|| format!("Failed to load task {}", id))?;
        Ok(task)
    }

    fn get_task_by_type(&self, task_type: &str) -> Result<Option<TaskDefinition>> {
        let conn = self.conn();
        let task = conn
            .query_row(
                &format!(
                    "SELECT {} FROM tasks WHERE task_type = ?1 ORDER BY id LIMIT 1",
                    TASK_COLUMNS
                ),
                params![task_type],
                Self::row_to_task,
            )
            .optional()
            .with_context(|| format!("Failed to load task of type {}", task_type))?;
        Ok(task)
    }

    fn list_tasks(&self) -> Result<Vec<TaskDefinition>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM tasks ORDER BY id", TASK_COLUMNS))?;
        let tasks = stmt
            .query_map([], Self::row_to_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    fn insert_task(&self, task: &NewTask) -> Result<i64> {
        if task.task_type.is_empty() {
            bail!("Task type cannot be empty");
        }
        let interval_secs = i64::try_from(task.interval_secs)
            .with_context(|| format!("Interval of task {} is too large", task.name))?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO tasks (name, task_type, interval_secs, enabled) VALUES (?1, ?2, ?3, ?4)",
            params![task.name, task.task_type, interval_secs, task.enabled],
        )
        .with_context(|| format!("Failed to insert task of type {}", task.task_type))?;
        let id = conn.last_insert_rowid();
        info!("Registered task {} ({}) as id {}", task.name, task.task_type, id);
        Ok(id)
    }

    fn delete_task(&self, id: i64) -> Result<bool> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn record_task_started(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE tasks SET last_started_at = ?1 WHERE id = ?2",
            params![Self::format_datetime(&at), id],
        )?;
        Ok(())
    }

    fn record_task_finished(&self, id: i64, at: DateTime<Utc>, succeeded: bool) -> Result<()> {
        let conn = self.conn();
        let at = Self::format_datetime(&at);
        if succeeded {
            conn.execute(
                "UPDATE tasks SET last_ended_at = ?1, last_succeeded_at = ?1 WHERE id = ?2",
                params![at, id],
            )?;
        } else {
            conn.execute(
                "UPDATE tasks SET last_ended_at = ?1 WHERE id = ?2",
                params![at, id],
            )?;
        }
        Ok(())
    }
}
