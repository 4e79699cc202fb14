//! SQLite schema for the task registry database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const TASKS_TABLE_V1: Table = Table {
    name: "tasks",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("task_type", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("interval_secs", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "enabled",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("1")
        ),
        sqlite_column!("last_started_at", &SqlType::Text),
        sqlite_column!("last_ended_at", &SqlType::Text),
        sqlite_column!("last_succeeded_at", &SqlType::Text),
    ],
    indices: &[],
};

pub const TASKS_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[TASKS_TABLE_V1],
    migration: None,
}];
