//! SQLite schema for the event log database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Task run events
// =============================================================================

const TASK_RUN_EVENTS_TABLE_V1: Table = Table {
    name: "task_run_events",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("task_id", &SqlType::Integer, non_null = true),
        sqlite_column!("started_at", &SqlType::Text, non_null = true),
        sqlite_column!("ended_at", &SqlType::Text),
        sqlite_column!("duration_ms", &SqlType::Integer),
        sqlite_column!(
            "is_error",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("error_message", &SqlType::Text),
        sqlite_column!("error_detail", &SqlType::Text),
        sqlite_column!(
            "is_manual",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("triggered_by", &SqlType::Integer),
    ],
    indices: &[
        // rolling averages: ended within window, grouped by task
        ("idx_task_run_events_ended_task", "ended_at, task_id"),
        // date filters and retention deletes
        ("idx_task_run_events_started", "started_at"),
        ("idx_task_run_events_task_ended_duration", "task_id, ended_at, duration_ms"),
    ],
};

// =============================================================================
// Version 2 - Persisted settings
// =============================================================================

const EVENT_LOG_SETTINGS_TABLE_V2: Table = Table {
    name: "event_log_settings",
    columns: &[
        sqlite_column!("key", &SqlType::Text, is_primary_key = true),
        sqlite_column!("value", &SqlType::Text, non_null = true),
        sqlite_column!("updated_at", &SqlType::Text, non_null = true),
    ],
    indices: &[],
};

fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    EVENT_LOG_SETTINGS_TABLE_V2.create(conn)
}

pub const EVENT_LOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[TASK_RUN_EVENTS_TABLE_V1],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[TASK_RUN_EVENTS_TABLE_V1, EVENT_LOG_SETTINGS_TABLE_V2],
        migration: Some(migrate_v1_to_v2),
    },
];
