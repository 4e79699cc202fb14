//! Shared constants for end-to-end tests
//!
//! When test data changes (admin identities, seeded tasks, etc.),
//! update only this file.

// ============================================================================
// Admin Identities
// ============================================================================

/// Token of the configured test admin
pub const ADMIN_TOKEN: &str = "admin-token-1";

/// Actor id of the configured test admin
pub const ADMIN_ACTOR_ID: i64 = 1;

/// Display label of the configured test admin
pub const ADMIN_LABEL: &str = "admin@example.com";

// ============================================================================
// Seeded Tasks
// ============================================================================

/// Task whose body always succeeds
pub const SEND_EMAILS_TASK_TYPE: &str = "send_emails";
pub const SEND_EMAILS_TASK_NAME: &str = "Send emails";

/// Task whose body always fails with FAILING_TASK_MESSAGE
pub const SYNC_FEEDS_TASK_TYPE: &str = "sync_feeds";
pub const SYNC_FEEDS_TASK_NAME: &str = "Sync feeds";
pub const FAILING_TASK_MESSAGE: &str = "feed host unreachable";

/// Registered in the task registry, but no body is registered for it
pub const ORPHAN_TASK_TYPE: &str = "orphan";
pub const ORPHAN_TASK_NAME: &str = "Orphan";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for the server to become ready
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness probes
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

/// Timeout for individual HTTP requests
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
