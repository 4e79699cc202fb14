use crate::actors::AdminIdentity;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub display_utc_offset_minutes: Option<i32>,
    pub scheduler_enabled: Option<bool>,

    // Event log install defaults
    pub retention_days: Option<u32>,
    pub logging_disabled: Option<bool>,
    pub prune_interval_hours: Option<u64>,

    // File-only sections
    pub admins: Vec<AdminIdentity>,
    pub tasks: Vec<TaskConfig>,
}

/// A host task registered at startup if its type is not known yet.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TaskConfig {
    pub name: String,
    pub task_type: String,
    pub interval_secs: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
