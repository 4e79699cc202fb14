//! The two scalars the event log is driven by, persisted next to the events.

use super::EventLogError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

const KEY_LOGGING_DISABLED: &str = "logging_disabled";
const KEY_RETENTION_DAYS: &str = "retention_days";

pub const DEFAULT_RETENTION_DAYS: u32 = 14;
/// Upper bound for `retention_days`, roughly a century.
pub const MAX_RETENTION_DAYS: u32 = 36_500;

pub trait SettingsStore: Send + Sync {
    fn get_setting(&self, key: &str) -> Result<Option<String>>;

    /// Writes every entry or none of them.
    fn set_settings(&self, entries: &[(&str, String)]) -> Result<()>;

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.set_settings(&[(key, value.to_string())])
    }

    fn delete_setting(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventLogSettings {
    pub logging_disabled: bool,
    pub retention_days: u32,
}

impl Default for EventLogSettings {
    fn default() -> Self {
        Self {
            logging_disabled: false,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Settings as submitted by an operator, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsUpdate {
    pub logging_disabled: bool,
    pub retention_days: i64,
}

impl SettingsUpdate {
    pub fn validate(&self) -> Result<EventLogSettings, EventLogError> {
        if self.retention_days <= 0 {
            return Err(EventLogError::invalid(
                "retention_days must be greater than zero",
            ));
        }
        let retention_days = u32::try_from(self.retention_days)
            .ok()
            .filter(|days| *days <= MAX_RETENTION_DAYS)
            .ok_or_else(|| {
                EventLogError::invalid(format!(
                    "retention_days must be at most {}",
                    MAX_RETENTION_DAYS
                ))
            })?;
        Ok(EventLogSettings {
            logging_disabled: self.logging_disabled,
            retention_days,
        })
    }
}

/// Shared view of the current settings.
///
/// Readers take a copy per request; updates are persisted first and only then
/// become visible.
#[derive(Clone)]
pub struct SettingsHandle {
    current: Arc<RwLock<EventLogSettings>>,
    store: Arc<dyn SettingsStore>,
}

impl SettingsHandle {
    /// Loads the persisted settings, falling back to `defaults` for missing keys.
    pub fn load(store: Arc<dyn SettingsStore>, defaults: EventLogSettings) -> Result<Self> {
        let logging_disabled = match store.get_setting(KEY_LOGGING_DISABLED)? {
            Some(raw) => raw
                .parse::<bool>()
                .with_context(|| format!("Invalid stored {}: {}", KEY_LOGGING_DISABLED, raw))?,
            None => defaults.logging_disabled,
        };
        let retention_days = match store.get_setting(KEY_RETENTION_DAYS)? {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|days| (1..=MAX_RETENTION_DAYS).contains(days))
                .with_context(|| format!("Invalid stored {}: {}", KEY_RETENTION_DAYS, raw))?,
            None => defaults.retention_days,
        };

        Ok(Self {
            current: Arc::new(RwLock::new(EventLogSettings {
                logging_disabled,
                retention_days,
            })),
            store,
        })
    }

    pub fn snapshot(&self) -> EventLogSettings {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn update(&self, update: &SettingsUpdate) -> Result<EventLogSettings, EventLogError> {
        let settings = update.validate()?;
        Self::persist(self.store.as_ref(), &settings)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = settings;
        info!(
            "Event log settings updated: logging_disabled={}, retention_days={}",
            settings.logging_disabled, settings.retention_days
        );
        Ok(settings)
    }

    /// Writes `defaults` for every key that has never been stored.
    pub fn install_defaults(store: &dyn SettingsStore, defaults: &EventLogSettings) -> Result<()> {
        if store.get_setting(KEY_LOGGING_DISABLED)?.is_none() {
            store.set_setting(KEY_LOGGING_DISABLED, &defaults.logging_disabled.to_string())?;
        }
        if store.get_setting(KEY_RETENTION_DAYS)?.is_none() {
            store.set_setting(KEY_RETENTION_DAYS, &defaults.retention_days.to_string())?;
        }
        Ok(())
    }

    pub fn uninstall(store: &dyn SettingsStore) -> Result<()> {
        store.delete_setting(KEY_LOGGING_DISABLED)?;
        store.delete_setting(KEY_RETENTION_DAYS)
    }

    fn persist(store: &dyn SettingsStore, settings: &EventLogSettings) -> Result<()> {
        store.set_settings(&[
            (KEY_LOGGING_DISABLED, settings.logging_disabled.to_string()),
            (KEY_RETENTION_DAYS, settings.retention_days.to_string()),
        ])
    }
}
