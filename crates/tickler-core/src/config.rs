use std::time::Duration;

use chrono::TimeDelta;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_NEGOTIATION_TIMEOUT_SECS: u64 = 15;
/// Offset applied when a snooze negotiation gets no usable answer.
pub const DEFAULT_AUTO_SNOOZE_MINUTES: u64 = 60;
/// Ten years. Larger offsets are refused at load time.
pub const MAX_AUTO_SNOOZE_MINUTES: u64 = 10 * 365 * 24 * 60;
pub const DEFAULT_MAX_STORE_FAILURES: u32 = 3;

/// Top-level config (tickler.toml + TICKLER_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicklerConfig {
    #[serde(default)]
    pub reminder: ReminderConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Pause between the end of one tick and the start of the next.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// How long a snooze prompt waits for the operator.
    #[serde(default = "default_negotiation_timeout")]
    pub negotiation_timeout_secs: u64,
    /// Auto-snooze offset when the operator does not answer or answers badly.
    #[serde(default = "default_auto_snooze")]
    pub auto_snooze_minutes: u64,
    /// Consecutive failed snapshots before the scheduler gives up.
    #[serde(default = "default_max_store_failures")]
    pub max_store_failures: u32,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            negotiation_timeout_secs: DEFAULT_NEGOTIATION_TIMEOUT_SECS,
            auto_snooze_minutes: DEFAULT_AUTO_SNOOZE_MINUTES,
            max_store_failures: DEFAULT_MAX_STORE_FAILURES,
        }
    }
}

impl ReminderConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_secs(self.negotiation_timeout_secs)
    }

    /// Auto-snooze offset, clamped to `1..=MAX_AUTO_SNOOZE_MINUTES`.
    pub fn auto_snooze(&self) -> TimeDelta {
        let minutes = self
            .auto_snooze_minutes
            .clamp(1, MAX_AUTO_SNOOZE_MINUTES);
        i64::try_from(minutes)
            .ok()
            .and_then(TimeDelta::try_minutes)
            .unwrap_or_else(|| TimeDelta::minutes(DEFAULT_AUTO_SNOOZE_MINUTES as i64))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    /// Nothing survives the process; handy for demos.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_db_path(),
        }
    }
}

fn default_tick_interval() -> u64 {
    DEFAULT_TICK_INTERVAL_SECS
}
fn default_negotiation_timeout() -> u64 {
    DEFAULT_NEGOTIATION_TIMEOUT_SECS
}
fn default_auto_snooze() -> u64 {
    DEFAULT_AUTO_SNOOZE_MINUTES
}
fn default_max_store_failures() -> u32 {
    DEFAULT_MAX_STORE_FAILURES
}
fn default_db_path() -> String {
    format!("{}/tickler.db", tickler_home())
}

fn tickler_home() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tickler", home)
}

impl TicklerConfig {
    /// Load config from a TOML file with TICKLER_* env var overrides.
    ///
    /// Nested keys use a double underscore:
    /// `TICKLER_REMINDER__AUTO_SNOOZE_MINUTES=15`.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: TicklerConfig = Figment::from(Serialized::defaults(TicklerConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("TICKLER_").split("__"))
            .extract()
            .map_err(|e| crate::error::TicklerError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> crate::error::Result<()> {
        let r = &self.reminder;
        let checks = [
            ("reminder.tick_interval_secs", r.tick_interval_secs == 0),
            (
                "reminder.negotiation_timeout_secs",
                r.negotiation_timeout_secs == 0,
            ),
            ("reminder.auto_snooze_minutes", r.auto_snooze_minutes == 0),
            ("reminder.max_store_failures", r.max_store_failures == 0),
        ];
        for (key, is_zero) in checks {
            if is_zero {
                return Err(crate::error::TicklerError::Config(format!(
                    "{key} must be greater than zero"
                )));
            }
        }
        if r.auto_snooze_minutes > MAX_AUTO_SNOOZE_MINUTES {
            return Err(crate::error::TicklerError::Config(format!(
                "reminder.auto_snooze_minutes must be at most {MAX_AUTO_SNOOZE_MINUTES}"
            )));
        }
        Ok(())
    }
}

pub fn default_config_path() -> String {
    format!("{}/tickler.toml", tickler_home())
}
