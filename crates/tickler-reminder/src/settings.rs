use std::time::Duration;

use chrono::TimeDelta;
use tickler_core::config::ReminderConfig;

/// Runtime knobs for the engine and the negotiator.
///
/// Built from [`ReminderConfig`] in production; tests construct it directly
/// so they can use millisecond timeouts.
#[derive(Debug, Clone)]
pub struct ReminderSettings {
    pub tick_interval: Duration,
    pub negotiation_timeout: Duration,
    pub auto_snooze: TimeDelta,
    pub max_store_failures: u32,
}

impl From<&ReminderConfig> for ReminderSettings {
    fn from(cfg: &ReminderConfig) -> Self {
        Self {
            tick_interval: cfg.tick_interval(),
            negotiation_timeout: cfg.negotiation_timeout(),
            auto_snooze: cfg.auto_snooze(),
            max_store_failures: cfg.max_store_failures,
        }
    }
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self::from(&ReminderConfig::default())
    }
}
