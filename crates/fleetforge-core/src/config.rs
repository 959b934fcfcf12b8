use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for a single `Cell`'s tick and checkpoint loops. All durations
/// default to the values named in the external interface contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellConfig {
    #[serde(with = "humantime_serde")]
    pub tick_period: Duration,
    #[serde(with = "humantime_serde")]
    pub checkpoint_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub stale_player_timeout: Duration,
    pub split_threshold: f64,
    pub merge_threshold: f64,
}

impl Default for CellConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(50),
            checkpoint_interval: Duration::from_secs(30),
            stale_player_timeout: Duration::from_secs(30),
            split_threshold: 0.8,
            merge_threshold: 0.2,
        }
    }
}

/// Tunables for `CellManager`'s split/merge orchestration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManagerConfig {
    #[serde(with = "humantime_serde")]
    pub child_ready_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub split_cooldown: Duration,
    #[serde(with = "humantime_serde")]
    pub merge_monitor_period: Duration,
    #[serde(with = "humantime_serde")]
    pub merge_sustained_low_window: Duration,
    pub event_log_capacity: usize,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            child_ready_timeout: Duration::from_secs(5),
            split_cooldown: Duration::from_secs(2),
            merge_monitor_period: Duration::from_secs(30),
            merge_sustained_low_window: Duration::from_secs(5 * 60),
            event_log_capacity: crate::event::DEFAULT_EVENT_LOG_CAPACITY,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}
