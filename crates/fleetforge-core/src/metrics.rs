use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A snapshot of a cell's load and lifecycle counters, recomputed every
/// tick. `density_ratio` is the single number split/merge decisions hinge
/// on.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellMetrics {
    pub player_count: u32,
    pub max_players: u32,
    pub tick_rate_hz: f64,
    pub tick_duration_ms: f64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_checkpoint: Option<OffsetDateTime>,
    pub state_size_bytes: usize,
    pub split_count: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_split_time: Option<OffsetDateTime>,
    pub avg_split_duration_ms: f64,
    pub merge_count: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_merge_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub low_load_start_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub threshold_breach_time: Option<OffsetDateTime>,
}

impl CellMetrics {
    #[must_use]
    pub fn new(max_players: u32) -> Self {
        Self {
            player_count: 0,
            max_players,
            tick_rate_hz: 0.0,
            tick_duration_ms: 0.0,
            last_checkpoint: None,
            state_size_bytes: 0,
            split_count: 0,
            last_split_time: None,
            avg_split_duration_ms: 0.0,
            merge_count: 0,
            last_merge_time: None,
            low_load_start_time: None,
            threshold_breach_time: None,
        }
    }

    #[must_use]
    pub fn density_ratio(&self) -> f64 {
        if self.max_players == 0 {
            return 0.0;
        }
        f64::from(self.player_count) / f64::from(self.max_players)
    }
}
