use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use fleetforge_geometry::{Position, WorldBounds};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    capacity::CellCapacity,
    checkpoint::{CellSnapshot, CheckpointSink},
    config::CellConfig,
    error::{CellError, Result},
    ids::{CellId, PlayerId},
    metrics::CellMetrics,
    player::PlayerState,
};

/// A callback `Cell` invokes at most once per tick when density crosses the
/// split threshold. `CellManager` wires this to enqueue an asynchronous
/// split so the tick loop itself never blocks on one.
pub type SplitCallback = Arc<dyn Fn(CellId) + Send + Sync>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CellPhase {
    Initializing,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl Display for CellPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initializing => "Initializing",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellHealth {
    pub healthy: bool,
    pub player_count: u32,
    pub uptime: Duration,
    pub last_checkpoint: Option<OffsetDateTime>,
    pub errors: Vec<String>,
}

/// A deep-copy snapshot of a cell's observable state. Owning no references
/// back into the cell, it is safe to hold and serialize after the cell has
/// moved on.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellState {
    pub id: CellId,
    pub boundaries: WorldBounds,
    pub capacity: CellCapacity,
    pub players: HashMap<PlayerId, PlayerState>,
    pub player_count: u32,
    pub phase: CellPhase,
    pub ready: bool,
    pub tick: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub parent_id: Option<CellId>,
    pub generation: u32,
    pub sibling_ids: Vec<CellId>,
    pub game_state: serde_json::Value,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_checkpoint: Option<OffsetDateTime>,
}

struct Thresholds {
    split: f64,
    merge: f64,
}

struct CellInner {
    phase: CellPhase,
    players: HashMap<PlayerId, PlayerState>,
    tick: u64,
    created_at: OffsetDateTime,
    created_instant: Instant,
    updated_at: OffsetDateTime,
    parent_id: Option<CellId>,
    generation: u32,
    sibling_ids: Vec<CellId>,
    game_state: serde_json::Value,
    last_checkpoint: Option<OffsetDateTime>,
    metrics: CellMetrics,
    last_tick_instant: Instant,
    threshold_breached_active: bool,
}

struct CellShared {
    id: CellId,
    boundaries: WorldBounds,
    capacity: CellCapacity,
    tick_period: Duration,
    checkpoint_interval: Duration,
    stale_player_timeout: Duration,
    thresholds: Mutex<Thresholds>,
    inner: Mutex<CellInner>,
    cancellation: Mutex<Option<CancellationToken>>,
    checkpoint_sink: Arc<dyn CheckpointSink>,
    on_split_needed: Mutex<Option<SplitCallback>>,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

/// One spatial region: owns its players, runs a fixed-rate tick loop,
/// reports density and health, serializes its own state. Cheap to clone;
/// clones share the same underlying cell via an `Arc`.
pub struct Cell(Arc<CellShared>);

impl Clone for Cell {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl Cell {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: CellId,
        boundaries: WorldBounds,
        capacity: CellCapacity,
        parent_id: Option<CellId>,
        generation: u32,
        sibling_ids: Vec<CellId>,
        config: &CellConfig,
        checkpoint_sink: Arc<dyn CheckpointSink>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        let metrics = CellMetrics::new(capacity.max_players);
        Self(Arc::new(CellShared {
            id,
            boundaries,
            capacity,
            tick_period: config.tick_period,
            checkpoint_interval: config.checkpoint_interval,
            stale_player_timeout: config.stale_player_timeout,
            thresholds: Mutex::new(Thresholds {
                split: config.split_threshold,
                merge: config.merge_threshold,
            }),
            inner: Mutex::new(CellInner {
                phase: CellPhase::Initializing,
                players: HashMap::new(),
                tick: 0,
                created_at: now,
                created_instant: Instant::now(),
                updated_at: now,
                parent_id,
                generation,
                sibling_ids,
                game_state: serde_json::Value::Null,
                last_checkpoint: None,
                metrics,
                last_tick_instant: Instant::now(),
                threshold_breached_active: false,
            }),
            cancellation: Mutex::new(None),
            checkpoint_sink,
            on_split_needed: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }))
    }

    #[must_use]
    pub fn id(&self) -> &CellId {
        &self.0.id
    }

    #[must_use]
    pub fn boundaries(&self) -> WorldBounds {
        self.0.boundaries
    }

    #[must_use]
    pub fn capacity(&self) -> &CellCapacity {
        &self.0.capacity
    }

    #[must_use]
    pub fn generation(&self) -> u32 {
        self.0.inner.lock().generation
    }

    #[must_use]
    pub fn parent_id(&self) -> Option<CellId> {
        self.0.inner.lock().parent_id.clone()
    }

    #[must_use]
    pub fn phase(&self) -> CellPhase {
        self.0.inner.lock().phase
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.phase(), CellPhase::Running)
    }

    pub fn set_split_threshold(&self, ratio: f64) {
        self.0.thresholds.lock().split = ratio;
    }

    pub fn set_merge_threshold(&self, ratio: f64) {
        self.0.thresholds.lock().merge = ratio;
    }

    pub fn set_on_split_needed(&self, callback: SplitCallback) {
        *self.0.on_split_needed.lock() = Some(callback);
    }

    #[must_use]
    pub fn is_within_boundaries(&self, pos: Position) -> bool {
        self.0.boundaries.contains_point(pos)
    }

    #[must_use]
    pub fn is_threshold_breached(&self) -> bool {
        let density = self.0.inner.lock().metrics.density_ratio();
        density >= self.0.thresholds.lock().split
    }

    #[must_use]
    pub fn get_density_ratio(&self) -> f64 {
        self.0.inner.lock().metrics.density_ratio()
    }

    /// Transitions `Initializing -> Starting` and spawns the tick and
    /// checkpoint loops plus the warmup timer. `cancellation` is expected
    /// to be a child token of the owning manager's root token so a single
    /// `Shutdown` can stop every cell at once.
    pub fn start(&self, cancellation: CancellationToken) -> Result<()> {
        {
            let mut inner = self.0.inner.lock();
            if !matches!(inner.phase, CellPhase::Initializing) {
                return Err(CellError::NotReady {
                    cell_id: self.0.id.clone(),
                    phase: inner.phase,
                });
            }
            inner.phase = CellPhase::Starting;
        }
        *self.0.cancellation.lock() = Some(cancellation.clone());

        let warmup_cell = self.clone();
        let warmup_token = cancellation.clone();
        let warmup_handle = tokio::spawn(
            async move {
                tokio::select! {
                    () = tokio::time::sleep(Duration::from_millis(100)) => {
                        let mut inner = warmup_cell.0.inner.lock();
                        if matches!(inner.phase, CellPhase::Starting) {
                            inner.phase = CellPhase::Running;
                            drop(inner);
                            tracing::info!(cell_id = %warmup_cell.0.id, "cell running");
                        }
                    }
                    () = warmup_token.cancelled() => {
                        tracing::debug!(cell_id = %warmup_cell.0.id, "warmup cancelled before running");
                    }
                }
            }
            .instrument(tracing::info_span!("cell_warmup", cell_id = %self.0.id)),
        );

        let tick_cell = self.clone();
        let tick_token = cancellation.clone();
        let tick_handle = tokio::spawn(
            async move { tick_cell.run_tick_loop(tick_token).await }
                .instrument(tracing::info_span!("cell_tick_loop", cell_id = %self.0.id)),
        );

        let checkpoint_cell = self.clone();
        let checkpoint_token = cancellation;
        let checkpoint_handle = tokio::spawn(
            async move { checkpoint_cell.run_checkpoint_loop(checkpoint_token).await }
                .instrument(tracing::info_span!("cell_checkpoint_loop", cell_id = %self.0.id)),
        );

        self.0
            .tasks
            .lock()
            .extend([warmup_handle, tick_handle, checkpoint_handle]);

        Ok(())
    }

    /// Awaits every background task this cell has spawned. Only meaningful
    /// after `stop()` has cancelled them; intended for `CellManager::shutdown`
    /// to bound how long it waits for loops to actually exit.
    pub async fn join(&self) {
        let handles: Vec<_> = self.0.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Idempotent. Cancels the warmup timer and both background loops;
    /// always succeeds.
    pub fn stop(&self) {
        {
            let mut inner = self.0.inner.lock();
            if matches!(inner.phase, CellPhase::Stopped) {
                return;
            }
            inner.phase = CellPhase::Stopping;
        }
        if let Some(token) = self.0.cancellation.lock().as_ref() {
            token.cancel();
        }
        self.0.inner.lock().phase = CellPhase::Stopped;
    }

    pub fn add_player(&self, mut player: PlayerState) -> Result<()> {
        let mut inner = self.0.inner.lock();
        if !matches!(inner.phase, CellPhase::Running) {
            return Err(CellError::NotReady {
                cell_id: self.0.id.clone(),
                phase: inner.phase,
            });
        }
        if inner.players.len() as u32 >= self.0.capacity.max_players {
            return Err(CellError::CapacityExceeded {
                cell_id: self.0.id.clone(),
                max_players: self.0.capacity.max_players,
            });
        }
        if inner.players.contains_key(&player.id) {
            return Err(CellError::AlreadyExists(format!(
                "player {} already present in cell {}",
                player.id, self.0.id
            )));
        }
        if !self.0.boundaries.contains_point(player.position) {
            return Err(CellError::InvalidInput(format!(
                "player {} position is outside cell {} boundaries",
                player.id, self.0.id
            )));
        }
        player.last_seen = OffsetDateTime::now_utc();
        inner.players.insert(player.id.clone(), player);
        inner.metrics.player_count = inner.players.len() as u32;
        inner.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    pub fn remove_player(&self, player_id: &PlayerId) -> Result<()> {
        let mut inner = self.0.inner.lock();
        if inner.players.remove(player_id).is_none() {
            return Err(CellError::PlayerNotFound(player_id.to_string()));
        }
        inner.metrics.player_count = inner.players.len() as u32;
        inner.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    pub fn update_player_position(&self, player_id: &PlayerId, pos: Position) -> Result<()> {
        if !self.0.boundaries.contains_point(pos) {
            return Err(CellError::InvalidInput(format!(
                "position is outside cell {} boundaries",
                self.0.id
            )));
        }
        let mut inner = self.0.inner.lock();
        let player = inner
            .players
            .get_mut(player_id)
            .ok_or_else(|| CellError::PlayerNotFound(player_id.to_string()))?;
        player.position = pos;
        player.last_seen = OffsetDateTime::now_utc();
        inner.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    #[must_use]
    pub fn get_player(&self, player_id: &PlayerId) -> Option<PlayerState> {
        self.0.inner.lock().players.get(player_id).cloned()
    }

    #[must_use]
    pub fn get_state(&self) -> CellState {
        let inner = self.0.inner.lock();
        CellState {
            id: self.0.id.clone(),
            boundaries: self.0.boundaries,
            capacity: self.0.capacity.clone(),
            players: inner.players.clone(),
            player_count: inner.metrics.player_count,
            phase: inner.phase,
            ready: matches!(inner.phase, CellPhase::Running),
            tick: inner.tick,
            created_at: inner.created_at,
            updated_at: inner.updated_at,
            parent_id: inner.parent_id.clone(),
            generation: inner.generation,
            sibling_ids: inner.sibling_ids.clone(),
            game_state: inner.game_state.clone(),
            last_checkpoint: inner.last_checkpoint,
        }
    }

    #[must_use]
    pub fn get_health(&self) -> CellHealth {
        let inner = self.0.inner.lock();
        let stalled = inner.last_tick_instant.elapsed() > self.0.tick_period * 2;
        let mut errors = Vec::new();
        if stalled {
            errors.push("tick loop stalled".to_string());
        }
        let healthy = matches!(inner.phase, CellPhase::Running) && !stalled;
        CellHealth {
            healthy,
            player_count: inner.metrics.player_count,
            uptime: inner.created_instant.elapsed(),
            last_checkpoint: inner.last_checkpoint,
            errors,
        }
    }

    #[must_use]
    pub fn get_metrics(&self) -> CellMetrics {
        self.0.inner.lock().metrics.clone()
    }

    /// Folds a parent's split lineage into a freshly created child: bumps
    /// `splitCount`, stamps `lastSplitTime`, and rolls `avgSplitDurationMs`
    /// forward with this split's duration.
    pub fn record_split_lineage(&self, parent_split_count: u64, parent_avg_ms: f64, duration_ms: f64) {
        let mut inner = self.0.inner.lock();
        let count = parent_split_count + 1;
        inner.metrics.avg_split_duration_ms = parent_avg_ms.mul_add(parent_split_count as f64, duration_ms) / count as f64;
        inner.metrics.split_count = count;
        inner.metrics.last_split_time = Some(OffsetDateTime::now_utc());
    }

    /// Stamps a merged cell's `mergeCount`/`lastMergeTime` from its sources.
    pub fn record_merge_lineage(&self, merge_count: u64) {
        let mut inner = self.0.inner.lock();
        inner.metrics.merge_count = merge_count;
        inner.metrics.last_merge_time = Some(OffsetDateTime::now_utc());
    }

    /// Removes every player and returns them, leaving the cell empty. Used
    /// by `CellManager` to redistribute a parent's players during split,
    /// or to drain an input cell during merge, immediately before the cell
    /// is stopped.
    #[must_use]
    pub fn drain_players(&self) -> Vec<PlayerState> {
        let mut inner = self.0.inner.lock();
        let drained: Vec<_> = inner.players.drain().map(|(_, p)| p).collect();
        inner.metrics.player_count = 0;
        drained
    }

    pub fn checkpoint(&self) -> Result<Bytes> {
        let snapshot = {
            let inner = self.0.inner.lock();
            CellSnapshot {
                players: inner
                    .players
                    .iter()
                    .map(|(id, p)| (id.to_string(), p.clone()))
                    .collect(),
                player_count: inner.metrics.player_count,
                game_state: inner.game_state.clone(),
                tick: inner.tick,
            }
        };
        let bytes = snapshot.encode()?;
        self.0.checkpoint_sink.write(&self.0.id, bytes.clone())?;
        let mut inner = self.0.inner.lock();
        let now = OffsetDateTime::now_utc();
        inner.last_checkpoint = Some(now);
        inner.metrics.last_checkpoint = Some(now);
        inner.metrics.state_size_bytes = bytes.len();
        Ok(bytes)
    }

    /// Replaces players, player count, game state, and tick from a
    /// checkpoint. Identity, boundaries, and capacity are untouched.
    pub fn restore(&self, bytes: &[u8]) -> Result<()> {
        let snapshot = CellSnapshot::decode(bytes)?;
        let mut inner = self.0.inner.lock();
        let mut players = HashMap::with_capacity(snapshot.players.len());
        for (id, player) in snapshot.players {
            players.insert(PlayerId::new(id)?, player);
        }
        inner.metrics.player_count = snapshot.player_count;
        inner.players = players;
        inner.game_state = snapshot.game_state;
        inner.tick = snapshot.tick;
        inner.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn run_tick_loop(self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.0.tick_period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = interval.tick() => self.do_tick(),
            }
        }
    }

    fn do_tick(&self) {
        let start = Instant::now();
        let callback = {
            let mut inner = self.0.inner.lock();
            inner.tick += 1;
            let now = OffsetDateTime::now_utc();
            inner.updated_at = now;
            inner.last_tick_instant = start;

            let stale_timeout = self.0.stale_player_timeout.as_secs_f64();
            for player in inner.players.values_mut() {
                if (now - player.last_seen).as_seconds_f64() > stale_timeout {
                    player.connected = false;
                }
            }
            inner.metrics.player_count = inner.players.len() as u32;

            let Thresholds { split, merge } = {
                let t = self.0.thresholds.lock();
                Thresholds {
                    split: t.split,
                    merge: t.merge,
                }
            };
            let density = inner.metrics.density_ratio();

            let mut fire_callback = false;
            if density >= split {
                if !inner.threshold_breached_active {
                    inner.metrics.threshold_breach_time = Some(now);
                    inner.threshold_breached_active = true;
                    fire_callback = true;
                }
                inner.metrics.low_load_start_time = None;
            } else {
                inner.threshold_breached_active = false;
                if density <= merge {
                    if inner.metrics.low_load_start_time.is_none() {
                        inner.metrics.low_load_start_time = Some(now);
                    }
                } else {
                    inner.metrics.low_load_start_time = None;
                }
            }

            let tick_duration_ms = start.elapsed().as_secs_f64() * 1000.0;
            inner.metrics.tick_duration_ms = tick_duration_ms;
            let period_secs = self.0.tick_period.as_secs_f64();
            if period_secs > 0.0 {
                inner.metrics.tick_rate_hz = 1.0 / period_secs;
            }

            if fire_callback {
                self.0.on_split_needed.lock().clone()
            } else {
                None
            }
        };

        if let Some(callback) = callback {
            callback(self.0.id.clone());
        }
    }

    async fn run_checkpoint_loop(self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.0.checkpoint_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.checkpoint() {
                        tracing::warn!(cell_id = %self.0.id, error = %e, "checkpoint failed");
                    }
                }
            }
        }
    }
}
