use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use fleetforge_geometry::{Position, WorldBounds};
use parking_lot::{Mutex, RwLock};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use crate::{
    capacity::CellCapacity,
    cell::{Cell, SplitCallback},
    checkpoint::CheckpointSink,
    config::{CellConfig, ManagerConfig},
    cooldown::CooldownTracker,
    error::{CellError, Result},
    event::{CellEvent, CellEventKind, EventLog},
    ids::{CellId, PlayerId},
    metrics::CellMetrics,
    player::PlayerState,
    session_sink::SessionSink,
};

/// The input to `CellManager::create_cell`: enough to allocate and start a
/// single cell. `CellManager` fills in identity fields (`parentId`,
/// `generation`, `siblingIds`) that only splits and merges produce.
#[derive(Clone, Debug)]
pub struct CellSpec {
    pub id: CellId,
    pub boundaries: WorldBounds,
    pub capacity: CellCapacity,
}

/// The narrow contract a gateway needs from the manager: lifecycle-free
/// player and lookup operations, with no access to split/merge or the
/// event/checkpoint surface a controller would use. `CellManager`
/// implements both this and its own wider inherent API, per the
/// "two interfaces over one concrete type" shape its split/merge
/// orchestration is built around.
pub trait CellDirectory: Send + Sync {
    fn get_cell(&self, id: &CellId) -> Option<Cell>;
    fn add_player(&self, cell_id: &CellId, player: PlayerState) -> Result<()>;
    fn remove_player(&self, cell_id: &CellId, player_id: &PlayerId) -> Result<()>;
    fn update_player_position(&self, cell_id: &CellId, player_id: &PlayerId, pos: Position) -> Result<()>;
}

struct ManagerInner {
    cells: RwLock<HashMap<CellId, Cell>>,
    cell_config: CellConfig,
    manager_config: ManagerConfig,
    checkpoint_sink: Arc<dyn CheckpointSink>,
    events: EventLog,
    cooldown: Mutex<CooldownTracker>,
    split_in_flight: Mutex<HashSet<CellId>>,
    merge_counter: Mutex<u64>,
    session_sink: Mutex<Option<Arc<dyn SessionSink>>>,
    root_token: CancellationToken,
}

/// Single point of truth for the set of cells and player-to-cell
/// assignments. All split and merge decisions flow through here; writes
/// are serialized on the registry's write lock, reads use the read lock.
/// Cheap to clone — clones share the same manager via an `Arc`.
pub struct CellManager(Arc<ManagerInner>);

impl Clone for CellManager {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl CellManager {
    #[must_use]
    pub fn new(
        cell_config: CellConfig,
        manager_config: ManagerConfig,
        checkpoint_sink: Arc<dyn CheckpointSink>,
    ) -> Self {
        let events = EventLog::new(manager_config.event_log_capacity);
        let manager = Self(Arc::new(ManagerInner {
            cells: RwLock::new(HashMap::new()),
            cell_config,
            manager_config,
            checkpoint_sink,
            events,
            cooldown: Mutex::new(CooldownTracker::new()),
            split_in_flight: Mutex::new(HashSet::new()),
            merge_counter: Mutex::new(0),
            session_sink: Mutex::new(None),
            root_token: CancellationToken::new(),
        }));
        manager.spawn_merge_monitor();
        manager
    }

    /// Wires the session store a gateway or manager-service binary uses.
    /// Split apart from `new` because the session store itself typically
    /// needs a reference to a `Router`, not this manager, to construct.
    pub fn set_session_sink(&self, sink: Arc<dyn SessionSink>) {
        *self.0.session_sink.lock() = Some(sink);
    }

    fn session_sink(&self) -> Option<Arc<dyn SessionSink>> {
        self.0.session_sink.lock().clone()
    }

    #[must_use]
    pub fn blocked_split_count(&self) -> u64 {
        self.0.cooldown.lock().blocked_count()
    }

    fn wire_split_callback(&self, cell: &Cell) {
        let manager = self.clone();
        let callback: SplitCallback = Arc::new(move |cell_id: CellId| {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager.handle_threshold_split(cell_id).await;
            });
        });
        cell.set_on_split_needed(callback);
    }

    async fn wait_ready(&self, cells: &[&Cell]) -> Result<()> {
        let timeout = self.0.manager_config.child_ready_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            if cells.iter().all(|c| c.is_ready()) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CellError::Timeout {
                    operation: "wait for cell readiness".to_string(),
                    elapsed: timeout,
                });
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tracing::instrument(skip(self, spec), fields(cell_id = %spec.id))]
    pub async fn create_cell(&self, spec: CellSpec) -> Result<Cell> {
        {
            let cells = self.0.cells.read();
            if cells.contains_key(&spec.id) {
                return Err(CellError::AlreadyExists(spec.id.to_string()));
            }
        }

        let cell = Cell::new(
            spec.id.clone(),
            spec.boundaries,
            spec.capacity,
            None,
            0,
            Vec::new(),
            &self.0.cell_config,
            self.0.checkpoint_sink.clone(),
        );
        self.wire_split_callback(&cell);
        cell.start(self.0.root_token.child_token())?;

        self.0.cells.write().insert(cell.id().clone(), cell.clone());
        self.0
            .events
            .append(CellEvent::new(CellEventKind::CellCreated, cell.id().clone()));
        tracing::info!(cell_id = %cell.id(), "cell created");
        Ok(cell)
    }

    #[must_use]
    pub fn get_cell(&self, id: &CellId) -> Option<Cell> {
        self.0.cells.read().get(id).cloned()
    }

    /// Every cell currently registered, sorted by id. Used by admin/
    /// observability surfaces; never consulted by split/merge logic itself.
    #[must_use]
    pub fn list_cells(&self) -> Vec<Cell> {
        let mut cells: Vec<_> = self.0.cells.read().values().cloned().collect();
        cells.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        cells
    }

    pub fn delete_cell(&self, id: &CellId) -> Result<()> {
        let cell = { self.0.cells.write().remove(id) };
        let Some(cell) = cell else {
            return Err(CellError::CellNotFound(id.clone()));
        };
        cell.stop();
        if let Some(sink) = self.session_sink() {
            sink.remove_for_cell(id);
        }
        self.0.cooldown.lock().clear(id);
        self.0.split_in_flight.lock().remove(id);
        self.0
            .events
            .append(CellEvent::new(CellEventKind::CellTerminated, id.clone()));
        Ok(())
    }

    pub fn add_player(&self, cell_id: &CellId, player: PlayerState) -> Result<()> {
        if let Some(sink) = self.session_sink() {
            if let Some(existing) = sink.active_cell_for(&player.id) {
                if &existing != cell_id {
                    return Err(CellError::Conflict(format!(
                        "player {} already has an active session on cell {existing}",
                        player.id
                    )));
                }
            }
        }
        let cell = self
            .get_cell(cell_id)
            .ok_or_else(|| CellError::CellNotFound(cell_id.clone()))?;
        let player_id = player.id.clone();
        cell.add_player(player)?;
        if let Some(sink) = self.session_sink() {
            sink.rewrite(&player_id, cell_id);
            sink.touch(&player_id);
        }
        self.0.events.append(
            CellEvent::new(CellEventKind::PlayerAdded, cell_id.clone())
                .with_metadata("playerId", player_id.to_string()),
        );
        Ok(())
    }

    pub fn remove_player(&self, cell_id: &CellId, player_id: &PlayerId) -> Result<()> {
        let cell = self
            .get_cell(cell_id)
            .ok_or_else(|| CellError::CellNotFound(cell_id.clone()))?;
        cell.remove_player(player_id)
    }

    pub fn update_player_position(&self, cell_id: &CellId, player_id: &PlayerId, pos: Position) -> Result<()> {
        let cell = self
            .get_cell(cell_id)
            .ok_or_else(|| CellError::CellNotFound(cell_id.clone()))?;
        cell.update_player_position(player_id, pos)?;
        if let Some(sink) = self.session_sink() {
            sink.touch(player_id);
        }
        Ok(())
    }

    pub fn should_split(&self, cell_id: &CellId, threshold: f64) -> Result<bool> {
        let cell = self
            .get_cell(cell_id)
            .ok_or_else(|| CellError::CellNotFound(cell_id.clone()))?;
        Ok(cell.get_density_ratio() >= threshold)
    }

    pub fn get_load_metrics(&self, cell_id: &CellId) -> Result<CellMetrics> {
        let cell = self
            .get_cell(cell_id)
            .ok_or_else(|| CellError::CellNotFound(cell_id.clone()))?;
        Ok(cell.get_metrics())
    }

    pub fn checkpoint(&self, cell_id: &CellId) -> Result<Bytes> {
        let cell = self
            .get_cell(cell_id)
            .ok_or_else(|| CellError::CellNotFound(cell_id.clone()))?;
        cell.checkpoint()
    }

    pub fn restore(&self, cell_id: &CellId, bytes: &[u8]) -> Result<()> {
        let cell = self
            .get_cell(cell_id)
            .ok_or_else(|| CellError::CellNotFound(cell_id.clone()))?;
        cell.restore(bytes)
    }

    #[must_use]
    pub fn get_events(&self) -> Vec<CellEvent> {
        self.0.events.all()
    }

    #[must_use]
    pub fn get_events_since(&self, since: OffsetDateTime) -> Vec<CellEvent> {
        self.0.events.since(since)
    }

    /// Automatic, threshold-triggered split. Subject to cooldown.
    pub async fn split_cell(&self, cell_id: &CellId, threshold: f64) -> Result<Vec<Cell>> {
        self.execute_split(cell_id, Some(threshold), "ThresholdBreach", None).await
    }

    /// Bypasses threshold and cooldown; stamps `userInfo` into the event.
    pub async fn manual_split_cell(&self, cell_id: &CellId, user_info: serde_json::Value) -> Result<Vec<Cell>> {
        self.execute_split(cell_id, None, "ManualOverride", Some(user_info)).await
    }

    async fn handle_threshold_split(&self, cell_id: CellId) {
        {
            let mut in_flight = self.0.split_in_flight.lock();
            if in_flight.contains(&cell_id) {
                return;
            }
            in_flight.insert(cell_id.clone());
        }
        let threshold = self.0.cell_config.split_threshold;
        if let Err(e) = self.split_cell(&cell_id, threshold).await {
            tracing::warn!(cell_id = %cell_id, error = %e, "automatic split did not complete");
        }
        self.0.split_in_flight.lock().remove(&cell_id);
    }

    #[tracing::instrument(skip(self, user_info), fields(cell_id = %cell_id))]
    async fn execute_split(
        &self,
        cell_id: &CellId,
        threshold: Option<f64>,
        reason: &str,
        user_info: Option<serde_json::Value>,
    ) -> Result<Vec<Cell>> {
        let manual = threshold.is_none();
        let parent = self
            .get_cell(cell_id)
            .ok_or_else(|| CellError::CellNotFound(cell_id.clone()))?;

        if !manual {
            if self.0.cooldown.lock().is_active(cell_id) {
                self.0.cooldown.lock().record_block();
                return Err(CellError::Conflict(format!("cell {cell_id} is in split cooldown")));
            }
            let threshold = threshold.expect("checked manual above");
            if parent.get_density_ratio() < threshold {
                return Err(CellError::ThresholdNotMet(cell_id.clone()));
            }
        }

        let start_instant = Instant::now();
        let (bounds1, bounds2) = parent.boundaries().split_x();
        let child1_id = CellId::child(cell_id, 0);
        let child2_id = CellId::child(cell_id, 1);
        let generation = parent.generation() + 1;
        let sibling_ids = vec![child1_id.clone(), child2_id.clone()];

        let child1 = Cell::new(
            child1_id.clone(),
            bounds1,
            parent.capacity().clone(),
            Some(cell_id.clone()),
            generation,
            sibling_ids.clone(),
            &self.0.cell_config,
            self.0.checkpoint_sink.clone(),
        );
        let child2 = Cell::new(
            child2_id.clone(),
            bounds2,
            parent.capacity().clone(),
            Some(cell_id.clone()),
            generation,
            sibling_ids,
            &self.0.cell_config,
            self.0.checkpoint_sink.clone(),
        );
        self.wire_split_callback(&child1);
        self.wire_split_callback(&child2);

        child1.start(self.0.root_token.child_token())?;
        child2.start(self.0.root_token.child_token())?;

        if let Err(e) = self.wait_ready(&[&child1, &child2]).await {
            child1.stop();
            child2.stop();
            return Err(e);
        }

        // Holds the registry write lock from the moment the parent is
        // drained until the children replace it in the map. `add_player`'s
        // `get_cell` takes a read lock to resolve its target, so a request
        // racing this split either resolves against the parent before this
        // block starts (and the parent still holds its own players) or
        // blocks here and resolves against the children afterward. Nothing
        // can observe the parent as empty-but-still-registered in between.
        let (total, migrated, errors, move_events, duration, within_1s, success_rate) = {
            let mut cells = self.0.cells.write();

            let players = parent.drain_players();
            let total = players.len();
            let mut migrated = 0usize;
            let mut errors = 0usize;
            let mut move_events = Vec::with_capacity(total);

            for player in players {
                let target = if child1.is_within_boundaries(player.position) {
                    &child1
                } else {
                    &child2
                };
                let player_id = player.id.clone();
                match target.add_player(player) {
                    Ok(()) => {
                        migrated += 1;
                        if let Some(sink) = self.session_sink() {
                            sink.rewrite(&player_id, target.id());
                        }
                        move_events.push((player_id, target.id().clone()));
                    }
                    Err(e) => {
                        errors += 1;
                        tracing::warn!(
                            cell_id = %cell_id, player_id = %player_id, error = %e,
                            "player redistribution failed during split"
                        );
                    }
                }
            }

            let duration = start_instant.elapsed();
            let within_1s = duration <= Duration::from_secs(1);
            let success_rate = if total == 0 { 1.0 } else { migrated as f64 / total as f64 };

            parent.stop();
            cells.remove(cell_id);
            cells.insert(child1.id().clone(), child1.clone());
            cells.insert(child2.id().clone(), child2.clone());

            (total, migrated, errors, move_events, duration, within_1s, success_rate)
        };

        let parent_metrics = parent.get_metrics();
        let duration_ms = duration.as_secs_f64() * 1000.0;
        child1.record_split_lineage(parent_metrics.split_count, parent_metrics.avg_split_duration_ms, duration_ms);
        child2.record_split_lineage(parent_metrics.split_count, parent_metrics.avg_split_duration_ms, duration_ms);

        if !manual {
            let cooldown = self.0.manager_config.split_cooldown;
            let mut tracker = self.0.cooldown.lock();
            tracker.arm(child1.id().clone(), cooldown);
            tracker.arm(child2.id().clone(), cooldown);
        }

        for (player_id, to_cell) in move_events {
            self.0.events.append(
                CellEvent::new(CellEventKind::PlayerMoved, cell_id.clone())
                    .with_metadata("playerId", player_id.to_string())
                    .with_metadata("toCellId", to_cell.to_string()),
            );
        }

        let mut split_event = CellEvent::new(CellEventKind::CellSplit, cell_id.clone())
            .with_parent(cell_id.clone())
            .with_children(vec![child1.id().clone(), child2.id().clone()])
            .with_duration_ms(duration_ms)
            .with_metadata("reason", reason)
            .with_metadata("playerCount", total as u64)
            .with_metadata("migratedCount", migrated as u64)
            .with_metadata("redistributionErrors", errors as u64)
            .with_metadata("successRate", success_rate)
            .with_metadata("within1s", within_1s);
        if let Some(info) = user_info {
            split_event = split_event.with_metadata("userInfo", info);
        }
        self.0.events.append(split_event);
        self.0.events.append(
            CellEvent::new(CellEventKind::CellTerminated, cell_id.clone()).with_parent(cell_id.clone()),
        );

        tracing::info!(
            cell_id = %cell_id, child1 = %child1.id(), child2 = %child2.id(),
            migrated, errors, "cell split"
        );

        Ok(vec![child1, child2])
    }

    /// Automatic merge of two sustained-low-density siblings.
    pub async fn merge_cells(&self, id1: &CellId, id2: &CellId) -> Result<Cell> {
        self.execute_merge(id1, id2, false, None).await
    }

    /// Bypasses the density check; stamps `userInfo` into the event.
    pub async fn manual_merge_cells(&self, id1: &CellId, id2: &CellId, user_info: serde_json::Value) -> Result<Cell> {
        self.execute_merge(id1, id2, true, Some(user_info)).await
    }

    #[tracing::instrument(skip(self, user_info), fields(cell_a = %id1, cell_b = %id2))]
    async fn execute_merge(
        &self,
        id1: &CellId,
        id2: &CellId,
        manual: bool,
        user_info: Option<serde_json::Value>,
    ) -> Result<Cell> {
        let (cell1, cell2) = {
            let cells = self.0.cells.read();
            let cell1 = cells.get(id1).cloned().ok_or_else(|| CellError::CellNotFound(id1.clone()))?;
            let cell2 = cells.get(id2).cloned().ok_or_else(|| CellError::CellNotFound(id2.clone()))?;
            (cell1, cell2)
        };

        let parent1 = cell1.parent_id();
        let parent2 = cell2.parent_id();
        if parent1.is_none() || parent1 != parent2 {
            return Err(CellError::InvalidInput(format!(
                "{id1} and {id2} are not sibling cells"
            )));
        }
        if cell1.boundaries().shared_edge_axis(&cell2.boundaries()).is_none() {
            return Err(CellError::InvalidInput(format!(
                "{id1} and {id2} are not spatially adjacent"
            )));
        }
        if !manual {
            let threshold = self.0.cell_config.merge_threshold;
            if cell1.get_density_ratio() > threshold || cell2.get_density_ratio() > threshold {
                return Err(CellError::ThresholdNotMet(id1.clone()));
            }
        }

        let start_instant = Instant::now();
        let merged_bounds = cell1.boundaries().union(&cell2.boundaries());
        let merged_capacity = CellCapacity::merged(cell1.capacity(), cell2.capacity());
        let generation = cell1.generation().max(cell2.generation()) + 1;
        let counter = {
            let mut counter = self.0.merge_counter.lock();
            *counter += 1;
            *counter
        };
        let merged_id = CellId::merged(id1, counter);

        let merged = Cell::new(
            merged_id,
            merged_bounds,
            merged_capacity,
            None,
            generation,
            Vec::new(),
            &self.0.cell_config,
            self.0.checkpoint_sink.clone(),
        );
        self.wire_split_callback(&merged);
        merged.start(self.0.root_token.child_token())?;
        if let Err(e) = self.wait_ready(&[&merged]).await {
            merged.stop();
            return Err(e);
        }

        // Holds the registry write lock from the moment the sources are
        // drained until the merged cell replaces them in the map, for the
        // same reason `execute_split` does: no caller's `add_player` may
        // resolve against an emptied-but-still-registered source cell.
        let migrated = {
            let mut cells = self.0.cells.write();

            let mut migrated = 0u32;
            for source in [&cell1, &cell2] {
                for player in source.drain_players() {
                    let player_id = player.id.clone();
                    if merged.is_within_boundaries(player.position) && merged.add_player(player).is_ok() {
                        migrated += 1;
                        if let Some(sink) = self.session_sink() {
                            sink.rewrite(&player_id, merged.id());
                        }
                    }
                }
            }

            cell1.stop();
            cell2.stop();
            cells.remove(id1);
            cells.remove(id2);
            cells.insert(merged.id().clone(), merged.clone());

            migrated
        };
        self.0.cooldown.lock().clear(id1);
        self.0.cooldown.lock().clear(id2);

        let duration = start_instant.elapsed();
        let merge_count = cell1.get_metrics().merge_count.max(cell2.get_metrics().merge_count) + 1;
        merged.record_merge_lineage(merge_count);
        let reason = if manual { "ManualOverride" } else { "SustainedLowDensity" };
        let mut merge_event = CellEvent::new(CellEventKind::CellMerged, merged.id().clone())
            .with_children(vec![id1.clone(), id2.clone()])
            .with_duration_ms(duration.as_secs_f64() * 1000.0)
            .with_metadata("reason", reason)
            .with_metadata("playerCount", migrated);
        if let Some(info) = user_info {
            merge_event = merge_event.with_metadata("userInfo", info);
        }
        self.0.events.append(merge_event);
        self.0
            .events
            .append(CellEvent::new(CellEventKind::CellTerminated, id1.clone()));
        self.0
            .events
            .append(CellEvent::new(CellEventKind::CellTerminated, id2.clone()));

        tracing::info!(cell_a = %id1, cell_b = %id2, merged = %merged.id(), migrated, "cells merged");

        Ok(merged)
    }

    fn spawn_merge_monitor(&self) {
        let manager = self.clone();
        let token = self.0.root_token.child_token();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.0.manager_config.merge_monitor_period);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => manager.run_merge_monitor_cycle().await,
                }
            }
        });
    }

    async fn run_merge_monitor_cycle(&self) {
        let sustained_window = self.0.manager_config.merge_sustained_low_window;
        let candidates: Vec<Cell> = self.0.cells.read().values().cloned().collect();
        let is_sustained_low = |cell: &Cell| -> bool {
            cell.get_metrics()
                .low_load_start_time
                .is_some_and(|since| (OffsetDateTime::now_utc() - since).as_seconds_f64() >= sustained_window.as_secs_f64())
        };

        let mut merged_this_cycle: HashSet<CellId> = HashSet::new();
        for cell in &candidates {
            if merged_this_cycle.contains(cell.id()) || !is_sustained_low(cell) {
                continue;
            }
            let Some(parent_id) = cell.parent_id() else {
                continue;
            };
            let sibling = candidates.iter().find(|other| {
                other.id() != cell.id()
                    && other.parent_id().as_ref() == Some(&parent_id)
                    && !merged_this_cycle.contains(other.id())
                    && cell.boundaries().shared_edge_axis(&other.boundaries()).is_some()
                    && is_sustained_low(other)
            });
            if let Some(sibling) = sibling {
                merged_this_cycle.insert(cell.id().clone());
                merged_this_cycle.insert(sibling.id().clone());
                let id1 = cell.id().clone();
                let id2 = sibling.id().clone();
                let manager = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = manager.merge_cells(&id1, &id2).await {
                        tracing::warn!(cell_a = %id1, cell_b = %id2, error = %e, "sustained-low merge did not complete");
                    }
                });
            }
        }
    }

    /// Cancels the manager-wide token (propagating to every cell and the
    /// merge monitor) and waits, up to a bounded timeout, for every cell's
    /// background loops to actually exit.
    pub async fn shutdown(&self) {
        self.0.root_token.cancel();
        let cells: Vec<Cell> = self.0.cells.write().drain().map(|(_, cell)| cell).collect();
        for cell in &cells {
            cell.stop();
        }
        let timeout = self.0.manager_config.shutdown_timeout;
        let join_all = async {
            for cell in cells {
                cell.join().await;
            }
        };
        if tokio::time::timeout(timeout, join_all).await.is_err() {
            tracing::warn!("shutdown timed out waiting for cell loops to exit");
        }
    }
}

impl CellDirectory for CellManager {
    fn get_cell(&self, id: &CellId) -> Option<Cell> {
        Self::get_cell(self, id)
    }

    fn add_player(&self, cell_id: &CellId, player: PlayerState) -> Result<()> {
        Self::add_player(self, cell_id, player)
    }

    fn remove_player(&self, cell_id: &CellId, player_id: &PlayerId) -> Result<()> {
        Self::remove_player(self, cell_id, player_id)
    }

    fn update_player_position(&self, cell_id: &CellId, player_id: &PlayerId, pos: Position) -> Result<()> {
        Self::update_player_position(self, cell_id, player_id, pos)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fleetforge_geometry::AxisBounds;

    use super::*;
    use crate::checkpoint::InMemoryCheckpointSink;

    fn fast_cell_config() -> CellConfig {
        CellConfig {
            tick_period: Duration::from_millis(20),
            checkpoint_interval: Duration::from_secs(60),
            stale_player_timeout: Duration::from_secs(30),
            split_threshold: 0.8,
            merge_threshold: 0.2,
        }
    }

    fn fast_manager_config() -> ManagerConfig {
        ManagerConfig {
            child_ready_timeout: Duration::from_secs(2),
            split_cooldown: Duration::from_secs(10),
            merge_monitor_period: Duration::from_secs(3600),
            merge_sustained_low_window: Duration::from_secs(3600),
            event_log_capacity: crate::event::DEFAULT_EVENT_LOG_CAPACITY,
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    fn test_manager() -> CellManager {
        CellManager::new(fast_cell_config(), fast_manager_config(), Arc::new(InMemoryCheckpointSink::default()))
    }

    fn world_bounds(min: f64, max: f64) -> WorldBounds {
        WorldBounds::new_2d(AxisBounds::new(min, max).unwrap(), AxisBounds::new(0.0, 100.0).unwrap())
    }

    async fn spawn_cell(manager: &CellManager, id: &str, min: f64, max: f64, max_players: u32) -> Cell {
        let spec = CellSpec {
            id: CellId::new(id).unwrap(),
            boundaries: world_bounds(min, max),
            capacity: CellCapacity::new(max_players),
        };
        let cell = manager.create_cell(spec).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        cell
    }

    fn player(id: &str, x: f64) -> PlayerState {
        PlayerState::new(PlayerId::new(id).unwrap(), Position::new(x, 50.0))
    }

    #[tokio::test]
    async fn create_cell_rejects_duplicate_id() {
        let manager = test_manager();
        spawn_cell(&manager, "a", 0.0, 100.0, 10).await;
        let err = manager
            .create_cell(CellSpec {
                id: CellId::new("a").unwrap(),
                boundaries: world_bounds(0.0, 100.0),
                capacity: CellCapacity::new(10),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CellError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn add_player_rejects_unknown_cell() {
        let manager = test_manager();
        let err = manager
            .add_player(&CellId::new("missing").unwrap(), player("p1", 5.0))
            .unwrap_err();
        assert!(matches!(err, CellError::CellNotFound(_)));
    }

    #[tokio::test]
    async fn manual_split_conserves_player_count_across_children() {
        let manager = test_manager();
        let cell = spawn_cell(&manager, "world", 0.0, 100.0, 50).await;
        for i in 0..6 {
            let x = f64::from(i) * 15.0;
            manager.add_player(cell.id(), player(&format!("p{i}"), x)).unwrap();
        }

        let children = manager
            .manual_split_cell(cell.id(), serde_json::json!({"requestedBy": "test"}))
            .await
            .unwrap();
        assert_eq!(children.len(), 2);

        let total: u32 = children.iter().map(|c| c.get_state().player_count).sum();
        assert_eq!(total, 6);
        assert!(manager.get_cell(cell.id()).is_none(), "parent retired after split");
    }

    #[tokio::test]
    async fn split_cell_respects_cooldown_on_children() {
        let manager = test_manager();
        let cell = spawn_cell(&manager, "world", 0.0, 100.0, 2).await;
        manager.add_player(cell.id(), player("p0", 10.0)).unwrap();
        manager.add_player(cell.id(), player("p1", 90.0)).unwrap();

        let children = manager.split_cell(cell.id(), 0.8).await.unwrap();
        let child = &children[0];

        let err = manager.split_cell(child.id(), 0.0).await.unwrap_err();
        assert!(matches!(err, CellError::Conflict(_)));
        assert_eq!(manager.blocked_split_count(), 1);
    }

    #[tokio::test]
    async fn manual_split_bypasses_threshold_and_cooldown() {
        let manager = test_manager();
        let cell = spawn_cell(&manager, "world", 0.0, 100.0, 10).await;

        let children = manager.split_cell(cell.id(), 2.0).await;
        assert!(matches!(children.unwrap_err(), CellError::ThresholdNotMet(_)));

        let children = manager.manual_split_cell(cell.id(), serde_json::Value::Null).await.unwrap();
        assert_eq!(children.len(), 2);
    }

    #[tokio::test]
    async fn merge_requires_adjacent_siblings() {
        let manager = test_manager();
        spawn_cell(&manager, "a", 0.0, 50.0, 10).await;
        spawn_cell(&manager, "b", 50.0, 100.0, 10).await;

        let err = manager
            .manual_merge_cells(&CellId::new("a").unwrap(), &CellId::new("b").unwrap(), serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, CellError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn merge_conserves_players_and_clears_low_load_window() {
        let manager = test_manager();
        let cell = spawn_cell(&manager, "world", 0.0, 100.0, 20).await;
        for i in 0..4 {
            manager.add_player(cell.id(), player(&format!("p{i}"), f64::from(i) * 20.0)).unwrap();
        }
        let children = manager.manual_split_cell(cell.id(), serde_json::Value::Null).await.unwrap();
        let before_total: u32 = children.iter().map(|c| c.get_state().player_count).sum();

        let merged = manager
            .manual_merge_cells(children[0].id(), children[1].id(), serde_json::json!({"reason": "test"}))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(merged.get_state().player_count, before_total);
        assert!(merged.get_metrics().low_load_start_time.is_none());
        assert!(manager.get_cell(children[0].id()).is_none());
        assert!(manager.get_cell(children[1].id()).is_none());
    }

    #[tokio::test]
    async fn events_are_recorded_in_chronological_order() {
        let manager = test_manager();
        let cell = spawn_cell(&manager, "world", 0.0, 100.0, 10).await;
        manager.add_player(cell.id(), player("p0", 10.0)).unwrap();
        manager.manual_split_cell(cell.id(), serde_json::Value::Null).await.unwrap();

        let events = manager.get_events();
        assert!(events.len() >= 4);
        for pair in events.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        assert!(matches!(events[0].kind, CellEventKind::CellCreated));
        assert!(events.iter().any(|e| matches!(e.kind, CellEventKind::CellSplit)));
    }

    #[tokio::test]
    async fn get_events_since_excludes_earlier_events() {
        let manager = test_manager();
        spawn_cell(&manager, "a", 0.0, 100.0, 10).await;
        let cutoff = OffsetDateTime::now_utc();
        tokio::time::sleep(Duration::from_millis(10)).await;
        spawn_cell(&manager, "b", 100.0, 200.0, 10).await;

        let recent = manager.get_events_since(cutoff);
        assert!(recent.iter().all(|e| e.cell_id.as_str() == "b"));
        assert!(!recent.is_empty());
    }
}
