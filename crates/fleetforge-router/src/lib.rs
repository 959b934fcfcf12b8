//! The cell registry and load-balancing strategies a gateway consults when
//! admitting a new player. `Router` holds load and health as *reported*
//! facts, fed in from outside; it never probes a cell itself.

use std::collections::HashMap;

use fleetforge_core::CellId;
use parking_lot::Mutex;
use serde::Serialize;

mod error;

pub use error::RouterError;

/// Everything the router knows about one registered cell. `load` is a
/// caller-supplied number in `[0.0, 1.0]` (e.g. tick-duration headroom);
/// `player_count`/`capacity` feed the density term of `SelectByLoad`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellInfo {
    pub id: CellId,
    pub address: String,
    pub capacity: u32,
    pub player_count: u32,
    pub load: f64,
    pub healthy: bool,
}

impl CellInfo {
    #[must_use]
    pub fn new(id: CellId, address: impl Into<String>, capacity: u32) -> Self {
        Self {
            id,
            address: address.into(),
            capacity,
            player_count: 0,
            load: 0.0,
            healthy: true,
        }
    }

    fn combined_load(&self) -> f64 {
        let density = if self.capacity == 0 {
            1.0
        } else {
            f64::from(self.player_count) / f64::from(self.capacity)
        };
        0.7 * self.load + 0.3 * density
    }

    fn remaining_capacity(&self) -> i64 {
        i64::from(self.capacity) - i64::from(self.player_count)
    }
}

struct RegistryInner {
    cells: HashMap<CellId, CellInfo>,
    round_robin_cursor: usize,
}

/// The router's own lock, per the component isolation §5 requires: nothing
/// outside `Router` ever touches this registry directly.
pub struct Router {
    inner: Mutex<RegistryInner>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                cells: HashMap::new(),
                round_robin_cursor: 0,
            }),
        }
    }

    pub fn register_cell(&self, info: CellInfo) {
        self.inner.lock().cells.insert(info.id.clone(), info);
    }

    pub fn unregister_cell(&self, id: &CellId) {
        self.inner.lock().cells.remove(id);
    }

    pub fn update_cell_load(&self, id: &CellId, player_count: u32, load: f64) -> Result<(), RouterError> {
        let mut inner = self.inner.lock();
        let cell = inner.cells.get_mut(id).ok_or_else(|| RouterError::UnknownCell(id.clone()))?;
        cell.player_count = player_count;
        cell.load = load;
        Ok(())
    }

    pub fn update_cell_health(&self, id: &CellId, healthy: bool) -> Result<(), RouterError> {
        let mut inner = self.inner.lock();
        let cell = inner.cells.get_mut(id).ok_or_else(|| RouterError::UnknownCell(id.clone()))?;
        cell.healthy = healthy;
        Ok(())
    }

    #[must_use]
    pub fn get_cell(&self, id: &CellId) -> Option<CellInfo> {
        self.inner.lock().cells.get(id).cloned()
    }

    #[must_use]
    pub fn healthy_cells(&self) -> Vec<CellInfo> {
        let mut cells: Vec<_> = self.inner.lock().cells.values().filter(|c| c.healthy).cloned().collect();
        cells.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        cells
    }

    /// Every registered cell, healthy or not. Used by admin/observability
    /// listings rather than selection.
    #[must_use]
    pub fn all_cells(&self) -> Vec<CellInfo> {
        let mut cells: Vec<_> = self.inner.lock().cells.values().cloned().collect();
        cells.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        cells
    }

    /// Advances a monotonic counter over the current healthy set, sorted by
    /// id for a deterministic rotation order.
    pub fn select_round_robin(&self) -> Result<CellId, RouterError> {
        let mut inner = self.inner.lock();
        let mut healthy: Vec<_> = inner.cells.values().filter(|c| c.healthy).map(|c| c.id.clone()).collect();
        healthy.sort();
        if healthy.is_empty() {
            return Err(RouterError::NoHealthyCell);
        }
        let idx = inner.round_robin_cursor % healthy.len();
        inner.round_robin_cursor = inner.round_robin_cursor.wrapping_add(1);
        Ok(healthy[idx].clone())
    }

    /// Picks the healthy cell minimizing `0.7 * load + 0.3 * density`. Ties
    /// break on cell id for determinism.
    pub fn select_by_load(&self) -> Result<CellId, RouterError> {
        let inner = self.inner.lock();
        best_by_load(inner.cells.values().filter(|c| c.healthy)).ok_or_else(|| {
            tracing::warn!(registered = inner.cells.len(), "no healthy cell for select_by_load");
            RouterError::NoHealthyCell
        })
    }

    /// Filters to cells with `capacity - playerCount >= required`, then
    /// selects by combined load among the survivors.
    pub fn select_with_capacity(&self, required: u32) -> Result<CellId, RouterError> {
        let inner = self.inner.lock();
        let candidates = inner
            .cells
            .values()
            .filter(|c| c.healthy && c.remaining_capacity() >= i64::from(required));
        best_by_load(candidates).ok_or_else(|| {
            tracing::warn!(required, registered = inner.cells.len(), "no healthy cell with enough capacity");
            RouterError::InsufficientCapacity { required }
        })
    }
}

fn best_by_load<'a>(candidates: impl Iterator<Item = &'a CellInfo>) -> Option<CellId> {
    candidates
        .min_by(|a, b| {
            a.combined_load()
                .partial_cmp(&b.combined_load())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        })
        .map(|c| c.id.clone())
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn cell(id: &str, capacity: u32, player_count: u32, load: f64) -> CellInfo {
        let mut info = CellInfo::new(CellId::new(id).unwrap(), format!("{id}.local:9000"), capacity);
        info.player_count = player_count;
        info.load = load;
        info
    }

    #[test]
    fn round_robin_cycles_healthy_set() {
        let router = Router::new();
        router.register_cell(cell("a", 100, 0, 0.0));
        router.register_cell(cell("b", 100, 0, 0.0));

        let first = router.select_round_robin().unwrap();
        let second = router.select_round_robin().unwrap();
        let third = router.select_round_robin().unwrap();
        assert_ne!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn round_robin_fails_with_no_healthy_cells() {
        let router = Router::new();
        assert!(matches!(router.select_round_robin(), Err(RouterError::NoHealthyCell)));
    }

    #[test]
    fn select_by_load_prefers_lower_combined_load() {
        let router = Router::new();
        router.register_cell(cell("busy", 100, 90, 0.9));
        router.register_cell(cell("idle", 100, 10, 0.1));
        assert_eq!(router.select_by_load().unwrap().as_str(), "idle");
    }

    #[test]
    fn select_by_load_ignores_unhealthy_cells() {
        let router = Router::new();
        router.register_cell(cell("idle-but-unhealthy", 100, 0, 0.0));
        router.update_cell_health(&CellId::new("idle-but-unhealthy").unwrap(), false).unwrap();
        router.register_cell(cell("busier-but-healthy", 100, 50, 0.5));
        assert_eq!(router.select_by_load().unwrap().as_str(), "busier-but-healthy");
    }

    #[test]
    fn select_with_capacity_filters_full_cells() {
        let router = Router::new();
        router.register_cell(cell("full", 10, 10, 0.0));
        router.register_cell(cell("room", 10, 5, 0.5));
        assert_eq!(router.select_with_capacity(3).unwrap().as_str(), "room");
    }

    #[test]
    fn select_with_capacity_fails_when_nobody_has_room() {
        let router = Router::new();
        router.register_cell(cell("full", 10, 10, 0.0));
        assert!(matches!(
            router.select_with_capacity(1),
            Err(RouterError::InsufficientCapacity { required: 1 })
        ));
    }

    #[test]
    fn unregister_removes_from_selection() {
        let router = Router::new();
        router.register_cell(cell("only", 10, 0, 0.0));
        router.unregister_cell(&CellId::new("only").unwrap());
        assert!(matches!(router.select_round_robin(), Err(RouterError::NoHealthyCell)));
    }

    proptest! {
        #[test]
        fn select_by_load_never_returns_a_more_loaded_cell_when_a_lighter_one_exists(
            light_load in 0.0_f64..0.5, heavy_load in 0.5_f64..1.0,
        ) {
            let router = Router::new();
            router.register_cell(cell("light", 100, 0, light_load));
            router.register_cell(cell("heavy", 100, 0, heavy_load));
            prop_assert_eq!(router.select_by_load().unwrap().as_str(), "light");
        }
    }
}
