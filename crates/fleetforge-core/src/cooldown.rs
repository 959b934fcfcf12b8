use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use fleetforge_scheduled::Scheduled;

use crate::ids::CellId;

/// Tracks which cells are currently inside a post-split cooldown window.
/// Backed by a min-heap of expiries so garbage collection is O(expired
/// entries) rather than a full scan of every armed cell.
pub struct CooldownTracker {
    active: HashMap<CellId, Instant>,
    expiry_queue: Scheduled<Instant, CellId>,
    blocked_count: u64,
}

impl CooldownTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: HashMap::new(),
            expiry_queue: Scheduled::new(),
            blocked_count: 0,
        }
    }

    pub fn arm(&mut self, cell_id: CellId, duration: Duration) {
        let expiry = Instant::now() + duration;
        self.active.insert(cell_id.clone(), expiry);
        self.expiry_queue.schedule(expiry, cell_id);
    }

    fn gc(&mut self) {
        let now = Instant::now();
        for id in self.expiry_queue.pop_until(&now).collect::<Vec<_>>() {
            if self.active.get(&id).is_some_and(|exp| *exp <= now) {
                self.active.remove(&id);
            }
        }
    }

    pub fn is_active(&mut self, cell_id: &CellId) -> bool {
        self.gc();
        self.active.contains_key(cell_id)
    }

    pub fn record_block(&mut self) {
        self.blocked_count += 1;
    }

    #[must_use]
    pub fn blocked_count(&self) -> u64 {
        self.blocked_count
    }

    pub fn clear(&mut self, cell_id: &CellId) {
        self.active.remove(cell_id);
    }
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn armed_cell_blocks_until_expiry() {
        let mut tracker = CooldownTracker::new();
        let id = CellId::new("a-child-0").unwrap();
        tracker.arm(id.clone(), Duration::from_millis(20));
        assert!(tracker.is_active(&id));
        std::thread::sleep(Duration::from_millis(30));
        assert!(!tracker.is_active(&id));
    }

    #[test]
    fn clear_removes_before_expiry() {
        let mut tracker = CooldownTracker::new();
        let id = CellId::new("a-child-0").unwrap();
        tracker.arm(id.clone(), Duration::from_secs(5));
        tracker.clear(&id);
        assert!(!tracker.is_active(&id));
    }
}
