use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::CellId;

/// The default capacity of a cell manager's in-memory event ring.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 10_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CellEventKind {
    CellCreated,
    CellSplit,
    CellMerged,
    CellTerminated,
    PlayerAdded,
    PlayerMoved,
}

/// An immutable record of something that happened to a cell. Consumers
/// (the out-of-scope controller, an audit log) read these via
/// `CellManager::get_events`/`get_events_since`; nothing in the core
/// mutates a `CellEvent` after it is appended to the ring.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellEvent {
    #[serde(rename = "type")]
    pub kind: CellEventKind,
    pub cell_id: CellId,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub parent_id: Option<CellId>,
    pub children_ids: Option<Vec<CellId>>,
    #[serde(rename = "duration")]
    pub duration_ms: Option<f64>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl CellEvent {
    #[must_use]
    pub fn new(kind: CellEventKind, cell_id: CellId) -> Self {
        Self {
            kind,
            cell_id,
            timestamp: OffsetDateTime::now_utc(),
            parent_id: None,
            children_ids: None,
            duration_ms: None,
            metadata: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: CellId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<CellId>) -> Self {
        self.children_ids = Some(children);
        self
    }

    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A bounded in-memory append log. Oldest events are dropped once capacity
/// is reached; the contract never promises durability beyond this ring, as
/// persistence is the out-of-scope controller's job.
pub struct EventLog {
    capacity: usize,
    events: Mutex<VecDeque<CellEvent>>,
}

impl EventLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn append(&self, event: CellEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    #[must_use]
    pub fn all(&self) -> Vec<CellEvent> {
        self.events.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn since(&self, since: OffsetDateTime) -> Vec<CellEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.timestamp > since)
            .cloned()
            .collect()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_drops_oldest_past_capacity() {
        let log = EventLog::new(2);
        for i in 0..5 {
            log.append(CellEvent::new(
                CellEventKind::CellCreated,
                CellId::new(format!("cell-{i}")).unwrap(),
            ));
        }
        let all = log.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].cell_id.as_str(), "cell-3");
        assert_eq!(all[1].cell_id.as_str(), "cell-4");
    }

    #[test]
    fn since_filters_strictly_after() {
        let log = EventLog::default();
        let cutoff = OffsetDateTime::now_utc();
        std::thread::sleep(std::time::Duration::from_millis(5));
        log.append(CellEvent::new(
            CellEventKind::CellCreated,
            CellId::new("a").unwrap(),
        ));
        assert_eq!(log.since(cutoff).len(), 1);
        assert_eq!(log.since(OffsetDateTime::now_utc()).len(), 0);
    }
}
