use std::{collections::HashMap, time::Duration};

use fleetforge_core::{CellId, PlayerId};
use parking_lot::Mutex;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Http,
    Websocket,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ConnectionKind,
    pub remote_addr: String,
    #[serde(with = "time::serde::rfc3339")]
    pub connected_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
    pub player_id: Option<PlayerId>,
    pub cell_id: Option<CellId>,
}

/// Tracks every admitted connection. Owns its own lock, independent of the
/// session map and rate limiter.
pub struct ConnectionTracker {
    connections: Mutex<HashMap<String, Connection>>,
}

impl ConnectionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Admits a new connection, returning its freshly generated id.
    pub fn admit(&self, kind: ConnectionKind, remote_addr: String) -> String {
        let id = Uuid::new_v4().to_string();
        let now = OffsetDateTime::now_utc();
        self.connections.lock().insert(
            id.clone(),
            Connection {
                id: id.clone(),
                kind,
                remote_addr,
                connected_at: now,
                last_activity: now,
                player_id: None,
                cell_id: None,
            },
        );
        id
    }

    pub fn touch(&self, connection_id: &str, player_id: Option<PlayerId>, cell_id: Option<CellId>) {
        if let Some(conn) = self.connections.lock().get_mut(connection_id) {
            conn.last_activity = OffsetDateTime::now_utc();
            if player_id.is_some() {
                conn.player_id = player_id;
            }
            if cell_id.is_some() {
                conn.cell_id = cell_id;
            }
        }
    }

    pub fn remove(&self, connection_id: &str) {
        self.connections.lock().remove(connection_id);
    }

    #[must_use]
    pub fn all(&self) -> Vec<Connection> {
        self.connections.lock().values().cloned().collect()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Reaps connections idle beyond `timeout`, returning how many were
    /// removed.
    pub fn reap_idle(&self, timeout: Duration) -> usize {
        let now = OffsetDateTime::now_utc();
        let timeout_secs = timeout.as_secs_f64();
        let mut connections = self.connections.lock();
        let before = connections.len();
        connections.retain(|_, conn| (now - conn.last_activity).as_seconds_f64() <= timeout_secs);
        before - connections.len()
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admit_assigns_unique_ids() {
        let tracker = ConnectionTracker::new();
        let first = tracker.admit(ConnectionKind::Http, "127.0.0.1:1".to_string());
        let second = tracker.admit(ConnectionKind::Http, "127.0.0.1:2".to_string());
        assert_ne!(first, second);
        assert_eq!(tracker.count(), 2);
    }

    #[test]
    fn reap_idle_removes_only_stale_connections() {
        let tracker = ConnectionTracker::new();
        tracker.admit(ConnectionKind::Http, "127.0.0.1:1".to_string());
        let removed = tracker.reap_idle(Duration::from_secs(0));
        assert_eq!(removed, 1);
        assert_eq!(tracker.count(), 0);
    }
}
