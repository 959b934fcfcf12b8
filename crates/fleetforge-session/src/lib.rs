//! Maps a player to the cell and connection currently serving it, and keeps
//! that mapping valid across splits, merges, and worker restarts. Sessions
//! outlive any individual `Cell` — when `CellManager` rewrites ownership it
//! calls back into this store in the same critical section as the player
//! move, via `fleetforge_core::SessionSink`.

use std::{
    collections::HashMap,
    time::Duration,
};

use fleetforge_core::{CellId, PlayerId, SessionSink};
use fleetforge_router::Router;
use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

mod error;

pub use error::SessionError;

/// The default idle timeout after which a session is eligible for sweeping.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// The default interval between sweeper passes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq)]
pub struct SessionAffinity {
    pub player_id: PlayerId,
    pub cell_id: CellId,
    pub connection_id: String,
    pub assigned_at: OffsetDateTime,
    pub last_activity: OffsetDateTime,
}

struct StoreInner {
    sessions: HashMap<PlayerId, SessionAffinity>,
}

/// Owns its own lock, per the component-isolation requirement that no
/// shared mutable state crosses the router/session/manager boundary.
pub struct SessionStore {
    inner: Mutex<StoreInner>,
    router: std::sync::Arc<Router>,
    idle_timeout: Duration,
    sweep_interval: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(router: std::sync::Arc<Router>, idle_timeout: Duration, sweep_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(StoreInner { sessions: HashMap::new() }),
            router,
            idle_timeout,
            sweep_interval,
        }
    }

    /// Resolves a cell for `player_id` via the router, reusing an existing
    /// affinity if that cell is still registered and healthy, and records
    /// the resulting session. `connection_id` identifies the transport
    /// connection this session is currently bound to.
    pub fn create_session(&self, player_id: PlayerId, connection_id: String) -> Result<SessionAffinity, SessionError> {
        let existing_cell = {
            let inner = self.inner.lock();
            inner.sessions.get(&player_id).map(|s| s.cell_id.clone())
        };

        let cell_id = match existing_cell {
            Some(cell_id) if self.router.get_cell(&cell_id).is_some_and(|c| c.healthy) => cell_id,
            _ => self.router.select_by_load().map_err(SessionError::NoCellAvailable)?,
        };

        let now = OffsetDateTime::now_utc();
        let affinity = SessionAffinity {
            player_id: player_id.clone(),
            cell_id,
            connection_id,
            assigned_at: now,
            last_activity: now,
        };
        self.inner.lock().sessions.insert(player_id, affinity.clone());
        Ok(affinity)
    }

    pub fn destroy_session(&self, player_id: &PlayerId) {
        self.inner.lock().sessions.remove(player_id);
    }

    #[must_use]
    pub fn get_affinity(&self, player_id: &PlayerId) -> Option<SessionAffinity> {
        self.inner.lock().sessions.get(player_id).cloned()
    }

    pub fn touch_activity(&self, player_id: &PlayerId) {
        if let Some(session) = self.inner.lock().sessions.get_mut(player_id) {
            session.last_activity = OffsetDateTime::now_utc();
        }
    }

    pub fn rewrite_cell(&self, player_id: &PlayerId, new_cell_id: &CellId) {
        if let Some(session) = self.inner.lock().sessions.get_mut(player_id) {
            session.cell_id = new_cell_id.clone();
        }
    }

    /// Removes every session idle longer than `idle_timeout` as of `now`,
    /// returning how many were swept.
    pub fn cleanup_expired(&self, now: OffsetDateTime) -> usize {
        let timeout_secs = self.idle_timeout.as_secs_f64();
        let mut inner = self.inner.lock();
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|_, session| (now - session.last_activity).as_seconds_f64() <= timeout_secs);
        before - inner.sessions.len()
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    #[must_use]
    pub fn all_sessions(&self) -> Vec<SessionAffinity> {
        self.inner.lock().sessions.values().cloned().collect()
    }

    /// Spawns the background idle-session sweeper. Cancels with `token`.
    pub fn spawn_sweeper(self: &std::sync::Arc<Self>, token: CancellationToken) {
        let store = self.clone();
        let period = self.sweep_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => {
                        let removed = store.cleanup_expired(OffsetDateTime::now_utc());
                        if removed > 0 {
                            tracing::debug!(removed, "swept idle sessions");
                        }
                    }
                }
            }
        });
    }
}

impl SessionSink for SessionStore {
    fn active_cell_for(&self, player_id: &PlayerId) -> Option<CellId> {
        self.get_affinity(player_id).map(|s| s.cell_id)
    }

    fn rewrite(&self, player_id: &PlayerId, new_cell_id: &CellId) {
        self.rewrite_cell(player_id, new_cell_id);
    }

    fn touch(&self, player_id: &PlayerId) {
        self.touch_activity(player_id);
    }

    fn remove_for_cell(&self, cell_id: &CellId) {
        self.inner.lock().sessions.retain(|_, session| &session.cell_id != cell_id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fleetforge_router::CellInfo;

    use super::*;

    fn store_with_one_cell() -> (Arc<SessionStore>, CellId) {
        let router = Arc::new(Router::new());
        let cell_id = CellId::new("cell-a").unwrap();
        router.register_cell(CellInfo::new(cell_id.clone(), "cell-a.local:9000", 100));
        let store = Arc::new(SessionStore::new(router, DEFAULT_IDLE_TIMEOUT, DEFAULT_SWEEP_INTERVAL));
        (store, cell_id)
    }

    #[test]
    fn create_session_resolves_via_router() {
        let (store, cell_id) = store_with_one_cell();
        let player = PlayerId::new("p1").unwrap();
        let affinity = store.create_session(player.clone(), "conn-1".to_string()).unwrap();
        assert_eq!(affinity.cell_id, cell_id);
        assert_eq!(store.get_affinity(&player).unwrap().cell_id, cell_id);
    }

    #[test]
    fn create_session_reuses_existing_affinity_when_cell_still_healthy() {
        let (store, cell_id) = store_with_one_cell();
        let player = PlayerId::new("p1").unwrap();
        store.create_session(player.clone(), "conn-1".to_string()).unwrap();
        let second = store.create_session(player.clone(), "conn-2".to_string()).unwrap();
        assert_eq!(second.cell_id, cell_id);
    }

    #[test]
    fn rewrite_updates_cell_id_in_place() {
        let (store, _) = store_with_one_cell();
        let player = PlayerId::new("p1").unwrap();
        store.create_session(player.clone(), "conn-1".to_string()).unwrap();
        let new_cell = CellId::new("cell-a-child-0").unwrap();
        store.rewrite_cell(&player, &new_cell);
        assert_eq!(store.get_affinity(&player).unwrap().cell_id, new_cell);
    }

    #[test]
    fn cleanup_expired_sweeps_stale_sessions_only() {
        let (store, _) = store_with_one_cell();
        let player = PlayerId::new("p1").unwrap();
        store.create_session(player.clone(), "conn-1".to_string()).unwrap();

        let far_future = OffsetDateTime::now_utc() + DEFAULT_IDLE_TIMEOUT + Duration::from_secs(1);
        let removed = store.cleanup_expired(far_future);
        assert_eq!(removed, 1);
        assert!(store.get_affinity(&player).is_none());
    }

    #[test]
    fn remove_for_cell_drops_only_matching_sessions() {
        let (store, cell_id) = store_with_one_cell();
        let p1 = PlayerId::new("p1").unwrap();
        let p2 = PlayerId::new("p2").unwrap();
        store.create_session(p1.clone(), "conn-1".to_string()).unwrap();
        store.create_session(p2.clone(), "conn-2".to_string()).unwrap();
        SessionSink::remove_for_cell(&*store, &cell_id);
        assert!(store.get_affinity(&p1).is_none());
        assert!(store.get_affinity(&p2).is_none());
    }
}
