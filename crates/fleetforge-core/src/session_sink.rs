use crate::ids::{CellId, PlayerId};

/// The narrow contract `CellManager` needs from a session store: rewrite
/// affinity during split/merge, answer "does this player already have a
/// session elsewhere", and clean up when a cell is deleted. Defined here
/// rather than depended on from `fleetforge-session` so the core stays
/// free of a dependency on the session-affinity crate; `fleetforge-session`
/// implements this trait for its `SessionStore` instead.
pub trait SessionSink: Send + Sync {
    fn active_cell_for(&self, player_id: &PlayerId) -> Option<CellId>;
    fn rewrite(&self, player_id: &PlayerId, new_cell_id: &CellId);
    fn touch(&self, player_id: &PlayerId);
    fn remove_for_cell(&self, cell_id: &CellId);
}
