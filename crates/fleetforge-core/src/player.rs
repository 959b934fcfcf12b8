use fleetforge_geometry::Position;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::PlayerId;

/// A player's state as owned by exactly one `Cell` at a time. `position`
/// must lie within the owning cell's boundaries whenever the cell holds the
/// player; callers that move a player are responsible for checking this
/// before handing a `PlayerState` to `Cell::add_player`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub position: Position,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    pub connected: bool,
    /// Opaque per-player payload. The core never inspects this; it is
    /// carried through splits, merges, and checkpoints unchanged.
    pub game_state: serde_json::Value,
}

impl PlayerState {
    #[must_use]
    pub fn new(id: PlayerId, position: Position) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            position,
            last_seen: now,
            connected: true,
            game_state: serde_json::Value::Null,
        }
    }
}
