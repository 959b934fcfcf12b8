use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{error::CellError, ids::CellId, player::PlayerState};

/// The subset of a cell's state `Checkpoint`/`Restore` round-trips. Cell
/// identity, boundaries, and capacity are deliberately absent: `Restore`
/// never touches them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub players: HashMap<String, PlayerState>,
    pub player_count: u32,
    pub game_state: serde_json::Value,
    pub tick: u64,
}

impl CellSnapshot {
    /// Serializes to the opaque byte form the checkpoint sink stores.
    pub fn encode(&self) -> Result<Bytes, CellError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| CellError::Transient(format!("checkpoint encode failed: {e}")))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CellError> {
        serde_json::from_slice(bytes)
            .map_err(|e| CellError::InvalidInput(format!("checkpoint decode failed: {e}")))
    }
}

/// An abstract, pluggable durable-storage collaborator. The core produces
/// and consumes opaque byte blobs; persistence itself is out of scope.
pub trait CheckpointSink: Send + Sync {
    fn write(&self, cell_id: &CellId, bytes: Bytes) -> Result<(), CellError>;
    fn read(&self, cell_id: &CellId) -> Result<Bytes, CellError>;
}

/// The default sink: records only the size of the last checkpoint written
/// per cell, and does not persist anything. Useful for tests and for
/// standalone deployments with no external store configured.
#[derive(Default)]
pub struct InMemoryCheckpointSink {
    sizes: Mutex<HashMap<CellId, usize>>,
}

impl CheckpointSink for InMemoryCheckpointSink {
    fn write(&self, cell_id: &CellId, bytes: Bytes) -> Result<(), CellError> {
        self.sizes.lock().insert(cell_id.clone(), bytes.len());
        Ok(())
    }

    fn read(&self, cell_id: &CellId) -> Result<Bytes, CellError> {
        Err(CellError::CellNotFound(cell_id.clone()))
    }
}

impl InMemoryCheckpointSink {
    #[must_use]
    pub fn last_size(&self, cell_id: &CellId) -> Option<usize> {
        self.sizes.lock().get(cell_id).copied()
    }
}
