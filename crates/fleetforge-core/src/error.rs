use std::time::Duration;

use crate::{cell::CellPhase, ids::CellId};

/// Error kinds a `Cell` or `CellManager` operation can return. Variants map
/// 1:1 to the error kinds gateways translate into HTTP status codes; no
/// variant here carries a panic path.
#[derive(Debug, thiserror::Error)]
pub enum CellError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cell {0} not found")]
    CellNotFound(CellId),

    #[error("player {0} not found")]
    PlayerNotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("cell {cell_id} is at capacity ({max_players} players)")]
    CapacityExceeded { cell_id: CellId, max_players: u32 },

    #[error("cell {cell_id} is not ready (phase: {phase})")]
    NotReady { cell_id: CellId, phase: CellPhase },

    #[error("threshold not met for {0}")]
    ThresholdNotMet(CellId),

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout { operation: String, elapsed: Duration },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transient failure: {0}")]
    Transient(String),
}

impl CellError {
    /// A short, stable tag for structured log fields and metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::CellNotFound(_) | Self::PlayerNotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::NotReady { .. } => "not_ready",
            Self::ThresholdNotMet(_) => "threshold_not_met",
            Self::Timeout { .. } => "timeout",
            Self::Conflict(_) => "conflict",
            Self::Transient(_) => "transient",
        }
    }
}

pub type Result<T> = std::result::Result<T, CellError>;
