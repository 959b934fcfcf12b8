use fleetforge_core::CellId;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RouterError {
    #[error("cell {0} is not registered")]
    UnknownCell(CellId),

    #[error("no healthy cell available")]
    NoHealthyCell,

    #[error("no healthy cell with at least {required} remaining capacity")]
    InsufficientCapacity { required: u32 },
}
