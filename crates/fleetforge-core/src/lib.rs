//! The cell model and split/merge orchestration at the heart of FleetForge:
//! a `Cell` owns a spatial region and its players, `CellManager` owns the
//! set of cells and decides when to split or merge them.

mod bootstrap;
mod capacity;
mod cell;
mod checkpoint;
mod config;
mod cooldown;
mod error;
mod event;
mod ids;
mod manager;
mod player;
mod session_sink;
mod worldspec;

pub use bootstrap::partition_initial_cells;
pub use capacity::CellCapacity;
pub use cell::{Cell, CellHealth, CellPhase, CellState, SplitCallback};
pub use checkpoint::{CellSnapshot, CheckpointSink, InMemoryCheckpointSink};
pub use config::{CellConfig, ManagerConfig};
pub use cooldown::CooldownTracker;
pub use error::{CellError, Result};
pub use event::{CellEvent, CellEventKind, EventLog, DEFAULT_EVENT_LOG_CAPACITY};
pub use ids::{CellId, PlayerId};
pub use manager::{CellDirectory, CellManager, CellSpec};
pub use player::PlayerState;
pub use session_sink::SessionSink;
pub use worldspec::{Capacity, Persistence, Scaling, Topology, WorldBoundariesSpec, WorldSpec};

pub use fleetforge_geometry::{Axis, AxisBounds, BoundsError, Position, WorldBounds};
