use clap::Parser;
use fleetforge_core::{CellCapacity, CellError, CellId};
use fleetforge_geometry::{AxisBounds, WorldBounds};

/// Startup configuration for one cell worker process: a single `CELL_ID`
/// owning one `WorldBounds`, hosted per §6's "per-worker deployment unit".
#[derive(Parser, Debug)]
pub struct Params {
    #[clap(long, env = "CELL_ID")]
    pub cell_id: String,

    #[clap(long, env = "BOUNDARIES_X_MIN", allow_hyphen_values = true)]
    pub boundaries_x_min: f64,
    #[clap(long, env = "BOUNDARIES_X_MAX", allow_hyphen_values = true)]
    pub boundaries_x_max: f64,
    #[clap(long, env = "BOUNDARIES_Y_MIN", allow_hyphen_values = true)]
    pub boundaries_y_min: Option<f64>,
    #[clap(long, env = "BOUNDARIES_Y_MAX", allow_hyphen_values = true)]
    pub boundaries_y_max: Option<f64>,
    #[clap(long, env = "BOUNDARIES_Z_MIN", allow_hyphen_values = true)]
    pub boundaries_z_min: Option<f64>,
    #[clap(long, env = "BOUNDARIES_Z_MAX", allow_hyphen_values = true)]
    pub boundaries_z_max: Option<f64>,

    #[clap(long, env = "MAX_PLAYERS", default_value_t = 100)]
    pub max_players: u32,

    #[clap(long, env = "HEALTH_PORT", default_value_t = 8081)]
    pub health_port: u16,

    #[clap(long, env = "METRICS_PORT", default_value_t = 9091)]
    pub metrics_port: u16,
}

impl Params {
    pub fn cell_id(&self) -> Result<CellId, CellError> {
        CellId::new(self.cell_id.clone())
    }

    pub fn boundaries(&self) -> Result<WorldBounds, CellError> {
        let x = AxisBounds::new(self.boundaries_x_min, self.boundaries_x_max)
            .map_err(|e| CellError::InvalidInput(e.to_string()))?;
        let y = match (self.boundaries_y_min, self.boundaries_y_max) {
            (Some(min), Some(max)) => Some(AxisBounds::new(min, max).map_err(|e| CellError::InvalidInput(e.to_string()))?),
            _ => None,
        };
        let z = match (self.boundaries_z_min, self.boundaries_z_max) {
            (Some(min), Some(max)) => Some(AxisBounds::new(min, max).map_err(|e| CellError::InvalidInput(e.to_string()))?),
            _ => None,
        };
        Ok(WorldBounds { x, y, z })
    }

    #[must_use]
    pub fn capacity(&self) -> CellCapacity {
        CellCapacity::new(self.max_players)
    }
}
