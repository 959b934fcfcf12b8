use serde::{Deserialize, Serialize};

use fleetforge_geometry::{AxisBounds, WorldBounds};

/// The declarative input the out-of-scope controller reconciles into a
/// fleet of cells. `fleetforge-manager-service` loads one of these from a
/// file and divides `topology.world_boundaries` into `topology.initial_cells`
/// equal X bands, calling `CellManager::create_cell` for each.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSpec {
    pub topology: Topology,
    pub capacity: Capacity,
    #[serde(default)]
    pub scaling: Scaling,
    #[serde(default)]
    pub persistence: Persistence,
    pub game_server_image: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    pub initial_cells: u32,
    pub world_boundaries: WorldBoundariesSpec,
    pub cell_size: Option<f64>,
    pub max_cells_per_cluster: Option<u32>,
}

/// The wire form of world boundaries: flat optional min/max per axis, so
/// JSON/TOML can omit absent axes entirely rather than encode a sentinel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldBoundariesSpec {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
    pub z_min: Option<f64>,
    pub z_max: Option<f64>,
}

impl WorldBoundariesSpec {
    pub fn to_world_bounds(&self) -> Result<WorldBounds, fleetforge_geometry::BoundsError> {
        let x = AxisBounds::new(self.x_min, self.x_max)?;
        let y = match (self.y_min, self.y_max) {
            (Some(min), Some(max)) => Some(AxisBounds::new(min, max)?),
            _ => None,
        };
        let z = match (self.z_min, self.z_max) {
            (Some(min), Some(max)) => Some(AxisBounds::new(min, max)?),
            _ => None,
        };
        Ok(WorldBounds { x, y, z })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capacity {
    pub max_players_per_cell: u32,
    pub cpu_limit: Option<String>,
    pub memory_limit: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scaling {
    pub scale_up_threshold: f64,
    pub scale_down_threshold: f64,
    pub min_cells: u32,
    pub max_cells: u32,
    pub predictive_enabled: bool,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            scale_up_threshold: 0.8,
            scale_down_threshold: 0.2,
            min_cells: 1,
            max_cells: 64,
            predictive_enabled: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persistence {
    #[serde(with = "humantime_serde")]
    pub checkpoint_interval: std::time::Duration,
    #[serde(with = "humantime_serde")]
    pub retention_period: std::time::Duration,
    pub storage_class: Option<String>,
    pub enabled: bool,
}

impl Default for Persistence {
    fn default() -> Self {
        Self {
            checkpoint_interval: std::time::Duration::from_secs(30),
            retention_period: std::time::Duration::from_secs(7 * 24 * 3600),
            storage_class: None,
            enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_2d_spec() {
        let json = r#"{
            "topology": {
                "initialCells": 3,
                "worldBoundaries": {"xMin": -1000.0, "xMax": 1000.0, "yMin": -500.0, "yMax": 500.0},
                "cellSize": null,
                "maxCellsPerCluster": null
            },
            "capacity": {"maxPlayersPerCell": 100, "cpuLimit": null, "memoryLimit": null},
            "gameServerImage": "fleetforge/game-server:latest"
        }"#;
        let spec: WorldSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.topology.initial_cells, 3);
        let bounds = spec.topology.world_boundaries.to_world_bounds().unwrap();
        assert!(bounds.y.is_some());
    }
}
