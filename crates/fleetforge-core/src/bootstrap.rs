//! Turns a declarative [`WorldSpec`] into the initial set of [`CellSpec`]s a
//! controller would call `CreateCell` with. This is the minimal, in-scope
//! sliver of "the controller" §6 describes: divide `worldBoundaries` into
//! `initialCells` equal bands along X, area preserved exactly modulo float
//! rounding.

use fleetforge_geometry::{AxisBounds, WorldBounds};

use crate::{capacity::CellCapacity, error::CellError, ids::CellId, manager::CellSpec, worldspec::WorldSpec};

/// Divides `spec.topology.world_boundaries` into `spec.topology.initial_cells`
/// equal-width bands along X, naming each `<prefix>-0`, `<prefix>-1`, ... in
/// band order. Y and Z, if present, are shared unchanged by every band.
pub fn partition_initial_cells(spec: &WorldSpec, id_prefix: &str) -> Result<Vec<CellSpec>, CellError> {
    let n = spec.topology.initial_cells;
    if n == 0 {
        return Err(CellError::InvalidInput("topology.initialCells must be at least 1".to_string()));
    }

    let bounds = spec
        .topology
        .world_boundaries
        .to_world_bounds()
        .map_err(|e| CellError::InvalidInput(e.to_string()))?;

    let width = bounds.x.len() / f64::from(n);
    let capacity = CellCapacity::new(spec.capacity.max_players_per_cell);

    (0..n)
        .map(|i| {
            let min = bounds.x.min + width * f64::from(i);
            let max = if i + 1 == n { bounds.x.max } else { bounds.x.min + width * f64::from(i + 1) };
            let x = AxisBounds::new(min, max).map_err(|e| CellError::InvalidInput(e.to_string()))?;
            let boundaries = WorldBounds { x, y: bounds.y, z: bounds.z };
            let id = CellId::new(format!("{id_prefix}-{i}"))?;
            Ok(CellSpec { id, boundaries, capacity: capacity.clone() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worldspec::{Capacity, Topology, WorldBoundariesSpec};

    fn sample_spec(initial_cells: u32) -> WorldSpec {
        WorldSpec {
            topology: Topology {
                initial_cells,
                world_boundaries: WorldBoundariesSpec {
                    x_min: -100.0,
                    x_max: 100.0,
                    y_min: Some(-50.0),
                    y_max: Some(50.0),
                    z_min: None,
                    z_max: None,
                },
                cell_size: None,
                max_cells_per_cluster: None,
            },
            capacity: Capacity { max_players_per_cell: 50, cpu_limit: None, memory_limit: None },
            scaling: crate::worldspec::Scaling::default(),
            persistence: crate::worldspec::Persistence::default(),
            game_server_image: "fleetforge/game-server:latest".to_string(),
        }
    }

    #[test]
    fn divides_into_equal_contiguous_bands() {
        let spec = sample_spec(4);
        let cells = partition_initial_cells(&spec, "world").unwrap();
        assert_eq!(cells.len(), 4);
        assert!((cells[0].boundaries.x.min - (-100.0)).abs() < 1e-9);
        assert!((cells[3].boundaries.x.max - 100.0).abs() < 1e-9);
        for pair in cells.windows(2) {
            assert!((pair[0].boundaries.x.max - pair[1].boundaries.x.min).abs() < 1e-9);
        }
        let total_area: f64 = cells.iter().map(|c| c.boundaries.area()).sum();
        assert!((total_area - spec.topology.world_boundaries.to_world_bounds().unwrap().area()).abs() < 1e-6);
    }

    #[test]
    fn rejects_zero_initial_cells() {
        let spec = sample_spec(0);
        assert!(partition_initial_cells(&spec, "world").is_err());
    }
}
