use fleetforge_core::{CellManager, CellPhase};
use prometheus::{Encoder, GaugeVec, IntGauge, Opts, Registry, TextEncoder};

/// Renders the manager-scope Prometheus surface named in the external
/// interface contract. Built fresh on every scrape rather than held as
/// long-lived state: cells come and go across splits/merges, and a fresh
/// `Registry` sidesteps stale per-cell label sets from deleted cells.
pub fn render(manager: &CellManager) -> Result<String, anyhow::Error> {
    let registry = Registry::new();
    let cells = manager.list_cells();

    let cells_total = IntGauge::new("fleetforge_cells_total", "cells currently registered")?;
    let cells_running = IntGauge::new("fleetforge_cells_running", "cells in the Running phase")?;
    let cells_active = IntGauge::new("fleetforge_cells_active", "cells with at least one player")?;
    let players_total = IntGauge::new("fleetforge_players_total", "players across every cell")?;
    let capacity_total = IntGauge::new("fleetforge_capacity_total", "summed max_players across every cell")?;
    let utilization_rate = prometheus::Gauge::new("fleetforge_utilization_rate", "players_total / capacity_total")?;

    registry.register(Box::new(cells_total.clone()))?;
    registry.register(Box::new(cells_running.clone()))?;
    registry.register(Box::new(cells_active.clone()))?;
    registry.register(Box::new(players_total.clone()))?;
    registry.register(Box::new(capacity_total.clone()))?;
    registry.register(Box::new(utilization_rate.clone()))?;

    let cell_load = GaugeVec::new(Opts::new("fleetforge_cell_load", "density ratio"), &["cell_id"])?;
    let cell_player_count = GaugeVec::new(Opts::new("fleetforge_cell_player_count", "players in this cell"), &["cell_id"])?;
    let cell_uptime = GaugeVec::new(Opts::new("fleetforge_cell_uptime_seconds", "seconds since the cell started"), &["cell_id"])?;
    let cell_tick_rate = GaugeVec::new(Opts::new("fleetforge_cell_tick_rate", "ticks per second"), &["cell_id"])?;
    let cell_tick_duration = GaugeVec::new(Opts::new("fleetforge_cell_tick_duration_ms", "last tick's wall time"), &["cell_id"])?;

    registry.register(Box::new(cell_load.clone()))?;
    registry.register(Box::new(cell_player_count.clone()))?;
    registry.register(Box::new(cell_uptime.clone()))?;
    registry.register(Box::new(cell_tick_rate.clone()))?;
    registry.register(Box::new(cell_tick_duration.clone()))?;

    let mut players_sum: i64 = 0;
    let mut capacity_sum: i64 = 0;
    let mut running = 0;
    let mut active = 0;

    for cell in &cells {
        let id = cell.id().as_str();
        let health = cell.get_health();
        let metrics = cell.get_metrics();

        if matches!(cell.phase(), CellPhase::Running) {
            running += 1;
        }
        if metrics.player_count > 0 {
            active += 1;
        }
        players_sum += i64::from(metrics.player_count);
        capacity_sum += i64::from(cell.capacity().max_players);

        cell_load.with_label_values(&[id]).set(metrics.density_ratio());
        cell_player_count.with_label_values(&[id]).set(f64::from(metrics.player_count));
        cell_uptime.with_label_values(&[id]).set(health.uptime.as_secs_f64());
        cell_tick_rate.with_label_values(&[id]).set(metrics.tick_rate_hz);
        cell_tick_duration.with_label_values(&[id]).set(metrics.tick_duration_ms);
    }

    cells_total.set(cells.len() as i64);
    cells_running.set(running);
    cells_active.set(active);
    players_total.set(players_sum);
    capacity_total.set(capacity_sum);
    utilization_rate.set(if capacity_sum > 0 { players_sum as f64 / capacity_sum as f64 } else { 0.0 });

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
