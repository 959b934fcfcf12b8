use fleetforge_core::Cell;
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};

/// Prometheus exposition for the one cell this process hosts. Gauges carry
/// a `cell_id` label so federation across many agent processes still reads
/// as the same metric names the manager-hosted path exports.
pub struct CellAgentMetrics {
    registry: Registry,
    uptime_seconds: Gauge,
    load: Gauge,
    player_count: Gauge,
    tick_rate: Gauge,
    tick_duration_ms: Gauge,
}

impl CellAgentMetrics {
    pub fn new(cell_id: &str) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let labels = &[cell_id];

        let uptime_vec = GaugeVec::new(Opts::new("fleetforge_cell_uptime_seconds", "seconds since the cell started"), &["cell_id"])?;
        let load_vec = GaugeVec::new(Opts::new("fleetforge_cell_load", "current density ratio"), &["cell_id"])?;
        let player_count_vec = GaugeVec::new(Opts::new("fleetforge_cell_player_count", "players currently in the cell"), &["cell_id"])?;
        let tick_rate_vec = GaugeVec::new(Opts::new("fleetforge_cell_tick_rate", "ticks per second"), &["cell_id"])?;
        let tick_duration_vec = GaugeVec::new(Opts::new("fleetforge_cell_tick_duration_ms", "last tick's wall time"), &["cell_id"])?;

        registry.register(Box::new(uptime_vec.clone()))?;
        registry.register(Box::new(load_vec.clone()))?;
        registry.register(Box::new(player_count_vec.clone()))?;
        registry.register(Box::new(tick_rate_vec.clone()))?;
        registry.register(Box::new(tick_duration_vec.clone()))?;

        Ok(Self {
            registry,
            uptime_seconds: uptime_vec.with_label_values(labels),
            load: load_vec.with_label_values(labels),
            player_count: player_count_vec.with_label_values(labels),
            tick_rate: tick_rate_vec.with_label_values(labels),
            tick_duration_ms: tick_duration_vec.with_label_values(labels),
        })
    }

    fn refresh(&self, cell: &Cell) {
        let health = cell.get_health();
        let metrics = cell.get_metrics();
        self.uptime_seconds.set(health.uptime.as_secs_f64());
        self.load.set(metrics.density_ratio());
        self.player_count.set(f64::from(metrics.player_count));
        self.tick_rate.set(metrics.tick_rate_hz);
        self.tick_duration_ms.set(metrics.tick_duration_ms);
    }

    pub fn render(&self, cell: &Cell) -> Result<String, anyhow::Error> {
        self.refresh(cell);
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
