use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Gateway-scoped Prometheus metrics. Cell- and manager-scoped metrics are
/// exported by `fleetforge-cell-agent`/`fleetforge-manager-service`
/// respectively; this registry only covers admission and connection
/// concerns the gateway itself owns.
pub struct GatewayMetrics {
    registry: Registry,
    pub connects_total: IntCounter,
    pub rate_limited_total: IntCounter,
    pub active_connections: IntGauge,
    pub active_sessions: IntGauge,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let connects_total = IntCounter::new(
            "fleetforge_gateway_connects_total",
            "Total number of successfully admitted connect requests",
        )?;
        let rate_limited_total = IntCounter::new(
            "fleetforge_gateway_rate_limited_total",
            "Total number of requests rejected by the rate limiter",
        )?;
        let active_connections = IntGauge::new(
            "fleetforge_gateway_active_connections",
            "Number of tracked connections",
        )?;
        let active_sessions = IntGauge::new(
            "fleetforge_gateway_active_sessions",
            "Number of active player sessions",
        )?;

        registry.register(Box::new(connects_total.clone()))?;
        registry.register(Box::new(rate_limited_total.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;
        registry.register(Box::new(active_sessions.clone()))?;

        Ok(Self {
            registry,
            connects_total,
            rate_limited_total,
            active_connections,
            active_sessions,
        })
    }

    /// Renders every registered metric in Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
