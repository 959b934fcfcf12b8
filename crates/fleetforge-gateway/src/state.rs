use std::{sync::Arc, time::Duration};

use fleetforge_core::CellManager;
use fleetforge_router::Router;
use fleetforge_session::SessionStore;
use tokio_util::sync::CancellationToken;

use crate::{connections::ConnectionTracker, metrics::GatewayMetrics, rate_limit::RateLimiter};

/// Tunables for the gateway's admission and reaping loops.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub rate: f64,
    pub burst: f64,
    pub idle_eviction: Duration,
    pub connection_reap_period: Duration,
    pub session_idle_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rate: crate::rate_limit::DEFAULT_RATE,
            burst: crate::rate_limit::DEFAULT_BURST,
            idle_eviction: crate::rate_limit::DEFAULT_IDLE_EVICTION,
            connection_reap_period: Duration::from_secs(60),
            session_idle_timeout: fleetforge_session::DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Everything an axum handler needs. Each field owns its own lock; nothing
/// here shares a mutex with another field, per the component isolation
/// rule.
#[derive(Clone)]
pub struct GatewayState {
    pub manager: CellManager,
    pub router: Arc<Router>,
    pub sessions: Arc<SessionStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub connections: Arc<ConnectionTracker>,
    pub metrics: Arc<GatewayMetrics>,
    pub config: Arc<GatewayConfig>,
}

impl GatewayState {
    pub fn new(manager: CellManager, router: Arc<Router>, config: GatewayConfig) -> Result<Self, prometheus::Error> {
        let sessions = Arc::new(SessionStore::new(
            router.clone(),
            config.session_idle_timeout,
            fleetforge_session::DEFAULT_SWEEP_INTERVAL,
        ));
        manager.set_session_sink(sessions.clone());
        Ok(Self {
            manager,
            router,
            sessions,
            rate_limiter: Arc::new(RateLimiter::new(config.rate, config.burst)),
            connections: Arc::new(ConnectionTracker::new()),
            metrics: Arc::new(GatewayMetrics::new()?),
            config: Arc::new(config),
        })
    }

    /// Spawns the session sweeper, rate-limiter bucket eviction, and
    /// connection reaper as independent background workers.
    pub fn spawn_background_workers(&self, token: CancellationToken) {
        self.sessions.spawn_sweeper(token.clone());

        let rate_limiter = self.rate_limiter.clone();
        let idle_eviction = self.config.idle_eviction;
        let rl_token = token.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                tokio::select! {
                    () = rl_token.cancelled() => break,
                    _ = interval.tick() => rate_limiter.evict_idle(idle_eviction),
                }
            }
        });

        let connections = self.connections.clone();
        let reap_period = self.config.connection_reap_period;
        let session_timeout = self.config.session_idle_timeout;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(reap_period);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => {
                        let removed = connections.reap_idle(session_timeout);
                        if removed > 0 {
                            tracing::debug!(removed, "reaped idle connections");
                        }
                    }
                }
            }
        });
    }
}
