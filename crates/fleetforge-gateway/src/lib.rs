//! External-facing request termination: connection tracking, rate limiting,
//! and delegation to `Router`/`SessionStore`/`CellManager`. The gateway is
//! single-process but internally concurrent — handlers run on independent
//! tokio workers, and every piece of shared state (connections, sessions,
//! router, rate limiter) owns its own lock.

pub mod connections;
pub mod error;
pub mod metrics;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use connections::ConnectionTracker;
pub use metrics::GatewayMetrics;
pub use rate_limit::RateLimiter;
pub use routes::build_router;
pub use state::{GatewayConfig, GatewayState};

use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;

/// Binds and serves the gateway HTTP surface: stops accepting new
/// connections as soon as `shutdown` resolves, then waits at most
/// `shutdown_timeout` for in-flight requests to drain before forcing the
/// server down.
pub async fn serve(
    state: GatewayState,
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    shutdown_timeout: std::time::Duration,
) -> anyhow::Result<()> {
    let token = CancellationToken::new();
    state.spawn_background_workers(token.clone());

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "gateway listening");

    let (signal_tx, mut signal_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown.await;
        tracing::info!("shutdown signal received, draining in-flight requests");
        let _ = signal_tx.send(true);
    });

    let mut drain_rx = signal_rx.clone();
    let mut serve_task = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                let _ = drain_rx.wait_for(|signalled| *signalled).await;
            })
            .await
    });

    // Phase 1: run until the server exits on its own or shutdown fires.
    tokio::select! {
        result = &mut serve_task => {
            token.cancel();
            return result?.map_err(Into::into);
        }
        _ = signal_rx.changed() => {}
    }

    // Phase 2: shutdown has fired and the server is draining; bound the wait.
    tokio::select! {
        result = &mut serve_task => {
            token.cancel();
            result??;
        }
        () = tokio::time::sleep(shutdown_timeout) => {
            tracing::warn!(?shutdown_timeout, "graceful drain exceeded timeout, aborting");
            serve_task.abort();
            token.cancel();
        }
    }
    Ok(())
}
