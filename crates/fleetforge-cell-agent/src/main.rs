mod config;
mod metrics;
mod routes;

use std::{net::SocketAddr, sync::Arc};

use clap::Parser;
use fleetforge_core::{Cell, CellConfig, InMemoryCheckpointSink};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Params,
    metrics::CellAgentMetrics,
    routes::{build_health_router, build_metrics_router, HealthState, MetricsState},
};

async fn run(params: Params) -> anyhow::Result<()> {
    let cell_id = params.cell_id()?;
    let boundaries = params.boundaries()?;
    let capacity = params.capacity();

    let cell = Cell::new(
        cell_id.clone(),
        boundaries,
        capacity,
        None,
        0,
        Vec::new(),
        &CellConfig::default(),
        Arc::new(InMemoryCheckpointSink::default()),
    );

    let token = CancellationToken::new();
    cell.start(token.clone())?;
    tracing::info!(%cell_id, "cell agent started");

    let metrics = Arc::new(CellAgentMetrics::new(cell_id.as_str())?);

    let health_addr = SocketAddr::from(([0, 0, 0, 0], params.health_port));
    let health_listener = tokio::net::TcpListener::bind(health_addr).await?;
    let health_app = build_health_router(HealthState { cell: cell.clone() });
    let health_token = token.clone();

    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], params.metrics_port));
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr).await?;
    let metrics_app = build_metrics_router(MetricsState { cell: cell.clone(), metrics });
    let metrics_token = token.clone();

    tracing::info!(%health_addr, %metrics_addr, "cell agent listening");

    let health_server = tokio::spawn(async move {
        axum::serve(health_listener, health_app)
            .with_graceful_shutdown(async move { health_token.cancelled().await })
            .await
    });
    let metrics_server = tokio::spawn(async move {
        axum::serve(metrics_listener, metrics_app)
            .with_graceful_shutdown(async move { metrics_token.cancelled().await })
            .await
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    token.cancel();
    cell.stop();
    cell.join().await;

    health_server.await??;
    metrics_server.await??;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let params = match Params::try_parse() {
        Ok(params) => params,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start async runtime: {err}");
            std::process::exit(3);
        }
    };

    if let Err(err) = runtime.block_on(run(params)) {
        tracing::error!(error = %err, "cell agent exited with an error");
        std::process::exit(3);
    }
}
