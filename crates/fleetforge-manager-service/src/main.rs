mod config;

use std::sync::Arc;

use clap::Parser;
use fleetforge_core::{partition_initial_cells, CellConfig, CellManager, InMemoryCheckpointSink, ManagerConfig, WorldSpec};
use fleetforge_manager_service::{build_router, ManagerState};

use crate::config::Params;

fn load_world_spec(path: &std::path::Path) -> anyhow::Result<WorldSpec> {
    let raw = std::fs::read_to_string(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("toml") {
        Ok(toml::from_str(&raw)?)
    } else {
        Ok(serde_json::from_str(&raw)?)
    }
}

async fn run(params: Params) -> anyhow::Result<()> {
    let spec = load_world_spec(&params.world_spec_path)?;

    let manager = CellManager::new(CellConfig::default(), ManagerConfig::default(), Arc::new(InMemoryCheckpointSink::default()));

    let cell_specs = partition_initial_cells(&spec, &params.cell_id_prefix)?;
    let total = cell_specs.len();
    for cell_spec in cell_specs {
        let id = cell_spec.id.clone();
        manager.create_cell(cell_spec).await?;
        tracing::info!(cell_id = %id, "cell created from world spec");
    }
    tracing::info!(count = total, "world initialized");

    let state = ManagerState { manager: manager.clone() };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(params.admin_bind_addr).await?;
    tracing::info!(addr = %params.admin_bind_addr, "manager admin surface listening");

    tokio::select! {
        result = axum::serve(listener, app) => result.map_err(Into::into),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            manager.shutdown().await;
            Ok(())
        }
    }
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
        tracing::error!(error = %err, "manager service exited with an error");
        std::process::exit(3);
    }
}
