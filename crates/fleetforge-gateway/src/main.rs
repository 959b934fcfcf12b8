use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use fleetforge_core::{partition_initial_cells, CellConfig, CellManager, InMemoryCheckpointSink, ManagerConfig, WorldSpec};
use fleetforge_gateway::{GatewayConfig, GatewayState};
use fleetforge_router::{CellInfo, Router};

/// Starts the player-facing edge: connection admission, rate limiting,
/// session affinity, and routing into an in-process `CellManager`. When
/// `--world-spec` is given, the gateway bootstraps its own fleet from it
/// rather than expecting cells to be registered externally.
#[derive(Parser, Debug)]
struct Params {
    #[clap(long, env = "GATEWAY_BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind_addr: SocketAddr,

    #[clap(long, env = "WORLD_SPEC_PATH")]
    world_spec: Option<PathBuf>,

    #[clap(long, env = "GATEWAY_SHUTDOWN_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    shutdown_timeout: Duration,
}

fn load_world_spec(path: &PathBuf) -> anyhow::Result<WorldSpec> {
    let raw = std::fs::read_to_string(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("toml") {
        Ok(toml::from_str(&raw)?)
    } else {
        Ok(serde_json::from_str(&raw)?)
    }
}

async fn run(params: Params) -> anyhow::Result<()> {
    let manager = CellManager::new(CellConfig::default(), ManagerConfig::default(), Arc::new(InMemoryCheckpointSink::default()));
    let router = Arc::new(Router::new());

    if let Some(path) = &params.world_spec {
        let spec = load_world_spec(path)?;
        let cell_specs = partition_initial_cells(&spec, "world")?;
        for cell_spec in cell_specs {
            let id = cell_spec.id.clone();
            let capacity = cell_spec.capacity.max_players;
            manager.create_cell(cell_spec).await?;
            router.register_cell(CellInfo::new(id.clone(), format!("in-process:{id}"), capacity));
        }
        tracing::info!(bind_addr = %params.bind_addr, "gateway bootstrapped world spec");
    } else {
        tracing::warn!("no --world-spec given; gateway started with an empty router");
    }

    let state = GatewayState::new(manager, router, GatewayConfig::default())?;

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    fleetforge_gateway::serve(state, params.bind_addr, shutdown, params.shutdown_timeout).await
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
        tracing::error!(error = %err, "gateway exited with an error");
        std::process::exit(3);
    }
}
