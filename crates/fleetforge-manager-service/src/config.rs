use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Startup configuration for the manager service: the minimal in-scope
/// sliver of "the controller" — loads one world spec, divides it into
/// initial cells, then serves an admin/observability surface for whatever
/// out-of-scope process watches this fleet.
#[derive(Parser, Debug)]
pub struct Params {
    #[clap(long, env = "WORLD_SPEC_PATH")]
    pub world_spec_path: PathBuf,

    #[clap(long, env = "MANAGER_ADMIN_BIND_ADDR", default_value = "0.0.0.0:9090")]
    pub admin_bind_addr: SocketAddr,

    #[clap(long, env = "MANAGER_CELL_ID_PREFIX", default_value = "world")]
    pub cell_id_prefix: String,
}
