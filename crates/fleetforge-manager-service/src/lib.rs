//! The in-scope sliver of "the controller": loads a world spec, divides it
//! into initial cells, and serves an admin/observability surface
//! (`/cells`, `/events`, `/metrics`) for whatever out-of-scope process
//! watches this fleet. Manual split/merge annotations are exposed as plain
//! HTTP endpoints rather than a Kubernetes reconciliation loop.

pub mod metrics;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::ManagerState;
