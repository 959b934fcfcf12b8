use fleetforge_router::RouterError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("could not resolve a cell for this session: {0}")]
    NoCellAvailable(#[source] RouterError),
}
