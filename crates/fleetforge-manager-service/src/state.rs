use fleetforge_core::CellManager;

#[derive(Clone)]
pub struct ManagerState {
    pub manager: CellManager,
}
