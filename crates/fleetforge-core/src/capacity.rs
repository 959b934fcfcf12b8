use serde::{Deserialize, Serialize};

/// Resource envelope for a cell. Only `max_players` affects core behavior;
/// `cpu_limit`/`memory_limit` are advisory strings passed through to the
/// out-of-scope orchestrator untouched.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellCapacity {
    pub max_players: u32,
    pub cpu_limit: Option<String>,
    pub memory_limit: Option<String>,
}

impl CellCapacity {
    #[must_use]
    pub fn new(max_players: u32) -> Self {
        Self {
            max_players,
            cpu_limit: None,
            memory_limit: None,
        }
    }

    /// The capacity of a cell created by merging two siblings: player
    /// limits add, advisory strings keep the first non-`None` value.
    #[must_use]
    pub fn merged(a: &Self, b: &Self) -> Self {
        Self {
            max_players: a.max_players + b.max_players,
            cpu_limit: a.cpu_limit.clone().or_else(|| b.cpu_limit.clone()),
            memory_limit: a.memory_limit.clone().or_else(|| b.memory_limit.clone()),
        }
    }
}
