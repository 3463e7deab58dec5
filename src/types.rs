/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// The deployable units of the backend. One process runs exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Gateway,
    Users,
    Notes,
    Tasks,
    Events,
}

impl ServiceKind {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Gateway => "gateway",
            ServiceKind::Users => "users",
            ServiceKind::Notes => "notes",
            ServiceKind::Tasks => "tasks",
            ServiceKind::Events => "events",
        }
    }

    /// Database backing this service, `None` for the stateless gateway
    pub fn database_name(&self) -> Option<String> {
        match self {
            ServiceKind::Gateway => None,
            other => Some(format!("agendita_{}", other.name())),
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
