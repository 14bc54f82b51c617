//! Limit accounting configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Limit accounting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Backend used to persist limit pools.
    #[serde(default)]
    pub store: StoreBackend,
    /// Admin-scope default maxima, keyed by limit kind name.
    ///
    /// These override the defaults an extension registers for its kinds.
    /// Negative values mean unlimited.
    #[serde(default)]
    pub defaults: HashMap<String, i64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::default(),
            defaults: HashMap::new(),
        }
    }
}

/// Where limit pools are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local store, lost on restart. Intended for tests and dry runs.
    Memory,
    /// PostgreSQL tables `limit_pools` and `limits`.
    Postgres,
}

impl Default for StoreBackend {
    fn default() -> Self {
        Self::Postgres
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Postgres => write!(f, "postgres"),
        }
    }
}
