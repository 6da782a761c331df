//! Store backend implementations.
//!
//! ## Available Backends
//!
//! - `memory`: process-local tables, used by tests and one-shot commands
//! - `jsonl`: the same tables persisted as one JSONL file per table

mod jsonl;
mod memory;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DbResult;
use crate::traits::Store;

/// Which backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    Memory,
    #[default]
    Jsonl,
}

impl std::fmt::Display for StoreBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Configuration for [`open_store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backend to use.
    pub backend: StoreBackendKind,
    /// Directory holding the table files (ignored by `memory`).
    pub path: PathBuf,
}

impl StoreConfig {
    /// In-memory store.
    pub fn memory() -> Self {
        Self {
            backend: StoreBackendKind::Memory,
            path: PathBuf::new(),
        }
    }

    /// JSONL store rooted at `path`.
    pub fn jsonl(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StoreBackendKind::Jsonl,
            path: path.into(),
        }
    }
}

/// Open a store with the given configuration.
///
/// # Errors
///
/// Returns an error if the JSONL directory cannot be created or an existing
/// table file cannot be parsed.
pub fn open_store(config: &StoreConfig) -> DbResult<Arc<dyn Store>> {
    debug!("Opening {} store at {:?}", config.backend, config.path);
    match config.backend {
        StoreBackendKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackendKind::Jsonl => Ok(Arc::new(JsonlStore::open(&config.path)?)),
    }
}
