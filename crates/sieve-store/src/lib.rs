//! sieve-store
//!
//! `DocumentStore` implementations: an in-process map for tests and one-shot
//! runs, and a LanceDB table for persistent collections.

pub mod lance;
pub mod memory;
pub mod schema;
pub mod table;

use std::sync::Arc;

use anyhow::Result;
use sieve_core::config::{expand_path, StoreBackend, StoreConfig};
use sieve_core::traits::DocumentStore;
use tracing::info;

pub use lance::LanceStore;
pub use memory::MemoryStore;

/// Store selected by `cfg.backend`; `dim` is the embedding dimensionality.
pub async fn open_store(cfg: &StoreConfig, dim: usize) -> Result<Arc<dyn DocumentStore>> {
    match cfg.backend {
        StoreBackend::Memory => {
            info!("using in-memory document store");
            Ok(Arc::new(MemoryStore::with_dimension(dim)))
        }
        StoreBackend::Lance => {
            let dir = expand_path(&cfg.lancedb_dir);
            std::fs::create_dir_all(&dir)?;
            info!(path = %dir.display(), table = %cfg.table, "opening LanceDB document store");
            Ok(Arc::new(LanceStore::open(&dir.to_string_lossy(), &cfg.table, dim).await?))
        }
    }
}
