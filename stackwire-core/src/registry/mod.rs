//! Cross-stack configuration registry.
//!
//! The registry is the only state shared between stacks. Every component
//! receives it as an injected `Arc<dyn Registry>`; there is no global handle.
//!
//! Semantics shared by all backends:
//! - `put` overwrites (last writer wins) and is idempotent.
//! - `get` on a missing key returns [`StackwireError::KeyNotFound`]; callers
//!   decide whether absence is fatal.
//! - No multi-key transactions. A reader may see one key of a publisher and
//!   not another.
//! - Entries never expire. Stale entries from torn-down stacks stay until an
//!   operator removes them.

use crate::config::{Config, RegistryBackend};
use crate::error::{Result, StackwireError};
use crate::types::{RegistryEntry, RegistryKey};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use memory::MemoryRegistry;
pub use sqlite::SqliteRegistry;

/// Registry backend.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Insert or overwrite an entry.
    async fn put_entry(&self, entry: RegistryEntry) -> Result<()>;

    /// Look up an entry. `Ok(None)` when the key was never published.
    async fn fetch(&self, key: &RegistryKey) -> Result<Option<RegistryEntry>>;

    /// Remove an entry. Returns whether it existed.
    async fn delete(&self, key: &RegistryKey) -> Result<bool>;

    /// All entries under a segment-aligned prefix, ordered by key.
    async fn list(&self, prefix: &str) -> Result<Vec<RegistryEntry>>;

    /// Backend name (for logging).
    fn name(&self) -> &str;

    /// Write a scalar value.
    async fn put(&self, key: &RegistryKey, value: &str) -> Result<()> {
        self.put_entry(RegistryEntry::scalar(key.clone(), value)).await
    }

    /// Read a value, failing with `KeyNotFound` if absent.
    async fn get(&self, key: &RegistryKey) -> Result<String> {
        self.fetch(key)
            .await?
            .map(|entry| entry.value)
            .ok_or_else(|| StackwireError::KeyNotFound { key: key.to_string() })
    }

    /// Read a value, falling back when absent.
    async fn get_or_default(&self, key: &RegistryKey, fallback: &str) -> Result<String> {
        Ok(self.fetch(key).await?.map(|entry| entry.value).unwrap_or_else(|| fallback.to_string()))
    }
}

/// Open the registry configured for an environment.
pub async fn open(config: &Config, environment: &str) -> Result<Arc<dyn Registry>> {
    match config.registry.backend {
        RegistryBackend::Memory => {
            info!("Using in-memory registry; nothing will be persisted");
            Ok(Arc::new(MemoryRegistry::new()))
        }
        RegistryBackend::Sqlite => {
            let path = config.registry_path(environment);
            info!("Using registry at {}", path.display());
            Ok(Arc::new(SqliteRegistry::open(path).await?))
        }
    }
}
