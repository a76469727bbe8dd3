//! In-process registry.
//!
//! Same semantics as the durable backend, without persistence. Used by tests
//! and by dry runs (`--registry memory`).

use super::Registry;
use crate::error::Result;
use crate::observability::metrics;
use crate::types::{RegistryEntry, RegistryKey};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Registry held entirely in memory.
///
/// Cloning shares the underlying map, so several stack deployments in one
/// process observe the same state.
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    entries: Arc<RwLock<BTreeMap<RegistryKey, RegistryEntry>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry, ordered by key.
    pub async fn snapshot(&self) -> Vec<RegistryEntry> {
        self.entries.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    #[instrument(skip(self, entry), fields(key = %entry.key))]
    async fn put_entry(&self, entry: RegistryEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.key.clone(), entry);
        metrics::record_registry_put();
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn fetch(&self, key: &RegistryKey) -> Result<Option<RegistryEntry>> {
        let entries = self.entries.read().await;
        let result = entries.get(key).cloned();
        metrics::record_registry_lookup(result.is_some());
        debug!(hit = result.is_some(), "Registry lookup");
        Ok(result)
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &RegistryKey) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RegistryEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.values().filter(|e| e.key.has_prefix(prefix)).cloned().collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StackwireError;

    fn key(raw: &str) -> RegistryKey {
        RegistryKey::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let registry = MemoryRegistry::new();
        registry.put(&key("/net/vpc/id"), "vpc-123").await.unwrap();

        assert_eq!(registry.get(&key("/net/vpc/id")).await.unwrap(), "vpc-123");
    }

    #[tokio::test]
    async fn test_get_missing_key_is_not_found() {
        let registry = MemoryRegistry::new();
        let err = registry.get(&key("/net/vpc/id")).await.unwrap_err();
        assert!(matches!(err, StackwireError::KeyNotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_or_default() {
        let registry = MemoryRegistry::new();
        let k = key("/appshell/cloudfront/distribution/id");

        assert_eq!(registry.get_or_default(&k, "none").await.unwrap(), "none");

        registry.put(&k, "E123").await.unwrap();
        assert_eq!(registry.get_or_default(&k, "none").await.unwrap(), "E123");
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let once = MemoryRegistry::new();
        once.put(&key("/net/vpc/id"), "vpc-123").await.unwrap();

        let twice = MemoryRegistry::new();
        twice.put(&key("/net/vpc/id"), "vpc-123").await.unwrap();
        twice.put(&key("/net/vpc/id"), "vpc-123").await.unwrap();

        let a = once.snapshot().await;
        let b = twice.snapshot().await;
        assert_eq!(a.len(), b.len());
        assert!(a.iter().zip(b.iter()).all(|(x, y)| x.same_content(y)));
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let registry = MemoryRegistry::new();
        registry.put(&key("/net/vpc/id"), "vpc-old").await.unwrap();
        registry.put(&key("/net/vpc/id"), "vpc-new").await.unwrap();

        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get(&key("/net/vpc/id")).await.unwrap(), "vpc-new");
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let registry = MemoryRegistry::new();
        registry.put(&key("/appshell/vpc/id"), "vpc-1").await.unwrap();
        registry.put(&key("/appshell/vpc/cidr"), "10.0.0.0/16").await.unwrap();
        registry.put(&key("/island/system-health/alb/dnsName"), "health.internal").await.unwrap();

        let vpc = registry.list("/appshell/vpc").await.unwrap();
        assert_eq!(vpc.len(), 2);
        assert_eq!(vpc[0].key.as_str(), "/appshell/vpc/cidr");

        assert!(registry.delete(&key("/appshell/vpc/id")).await.unwrap());
        assert!(!registry.delete(&key("/appshell/vpc/id")).await.unwrap());
        assert_eq!(registry.list("/").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_writers_on_distinct_keys() {
        let registry = MemoryRegistry::new();

        let mut handles = vec![];
        for i in 0..10 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let k = RegistryKey::parse(&format!("/stack-{}/loadbalancer/dnsName", i)).unwrap();
                registry.put(&k, &format!("lb-{}.internal", i)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.expect("Task failed");
        }

        assert_eq!(registry.len().await, 10);
    }
}
