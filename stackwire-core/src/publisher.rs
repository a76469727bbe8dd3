//! Publisher side of the registry handoff.
//!
//! A stack stages its outputs in a [`Publication`] while it provisions, and
//! hands the publication to [`Publisher::publish`] only once every resource
//! was created. A stack that fails part way drops its publication, so the
//! registry never describes half-created resources.
//!
//! Individual write failures are not fatal: the resource exists, so the
//! deployment succeeds and the failure is surfaced as a warning in the
//! [`PublishReport`] for manual remediation.

use crate::observability::metrics;
use crate::provision::Resource;
use crate::registry::Registry;
use crate::types::{RegistryEntry, RegistryKey};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A key that could not be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishFailure {
    pub key: RegistryKey,
    pub reason: String,
}

/// Result of a publish step.
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    pub written: Vec<RegistryKey>,
    pub failed: Vec<PublishFailure>,
}

impl PublishReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outputs staged by a stack, not yet visible to anyone.
#[derive(Debug, Default)]
pub struct Publication {
    stack: String,
    entries: Vec<RegistryEntry>,
    failures: Vec<PublishFailure>,
}

impl Publication {
    /// Stage a plain string value.
    pub fn scalar(&mut self, key: RegistryKey, value: impl Into<String>) -> &mut Self {
        self.entries.push(RegistryEntry::scalar(key, value).owned_by(&self.stack));
        self
    }

    /// Stage a JSON list value.
    pub fn list<S: AsRef<str>>(&mut self, key: RegistryKey, items: &[S]) -> &mut Self {
        match RegistryEntry::list(key.clone(), items) {
            Ok(entry) => self.entries.push(entry.owned_by(&self.stack)),
            Err(e) => self.failures.push(PublishFailure { key, reason: e.to_string() }),
        }
        self
    }

    /// Stage a resource's identifier.
    pub fn identifier(&mut self, key: RegistryKey, resource: &dyn Resource) -> &mut Self {
        let id = resource.resolve_identifier();
        self.scalar(key, id)
    }

    /// Stage a resource's address.
    pub fn address(&mut self, key: RegistryKey, resource: &dyn Resource) -> &mut Self {
        match resource.resolve_address() {
            Some(address) => self.scalar(key, address),
            None => {
                self.failures.push(PublishFailure {
                    key,
                    reason: format!("{} has no address", resource.kind()),
                });
                self
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Writes a stack's outputs to the registry.
#[derive(Clone)]
pub struct Publisher {
    stack: String,
    registry: Arc<dyn Registry>,
}

impl Publisher {
    pub fn new(stack: impl Into<String>, registry: Arc<dyn Registry>) -> Self {
        Self { stack: stack.into(), registry }
    }

    /// Start staging outputs.
    pub fn stage(&self) -> Publication {
        Publication { stack: self.stack.clone(), ..Default::default() }
    }

    /// Write every staged entry, best effort.
    #[instrument(skip(self, publication), fields(stack = %self.stack, entries = publication.len()))]
    pub async fn publish(&self, publication: Publication) -> PublishReport {
        let mut report = PublishReport { written: Vec::new(), failed: publication.failures };

        for entry in publication.entries {
            let key = entry.key.clone();
            match self.registry.put_entry(entry).await {
                Ok(()) => report.written.push(key),
                Err(e) => report.failed.push(PublishFailure { key, reason: e.to_string() }),
            }
        }

        for failure in &report.failed {
            metrics::record_publish_failure(&self.stack);
            warn!(
                key = %failure.key,
                "Failed to publish registry key: {}. Consumers will not see it until it is written manually",
                failure.reason
            );
        }

        info!(written = report.written.len(), failed = report.failed.len(), "Publish step complete");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, StackwireError};
    use crate::provision::{LoadBalancer, Network};
    use crate::registry::MemoryRegistry;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    fn key(raw: &str) -> RegistryKey {
        RegistryKey::parse(raw).unwrap()
    }

    /// Registry that rejects writes under one prefix.
    struct FlakyRegistry {
        inner: MemoryRegistry,
        reject_prefix: &'static str,
    }

    #[async_trait]
    impl Registry for FlakyRegistry {
        async fn put_entry(&self, entry: RegistryEntry) -> Result<()> {
            if entry.key.has_prefix(self.reject_prefix) {
                return Err(StackwireError::RegistryWriteFailure {
                    key: entry.key.to_string(),
                    reason: "throttled".to_string(),
                });
            }
            self.inner.put_entry(entry).await
        }

        async fn fetch(&self, key: &RegistryKey) -> Result<Option<RegistryEntry>> {
            self.inner.fetch(key).await
        }

        async fn delete(&self, key: &RegistryKey) -> Result<bool> {
            self.inner.delete(key).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<RegistryEntry>> {
            self.inner.list(prefix).await
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_publish_writes_staged_entries_with_owner() {
        let registry = MemoryRegistry::new();
        let publisher = Publisher::new("app-shell", Arc::new(registry.clone()));

        let lb = LoadBalancer {
            arn: "arn:lb/1".to_string(),
            dns_name: "shell.internal".to_string(),
            listener_arn: "arn:listener/1".to_string(),
        };

        let mut publication = publisher.stage();
        publication
            .address(key("/appshell/loadBalancer/dnsName"), &lb)
            .list(key("/appshell/vpc/subnets/app-shell-private"), &["s-1", "s-2"]);

        let report = publisher.publish(publication).await;
        assert!(report.is_complete());
        assert_eq!(report.written.len(), 2);

        let entry = registry.fetch(&key("/appshell/loadBalancer/dnsName")).await.unwrap().unwrap();
        assert_eq!(entry.value, "shell.internal");
        assert_eq!(entry.owner.as_deref(), Some("app-shell"));
    }

    #[tokio::test]
    async fn test_write_failure_is_reported_not_fatal() {
        let registry = FlakyRegistry { inner: MemoryRegistry::new(), reject_prefix: "/appshell/ecs" };
        let inner = registry.inner.clone();
        let publisher = Publisher::new("app-shell", Arc::new(registry));

        let mut publication = publisher.stage();
        publication
            .scalar(key("/appshell/vpc/id"), "vpc-1")
            .scalar(key("/appshell/ecs/clusterArn"), "arn:cluster/1");

        let report = publisher.publish(publication).await;
        assert_eq!(report.written, vec![key("/appshell/vpc/id")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].key, key("/appshell/ecs/clusterArn"));
        assert_eq!(inner.len().await, 1);
    }

    #[tokio::test]
    async fn test_address_of_addressless_resource_is_a_failure() {
        let registry = MemoryRegistry::new();
        let publisher = Publisher::new("app-shell", Arc::new(registry.clone()));

        let network =
            Network { id: "vpc-1".to_string(), cidr: "10.0.0.0/16".to_string(), subnets: BTreeMap::new() };

        let mut publication = publisher.stage();
        publication.address(key("/appshell/vpc/address"), &network);

        let report = publisher.publish(publication).await;
        assert_eq!(report.failed.len(), 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_dropped_publication_writes_nothing() {
        let registry = MemoryRegistry::new();
        let publisher = Publisher::new("app-shell", Arc::new(registry.clone()));

        let mut publication = publisher.stage();
        publication.scalar(key("/appshell/vpc/id"), "vpc-1");
        drop(publication);

        assert!(registry.is_empty().await);
    }
}
