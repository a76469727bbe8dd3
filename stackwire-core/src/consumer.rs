//! Consumer side of the registry handoff.
//!
//! Every read states its policy up front: [`Consumer::require`] for hard
//! dependencies (absence is a [`StackwireError::HardDependencyMissing`]) and
//! [`Consumer::optional`] for soft ones (absence is `Ok(None)`). Backend
//! failures propagate in both cases; only absence is treated differently.

use crate::error::{Result, StackwireError};
use crate::observability::metrics;
use crate::provision::Provisioner;
use crate::registry::Registry;
use crate::types::key::decode_list;
use crate::types::{ClusterHandle, Dependency, DependencyPolicy, NetworkHandle, RegistryKey};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Registry keys that describe a shared network.
#[derive(Debug, Clone)]
pub struct NetworkImport {
    /// Key holding the network identifier
    pub id_key: RegistryKey,
    /// Key holding a JSON list of subnet identifiers
    pub subnets_key: RegistryKey,
    /// Availability zones of the importing region (local metadata, not published)
    pub availability_zones: Vec<String>,
}

/// Values read by [`Consumer::preflight`].
///
/// Stacks build on these values instead of reading the registry again, so
/// nothing is read after the stack starts creating resources.
#[derive(Debug, Clone, Default)]
pub struct Preflight {
    values: BTreeMap<RegistryKey, String>,
    unavailable: Vec<RegistryKey>,
}

impl Preflight {
    /// Value of a checked key; `None` for soft keys that were absent.
    pub fn value(&self, key: &RegistryKey) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Soft dependencies that are not published yet.
    pub fn unavailable(&self) -> &[RegistryKey] {
        &self.unavailable
    }
}

/// Reads registry values on behalf of one stack.
#[derive(Clone)]
pub struct Consumer {
    stack: String,
    registry: Arc<dyn Registry>,
}

impl Consumer {
    pub fn new(stack: impl Into<String>, registry: Arc<dyn Registry>) -> Self {
        Self { stack: stack.into(), registry }
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Hard dependency: the value must be published.
    #[instrument(skip(self), fields(stack = %self.stack, key = %key))]
    pub async fn require(&self, key: &RegistryKey) -> Result<String> {
        match self.registry.fetch(key).await? {
            Some(entry) => {
                debug!("Resolved hard dependency");
                Ok(entry.value)
            }
            None => Err(StackwireError::HardDependencyMissing {
                stack: self.stack.clone(),
                key: key.to_string(),
            }),
        }
    }

    /// Soft dependency: `None` means the feature is not available yet.
    #[instrument(skip(self), fields(stack = %self.stack, key = %key))]
    pub async fn optional(&self, key: &RegistryKey) -> Result<Option<String>> {
        let value = self.registry.fetch(key).await?.map(|entry| entry.value);
        if value.is_none() {
            metrics::record_soft_dependency_unavailable(&self.stack);
            info!("Soft dependency {} not published yet; feature disabled", key);
        }
        Ok(value)
    }

    /// Hard dependency holding a JSON list.
    pub async fn require_list(&self, key: &RegistryKey) -> Result<Vec<String>> {
        let raw = self.require(key).await?;
        decode_list(key, &raw)
    }

    /// Read a dependency according to its declared policy.
    ///
    /// Hard dependencies never yield `Ok(None)`.
    pub async fn lookup(&self, dependency: &Dependency) -> Result<Option<String>> {
        match dependency.policy {
            DependencyPolicy::Hard => self.require(&dependency.key).await.map(Some),
            DependencyPolicy::Soft => self.optional(&dependency.key).await,
        }
    }

    /// Check every declared dependency before any resource is created.
    ///
    /// Fails on the first missing hard dependency. Every key is read once.
    #[instrument(skip(self, dependencies), fields(stack = %self.stack))]
    pub async fn preflight(&self, dependencies: &[Dependency]) -> Result<Preflight> {
        let mut preflight = Preflight::default();
        for dependency in dependencies {
            match self.lookup(dependency).await? {
                Some(value) => {
                    preflight.values.insert(dependency.key.clone(), value);
                }
                None => preflight.unavailable.push(dependency.key.clone()),
            }
        }
        Ok(preflight)
    }

    /// Rebuild a handle to a network owned by another stack.
    #[instrument(skip(self, provisioner, import), fields(stack = %self.stack, key = %import.id_key))]
    pub async fn import_network(
        &self,
        provisioner: &dyn Provisioner,
        import: &NetworkImport,
    ) -> Result<NetworkHandle> {
        let id = self.require(&import.id_key).await?;
        let subnet_ids = self.require_list(&import.subnets_key).await?;

        let handle = provisioner
            .import_network_by_handle(&id, &import.availability_zones, &subnet_ids)
            .await?;
        info!(network_id = %handle.id, subnets = handle.subnet_ids.len(), "Imported network");
        Ok(handle)
    }

    /// Rebuild a handle to a cluster owned by another stack.
    #[instrument(skip(self, provisioner), fields(stack = %self.stack, key = %key))]
    pub async fn import_cluster(
        &self,
        provisioner: &dyn Provisioner,
        key: &RegistryKey,
    ) -> Result<ClusterHandle> {
        let id = self.require(key).await?;
        let handle = provisioner.import_cluster_by_handle(&id).await?;
        info!(cluster_id = %handle.id, "Imported cluster");
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::SimulatedProvisioner;
    use crate::registry::MemoryRegistry;
    use crate::types::RegistryEntry;

    fn key(raw: &str) -> RegistryKey {
        RegistryKey::parse(raw).unwrap()
    }

    fn consumer(registry: &MemoryRegistry) -> Consumer {
        Consumer::new("system-health", Arc::new(registry.clone()))
    }

    #[tokio::test]
    async fn test_require_present() {
        let registry = MemoryRegistry::new();
        registry.put(&key("/net/vpc/id"), "vpc-123").await.unwrap();

        assert_eq!(consumer(&registry).require(&key("/net/vpc/id")).await.unwrap(), "vpc-123");
    }

    #[tokio::test]
    async fn test_require_missing_is_hard_error() {
        let registry = MemoryRegistry::new();
        let err = consumer(&registry).require(&key("/net/vpc/id")).await.unwrap_err();

        match err {
            StackwireError::HardDependencyMissing { stack, key } => {
                assert_eq!(stack, "system-health");
                assert_eq!(key, "/net/vpc/id");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_optional_missing_is_none() {
        let registry = MemoryRegistry::new();
        let value = consumer(&registry)
            .optional(&key("/appshell/cloudfront/distribution/id"))
            .await
            .unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_lookup_follows_policy() {
        let registry = MemoryRegistry::new();
        let consumer = consumer(&registry);

        let soft = Dependency::soft(key("/island/system-health/alb/dnsName"));
        assert_eq!(consumer.lookup(&soft).await.unwrap(), None);

        let hard = Dependency::hard(key("/island/system-health/alb/dnsName"));
        assert!(consumer.lookup(&hard).await.unwrap_err().is_hard_dependency_missing());
    }

    #[tokio::test]
    async fn test_preflight_reports_unavailable_soft_keys() {
        let registry = MemoryRegistry::new();
        registry.put(&key("/appshell/vpc/id"), "vpc-1").await.unwrap();

        let deps = vec![
            Dependency::hard(key("/appshell/vpc/id")),
            Dependency::soft(key("/appshell/cloudfront/distribution/id")),
        ];
        let preflight = consumer(&registry).preflight(&deps).await.unwrap();
        assert_eq!(preflight.unavailable(), &[key("/appshell/cloudfront/distribution/id")]);
        assert_eq!(preflight.value(&key("/appshell/vpc/id")), Some("vpc-1"));
        assert_eq!(preflight.value(&key("/appshell/cloudfront/distribution/id")), None);
    }

    #[tokio::test]
    async fn test_import_network() {
        let registry = MemoryRegistry::new();
        registry.put(&key("/net/vpc/id"), "vpc-123").await.unwrap();
        registry
            .put_entry(RegistryEntry::list(key("/net/vpc/subnets/island"), &["s-1", "s-2"]).unwrap())
            .await
            .unwrap();

        let import = NetworkImport {
            id_key: key("/net/vpc/id"),
            subnets_key: key("/net/vpc/subnets/island"),
            availability_zones: vec!["eu-west-1a".to_string(), "eu-west-1b".to_string()],
        };
        let handle =
            consumer(&registry).import_network(&SimulatedProvisioner::new(), &import).await.unwrap();

        assert_eq!(handle.id, "vpc-123");
        assert_eq!(handle.subnet_ids, vec!["s-1", "s-2"]);
        assert_eq!(handle.availability_zones.len(), 2);
    }

    #[tokio::test]
    async fn test_import_network_with_malformed_subnets() {
        let registry = MemoryRegistry::new();
        registry.put(&key("/net/vpc/id"), "vpc-123").await.unwrap();
        registry.put(&key("/net/vpc/subnets/island"), "not-json").await.unwrap();

        let import = NetworkImport {
            id_key: key("/net/vpc/id"),
            subnets_key: key("/net/vpc/subnets/island"),
            availability_zones: vec![],
        };
        let err = consumer(&registry)
            .import_network(&SimulatedProvisioner::new(), &import)
            .await
            .unwrap_err();
        assert!(matches!(err, StackwireError::InvalidValue { .. }));
    }
}
