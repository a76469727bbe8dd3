//! Stack domain types.

use crate::types::handle::ImportedResourceHandle;
use crate::types::key::RegistryKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a consumer treats a missing registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyPolicy {
    /// Absence aborts the consuming stack's deployment.
    Hard,
    /// Absence disables an optional feature; deployment proceeds.
    Soft,
}

/// A registry key a stack reads, with its policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub key: RegistryKey,
    pub policy: DependencyPolicy,
}

impl Dependency {
    pub fn hard(key: RegistryKey) -> Self {
        Self { key, policy: DependencyPolicy::Hard }
    }

    pub fn soft(key: RegistryKey) -> Self {
        Self { key, policy: DependencyPolicy::Soft }
    }

    pub fn is_hard(&self) -> bool {
        self.policy == DependencyPolicy::Hard
    }
}

/// Static description of an independently deployable stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackDescriptor {
    /// Stack name (unique within a catalog)
    pub name: String,

    /// Deployment region. Ordering ignores regions entirely.
    pub region: String,

    /// Stacks that must finish publishing before this one deploys
    pub depends_on: Vec<String>,

    /// Keys this stack publishes
    pub produces: BTreeSet<RegistryKey>,

    /// Keys this stack reads
    pub consumes: Vec<Dependency>,
}

impl StackDescriptor {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            depends_on: Vec::new(),
            produces: BTreeSet::new(),
            consumes: Vec::new(),
        }
    }

    pub fn depends_on(mut self, stack: impl Into<String>) -> Self {
        self.depends_on.push(stack.into());
        self
    }

    pub fn produces(mut self, key: RegistryKey) -> Self {
        self.produces.insert(key);
        self
    }

    pub fn consumes(mut self, dependency: Dependency) -> Self {
        self.consumes.push(dependency);
        self
    }

    /// Hard dependencies only.
    pub fn required_keys(&self) -> impl Iterator<Item = &RegistryKey> {
        self.consumes.iter().filter(|d| d.is_hard()).map(|d| &d.key)
    }
}

/// Outcome of a single stack deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployOutcome {
    /// Keys written successfully
    pub published: Vec<RegistryKey>,

    /// Keys whose write failed (deployment still succeeded)
    pub publish_failures: Vec<RegistryKey>,

    /// Soft dependencies that were not yet available
    pub unavailable: Vec<RegistryKey>,

    /// Resources of other stacks this deployment imported
    pub imported: Vec<ImportedResourceHandle>,

    /// Free-form notes for operators (e.g. "redeploy edge to enable /system-health/*")
    pub notes: Vec<String>,
}
