//! Handles to resources owned by other stacks.
//!
//! An imported handle is a weak reference: it carries enough metadata to use
//! the resource locally, and nothing to delete or mutate it.

use serde::{Deserialize, Serialize};

/// Imported network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkHandle {
    pub id: String,
    pub availability_zones: Vec<String>,
    pub subnet_ids: Vec<String>,
}

/// Imported cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHandle {
    pub id: String,
}

/// Any resource imported from another stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportedResourceHandle {
    Network(NetworkHandle),
    Cluster(ClusterHandle),
}

impl ImportedResourceHandle {
    pub fn id(&self) -> &str {
        match self {
            ImportedResourceHandle::Network(n) => &n.id,
            ImportedResourceHandle::Cluster(c) => &c.id,
        }
    }
}

impl From<NetworkHandle> for ImportedResourceHandle {
    fn from(handle: NetworkHandle) -> Self {
        ImportedResourceHandle::Network(handle)
    }
}

impl From<ClusterHandle> for ImportedResourceHandle {
    fn from(handle: ClusterHandle) -> Self {
        ImportedResourceHandle::Cluster(handle)
    }
}
