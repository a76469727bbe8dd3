//! Core domain types.

pub mod handle;
pub mod key;
pub mod route;
pub mod stack;

pub use handle::{ClusterHandle, ImportedResourceHandle, NetworkHandle};
pub use key::{RegistryEntry, RegistryKey, ValueKind};
pub use route::{
    AllowedMethods, BackendCandidate, BackendCategory, CachePolicy, HealthEndpoint, RouteRule,
    RoutingTable, ViewerProtocol, DEFAULT_PATTERN,
};
pub use stack::{Dependency, DependencyPolicy, DeployOutcome, StackDescriptor};
