//! Stackwire core library
//!
//! Cross-stack configuration handoff for independently deployed stacks: a
//! shared registry, publish/consume policies, dependency-ordered deployment
//! and edge routing composition.

pub mod composer;
pub mod config;
pub mod consumer;
pub mod deploy;
pub mod error;
pub mod observability;
pub mod paths;
pub mod provision;
pub mod publisher;
pub mod registry;
pub mod resolver;
pub mod stacks;
pub mod types;

// Re-export commonly used items
pub use composer::RouteComposer;
pub use config::Config;
pub use consumer::{Consumer, NetworkImport, Preflight};
pub use deploy::{DeployReport, Deployer};
pub use error::{Result, StackwireError};
pub use observability::init as init_observability;
pub use provision::{Provisioner, SimulatedProvisioner};
pub use publisher::{Publication, PublishReport, Publisher};
pub use registry::{MemoryRegistry, Registry, SqliteRegistry};
pub use resolver::Resolver;
pub use stacks::{DeployContext, Stack};
pub use types::{
    BackendCandidate, Dependency, RegistryEntry, RegistryKey, RouteRule, RoutingTable,
    StackDescriptor,
};
