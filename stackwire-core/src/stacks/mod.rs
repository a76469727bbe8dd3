//! Stack abstraction and the built-in stacks.
//!
//! Each stack deploys in three strictly ordered steps: read and import what
//! it needs from the registry, create its own resources, then publish. A
//! stack that fails before the last step publishes nothing.

use crate::config::Config;
use crate::consumer::Consumer;
use crate::error::Result;
use crate::provision::Provisioner;
use crate::publisher::{PublishReport, Publisher};
use crate::registry::Registry;
use crate::types::{DeployOutcome, StackDescriptor};
use async_trait::async_trait;
use std::sync::Arc;

pub mod app_shell;
pub mod edge;
pub mod keys;
pub mod system_health;

pub use app_shell::AppShellStack;
pub use edge::EdgeStack;
pub use system_health::SystemHealthStack;

/// Everything a stack needs to deploy.
#[derive(Clone)]
pub struct DeployContext {
    pub environment: String,
    pub config: Arc<Config>,
    pub registry: Arc<dyn Registry>,
    pub provisioner: Arc<dyn Provisioner>,
}

impl DeployContext {
    pub fn new(
        environment: impl Into<String>,
        config: Arc<Config>,
        registry: Arc<dyn Registry>,
        provisioner: Arc<dyn Provisioner>,
    ) -> Self {
        Self { environment: environment.into(), config, registry, provisioner }
    }

    pub fn consumer(&self, stack: &str) -> Consumer {
        Consumer::new(stack, self.registry.clone())
    }

    pub fn publisher(&self, stack: &str) -> Publisher {
        Publisher::new(stack, self.registry.clone())
    }
}

/// An independently deployable stack.
#[async_trait]
pub trait Stack: Send + Sync {
    /// Static description used for ordering and contract checks.
    fn descriptor(&self) -> StackDescriptor;

    /// Import, create, publish.
    async fn deploy(&self, ctx: &DeployContext) -> Result<DeployOutcome>;
}

/// The built-in stacks, in declaration order.
///
/// Fails when the configuration cannot describe them (e.g. a network region
/// with no availability zones).
pub fn builtin(config: &Config, environment: &str) -> Result<Vec<Arc<dyn Stack>>> {
    Ok(vec![
        Arc::new(AppShellStack::new(config, environment)?),
        Arc::new(SystemHealthStack::new(config, environment)?),
        Arc::new(EdgeStack::new(config, environment)),
    ])
}

/// Fold a publish report into a deploy outcome.
pub(crate) fn record_publish(outcome: &mut DeployOutcome, report: PublishReport) {
    outcome.published.extend(report.written);
    outcome.publish_failures.extend(report.failed.into_iter().map(|f| f.key));
}
