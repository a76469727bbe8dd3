//! Dependency-ordered deployment of a set of stacks.

use crate::error::{Result, StackwireError};
use crate::observability::metrics;
use crate::resolver::Resolver;
use crate::stacks::{DeployContext, Stack};
use crate::types::DeployOutcome;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};

/// Result of one stack in a deployment run.
#[derive(Debug, Clone)]
pub struct StackReport {
    pub name: String,
    pub region: String,
    pub outcome: DeployOutcome,
    pub duration: Duration,
}

/// Result of a successful deployment run.
#[derive(Debug, Clone, Default)]
pub struct DeployReport {
    pub environment: String,
    pub steps: Vec<StackReport>,
}

impl DeployReport {
    /// Total number of registry writes that failed across all stacks.
    pub fn publish_failures(&self) -> usize {
        self.steps.iter().map(|s| s.outcome.publish_failures.len()).sum()
    }
}

/// Deploys stacks one at a time in resolved order.
pub struct Deployer {
    stacks: HashMap<String, Arc<dyn Stack>>,
    resolver: Resolver,
}

impl Deployer {
    /// Validate the stack set. Duplicate names and undeclared dependencies fail here.
    pub fn new(stacks: Vec<Arc<dyn Stack>>) -> Result<Self> {
        let descriptors = stacks.iter().map(|s| s.descriptor()).collect();
        let resolver = Resolver::new(descriptors)?;
        let stacks = stacks.into_iter().map(|s| (s.descriptor().name, s)).collect();
        Ok(Self { stacks, resolver })
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Names of the stacks a deployment of `target` (or everything) would run.
    pub fn plan(&self, target: Option<&str>) -> Result<Vec<String>> {
        let order = match target {
            Some(target) => self.resolver.plan_for(target)?,
            None => self.resolver.order()?,
        };
        Ok(order.into_iter().map(|s| s.name.clone()).collect())
    }

    /// Deploy `target` and its dependencies (or every stack), in order.
    ///
    /// The order is resolved before anything runs, so a cycle fails without
    /// touching any stack. The first failing stack aborts the run.
    #[instrument(skip(self, ctx), fields(environment = %ctx.environment))]
    pub async fn deploy(&self, target: Option<&str>, ctx: &DeployContext) -> Result<DeployReport> {
        let plan = self.plan(target)?;
        info!("Deploying {} stack(s): {}", plan.len(), plan.join(", "));

        let mut report = DeployReport { environment: ctx.environment.clone(), steps: Vec::new() };

        for name in plan {
            let stack = self
                .stacks
                .get(&name)
                .ok_or_else(|| StackwireError::UnknownStack { stack: name.clone() })?;
            let descriptor = stack.descriptor();

            info!(stack = %name, region = %descriptor.region, "Deploying stack");
            let started = Instant::now();

            match stack.deploy(ctx).await {
                Ok(outcome) => {
                    metrics::record_stack_deploy(&name, true);
                    info!(
                        stack = %name,
                        published = outcome.published.len(),
                        "Stack deployed in {:?}",
                        started.elapsed()
                    );
                    report.steps.push(StackReport {
                        name,
                        region: descriptor.region,
                        outcome,
                        duration: started.elapsed(),
                    });
                }
                Err(e) => {
                    metrics::record_stack_deploy(&name, false);
                    error!(stack = %name, "Stack deployment failed: {}", e);
                    return Err(StackwireError::StackFailed { stack: name, source: Box::new(e) });
                }
            }
        }

        Ok(report)
    }
}
