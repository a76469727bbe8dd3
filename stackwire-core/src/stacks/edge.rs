//! Edge stack: composes the routing table and creates the distribution.

use super::{app_shell, keys, record_publish, DeployContext, Stack};
use crate::composer::RouteComposer;
use crate::config::Config;
use crate::error::{Result, StackwireError};
use crate::types::{BackendCandidate, Dependency, DeployOutcome, HealthEndpoint, StackDescriptor};
use async_trait::async_trait;
use tracing::{info, instrument};

pub const NAME: &str = "edge";
// Edge distributions are managed from us-east-1 regardless of backend regions.
const DEFAULT_REGION: &str = "us-east-1";
const PRIMARY_HEALTH_PATH: &str = "/";
const PRIMARY_PORT: u16 = 3030;

pub struct EdgeStack {
    region: String,
    backends: Vec<BackendCandidate>,
}

impl EdgeStack {
    pub fn new(config: &Config, environment: &str) -> Self {
        Self {
            region: config.region_for(environment, NAME, DEFAULT_REGION),
            backends: config.edge.backends.clone(),
        }
    }

    /// Composer for the current backend declarations.
    pub fn composer(&self) -> RouteComposer {
        RouteComposer::new(keys::app_shell_lb_dns())
            .primary_health(HealthEndpoint {
                path: PRIMARY_HEALTH_PATH.to_string(),
                port: PRIMARY_PORT,
            })
            .candidates(self.backends.iter().cloned())
    }
}

#[async_trait]
impl Stack for EdgeStack {
    fn descriptor(&self) -> StackDescriptor {
        let descriptor = StackDescriptor::new(NAME, &self.region)
            .depends_on(app_shell::NAME)
            .consumes(Dependency::hard(keys::app_shell_lb_dns()))
            .produces(keys::distribution_id())
            .produces(keys::distribution_id_legacy())
            .produces(keys::distribution_domain());

        self.backends
            .iter()
            .fold(descriptor, |d, b| d.consumes(Dependency::soft(b.address_key.clone())))
    }

    #[instrument(skip(self, ctx), fields(stack = NAME, environment = %ctx.environment))]
    async fn deploy(&self, ctx: &DeployContext) -> Result<DeployOutcome> {
        let consumer = ctx.consumer(NAME);
        let routes = self.composer().compose(&consumer).await?;

        let unavailable: Vec<_> = self
            .backends
            .iter()
            .filter(|b| routes.rule_for(&b.path_pattern).is_none())
            .map(|b| b.address_key.clone())
            .collect();

        let distribution =
            ctx.provisioner.create_distribution(NAME, &routes).await.map_err(|e| {
                StackwireError::ProvisioningFailed {
                    stack: NAME.to_string(),
                    resource: "distribution".to_string(),
                    reason: e.to_string(),
                }
            })?;

        info!(
            distribution = %distribution.id,
            rules = routes.len(),
            "Edge distribution created"
        );

        let publisher = ctx.publisher(NAME);
        let mut publication = publisher.stage();
        publication
            .identifier(keys::distribution_id(), &distribution)
            .identifier(keys::distribution_id_legacy(), &distribution)
            .address(keys::distribution_domain(), &distribution);

        let mut outcome = DeployOutcome::default();
        record_publish(&mut outcome, publisher.publish(publication).await);

        for backend in self.backends.iter().filter(|b| unavailable.contains(&b.address_key)) {
            outcome.notes.push(format!(
                "{} not routed: {} is not published yet. Redeploy the edge stack once it is",
                backend.path_pattern, backend.address_key
            ));
        }
        outcome.unavailable = unavailable;

        Ok(outcome)
    }
}
