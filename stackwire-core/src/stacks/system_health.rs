//! System health island: runs inside the app shell's network and cluster and
//! exposes its own internal load balancer for the edge to route to.

use super::{app_shell, keys, record_publish, DeployContext, Stack};
use crate::config::Config;
use crate::consumer::NetworkImport;
use crate::error::{Result, StackwireError};
use crate::provision::LoadBalancerSpec;
use crate::types::{Dependency, DeployOutcome, HealthEndpoint, RegistryKey, StackDescriptor};
use async_trait::async_trait;
use tracing::{info, instrument};

pub const NAME: &str = "system-health";
const DEFAULT_REGION: &str = "eu-west-1";
const SUBNET_GROUP: &str = "island-reserved-2";
const CONTAINER_PORT: u16 = 4321;
const LISTENER_PORT: u16 = 80;
const HEALTH_PATH: &str = "/system-health";

pub struct SystemHealthStack {
    region: String,
    availability_zones: Vec<String>,
    subnets_key: RegistryKey,
}

impl SystemHealthStack {
    pub fn new(config: &Config, environment: &str) -> Result<Self> {
        let region = config.region_for(environment, NAME, DEFAULT_REGION);
        Ok(Self {
            availability_zones: config.require_availability_zones(&region)?,
            subnets_key: keys::vpc_subnets(SUBNET_GROUP)?,
            region,
        })
    }

    fn consumes(&self) -> Vec<Dependency> {
        vec![
            Dependency::hard(keys::vpc_id()),
            Dependency::hard(self.subnets_key.clone()),
            Dependency::hard(keys::cluster_arn()),
            Dependency::soft(keys::distribution_id()),
        ]
    }
}

#[async_trait]
impl Stack for SystemHealthStack {
    fn descriptor(&self) -> StackDescriptor {
        let descriptor = StackDescriptor::new(NAME, &self.region)
            .depends_on(app_shell::NAME)
            .produces(keys::system_health_alb_dns())
            .produces(keys::system_health_alb_arn())
            .produces(keys::system_health_listener_arn());

        self.consumes().into_iter().fold(descriptor, |d, dep| d.consumes(dep))
    }

    #[instrument(skip(self, ctx), fields(stack = NAME, environment = %ctx.environment))]
    async fn deploy(&self, ctx: &DeployContext) -> Result<DeployOutcome> {
        let consumer = ctx.consumer(NAME);
        let provisioner = ctx.provisioner.as_ref();

        // Every registry read happens here; nothing is read after publishing.
        let preflight = consumer.preflight(&self.consumes()).await?;
        let distribution = preflight.value(&keys::distribution_id()).map(str::to_string);

        let network = consumer
            .import_network(
                provisioner,
                &NetworkImport {
                    id_key: keys::vpc_id(),
                    subnets_key: self.subnets_key.clone(),
                    availability_zones: self.availability_zones.clone(),
                },
            )
            .await?;
        let cluster = consumer.import_cluster(provisioner, &keys::cluster_arn()).await?;

        let load_balancer = provisioner
            .create_load_balancer(
                NAME,
                &LoadBalancerSpec {
                    network_id: network.id.clone(),
                    subnet_ids: network.subnet_ids.clone(),
                    cluster_id: cluster.id.clone(),
                    listener_port: LISTENER_PORT,
                    health: HealthEndpoint { path: HEALTH_PATH.to_string(), port: CONTAINER_PORT },
                },
            )
            .await
            .map_err(|e| StackwireError::ProvisioningFailed {
                stack: NAME.to_string(),
                resource: "load balancer".to_string(),
                reason: e.to_string(),
            })?;

        info!(dns_name = %load_balancer.dns_name, "System health load balancer created");

        let publisher = ctx.publisher(NAME);
        let mut publication = publisher.stage();
        publication
            .address(keys::system_health_alb_dns(), &load_balancer)
            .identifier(keys::system_health_alb_arn(), &load_balancer)
            .scalar(keys::system_health_listener_arn(), load_balancer.listener_arn.clone());

        let mut outcome = DeployOutcome {
            unavailable: preflight.unavailable().to_vec(),
            imported: vec![network.into(), cluster.into()],
            ..Default::default()
        };
        record_publish(&mut outcome, publisher.publish(publication).await);

        // The edge only picks up this backend when it is composed again.
        outcome.notes.push(match distribution {
            Some(distribution) => format!(
                "Redeploy the edge stack to route {}/* through distribution {}",
                HEALTH_PATH, distribution
            ),
            None => "No edge distribution yet; deploy the edge stack after this one".to_string(),
        });

        Ok(outcome)
    }
}
