//! App shell stack: owns the shared network, the cluster and the primary
//! load balancer.

use super::{keys, record_publish, DeployContext, Stack};
use crate::config::Config;
use crate::error::{Result, StackwireError};
use crate::provision::{LoadBalancerSpec, NetworkSpec};
use crate::types::{DeployOutcome, HealthEndpoint, RegistryKey, StackDescriptor};
use async_trait::async_trait;
use tracing::{info, instrument};

pub const NAME: &str = "app-shell";
const DEFAULT_REGION: &str = "eu-west-1";
const CONTAINER_PORT: u16 = 3030;
const LISTENER_PORT: u16 = 80;

pub struct AppShellStack {
    region: String,
    availability_zones: Vec<String>,
    /// Subnet group and the key its subnet list is published under. The
    /// first group hosts the load balancer.
    subnet_groups: Vec<(String, RegistryKey)>,
}

impl AppShellStack {
    pub fn new(config: &Config, environment: &str) -> Result<Self> {
        let region = config.region_for(environment, NAME, DEFAULT_REGION);
        let availability_zones = config.require_availability_zones(&region)?;

        if config.network.subnet_groups.is_empty() {
            return Err(StackwireError::InvalidConfig {
                reason: "at least one subnet group is required".to_string(),
            });
        }
        let subnet_groups = config
            .network
            .subnet_groups
            .iter()
            .map(|g| keys::vpc_subnets(g).map(|k| (g.clone(), k)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { region, availability_zones, subnet_groups })
    }

    fn failed(resource: &str, err: StackwireError) -> StackwireError {
        StackwireError::ProvisioningFailed {
            stack: NAME.to_string(),
            resource: resource.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl Stack for AppShellStack {
    fn descriptor(&self) -> StackDescriptor {
        self.subnet_groups.iter().fold(
            StackDescriptor::new(NAME, &self.region)
                .produces(keys::vpc_id())
                .produces(keys::vpc_cidr())
                .produces(keys::cluster_arn())
                .produces(keys::app_shell_lb_dns()),
            |d, (_, key)| d.produces(key.clone()),
        )
    }

    #[instrument(skip(self, ctx), fields(stack = NAME, environment = %ctx.environment))]
    async fn deploy(&self, ctx: &DeployContext) -> Result<DeployOutcome> {
        let provisioner = ctx.provisioner.as_ref();

        let private_group = self.subnet_groups.first().map(|(g, _)| g.as_str()).ok_or_else(|| {
            StackwireError::InvalidConfig { reason: "at least one subnet group is required".to_string() }
        })?;

        let network = provisioner
            .create_network(
                NAME,
                &NetworkSpec {
                    cidr: ctx.config.network.cidr.clone(),
                    availability_zones: self.availability_zones.clone(),
                    subnet_groups: self.subnet_groups.iter().map(|(g, _)| g.clone()).collect(),
                },
            )
            .await
            .map_err(|e| Self::failed("network", e))?;

        let cluster = provisioner
            .create_cluster(NAME, &network.id)
            .await
            .map_err(|e| Self::failed("cluster", e))?;

        let load_balancer = provisioner
            .create_load_balancer(
                NAME,
                &LoadBalancerSpec {
                    network_id: network.id.clone(),
                    subnet_ids: network.subnets.get(private_group).cloned().unwrap_or_default(),
                    cluster_id: cluster.arn.clone(),
                    listener_port: LISTENER_PORT,
                    health: HealthEndpoint { path: "/".to_string(), port: CONTAINER_PORT },
                },
            )
            .await
            .map_err(|e| Self::failed("load balancer", e))?;

        info!(network_id = %network.id, cluster = %cluster.arn, "App shell resources created");

        let publisher = ctx.publisher(NAME);
        let mut publication = publisher.stage();
        publication
            .identifier(keys::vpc_id(), &network)
            .scalar(keys::vpc_cidr(), network.cidr.clone())
            .identifier(keys::cluster_arn(), &cluster)
            .address(keys::app_shell_lb_dns(), &load_balancer);
        for (group, key) in &self.subnet_groups {
            let ids = network.subnets.get(group).cloned().unwrap_or_default();
            publication.list(key.clone(), &ids);
        }

        let mut outcome = DeployOutcome::default();
        record_publish(&mut outcome, publisher.publish(publication).await);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_produces_every_subnet_group() {
        let stack = AppShellStack::new(&Config::default(), "dev").unwrap();
        let descriptor = stack.descriptor();

        for group in ["app-shell-private", "island-reserved-1", "island-reserved-2", "island-reserved-3"]
        {
            assert!(descriptor.produces.contains(&keys::vpc_subnets(group).unwrap()), "{}", group);
        }
        assert_eq!(descriptor.produces.len(), 8);
    }

    #[test]
    fn test_invalid_subnet_group_fails_construction() {
        let mut config = Config::default();
        config.network.subnet_groups.push("a b".to_string());

        let err = AppShellStack::new(&config, "dev").err().unwrap();
        assert!(matches!(err, StackwireError::InvalidKey { .. }));
    }

    #[test]
    fn test_region_without_zones_fails_construction() {
        let mut config = Config::default();
        config
            .environments
            .entry("dev".to_string())
            .or_default()
            .regions
            .insert(NAME.to_string(), "ap-south-1".to_string());

        let err = AppShellStack::new(&config, "dev").err().unwrap();
        assert!(matches!(err, StackwireError::InvalidConfig { .. }));
    }
}
