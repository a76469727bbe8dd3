//! Boundary to the resource-provisioning layer.
//!
//! Stackwire does not allocate networks, clusters, load balancers or edge
//! distributions itself. Stacks drive a [`Provisioner`] and only publish
//! identifiers and addresses of what it returns.

use crate::error::Result;
use crate::types::{ClusterHandle, HealthEndpoint, NetworkHandle, RoutingTable};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, instrument};

/// Accessors the publisher needs from a created resource.
pub trait Resource {
    /// Resource kind, for logs.
    fn kind(&self) -> &'static str;

    /// Stable identifier (ID or ARN).
    fn resolve_identifier(&self) -> String;

    /// Network address, for resources that have one.
    fn resolve_address(&self) -> Option<String> {
        None
    }
}

/// Requested network layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub cidr: String,
    pub availability_zones: Vec<String>,
    pub subnet_groups: Vec<String>,
}

/// Network created by a stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub cidr: String,
    /// Subnet group -> subnet IDs (one per availability zone)
    pub subnets: BTreeMap<String, Vec<String>>,
}

/// Cluster created by a stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub arn: String,
}

/// Requested internal load balancer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancerSpec {
    pub network_id: String,
    pub subnet_ids: Vec<String>,
    pub cluster_id: String,
    pub listener_port: u16,
    pub health: HealthEndpoint,
}

/// Load balancer created by a stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub arn: String,
    pub dns_name: String,
    pub listener_arn: String,
}

/// Edge distribution created from a routing table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    pub id: String,
    pub domain_name: String,
}

impl Resource for Network {
    fn kind(&self) -> &'static str {
        "network"
    }

    fn resolve_identifier(&self) -> String {
        self.id.clone()
    }
}

impl Resource for Cluster {
    fn kind(&self) -> &'static str {
        "cluster"
    }

    fn resolve_identifier(&self) -> String {
        self.arn.clone()
    }
}

impl Resource for LoadBalancer {
    fn kind(&self) -> &'static str {
        "load balancer"
    }

    fn resolve_identifier(&self) -> String {
        self.arn.clone()
    }

    fn resolve_address(&self) -> Option<String> {
        Some(self.dns_name.clone())
    }
}

impl Resource for Distribution {
    fn kind(&self) -> &'static str {
        "distribution"
    }

    fn resolve_identifier(&self) -> String {
        self.id.clone()
    }

    fn resolve_address(&self) -> Option<String> {
        Some(self.domain_name.clone())
    }
}

/// Resource-provisioning capability.
///
/// Import methods return non-owning handles; implementations must not tie
/// the imported resource's lifecycle to the importing stack.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn import_network_by_handle(
        &self,
        id: &str,
        availability_zones: &[String],
        subnet_ids: &[String],
    ) -> Result<NetworkHandle>;

    async fn import_cluster_by_handle(&self, id: &str) -> Result<ClusterHandle>;

    async fn create_network(&self, stack: &str, spec: &NetworkSpec) -> Result<Network>;

    async fn create_cluster(&self, stack: &str, network_id: &str) -> Result<Cluster>;

    async fn create_load_balancer(&self, stack: &str, spec: &LoadBalancerSpec)
        -> Result<LoadBalancer>;

    async fn create_distribution(&self, stack: &str, routes: &RoutingTable)
        -> Result<Distribution>;
}

/// Provisioner that fabricates identifiers without touching any cloud.
///
/// Used for dry runs and tests. Created distributions are kept so the
/// materialized routing table can be inspected afterwards.
#[derive(Default)]
pub struct SimulatedProvisioner {
    distributions: Mutex<Vec<(Distribution, RoutingTable)>>,
}

impl SimulatedProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routing table of the most recently created distribution.
    pub fn last_routing_table(&self) -> Option<RoutingTable> {
        self.distributions
            .lock()
            .ok()
            .and_then(|d| d.last().map(|(_, table)| table.clone()))
    }

    fn short_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
    }
}

#[async_trait]
impl Provisioner for SimulatedProvisioner {
    #[instrument(skip(self))]
    async fn import_network_by_handle(
        &self,
        id: &str,
        availability_zones: &[String],
        subnet_ids: &[String],
    ) -> Result<NetworkHandle> {
        Ok(NetworkHandle {
            id: id.to_string(),
            availability_zones: availability_zones.to_vec(),
            subnet_ids: subnet_ids.to_vec(),
        })
    }

    #[instrument(skip(self))]
    async fn import_cluster_by_handle(&self, id: &str) -> Result<ClusterHandle> {
        Ok(ClusterHandle { id: id.to_string() })
    }

    #[instrument(skip(self, spec))]
    async fn create_network(&self, stack: &str, spec: &NetworkSpec) -> Result<Network> {
        let subnets = spec
            .subnet_groups
            .iter()
            .map(|group| {
                let ids =
                    spec.availability_zones.iter().map(|_| format!("subnet-{}", Self::short_id()));
                (group.clone(), ids.collect())
            })
            .collect();

        let network = Network { id: format!("vpc-{}", Self::short_id()), cidr: spec.cidr.clone(), subnets };
        debug!(network_id = %network.id, "Simulated network");
        Ok(network)
    }

    #[instrument(skip(self))]
    async fn create_cluster(&self, stack: &str, _network_id: &str) -> Result<Cluster> {
        Ok(Cluster { arn: format!("arn:sim:ecs:cluster/{}-{}", stack, Self::short_id()) })
    }

    #[instrument(skip(self, spec))]
    async fn create_load_balancer(
        &self,
        stack: &str,
        spec: &LoadBalancerSpec,
    ) -> Result<LoadBalancer> {
        let id = Self::short_id();
        Ok(LoadBalancer {
            arn: format!("arn:sim:elb:loadbalancer/{}/{}", stack, id),
            dns_name: format!("internal-{}-{}.elb.internal", stack, id),
            listener_arn: format!("arn:sim:elb:listener/{}/{}/{}", stack, id, spec.listener_port),
        })
    }

    #[instrument(skip(self, routes), fields(rules = routes.len()))]
    async fn create_distribution(
        &self,
        _stack: &str,
        routes: &RoutingTable,
    ) -> Result<Distribution> {
        let id = Self::short_id().to_uppercase();
        let distribution =
            Distribution { id: format!("E{}", id), domain_name: format!("d{}.edge.sim", id.to_lowercase()) };

        if let Ok(mut distributions) = self.distributions.lock() {
            distributions.push((distribution.clone(), routes.clone()));
        }
        Ok(distribution)
    }
}
