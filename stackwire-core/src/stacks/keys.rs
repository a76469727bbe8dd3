//! Well-known registry keys of the built-in stacks.

use crate::error::Result;
use crate::types::RegistryKey;

pub fn vpc_id() -> RegistryKey {
    RegistryKey::from_static("/appshell/vpc/id")
}

pub fn vpc_cidr() -> RegistryKey {
    RegistryKey::from_static("/appshell/vpc/cidr")
}

/// JSON list of subnet IDs for one subnet group.
pub fn vpc_subnets(group: &str) -> Result<RegistryKey> {
    RegistryKey::from_static("/appshell/vpc/subnets").child(group)
}

pub fn cluster_arn() -> RegistryKey {
    RegistryKey::from_static("/appshell/ecs/clusterArn")
}

pub fn app_shell_lb_dns() -> RegistryKey {
    RegistryKey::from_static("/appshell/loadBalancer/dnsName")
}

pub fn distribution_id() -> RegistryKey {
    RegistryKey::from_static("/appshell/cloudfront/distribution/id")
}

/// Older name of [`distribution_id`], still published for existing readers.
pub fn distribution_id_legacy() -> RegistryKey {
    RegistryKey::from_static("/appshell/cloudfront/distributionId")
}

pub fn distribution_domain() -> RegistryKey {
    RegistryKey::from_static("/appshell/cloudfront/domainName")
}

pub fn system_health_alb_dns() -> RegistryKey {
    RegistryKey::from_static("/island/system-health/alb/dnsName")
}

pub fn system_health_alb_arn() -> RegistryKey {
    RegistryKey::from_static("/island/system-health/alb/arn")
}

pub fn system_health_listener_arn() -> RegistryKey {
    RegistryKey::from_static("/island/system-health/alb/listener/arn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_keys_are_well_formed() {
        for key in [
            vpc_id(),
            vpc_cidr(),
            cluster_arn(),
            app_shell_lb_dns(),
            distribution_id(),
            distribution_id_legacy(),
            distribution_domain(),
            system_health_alb_dns(),
            system_health_alb_arn(),
            system_health_listener_arn(),
        ] {
            assert!(RegistryKey::parse(key.as_str()).is_ok(), "{}", key);
        }
    }

    #[test]
    fn test_subnet_key() {
        assert_eq!(
            vpc_subnets("island-reserved-2").unwrap().as_str(),
            "/appshell/vpc/subnets/island-reserved-2"
        );
        assert!(vpc_subnets("bad/group").is_err());
    }
}
