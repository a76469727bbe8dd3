//! Configuration management.

use crate::error::{Result, StackwireError};
use crate::paths;
use crate::stacks::keys;
use crate::types::{BackendCandidate, BackendCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Persistent configuration for stackwire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub registry: RegistryConfig,
    pub environments: BTreeMap<String, EnvironmentConfig>,
    pub network: NetworkConfig,
    pub edge: EdgeConfig,
}

/// Which registry backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub backend: RegistryBackend,
    /// Overrides the per-environment database path.
    pub path: Option<String>,
}

/// Per-environment overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Stack name -> region.
    pub regions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub cidr: String,
    /// Region -> availability zones used when importing the shared network.
    pub availability_zones: BTreeMap<String, Vec<String>>,
    /// Subnet groups carved by the network owner; each is published as a list.
    pub subnet_groups: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Optional backends routed once their address is published.
    pub backends: Vec<BackendCandidate>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            registry: RegistryConfig::default(),
            environments: BTreeMap::new(),
            network: NetworkConfig::default(),
            edge: EdgeConfig::default(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { backend: RegistryBackend::Sqlite, path: None }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: "10.0.0.0/16".to_string(),
            availability_zones: BTreeMap::from([(
                "eu-west-1".to_string(),
                vec!["eu-west-1a".to_string(), "eu-west-1b".to_string(), "eu-west-1c".to_string()],
            )]),
            subnet_groups: vec![
                "app-shell-private".to_string(),
                "island-reserved-1".to_string(),
                "island-reserved-2".to_string(),
                "island-reserved-3".to_string(),
            ],
        }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            backends: vec![BackendCandidate::new(
                "/system-health/*",
                keys::system_health_alb_dns(),
                BackendCategory::Health,
            )
            .with_health("/system-health", 4321)],
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        paths::config_dir().join("config.json")
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from a file; a missing file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| StackwireError::InvalidConfig {
            reason: format!("Failed to read config: {}", e),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            StackwireError::InvalidConfig { reason: format!("Failed to parse config: {}", e) }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::config_path())
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StackwireError::IoError { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            StackwireError::InvalidConfig { reason: format!("Failed to serialize config: {}", e) }
        })?;
        std::fs::write(path, content)
            .map_err(|e| StackwireError::IoError { path: path.to_path_buf(), source: e })
    }

    fn validate(&self) -> Result<()> {
        if self.log_level.trim().is_empty() {
            return Err(StackwireError::InvalidConfig {
                reason: "log_level must not be empty".to_string(),
            });
        }
        if self.network.subnet_groups.is_empty() {
            return Err(StackwireError::InvalidConfig {
                reason: "at least one subnet group is required".to_string(),
            });
        }
        for group in &self.network.subnet_groups {
            keys::vpc_subnets(group).map_err(|e| StackwireError::InvalidConfig {
                reason: format!("subnet group '{}' is not a valid key segment: {}", group, e),
            })?;
        }
        Ok(())
    }

    /// Overrides for an environment. Unknown environments use the defaults.
    pub fn environment(&self, name: &str) -> EnvironmentConfig {
        self.environments.get(name).cloned().unwrap_or_default()
    }

    /// Region for a stack in an environment, falling back to `default`.
    pub fn region_for(&self, environment: &str, stack: &str, default: &str) -> String {
        self.environments
            .get(environment)
            .and_then(|env| env.regions.get(stack))
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Registry database path for an environment.
    pub fn registry_path(&self, environment: &str) -> PathBuf {
        self.registry
            .path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| paths::registry_db_path(environment))
    }

    /// Availability zones for a region (empty when unconfigured).
    pub fn availability_zones(&self, region: &str) -> Vec<String> {
        self.network.availability_zones.get(region).cloned().unwrap_or_default()
    }

    /// Availability zones for a region that hosts a network. A region
    /// without zones would yield a network with no subnets.
    pub fn require_availability_zones(&self, region: &str) -> Result<Vec<String>> {
        let zones = self.availability_zones(region);
        if zones.is_empty() {
            return Err(StackwireError::InvalidConfig {
                reason: format!(
                    "no availability zones configured for region {} (network.availability_zones)",
                    region
                ),
            });
        }
        Ok(zones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_edge_backend_is_system_health() {
        let config = Config::default();
        assert_eq!(config.edge.backends.len(), 1);
        let backend = &config.edge.backends[0];
        assert_eq!(backend.path_pattern, "/system-health/*");
        assert_eq!(backend.address_key.as_str(), "/island/system-health/alb/dnsName");
        assert_eq!(backend.health.as_ref().map(|h| h.port), Some(4321));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.log_level = "debug".to_string();
        config
            .environments
            .insert("staging".to_string(), EnvironmentConfig {
                regions: BTreeMap::from([("edge".to_string(), "us-east-1".to_string())]),
            });
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.log_level, "debug");
        assert_eq!(loaded.region_for("staging", "edge", "eu-west-1"), "us-east-1");
        assert_eq!(loaded.region_for("production", "edge", "eu-west-1"), "eu-west-1");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("absent.json")).unwrap();
        assert_eq!(config.registry.backend, RegistryBackend::Sqlite);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "registry": { "backend": "memory" } }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.registry.backend, RegistryBackend::Memory);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.availability_zones("eu-west-1").len(), 3);
    }

    #[test]
    fn test_invalid_subnet_group_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "network": { "subnet_groups": ["a/b"] } }"#).unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, StackwireError::InvalidConfig { .. }));
    }

    #[test]
    fn test_subnet_group_must_be_a_valid_key_segment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "network": { "subnet_groups": ["app-shell-private", "a b"] } }"#)
            .unwrap();

        let err = Config::load_from(&path).unwrap_err();
        match err {
            StackwireError::InvalidConfig { reason } => assert!(reason.contains("a b")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_region_without_zones_is_rejected() {
        let config = Config::default();
        assert_eq!(config.require_availability_zones("eu-west-1").unwrap().len(), 3);

        let err = config.require_availability_zones("ap-south-1").unwrap_err();
        assert!(matches!(err, StackwireError::InvalidConfig { .. }));
    }

    #[test]
    fn test_registry_path_override() {
        let mut config = Config::default();
        config.registry.path = Some("/tmp/custom.db".to_string());
        assert_eq!(config.registry_path("prod"), PathBuf::from("/tmp/custom.db"));
    }
}
