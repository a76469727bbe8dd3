//! Edge routing types.

use crate::types::key::RegistryKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Path pattern of the default route.
pub const DEFAULT_PATTERN: &str = "*";

/// Caching applied at the edge for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    Optimized,
    Disabled,
}

/// HTTP methods the edge forwards to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllowedMethods {
    All,
    ReadOnly,
}

/// How the edge treats plain-HTTP viewer requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewerProtocol {
    RedirectToHttps,
    HttpsOnly,
    AllowAll,
}

/// Kind of backend behind an optional route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendCategory {
    /// Health or status pages; never cached.
    Health,
    /// Regular content.
    Content,
}

impl BackendCategory {
    pub fn cache_policy(&self) -> CachePolicy {
        match self {
            BackendCategory::Health => CachePolicy::Disabled,
            BackendCategory::Content => CachePolicy::Optimized,
        }
    }
}

/// Health endpoint of a backend, configured per stack and passed through as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthEndpoint {
    pub path: String,
    pub port: u16,
}

/// An optional backend that is routed only once its address is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCandidate {
    /// Path pattern scoped to this backend (e.g. `/system-health/*`)
    pub path_pattern: String,

    /// Registry key holding the backend address
    pub address_key: RegistryKey,

    pub category: BackendCategory,

    #[serde(default = "default_allowed_methods")]
    pub allowed_methods: AllowedMethods,

    #[serde(default)]
    pub health: Option<HealthEndpoint>,
}

fn default_allowed_methods() -> AllowedMethods {
    AllowedMethods::All
}

impl BackendCandidate {
    pub fn new(
        path_pattern: impl Into<String>,
        address_key: RegistryKey,
        category: BackendCategory,
    ) -> Self {
        Self {
            path_pattern: path_pattern.into(),
            address_key,
            category,
            allowed_methods: AllowedMethods::All,
            health: None,
        }
    }

    pub fn with_health(mut self, path: impl Into<String>, port: u16) -> Self {
        self.health = Some(HealthEndpoint { path: path.into(), port });
        self
    }
}

/// A single entry in the routing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub path_pattern: String,
    pub backend_address: String,
    pub cache_policy: CachePolicy,
    pub allowed_methods: AllowedMethods,
    pub viewer_protocol: ViewerProtocol,
    pub health: Option<HealthEndpoint>,
}

impl RouteRule {
    pub fn is_default(&self) -> bool {
        self.path_pattern == DEFAULT_PATTERN
    }
}

/// Ordered routing table: pattern-scoped rules first, default rule last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    rules: Vec<RouteRule>,
}

impl RoutingTable {
    pub(crate) fn from_rules(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_for(&self, pattern: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|r| r.path_pattern == pattern)
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachePolicy::Optimized => write!(f, "optimized"),
            CachePolicy::Disabled => write!(f, "disabled"),
        }
    }
}

impl fmt::Display for AllowedMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowedMethods::All => write!(f, "all"),
            AllowedMethods::ReadOnly => write!(f, "read-only"),
        }
    }
}

impl fmt::Display for ViewerProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerProtocol::RedirectToHttps => write!(f, "redirect-to-https"),
            ViewerProtocol::HttpsOnly => write!(f, "https-only"),
            ViewerProtocol::AllowAll => write!(f, "allow-all"),
        }
    }
}
