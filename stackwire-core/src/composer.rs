//! Edge routing table composition.
//!
//! A routing table is built from one primary backend (a hard dependency,
//! bound to the default `*` rule) and any number of optional backends (soft
//! dependencies, one pattern-scoped rule each). Optional backends whose
//! address is not published yet are left out; composition still succeeds.
//!
//! Composition reads a point-in-time snapshot of the registry. A table that
//! was already materialized is never updated when a new backend publishes
//! its address later: the edge stack has to be composed and deployed again.

use crate::consumer::Consumer;
use crate::error::{Result, StackwireError};
use crate::types::{
    AllowedMethods, BackendCandidate, CachePolicy, HealthEndpoint, RegistryKey, RouteRule,
    RoutingTable, ViewerProtocol, DEFAULT_PATTERN,
};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Addresses read from the registry for one composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSnapshot {
    pub primary_address: String,
    /// One slot per declared candidate, in declaration order.
    pub candidates: Vec<Option<String>>,
}

/// Builds routing tables.
#[derive(Debug, Clone)]
pub struct RouteComposer {
    primary_key: RegistryKey,
    primary_health: Option<HealthEndpoint>,
    candidates: Vec<BackendCandidate>,
    viewer_protocol: ViewerProtocol,
}

impl RouteComposer {
    /// Composer whose default rule points at the address stored under `primary_key`.
    pub fn new(primary_key: RegistryKey) -> Self {
        Self {
            primary_key,
            primary_health: None,
            candidates: Vec::new(),
            viewer_protocol: ViewerProtocol::RedirectToHttps,
        }
    }

    pub fn primary_health(mut self, health: HealthEndpoint) -> Self {
        self.primary_health = Some(health);
        self
    }

    pub fn viewer_protocol(mut self, protocol: ViewerProtocol) -> Self {
        self.viewer_protocol = protocol;
        self
    }

    /// Declare an optional backend.
    pub fn candidate(mut self, candidate: BackendCandidate) -> Self {
        self.candidates.push(candidate);
        self
    }

    pub fn candidates(mut self, candidates: impl IntoIterator<Item = BackendCandidate>) -> Self {
        self.candidates.extend(candidates);
        self
    }

    pub fn declared(&self) -> &[BackendCandidate] {
        &self.candidates
    }

    /// Read the registry and build the table.
    #[instrument(skip(self, consumer), fields(stack = %consumer.stack(), candidates = self.candidates.len()))]
    pub async fn compose(&self, consumer: &Consumer) -> Result<RoutingTable> {
        self.check_declarations()?;
        let snapshot = self.snapshot(consumer).await?;
        self.build(&snapshot)
    }

    /// Read every address this composer needs.
    ///
    /// The primary address is required; candidate addresses are optional.
    pub async fn snapshot(&self, consumer: &Consumer) -> Result<BackendSnapshot> {
        let primary_address = consumer.require(&self.primary_key).await?;

        let mut candidates = Vec::with_capacity(self.candidates.len());
        for candidate in &self.candidates {
            candidates.push(consumer.optional(&candidate.address_key).await?);
        }

        Ok(BackendSnapshot { primary_address, candidates })
    }

    /// Build a table from a snapshot. Pure: same snapshot, same table.
    pub fn build(&self, snapshot: &BackendSnapshot) -> Result<RoutingTable> {
        self.check_declarations()?;
        if snapshot.candidates.len() != self.candidates.len() {
            return Err(StackwireError::Internal(format!(
                "snapshot has {} candidate slots, composer declares {}",
                snapshot.candidates.len(),
                self.candidates.len()
            )));
        }

        let mut rules = Vec::with_capacity(self.candidates.len() + 1);

        for (candidate, address) in self.candidates.iter().zip(&snapshot.candidates) {
            match address {
                Some(address) => {
                    debug!(pattern = %candidate.path_pattern, %address, "Routing optional backend");
                    rules.push(RouteRule {
                        path_pattern: candidate.path_pattern.clone(),
                        backend_address: address.clone(),
                        cache_policy: candidate.category.cache_policy(),
                        allowed_methods: candidate.allowed_methods,
                        viewer_protocol: self.viewer_protocol,
                        health: candidate.health.clone(),
                    });
                }
                None => {
                    info!(
                        pattern = %candidate.path_pattern,
                        "Backend not published yet; route omitted until the edge is recomposed"
                    );
                }
            }
        }

        rules.push(RouteRule {
            path_pattern: DEFAULT_PATTERN.to_string(),
            backend_address: snapshot.primary_address.clone(),
            cache_policy: CachePolicy::Optimized,
            allowed_methods: AllowedMethods::All,
            viewer_protocol: self.viewer_protocol,
            health: self.primary_health.clone(),
        });

        validate_unique_patterns(rules.iter().map(|r| r.path_pattern.as_str()))?;
        Ok(RoutingTable::from_rules(rules))
    }

    /// Candidate patterns must be unique and must not shadow the default rule,
    /// whether or not their backends are published.
    fn check_declarations(&self) -> Result<()> {
        validate_unique_patterns(
            self.candidates
                .iter()
                .map(|c| c.path_pattern.as_str())
                .chain(std::iter::once(DEFAULT_PATTERN)),
        )
    }
}

fn validate_unique_patterns<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for pattern in patterns {
        if !seen.insert(pattern) {
            return Err(StackwireError::DuplicateRoutePattern { pattern: pattern.to_string() });
        }
    }
    Ok(())
}
