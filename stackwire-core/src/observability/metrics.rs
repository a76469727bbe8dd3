//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions (`_total` suffix for
//! counters). Without an installed recorder the macros are no-ops.

use ::metrics::{counter, describe_counter};

/// Register all core metrics with descriptions.
pub fn register_core_metrics() {
    describe_counter!("stackwire_registry_put_total", "Total registry writes");
    describe_counter!(
        "stackwire_registry_lookup_total",
        "Total registry lookups (by result: hit, miss)"
    );
    describe_counter!(
        "stackwire_publish_failures_total",
        "Registry writes that failed during a publish step"
    );
    describe_counter!(
        "stackwire_soft_dependency_unavailable_total",
        "Soft dependencies that were not yet published when read"
    );
    describe_counter!(
        "stackwire_stack_deploy_total",
        "Stack deployments (by outcome: succeeded, failed)"
    );
}

pub fn record_registry_put() {
    counter!("stackwire_registry_put_total").increment(1);
}

pub fn record_registry_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("stackwire_registry_lookup_total", "result" => result).increment(1);
}

pub fn record_publish_failure(stack: &str) {
    counter!("stackwire_publish_failures_total", "stack" => stack.to_string()).increment(1);
}

pub fn record_soft_dependency_unavailable(stack: &str) {
    counter!("stackwire_soft_dependency_unavailable_total", "stack" => stack.to_string())
        .increment(1);
}

pub fn record_stack_deploy(stack: &str, succeeded: bool) {
    let outcome = if succeeded { "succeeded" } else { "failed" };
    counter!("stackwire_stack_deploy_total", "stack" => stack.to_string(), "outcome" => outcome)
        .increment(1);
}
