//! Error types for stackwire.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for stackwire operations.
pub type Result<T> = std::result::Result<T, StackwireError>;

/// Main error type for stackwire.
#[derive(Error, Debug)]
pub enum StackwireError {
    // Consumer errors
    #[error("Stack '{stack}' requires registry key {key}, which has not been published. Deploy the producing stack first")]
    HardDependencyMissing { stack: String, key: String },

    // Deployment order errors
    #[error("Circular dependency detected between stacks: {}", stacks.join(" -> "))]
    CycleDetected { stacks: Vec<String> },

    #[error("Missing dependency: stack '{stack}' depends on '{dependency}' which is not declared")]
    MissingDependency { stack: String, dependency: String },

    #[error("Stack declared more than once: {stack}")]
    DuplicateStack { stack: String },

    #[error("Unknown stack: {stack}")]
    UnknownStack { stack: String },

    // Route composition errors
    #[error("Duplicate route pattern: {pattern}")]
    DuplicateRoutePattern { pattern: String },

    // Registry errors
    #[error("Registry key not found: {key}")]
    KeyNotFound { key: String },

    #[error("Invalid registry key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Invalid value for registry key {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to write registry key {key}: {reason}")]
    RegistryWriteFailure { key: String, reason: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Database migration failed: {reason}")]
    MigrationFailed { reason: String },

    // Stack lifecycle errors
    #[error("Failed to provision {resource} for stack '{stack}': {reason}")]
    ProvisioningFailed { stack: String, resource: String, reason: String },

    #[error("Deployment of stack '{stack}' failed: {source}")]
    StackFailed {
        stack: String,
        #[source]
        source: Box<StackwireError>,
    },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StackwireError {
    /// Whether this error means a producing stack has not deployed yet.
    pub fn is_hard_dependency_missing(&self) -> bool {
        match self {
            Self::HardDependencyMissing { .. } => true,
            Self::StackFailed { source, .. } => source.is_hard_dependency_missing(),
            _ => false,
        }
    }
}
