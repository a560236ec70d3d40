/// Unified error handling for topology classification and server selection
///
/// This module provides the error taxonomy surfaced to the operation layer:
/// selection failures, contradictory monitoring evidence, shutdown, and the
/// configuration/input errors raised while building criteria.
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;
use crate::core::{ServerAddress, ServerRole};

/// Main error type for topology and selection operations
#[derive(Debug, Clone, Error)]
pub enum TopologyError {
    /// No server under the current topology satisfies the criteria
    #[error("No suitable server in {topology} topology: {reason}")]
    NoSuitableServer { topology: String, reason: String },

    /// Monitoring reported mutually contradictory evidence
    #[error("Topology inconsistency: {0}")]
    Inconsistency(#[from] Inconsistency),

    /// The cluster has been shut down
    #[error("Cluster state is closed")]
    ClusterClosed,

    /// Waiting for a suitable server exceeded its deadline
    #[error("Operation timed out after {waited:?}: {operation}")]
    Timeout { operation: String, waited: Duration },

    /// Caller-supplied criteria cannot be honored
    #[error("Invalid selection criteria: {message}")]
    InvalidCriteria { message: String },

    /// Address string could not be parsed
    #[error("Invalid server address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Contradictory evidence observed by the classifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Inconsistency {
    #[error("multiple standalone servers reported: {}", join_addresses(.addresses))]
    MultipleStandalone { addresses: Vec<ServerAddress> },

    #[error("replica set name changed from '{expected}' to '{observed}' (reported by {address})")]
    SetNameChanged {
        expected: String,
        observed: String,
        address: ServerAddress,
    },

    #[error("members report conflicting replica set names: {}", .names.join(", "))]
    ConflictingSetNames { names: Vec<String> },

    #[error("expected members of replica set '{set_name}' but {address} reports role {role}")]
    UnexpectedRole {
        set_name: String,
        address: ServerAddress,
        role: ServerRole,
    },
}

fn join_addresses(addresses: &[ServerAddress]) -> String {
    addresses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for topology operations
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Convenience methods for creating specific error types
impl TopologyError {
    /// Create a no-suitable-server error
    pub fn no_suitable_server<T: Into<String>, R: Into<String>>(topology: T, reason: R) -> Self {
        TopologyError::NoSuitableServer {
            topology: topology.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, waited: Duration) -> Self {
        TopologyError::Timeout {
            operation: operation.into(),
            waited,
        }
    }

    /// Create an invalid criteria error
    pub fn invalid_criteria<S: Into<String>>(message: S) -> Self {
        TopologyError::InvalidCriteria {
            message: message.into(),
        }
    }

    /// Create an invalid address error
    pub fn invalid_address<A: Into<String>, R: Into<String>>(address: A, reason: R) -> Self {
        TopologyError::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Check if waiting for a later topology could make this error go away
    ///
    /// Selection returns `Inconsistency` while the published topology is an
    /// unresolved fallback; `select_within` keeps waiting on both.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TopologyError::NoSuitableServer { .. } | TopologyError::Inconsistency(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TopologyError::Config(_) => ErrorSeverity::Critical,
            TopologyError::ClusterClosed => ErrorSeverity::Critical,
            TopologyError::Inconsistency(_) => ErrorSeverity::Warning,
            TopologyError::Timeout { .. } => ErrorSeverity::Warning,
            TopologyError::NoSuitableServer { .. } => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that require immediate attention
    Critical,
    /// Errors that affect functionality but don't crash the system
    Error,
    /// Warnings about potential issues
    Warning,
    /// Informational messages about recoverable issues
    Info,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Info => write!(f, "INFO"),
        }
    }
}
