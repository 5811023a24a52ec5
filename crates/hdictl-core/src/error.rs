//! Unified error handling for hdictl-core
//!
//! Every lifecycle failure is reported through [`CoreError`] with enough
//! context (operation kind, cluster name) to log and retry.
//!
//! # Example
//!
//! ```rust
//! use hdictl_core::{ApiError, CoreError, OperationKind};
//!
//! let err = CoreError::infrastructure(
//!     OperationKind::Read,
//!     "cluster1",
//!     ApiError::Server { status: 503, message: "busy".to_string() },
//! );
//! assert!(err.is_retryable());
//! assert!(!err.is_not_found());
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::api::{ApiError, OperationFault};

/// The lifecycle operation an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Read => write!(f, "read"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// Why an in-flight wait was abandoned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller cancelled the context token
    Requested,
    /// The operation deadline elapsed
    DeadlineExceeded(Duration),
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Requested => write!(f, "cancelled by caller"),
            CancelReason::DeadlineExceeded(d) => write!(f, "deadline of {:?} exceeded", d),
        }
    }
}

/// Structural or cross-field violations found while expanding a configuration.
///
/// Every variant carries the path of the offending field, e.g.
/// `compute_profile.role[1].os_profile`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`{path}` is required")]
    MissingBlock { path: String },

    #[error("`{path}` must contain at least one element")]
    EmptySet { path: String },

    #[error("`{path}` must not be empty")]
    MissingField { path: String },

    #[error("role name `{name}` is declared more than once in `{path}`")]
    DuplicateRole { path: String, name: String },

    #[error("`{path}`: exactly one of `password` or `ssh_keys` must be set")]
    InvalidCredentialSpec { path: String },

    #[error("`{path}`: {reason}")]
    InvalidTags { path: String, reason: String },
}

impl ValidationError {
    /// Path of the field that failed validation
    pub fn path(&self) -> &str {
        match self {
            ValidationError::MissingBlock { path }
            | ValidationError::EmptySet { path }
            | ValidationError::MissingField { path }
            | ValidationError::DuplicateRole { path, .. }
            | ValidationError::InvalidCredentialSpec { path }
            | ValidationError::InvalidTags { path, .. } => path,
        }
    }
}

/// Core error type for lifecycle operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// The stored handle could not be parsed
    #[error("Malformed cluster identifier {id:?}: {reason}")]
    MalformedIdentifier { id: String, reason: String },

    /// The configuration failed expand-time validation; no remote call was made
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    /// The requested name is already taken
    #[error(
        "HDInsight cluster `name` needs to be globally unique and {name:?} is already in use"
    )]
    NameConflict { name: String },

    /// The cluster does not exist
    #[error("Cluster {resource} was not found")]
    NotFound { resource: String },

    /// The remote operation reached a failed terminal state
    #[error("Failed to {operation} cluster {name:?}: {fault}")]
    OperationFailed {
        operation: OperationKind,
        name: String,
        fault: OperationFault,
    },

    /// The wait was cancelled; re-read before retrying
    #[error("Gave up waiting to {operation} cluster {name:?}: {reason}")]
    OperationCancelled {
        operation: OperationKind,
        name: String,
        reason: CancelReason,
    },

    /// Transport, auth or transient failure; safe to retry
    #[error("Error during {operation} of cluster {name:?}: {source}")]
    Infrastructure {
        operation: OperationKind,
        name: String,
        #[source]
        source: ApiError,
    },

    /// State file error
    #[error("State error: {0}")]
    State(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn infrastructure(operation: OperationKind, name: &str, source: ApiError) -> Self {
        CoreError::Infrastructure {
            operation,
            name: name.to_string(),
            source,
        }
    }

    pub fn malformed(id: &str, reason: impl Into<String>) -> Self {
        CoreError::MalformedIdentifier {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true if this is a "not found" error (404)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            CoreError::NotFound { .. } => true,
            CoreError::Infrastructure { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Returns true if this is a naming conflict
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            CoreError::NameConflict { .. } => true,
            CoreError::OperationFailed { fault, .. } => fault.is_conflict(),
            CoreError::Infrastructure { source, .. } => source.is_conflict(),
            _ => false,
        }
    }

    /// Returns true if the wait was cancelled or ran out of time
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::OperationCancelled { .. })
    }

    /// Returns true if the configuration itself is at fault
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }

    /// Returns true if this error is potentially retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Infrastructure { source, .. } => source.is_retryable(),
            // Deadline might be met on a second attempt once state is re-read
            CoreError::OperationCancelled {
                reason: CancelReason::DeadlineExceeded(_),
                ..
            } => true,
            _ => false,
        }
    }
}
