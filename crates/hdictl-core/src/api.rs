//! Transport contract consumed by the lifecycle orchestrator
//!
//! The orchestrator never talks HTTP directly; it goes through [`ClusterApi`].
//! [`crate::arm::ArmClient`] is the production implementation, tests use
//! in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Cluster, ClusterCreateParameters, ClusterPatchParameters};

/// Errors returned by a [`ClusterApi`] implementation
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map an HTTP status and message to the matching variant
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => ApiError::BadRequest { message },
            401 | 403 => ApiError::AuthenticationFailed { message },
            404 => ApiError::NotFound { message },
            409 => ApiError::Conflict { message },
            429 => ApiError::RateLimited { message },
            500..=599 => ApiError::Server { status, message },
            _ => ApiError::Unexpected { status, message },
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict { .. })
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::AuthenticationFailed { .. })
    }

    /// Transient failures that may succeed on a second attempt
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited { .. }
                | ApiError::Server { .. }
                | ApiError::Connection(_)
                | ApiError::Timeout(_)
        )
    }
}

/// Remote-reported fault of a failed long-running operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFault {
    pub code: String,
    pub message: String,
    /// HTTP status of the final response, when the transport knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl OperationFault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// True when the fault signals that the requested name is taken
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.status == Some(409)
            || self.code.eq_ignore_ascii_case("Conflict")
            || self.code.eq_ignore_ascii_case("NameNotAvailable")
    }
}

impl fmt::Display for OperationFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// How a long-running operation is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    /// `Azure-AsyncOperation` status document (`{"status": ...}`)
    AsyncOperation,
    /// `Location` header: 202 while running, 2xx once done
    Location,
    /// No header; the resource itself is re-read until its
    /// `properties.provisioningState` is terminal
    ProvisioningState,
}

/// In-flight work returned by a mutating call. Polled, then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    pub url: String,
    pub kind: PollKind,
    /// Server-suggested interval between polls
    pub retry_after: Option<Duration>,
}

impl OperationHandle {
    pub fn new(url: impl Into<String>, kind: PollKind) -> Self {
        Self {
            url: url.into(),
            kind,
            retry_after: None,
        }
    }

    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

/// State of a polled operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    InProgress,
    Succeeded,
    Failed,
    Canceled,
}

impl OperationState {
    /// Parse an ARM status string (case-insensitive). Unknown values are
    /// treated as still running.
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "succeeded" => OperationState::Succeeded,
            "failed" => OperationState::Failed,
            "canceled" | "cancelled" => OperationState::Canceled,
            _ => OperationState::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationState::InProgress)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationState::InProgress => write!(f, "InProgress"),
            OperationState::Succeeded => write!(f, "Succeeded"),
            OperationState::Failed => write!(f, "Failed"),
            OperationState::Canceled => write!(f, "Canceled"),
        }
    }
}

/// One poll result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationStatus {
    pub state: OperationState,
    pub fault: Option<OperationFault>,
    pub retry_after: Option<Duration>,
}

impl OperationStatus {
    pub fn in_progress() -> Self {
        Self {
            state: OperationState::InProgress,
            fault: None,
            retry_after: None,
        }
    }

    pub fn succeeded() -> Self {
        Self {
            state: OperationState::Succeeded,
            fault: None,
            retry_after: None,
        }
    }

    pub fn failed(fault: OperationFault) -> Self {
        Self {
            state: OperationState::Failed,
            fault: Some(fault),
            retry_after: None,
        }
    }
}

/// Remote clusters API
///
/// Mutating calls return an optional [`OperationHandle`]; `None` means the
/// call completed synchronously.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn get(&self, resource_group: &str, name: &str) -> Result<Cluster, ApiError>;

    async fn create(
        &self,
        resource_group: &str,
        name: &str,
        body: &ClusterCreateParameters,
    ) -> Result<Option<OperationHandle>, ApiError>;

    async fn update(
        &self,
        resource_group: &str,
        name: &str,
        body: &ClusterPatchParameters,
    ) -> Result<Cluster, ApiError>;

    async fn delete(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<Option<OperationHandle>, ApiError>;

    async fn poll_operation(&self, handle: &OperationHandle) -> Result<OperationStatus, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        assert!(ApiError::from_status(404, "x").is_not_found());
        assert!(ApiError::from_status(409, "x").is_conflict());
        assert!(ApiError::from_status(401, "x").is_unauthorized());
        assert!(ApiError::from_status(403, "x").is_unauthorized());
        assert!(ApiError::from_status(503, "x").is_retryable());
        assert!(ApiError::from_status(429, "x").is_retryable());
        assert!(!ApiError::from_status(400, "x").is_retryable());
        assert!(matches!(
            ApiError::from_status(418, "x"),
            ApiError::Unexpected { status: 418, .. }
        ));
    }

    #[test]
    fn test_fault_conflict_signal() {
        assert!(OperationFault::new("Conflict", "taken").is_conflict());
        assert!(OperationFault::new("conflict", "taken").is_conflict());
        assert!(
            OperationFault::new("InternalServerError", "x")
                .with_status(409)
                .is_conflict()
        );
        assert!(!OperationFault::new("InternalServerError", "x").is_conflict());
    }

    #[test]
    fn test_operation_state_parse() {
        assert_eq!(OperationState::parse("Succeeded"), OperationState::Succeeded);
        assert_eq!(OperationState::parse("failed"), OperationState::Failed);
        assert_eq!(OperationState::parse("Canceled"), OperationState::Canceled);
        assert_eq!(OperationState::parse("Accepted"), OperationState::InProgress);
        assert!(!OperationState::InProgress.is_terminal());
        assert!(OperationState::Canceled.is_terminal());
    }
}
