//! Operation context threaded through every lifecycle call
//!
//! Holds the transport, the caller's cancellation token, per-operation
//! deadlines and the optional progress callback. Nothing here is global.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, ClusterApi};
use crate::error::{CancelReason, CoreError, OperationKind, Result};
use crate::lro::{ProgressCallback, ProgressEvent};

/// Upper bound for each lifecycle operation, including operation polling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(with = "secs", default = "default_create")]
    pub create: Duration,
    #[serde(with = "secs", default = "default_read")]
    pub read: Duration,
    #[serde(with = "secs", default = "default_update")]
    pub update: Duration,
    #[serde(with = "secs", default = "default_delete")]
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: default_create(),
            read: default_read(),
            update: default_update(),
            delete: default_delete(),
        }
    }
}

impl Timeouts {
    pub fn for_operation(&self, operation: OperationKind) -> Duration {
        match operation {
            OperationKind::Create => self.create,
            OperationKind::Read => self.read,
            OperationKind::Update => self.update,
            OperationKind::Delete => self.delete,
        }
    }
}

fn default_create() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_read() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_update() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_delete() -> Duration {
    Duration::from_secs(60 * 60)
}

// Durations are written as whole seconds in config files
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// Fallback poll interval when the operation doesn't suggest one
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// One operation on one cluster, with its deadline
#[derive(Debug, Clone)]
pub struct Scope {
    pub operation: OperationKind,
    pub name: String,
    deadline: Instant,
    budget: Duration,
}

impl Scope {
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    fn cancelled(&self, reason: CancelReason) -> CoreError {
        CoreError::OperationCancelled {
            operation: self.operation,
            name: self.name.clone(),
            reason,
        }
    }
}

pub struct OperationContext {
    api: Arc<dyn ClusterApi>,
    cancel: CancellationToken,
    timeouts: Timeouts,
    poll_interval: Duration,
    on_progress: Option<ProgressCallback>,
}

impl OperationContext {
    pub fn new(api: Arc<dyn ClusterApi>) -> Self {
        Self {
            api,
            cancel: CancellationToken::new(),
            timeouts: Timeouts::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn api(&self) -> &dyn ClusterApi {
        self.api.as_ref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Start the clock for `operation` on cluster `name`
    pub fn scope(&self, operation: OperationKind, name: &str) -> Scope {
        let budget = self.timeouts.for_operation(operation);
        Scope {
            operation,
            name: name.to_string(),
            deadline: Instant::now() + budget,
            budget,
        }
    }

    /// Run a remote call, giving up on cancellation or when the scope's
    /// deadline passes. The inner result is the transport's own outcome so
    /// callers can special-case not-found.
    pub async fn call<T, F>(&self, scope: &Scope, fut: F) -> Result<std::result::Result<T, ApiError>>
    where
        F: Future<Output = std::result::Result<T, ApiError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(scope.cancelled(CancelReason::Requested)),
            _ = tokio::time::sleep_until(scope.deadline) => {
                Err(scope.cancelled(CancelReason::DeadlineExceeded(scope.budget)))
            }
            res = fut => Ok(res),
        }
    }

    /// Sleep between polls without blocking cancellation
    pub async fn sleep(&self, scope: &Scope, duration: Duration) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(scope.cancelled(CancelReason::Requested)),
            _ = tokio::time::sleep_until(scope.deadline) => {
                Err(scope.cancelled(CancelReason::DeadlineExceeded(scope.budget)))
            }
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        if let Some(cb) = &self.on_progress {
            cb(event);
        }
    }
}
