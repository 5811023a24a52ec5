//! Long-running operation polling
//!
//! Mutating ARM calls return an [`OperationHandle`] which must be polled
//! until it reaches a terminal state. The interval comes from the operation
//! itself (`Retry-After`) and falls back to the context's poll interval.
//! Waiting is cancellable through the context.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{OperationFault, OperationHandle, OperationState};
use crate::context::{OperationContext, Scope};
use crate::error::{CoreError, OperationKind, Result};

/// Progress events emitted while waiting on an operation
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Operation has been submitted
    Started {
        operation: OperationKind,
        name: String,
    },
    /// Polling iteration with current status
    Polling {
        operation: OperationKind,
        name: String,
        status: String,
        elapsed: Duration,
    },
    /// Operation completed successfully
    Completed {
        operation: OperationKind,
        name: String,
    },
    /// Operation failed
    Failed {
        operation: OperationKind,
        name: String,
        error: String,
    },
}

/// Callback type for progress updates
///
/// The CLI uses this to drive its spinner.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Poll `handle` until it succeeds, fails or the scope is cancelled.
///
/// # Errors
///
/// - [`CoreError::OperationFailed`] with the remote fault verbatim when the
///   operation ends `Failed` or `Canceled`
/// - [`CoreError::OperationCancelled`] when the context token fires or the
///   scope's deadline passes; the remote side is left as-is
/// - [`CoreError::Infrastructure`] when a poll request itself fails
pub async fn wait_for_completion(
    ctx: &OperationContext,
    scope: &Scope,
    handle: &OperationHandle,
) -> Result<()> {
    let start = Instant::now();
    let mut interval = handle.retry_after.unwrap_or_else(|| ctx.poll_interval());

    ctx.emit(ProgressEvent::Started {
        operation: scope.operation,
        name: scope.name.clone(),
    });
    debug!(
        operation = %scope.operation,
        cluster = %scope.name,
        url = %handle.url,
        "Waiting for operation"
    );

    loop {
        let status = ctx
            .call(scope, ctx.api().poll_operation(handle))
            .await?
            .map_err(|e| CoreError::infrastructure(scope.operation, &scope.name, e))?;

        let elapsed = start.elapsed();
        ctx.emit(ProgressEvent::Polling {
            operation: scope.operation,
            name: scope.name.clone(),
            status: status.state.to_string(),
            elapsed,
        });

        match status.state {
            OperationState::Succeeded => {
                info!(
                    operation = %scope.operation,
                    cluster = %scope.name,
                    elapsed_secs = elapsed.as_secs(),
                    "Operation succeeded"
                );
                ctx.emit(ProgressEvent::Completed {
                    operation: scope.operation,
                    name: scope.name.clone(),
                });
                return Ok(());
            }
            OperationState::Failed | OperationState::Canceled => {
                let fault = status.fault.unwrap_or_else(|| {
                    OperationFault::new(
                        status.state.to_string(),
                        format!("Operation ended with status {}", status.state),
                    )
                });
                warn!(
                    operation = %scope.operation,
                    cluster = %scope.name,
                    code = %fault.code,
                    "Operation failed: {}",
                    fault.message
                );
                ctx.emit(ProgressEvent::Failed {
                    operation: scope.operation,
                    name: scope.name.clone(),
                    error: fault.to_string(),
                });
                return Err(CoreError::OperationFailed {
                    operation: scope.operation,
                    name: scope.name.clone(),
                    fault,
                });
            }
            OperationState::InProgress => {
                if let Some(retry_after) = status.retry_after {
                    interval = retry_after;
                }
                debug!(
                    cluster = %scope.name,
                    interval_secs = interval.as_secs(),
                    remaining_secs = scope.remaining().as_secs(),
                    "Operation still in progress"
                );
                ctx.sleep(scope, interval).await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ClusterApi, OperationStatus, PollKind};
    use crate::context::Timeouts;
    use crate::error::CancelReason;
    use crate::models::{Cluster, ClusterCreateParameters, ClusterPatchParameters};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Returns scripted poll results, then stays in progress forever
    struct ScriptedPolls {
        polls: Mutex<VecDeque<std::result::Result<OperationStatus, ApiError>>>,
        count: Mutex<usize>,
    }

    impl ScriptedPolls {
        fn new(polls: Vec<std::result::Result<OperationStatus, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                polls: Mutex::new(polls.into()),
                count: Mutex::new(0),
            })
        }

        fn count(&self) -> usize {
            *self.count.lock().unwrap()
        }
    }

    #[async_trait]
    impl ClusterApi for ScriptedPolls {
        async fn get(&self, _: &str, _: &str) -> std::result::Result<Cluster, ApiError> {
            unimplemented!()
        }

        async fn create(
            &self,
            _: &str,
            _: &str,
            _: &ClusterCreateParameters,
        ) -> std::result::Result<Option<OperationHandle>, ApiError> {
            unimplemented!()
        }

        async fn update(
            &self,
            _: &str,
            _: &str,
            _: &ClusterPatchParameters,
        ) -> std::result::Result<Cluster, ApiError> {
            unimplemented!()
        }

        async fn delete(
            &self,
            _: &str,
            _: &str,
        ) -> std::result::Result<Option<OperationHandle>, ApiError> {
            unimplemented!()
        }

        async fn poll_operation(
            &self,
            _: &OperationHandle,
        ) -> std::result::Result<OperationStatus, ApiError> {
            *self.count.lock().unwrap() += 1;
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(OperationStatus::in_progress()))
        }
    }

    fn handle() -> OperationHandle {
        OperationHandle::new("https://example.test/op/1", PollKind::AsyncOperation)
            .with_retry_after(Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_succeeded() {
        let api = ScriptedPolls::new(vec![
            Ok(OperationStatus::in_progress()),
            Ok(OperationStatus::in_progress()),
            Ok(OperationStatus::succeeded()),
        ]);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let ctx = OperationContext::new(api.clone()).with_progress(Box::new(move |e| {
            sink.lock().unwrap().push(e);
        }));
        let scope = ctx.scope(OperationKind::Create, "c1");

        wait_for_completion(&ctx, &scope, &handle()).await.unwrap();

        assert_eq!(api.count(), 3);
        let events = events.lock().unwrap();
        assert!(matches!(events.first(), Some(ProgressEvent::Started { .. })));
        assert!(matches!(events.last(), Some(ProgressEvent::Completed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_surfaces_fault_verbatim() {
        let api = ScriptedPolls::new(vec![Ok(OperationStatus::failed(OperationFault::new(
            "InvalidDocumentErrorCode",
            "DeploymentDocument 'x' failed validation",
        )))]);
        let ctx = OperationContext::new(api);
        let scope = ctx.scope(OperationKind::Update, "c1");

        let err = wait_for_completion(&ctx, &scope, &handle())
            .await
            .unwrap_err();
        match err {
            CoreError::OperationFailed {
                operation, fault, ..
            } => {
                assert_eq!(operation, OperationKind::Update);
                assert_eq!(fault.code, "InvalidDocumentErrorCode");
                assert_eq!(fault.message, "DeploymentDocument 'x' failed validation");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_cancel_is_a_failure() {
        let api = ScriptedPolls::new(vec![Ok(OperationStatus {
            state: OperationState::Canceled,
            fault: None,
            retry_after: None,
        })]);
        let ctx = OperationContext::new(api);
        let scope = ctx.scope(OperationKind::Delete, "c1");

        let err = wait_for_completion(&ctx, &scope, &handle())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::OperationFailed { fault, .. } if fault.code == "Canceled"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_wait() {
        let api = ScriptedPolls::new(vec![]);
        let ctx = OperationContext::new(api).with_timeouts(Timeouts {
            create: Duration::from_secs(60),
            ..Timeouts::default()
        });
        let scope = ctx.scope(OperationKind::Create, "c1");

        let err = wait_for_completion(&ctx, &scope, &handle())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::OperationCancelled {
                reason: CancelReason::DeadlineExceeded(_),
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_cancels_wait() {
        let api = ScriptedPolls::new(vec![]);
        let token = tokio_util::sync::CancellationToken::new();
        let ctx = OperationContext::new(api.clone()).with_cancellation(token.clone());
        let scope = ctx.scope(OperationKind::Create, "c1");

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            token.cancel();
        });

        let err = wait_for_completion(&ctx, &scope, &handle())
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(err.is_cancelled());
        // Polls at t=0, 5, 10 before the token fires at 12
        assert_eq!(api.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_error_is_infrastructure() {
        let api = ScriptedPolls::new(vec![Err(ApiError::Server {
            status: 502,
            message: "bad gateway".to_string(),
        })]);
        let ctx = OperationContext::new(api);
        let scope = ctx.scope(OperationKind::Create, "c1");

        let err = wait_for_completion(&ctx, &scope, &handle())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Infrastructure { .. }));
        assert!(err.is_retryable());
    }
}
