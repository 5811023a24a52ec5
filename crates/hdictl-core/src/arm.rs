//! Azure Resource Manager implementation of [`ClusterApi`]
//!
//! Requests go to
//! `{endpoint}/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.HDInsight/clusters/{name}`
//! with a bearer token. Mutations that run asynchronously answer with an
//! `Azure-AsyncOperation` or `Location` header, which becomes the
//! [`OperationHandle`]. A PUT answered without either header but with a
//! non-terminal `provisioningState` is tracked by re-reading the cluster.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crate::api::{
    ApiError, ClusterApi, OperationFault, OperationHandle, OperationState, OperationStatus,
    PollKind,
};
use crate::id::{COLLECTION, PROVIDER_NAMESPACE};
use crate::models::{Cluster, ClusterCreateParameters, ClusterPatchParameters};

/// API version of the HDInsight resource provider this client speaks
pub const API_VERSION: &str = "2015-03-01-preview";

const ASYNC_OPERATION: &str = "azure-asyncoperation";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct AsyncOperationDocument {
    status: String,
    #[serde(default)]
    error: Option<ErrorBody>,
}

/// HTTP client for the HDInsight clusters collection of one subscription
#[derive(Debug, Clone)]
pub struct ArmClient {
    http: reqwest::Client,
    base: Url,
    subscription_id: String,
    token: String,
}

impl ArmClient {
    pub fn new(
        endpoint: &str,
        subscription_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let base = Url::parse(endpoint)
            .map_err(|e| ApiError::Connection(format!("invalid endpoint {:?}: {}", endpoint, e)))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::Connection(format!(
                "invalid endpoint {:?}: not a base URL",
                endpoint
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("hdictl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Connection(e.to_string()))?;

        Ok(Self {
            http,
            base,
            subscription_id: subscription_id.into(),
            token: token.into(),
        })
    }

    /// URL of one cluster, `api-version` included
    pub fn cluster_url(&self, resource_group: &str, name: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "subscriptions",
                self.subscription_id.as_str(),
                "resourceGroups",
                resource_group,
                "providers",
                PROVIDER_NAMESPACE,
                COLLECTION,
                name,
            ]);
        }
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        url
    }

    async fn send<B: serde::Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        debug!(%method, %url, "ARM request");
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(transport_error)?;
        trace!(status = %response.status(), "ARM response");
        Ok(response)
    }

    async fn send_empty(&self, method: Method, url: Url) -> Result<Response, ApiError> {
        self.send::<()>(method, url, None).await
    }
}

#[async_trait]
impl ClusterApi for ArmClient {
    async fn get(&self, resource_group: &str, name: &str) -> Result<Cluster, ApiError> {
        let response = self
            .send_empty(Method::GET, self.cluster_url(resource_group, name))
            .await?;
        decode(ensure_success(response).await?).await
    }

    async fn create(
        &self,
        resource_group: &str,
        name: &str,
        parameters: &ClusterCreateParameters,
    ) -> Result<Option<OperationHandle>, ApiError> {
        let response = self
            .send(
                Method::PUT,
                self.cluster_url(resource_group, name),
                Some(parameters),
            )
            .await?;
        let response = ensure_success(response).await?;
        if let Some(handle) = operation_handle(response.headers()) {
            return Ok(Some(handle));
        }

        let interval = retry_after(response.headers());
        let body = response.text().await.map_err(transport_error)?;
        let handle = provisioning_handle(&body, &self.cluster_url(resource_group, name));
        Ok(match (handle, interval) {
            (Some(handle), Some(interval)) => Some(handle.with_retry_after(interval)),
            (handle, _) => handle,
        })
    }

    async fn update(
        &self,
        resource_group: &str,
        name: &str,
        parameters: &ClusterPatchParameters,
    ) -> Result<Cluster, ApiError> {
        let response = self
            .send(
                Method::PATCH,
                self.cluster_url(resource_group, name),
                Some(parameters),
            )
            .await?;
        decode(ensure_success(response).await?).await
    }

    async fn delete(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<Option<OperationHandle>, ApiError> {
        let response = self
            .send_empty(Method::DELETE, self.cluster_url(resource_group, name))
            .await?;
        let response = ensure_success(response).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(operation_handle(response.headers()))
    }

    async fn poll_operation(&self, handle: &OperationHandle) -> Result<OperationStatus, ApiError> {
        let url = Url::parse(&handle.url)
            .map_err(|e| ApiError::Decode(format!("invalid operation URL: {}", e)))?;
        let response = self.send_empty(Method::GET, url).await?;
        let retry_after = retry_after(response.headers());

        let mut status = match handle.kind {
            PollKind::AsyncOperation => {
                let doc: AsyncOperationDocument = decode(ensure_success(response).await?).await?;
                let state = OperationState::parse(&doc.status);
                let fault = doc
                    .error
                    .filter(|_| state.is_terminal() && state != OperationState::Succeeded)
                    .map(|e| OperationFault::new(e.code, e.message));
                OperationStatus {
                    state,
                    fault,
                    retry_after: None,
                }
            }
            PollKind::Location => location_status(response).await?,
            PollKind::ProvisioningState => {
                let cluster: Cluster = decode(ensure_success(response).await?).await?;
                provisioning_status(&cluster)
            }
        };
        status.retry_after = retry_after;
        Ok(status)
    }
}

/// 202 means still running; any other success is done. A client error is
/// the operation's own failure, except 404 which the caller interprets.
async fn location_status(response: Response) -> Result<OperationStatus, ApiError> {
    let code = response.status();
    if code == StatusCode::ACCEPTED {
        return Ok(OperationStatus::in_progress());
    }
    if code.is_success() {
        return Ok(OperationStatus::succeeded());
    }
    if code == StatusCode::NOT_FOUND || code.is_server_error() {
        return Err(error_from_response(response).await);
    }

    let status = code.as_u16();
    let body = response.text().await.unwrap_or_default();
    let fault = match parse_error_body(&body) {
        Some(e) => OperationFault::new(e.code, e.message),
        None => OperationFault::new(status.to_string(), body),
    };
    Ok(OperationStatus::failed(fault.with_status(status)))
}

fn provisioning_state(cluster: &Cluster) -> Option<&str> {
    cluster
        .properties
        .as_ref()?
        .provisioning_state
        .as_deref()
        .filter(|s| !s.is_empty())
}

/// Handle for a synchronous-looking PUT whose body says the cluster is still
/// provisioning. Bodies that are empty or not a cluster mean done.
fn provisioning_handle(body: &str, cluster_url: &Url) -> Option<OperationHandle> {
    let cluster: Cluster = serde_json::from_str(body).ok()?;
    let state = provisioning_state(&cluster)?;
    if OperationState::parse(state).is_terminal() {
        return None;
    }
    debug!(provisioning_state = %state, "Create accepted without an operation header");
    Some(OperationHandle::new(
        cluster_url.as_str(),
        PollKind::ProvisioningState,
    ))
}

/// A cluster without a provisioning state has nothing left to wait for
fn provisioning_status(cluster: &Cluster) -> OperationStatus {
    let Some(raw) = provisioning_state(cluster) else {
        return OperationStatus::succeeded();
    };
    match OperationState::parse(raw) {
        OperationState::Succeeded => OperationStatus::succeeded(),
        OperationState::InProgress => OperationStatus::in_progress(),
        state => OperationStatus {
            state,
            fault: Some(OperationFault::new(
                raw,
                format!("Cluster provisioning ended with state {}", raw),
            )),
            retry_after: None,
        },
    }
}

fn operation_handle(headers: &HeaderMap) -> Option<OperationHandle> {
    let header = |name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    };

    let handle = if let Some(url) = header(ASYNC_OPERATION) {
        OperationHandle::new(url, PollKind::AsyncOperation)
    } else if let Some(url) = header(LOCATION.as_str()) {
        OperationHandle::new(url, PollKind::Location)
    } else {
        return None;
    };

    Some(match retry_after(headers) {
        Some(interval) => handle.with_retry_after(interval),
        None => handle,
    })
}

/// `Retry-After` in whole seconds; the HTTP-date form is ignored
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(error_from_response(response).await)
    }
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = match parse_error_body(&body) {
        Some(e) if e.code.is_empty() => e.message,
        Some(e) => format!("{}: {}", e.code, e.message),
        None if body.is_empty() => format!("HTTP {}", status),
        None => body,
    };
    ApiError::from_status(status, message)
}

fn parse_error_body(body: &str) -> Option<ErrorBody> {
    serde_json::from_str::<ErrorEnvelope>(body).ok()?.error
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await.map_err(transport_error)?;
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout(e.to_string())
    } else if e.is_decode() {
        ApiError::Decode(e.to_string())
    } else {
        ApiError::Connection(e.to_string())
    }
}
