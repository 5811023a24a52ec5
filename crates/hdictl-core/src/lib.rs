//! # hdictl-core
//!
//! Shared engine for managing HDInsight clusters as declaratively configured
//! resources. The CLI is a thin layer over this crate.
//!
//! ## Layers
//!
//! - **Configuration tree** ([`tree`]) - the validated user intent
//! - **Remote models** ([`models`]) - the ARM request/response object graph
//! - **Expand / Flatten** ([`expand`], [`flatten`]) - the two directions of the
//!   mapping between the tree and the remote graph
//! - **Transport** ([`api`], [`arm`]) - the `ClusterApi` contract and its
//!   ARM REST implementation
//! - **Operation polling** ([`lro`]) - waits out asynchronous operations
//! - **Lifecycle** ([`lifecycle`]) - Create/Read/Update/Delete state machine
//! - **State** ([`state`]) - persisted identifier and last flattened snapshot
//! - **Config** ([`config`]) - profiles, credentials, timeouts
//!
//! ## Example
//!
//! ```rust,ignore
//! use hdictl_core::{ArmClient, OperationContext, ResourceState};
//! use std::sync::Arc;
//!
//! let api = Arc::new(ArmClient::new(endpoint, subscription_id, token)?);
//! let ctx = OperationContext::new(api);
//!
//! let mut state = ResourceState::default();
//! let tree = state.create(&ctx, &desired).await?;
//! println!("created {}", state.id.as_deref().unwrap_or_default());
//! ```

pub mod api;
pub mod arm;
pub mod config;
pub mod context;
pub mod error;
pub mod expand;
pub mod flatten;
pub mod id;
pub mod lifecycle;
pub mod lro;
pub mod models;
pub mod state;
pub mod tree;

pub use api::{ApiError, ClusterApi};
pub use arm::ArmClient;
pub use config::{Config, ConfigError, Profile};
pub use context::{OperationContext, Timeouts};
pub use error::{CoreError, OperationKind, Result, ValidationError};
pub use id::ResourceId;
pub use lifecycle::{Plan, lookup, plan};
pub use lro::{ProgressCallback, ProgressEvent, wait_for_completion};
pub use state::{Phase, ResourceState, StateFile};
pub use tree::ClusterConfig;
