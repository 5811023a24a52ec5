//! Configuration and profile management
//!
//! A profile names one Azure subscription and how to reach it: the ARM
//! endpoint, a bearer token and per-operation timeouts.
//!
//! # Features
//!
//! - Multiple named profiles with a default
//! - Secure credential storage using OS keyring (optional)
//! - Environment variable expansion in config files
//! - Platform-specific config file locations

#![allow(clippy::module_inception)]

pub mod config;
pub mod credential;
pub mod error;

pub use config::{Config, Connection, DEFAULT_ENDPOINT, Profile};
pub use credential::{CredentialStorage, CredentialStore};
pub use error::{ConfigError, Result};
