//! Connection management for Azure Resource Manager

use crate::error::Result as CliResult;
use hdictl_core::{
    ArmClient, Config, OperationContext, ProgressCallback, ProgressEvent, StateFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Connection manager for building ARM clients and finding the state file
#[derive(Clone)]
pub struct ConnectionManager {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub state_path: Option<PathBuf>,
}

impl ConnectionManager {
    pub fn new(config: Config, config_path: Option<PathBuf>, state_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
            state_path,
        }
    }

    /// Save the configuration to the appropriate location
    pub fn save_config(&self, config: &Config) -> CliResult<()> {
        if let Some(ref path) = self.config_path {
            config.save_to_path(path)?;
        } else {
            config.save()?;
        }
        Ok(())
    }

    /// Path of the state file, `--state-file` first
    pub fn state_path(&self) -> CliResult<PathBuf> {
        match &self.state_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Config::default_state_path()?),
        }
    }

    pub fn load_state(&self) -> CliResult<(StateFile, PathBuf)> {
        let path = self.state_path()?;
        debug!("Loading state from {}", path.display());
        let state = StateFile::load(&path)?;
        Ok((state, path))
    }

    /// Operation context for the resolved profile.
    ///
    /// Ctrl-C cancels in-flight waits; progress drives a spinner on stderr.
    pub fn context(&self, profile_name: Option<&str>) -> CliResult<OperationContext> {
        let connection = self.config.connection(profile_name)?;
        info!(
            endpoint = %connection.endpoint,
            subscription = %connection.subscription_id,
            "Connecting to Azure Resource Manager"
        );

        let client = ArmClient::new(
            &connection.endpoint,
            connection.subscription_id,
            connection.token,
        )?;

        Ok(OperationContext::new(Arc::new(client))
            .with_timeouts(connection.timeouts)
            .with_poll_interval(connection.poll_interval)
            .with_cancellation(ctrl_c_token())
            .with_progress(spinner()))
    }
}

fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; the remote operation keeps running");
            cancel.cancel();
        }
    });
    token
}

fn spinner() -> ProgressCallback {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    Box::new(move |event: ProgressEvent| match event {
        ProgressEvent::Started { operation, name } => {
            pb.reset();
            pb.enable_steady_tick(Duration::from_millis(120));
            pb.set_message(format!("Waiting to {} cluster {}", operation, name));
        }
        ProgressEvent::Polling {
            operation,
            name,
            status,
            ..
        } => {
            pb.set_message(format!("{} {}: {}", operation, name, status));
        }
        ProgressEvent::Completed { operation, name } => {
            pb.finish_and_clear();
            debug!("{} of {} completed", operation, name);
        }
        ProgressEvent::Failed {
            operation, name, ..
        } => {
            pb.abandon_with_message(format!("{} {} failed", operation, name));
        }
    })
}
