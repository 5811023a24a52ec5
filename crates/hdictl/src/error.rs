//! Error types for hdictl

use colored::Colorize;
use hdictl_core::{ApiError, ConfigError, CoreError};
use thiserror::Error;

/// Cargo-style diagnostic formatter for CLI errors.
///
/// ```text
/// error: cluster "cluster1" must be replaced to apply this change
///
///   tip: re-run with --allow-replace to delete and recreate it
/// ```
pub struct CliDiagnostic {
    message: String,
    detail: Option<String>,
    tips: Vec<(String, Vec<String>)>,
}

impl CliDiagnostic {
    pub fn error(message: &str) -> Self {
        Self {
            message: message.to_string(),
            detail: None,
            tips: Vec::new(),
        }
    }

    pub fn detail(mut self, text: &str) -> Self {
        self.detail = Some(text.to_string());
        self
    }

    /// Add a tip with optional example commands.
    pub fn tip(mut self, description: &str, commands: &[&str]) -> Self {
        self.tips.push((
            description.to_string(),
            commands.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// Print the diagnostic to stderr with colored formatting.
    pub fn print(&self) {
        eprint!("{}{}", "error".red().bold(), ": ".bold());
        eprintln!("{}", self.message);

        if let Some(detail) = &self.detail {
            eprintln!("  {}", detail);
        }

        for (description, commands) in &self.tips {
            eprintln!();
            eprint!("  {}{}", "tip".yellow().bold(), ": ".bold());
            eprintln!("{}", description);
            for cmd in commands {
                eprintln!("      {}", cmd);
            }
        }
    }
}

/// Main error type for the hdictl application
#[derive(Error, Debug)]
pub enum HdiCtlError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("No profile configured and AZURE_ACCESS_TOKEN / AZURE_SUBSCRIPTION_ID are not set")]
    NoProfileConfigured,

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("File error for '{path}': {message}")]
    FileError { path: String, message: String },

    #[error(
        "HDInsight cluster `name` needs to be globally unique and {name:?} is already in use"
    )]
    NameConflict { name: String },

    #[error("Cluster {resource} not found")]
    NotFound { resource: String },

    #[error("Cluster {name:?} is not managed in this state file")]
    NotManaged { name: String },

    #[error("Cluster {name:?} must be replaced to apply changes to {}", fields.join(", "))]
    ReplacementRequired { name: String, fields: Vec<String> },

    #[error("{message}")]
    OperationFailed { message: String },

    #[error("{message}")]
    Cancelled { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("API error: {message}")]
    ApiError { message: String },

    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    #[error("State error: {message}")]
    State { message: String },

    #[error("Output formatting error: {message}")]
    OutputError { message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for hdictl operations
pub type Result<T> = std::result::Result<T, HdiCtlError>;

impl HdiCtlError {
    /// Get helpful suggestions for resolving this error
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            HdiCtlError::ProfileNotFound { name } => vec![
                "List available profiles: hdictl profile list".to_string(),
                format!(
                    "Create profile '{}': hdictl profile set {} --subscription-id <id>",
                    name, name
                ),
            ],
            HdiCtlError::NoProfileConfigured => vec![
                "Create a profile: hdictl profile set <name> --subscription-id <id>".to_string(),
                "Or export AZURE_SUBSCRIPTION_ID and AZURE_ACCESS_TOKEN".to_string(),
            ],
            HdiCtlError::AuthenticationFailed { .. } => vec![
                "Tokens expire after about an hour: az account get-access-token".to_string(),
                "Check the profile: hdictl profile show <profile>".to_string(),
            ],
            HdiCtlError::NameConflict { .. } => {
                vec!["Cluster names are global across Azure; pick another name".to_string()]
            }
            HdiCtlError::NotManaged { .. } => vec![
                "Create it: hdictl create <file>".to_string(),
                "Or adopt an existing cluster: hdictl import <resource-id>".to_string(),
            ],
            HdiCtlError::ReplacementRequired { .. } => vec![
                "Re-run with --allow-replace to delete and recreate the cluster".to_string(),
            ],
            HdiCtlError::Cancelled { .. } => vec![
                "The operation may still be running in Azure; refresh with: hdictl read <resource-group> <name>"
                    .to_string(),
            ],
            HdiCtlError::ConnectionError { .. } => vec![
                "Check network connectivity".to_string(),
                "Verify the endpoint: hdictl profile show <profile>".to_string(),
            ],
            HdiCtlError::FileError { path, .. } => vec![format!("Check that file exists: {}", path)],
            _ => vec![],
        }
    }

    /// Print a cargo-style diagnostic to stderr using colored formatting.
    pub fn print_diagnostic(&self) {
        let mut diag = CliDiagnostic::error(&self.to_string());

        if let HdiCtlError::Cancelled { .. } = self {
            diag = diag.detail("Only the local wait was abandoned; Azure was not asked to stop.");
        }

        for suggestion in self.suggestions() {
            diag = diag.tip(&suggestion, &[]);
        }

        diag.print();
    }
}

impl From<ApiError> for HdiCtlError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::AuthenticationFailed { message } => {
                HdiCtlError::AuthenticationFailed { message }
            }
            ApiError::Connection(message) | ApiError::Timeout(message) => {
                HdiCtlError::ConnectionError { message }
            }
            _ => HdiCtlError::ApiError {
                message: err.to_string(),
            },
        }
    }
}

impl From<CoreError> for HdiCtlError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => HdiCtlError::InvalidInput {
                message: e.to_string(),
            },
            CoreError::MalformedIdentifier { .. } => HdiCtlError::InvalidInput {
                message: err.to_string(),
            },
            CoreError::NameConflict { name } => HdiCtlError::NameConflict { name },
            CoreError::NotFound { resource } => HdiCtlError::NotFound { resource },
            CoreError::OperationFailed { .. } => HdiCtlError::OperationFailed {
                message: err.to_string(),
            },
            CoreError::OperationCancelled { .. } => HdiCtlError::Cancelled {
                message: err.to_string(),
            },
            CoreError::Infrastructure { source, .. } => HdiCtlError::from(source),
            CoreError::State(message) => HdiCtlError::State { message },
        }
    }
}

impl From<ConfigError> for HdiCtlError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ProfileNotFound { name } => HdiCtlError::ProfileNotFound { name },
            ConfigError::NoProfiles { .. } => HdiCtlError::NoProfileConfigured,
            _ => HdiCtlError::Configuration(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for HdiCtlError {
    fn from(err: serde_json::Error) -> Self {
        HdiCtlError::OutputError {
            message: format!("JSON error: {}", err),
        }
    }
}

impl From<serde_yaml::Error> for HdiCtlError {
    fn from(err: serde_yaml::Error) -> Self {
        HdiCtlError::OutputError {
            message: format!("YAML error: {}", err),
        }
    }
}
