//! CLI structure and command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Declarative management of Azure HDInsight clusters
#[derive(Parser, Debug)]
#[command(name = "hdictl")]
#[command(version, about = "Declarative management of Azure HDInsight clusters")]
#[command(long_about = "
Declarative management of Azure HDInsight clusters

A cluster is described in a TOML, JSON or YAML file. hdictl expands it into
the Azure Resource Manager request, waits for the long-running operation and
records the resulting cluster ID in a local state file.

EXAMPLES:
    # Set up a profile (the token can also come from AZURE_ACCESS_TOKEN)
    hdictl profile set prod --subscription-id 0000-... --use-keyring

    # Preview the request without touching Azure
    hdictl expand cluster.toml

    # Create, retag or replace the cluster to match the file
    hdictl plan cluster.toml
    hdictl apply cluster.toml

    # Refresh and show what Azure reports
    hdictl read rg1 cluster1 -o yaml

    # Adopt an existing cluster
    hdictl import /subscriptions/.../resourceGroups/rg1/providers/Microsoft.HDInsight/clusters/cluster1

For more help on a specific command, run:
    hdictl <command> --help
")]
pub struct Cli {
    /// Profile to use for this command
    #[arg(long, short, global = true, env = "HDICTL_PROFILE")]
    pub profile: Option<String>,

    /// Path to alternate configuration file
    #[arg(long, global = true, env = "HDICTL_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Path to the state file
    #[arg(long, global = true, env = "HDICTL_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "auto")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable where it makes sense, JSON otherwise
    Auto,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Make the cluster match the file: create, retag or replace
    #[command(after_help = "EXAMPLES:
    hdictl apply cluster.toml
    hdictl apply cluster.toml --allow-replace
")]
    Apply {
        /// Cluster definition (TOML, JSON or YAML)
        file: PathBuf,

        /// Delete and recreate when an immutable field changed
        #[arg(long)]
        allow_replace: bool,
    },

    /// Show what apply would do
    Plan {
        /// Cluster definition (TOML, JSON or YAML)
        file: PathBuf,
    },

    /// Create the cluster and wait until it is ready
    Create {
        /// Cluster definition (TOML, JSON or YAML)
        file: PathBuf,
    },

    /// Refresh a managed cluster from Azure
    Read {
        resource_group: String,
        name: String,
    },

    /// Push tag changes for a managed cluster
    Update {
        /// Cluster definition (TOML, JSON or YAML)
        file: PathBuf,
    },

    /// Delete a managed cluster and wait until it is gone
    Delete {
        resource_group: String,
        name: String,
    },

    /// Start managing an existing cluster by its resource ID
    Import {
        /// `/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.HDInsight/clusters/{name}`
        id: String,
    },

    /// Look up any cluster without recording it
    Get {
        resource_group: String,
        name: String,
    },

    /// Print the ARM request body for a cluster definition (offline)
    Expand {
        /// Cluster definition (TOML, JSON or YAML)
        file: PathBuf,
    },

    /// Profile management
    #[command(subcommand)]
    Profile(ProfileCommands),
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List configured profiles
    List,

    /// Show the configuration file path
    Path,

    /// Show one profile
    Show { name: String },

    /// Create or update a profile
    Set {
        name: String,

        /// Azure subscription ID
        #[arg(long)]
        subscription_id: String,

        /// Resource Manager endpoint
        #[arg(long, default_value = hdictl_core::config::DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Bearer token (prefer AZURE_ACCESS_TOKEN for short-lived tokens)
        #[arg(long)]
        token: Option<String>,

        /// Seconds between operation polls when Azure does not suggest one
        #[arg(long)]
        poll_interval: Option<u64>,

        /// Store the token in the OS keyring
        #[cfg(feature = "secure-storage")]
        #[arg(long)]
        use_keyring: bool,

        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },

    /// Remove a profile
    Remove { name: String },

    /// Set the default profile
    Default { name: String },
}
