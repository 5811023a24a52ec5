use anyhow::Result;
use clap::Parser;
use hdictl_core::Config;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod connection;
mod error;
mod output;

use cli::{Cli, Commands, ProfileCommands};
use connection::ConnectionManager;
use error::HdiCtlError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level
    init_tracing(cli.verbose);

    let conn_mgr = match load_connection_manager(&cli) {
        Ok(conn_mgr) => conn_mgr,
        Err(e) => {
            e.print_diagnostic();
            std::process::exit(1);
        }
    };

    if let Err(e) = execute_command(&cli, &conn_mgr).await {
        e.print_diagnostic();
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    // Check for RUST_LOG env var first, then fall back to verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "hdictl=warn,hdictl_core=warn",
            1 => "hdictl=info,hdictl_core=info",
            2 => "hdictl=debug,hdictl_core=debug",
            _ => "hdictl=trace,hdictl_core=trace",
        };
        tracing_subscriber::EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .init();

    debug!("Tracing initialized with verbosity level: {}", verbose);
}

fn load_connection_manager(cli: &Cli) -> Result<ConnectionManager, HdiCtlError> {
    // Load configuration from specified path or default location
    let config = if let Some(path) = &cli.config_file {
        debug!("Loading config from explicit path: {:?}", path);
        Config::load_from_path(path)?
    } else {
        debug!("Loading config from default location");
        Config::load()?
    };

    Ok(ConnectionManager::new(
        config,
        cli.config_file.clone(),
        cli.state_file.clone(),
    ))
}

async fn execute_command(cli: &Cli, conn_mgr: &ConnectionManager) -> Result<(), HdiCtlError> {
    info!("Command: {}", format_command(&cli.command));

    let profile = cli.profile.as_deref();
    let start = std::time::Instant::now();
    let result = match &cli.command {
        Commands::Apply {
            file,
            allow_replace,
        } => {
            commands::cluster::handle_apply(conn_mgr, profile, file, *allow_replace, cli.output)
                .await
        }
        Commands::Plan { file } => commands::cluster::handle_plan(conn_mgr, file, cli.output),
        Commands::Create { file } => {
            commands::cluster::handle_create(conn_mgr, profile, file, cli.output).await
        }
        Commands::Read {
            resource_group,
            name,
        } => {
            commands::cluster::handle_read(conn_mgr, profile, resource_group, name, cli.output)
                .await
        }
        Commands::Update { file } => {
            commands::cluster::handle_update(conn_mgr, profile, file, cli.output).await
        }
        Commands::Delete {
            resource_group,
            name,
        } => {
            commands::cluster::handle_delete(conn_mgr, profile, resource_group, name, cli.output)
                .await
        }
        Commands::Import { id } => {
            commands::cluster::handle_import(conn_mgr, profile, id, cli.output).await
        }
        Commands::Get {
            resource_group,
            name,
        } => {
            commands::cluster::handle_get(conn_mgr, profile, resource_group, name, cli.output)
                .await
        }
        Commands::Expand { file } => commands::cluster::handle_expand(file, cli.output),
        Commands::Profile(profile_cmd) => {
            debug!("Executing profile command");
            commands::profile::handle_profile_command(profile_cmd, conn_mgr, cli.output).await
        }
    };

    let duration = start.elapsed();
    match &result {
        Ok(_) => info!(
            "Command completed successfully in {:.2}s",
            duration.as_secs_f64()
        ),
        Err(e) => debug!("Command failed after {:.2}s: {}", duration.as_secs_f64(), e),
    }

    result
}

/// Format command for human-readable logging; never includes secrets
fn format_command(command: &Commands) -> String {
    match command {
        Commands::Apply { file, .. } => format!("apply {}", file.display()),
        Commands::Plan { file } => format!("plan {}", file.display()),
        Commands::Create { file } => format!("create {}", file.display()),
        Commands::Read {
            resource_group,
            name,
        } => format!("read {}/{}", resource_group, name),
        Commands::Update { file } => format!("update {}", file.display()),
        Commands::Delete {
            resource_group,
            name,
        } => format!("delete {}/{}", resource_group, name),
        Commands::Import { id } => format!("import {}", id),
        Commands::Get {
            resource_group,
            name,
        } => format!("get {}/{}", resource_group, name),
        Commands::Expand { file } => format!("expand {}", file.display()),
        Commands::Profile(cmd) => match cmd {
            ProfileCommands::List => "profile list".to_string(),
            ProfileCommands::Path => "profile path".to_string(),
            ProfileCommands::Show { name } => format!("profile show {}", name),
            ProfileCommands::Set { name, .. } => format!("profile set {} (token redacted)", name),
            ProfileCommands::Remove { name } => format!("profile remove {}", name),
            ProfileCommands::Default { name } => format!("profile default {}", name),
        },
    }
}
