//! devlink CLI
//!
//! Operator commands for managing a remote device over a debug-protocol
//! link: connect, remote shell execution, package install/uninstall/list,
//! plus local cache and identity-key maintenance.

mod output;
mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use devlink_commands::cache;
use devlink_commands::{
    instrumented, ConnectionWatch, InstallOrchestrator, ListOrchestrator, UninstallOrchestrator,
};
use devlink_core::config::{self, ConfigFile};
use devlink_core::format::{format_file_size, format_speed};
use devlink_core::types::{DeviceAddress, TransferProgress, TransferState};
use devlink_session::{DeviceSession, IdentityManager};

use output::{format_apps, print_error, print_info, print_success, print_warning};
use transport::AdbExecDialer;

#[derive(Parser)]
#[command(name = "devlink")]
#[command(author, version, about = "Remote device management over a debug-protocol link")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a device and validate the link
    Connect {
        /// Device address, `host[:port]`
        address: String,
    },

    /// Run a shell command on a device
    Exec {
        /// Device address, `host[:port]`
        address: String,
        /// Command to run
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// Install a package file on a device
    Install {
        /// Device address, `host[:port]`
        address: String,
        /// Path to the package file
        package: PathBuf,
    },

    /// Uninstall a package from a device
    Uninstall {
        /// Device address, `host[:port]`
        address: String,
        /// Package name to remove
        package: String,
    },

    /// List installed third-party apps
    List {
        /// Device address, `host[:port]`
        address: String,
    },

    /// Manage the local package cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage the device identity key pair
    Identity {
        #[command(subcommand)]
        action: IdentityAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete cached package files
    Clean {
        /// Directory to sweep (defaults to the configured cache dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum IdentityAction {
    /// Show the identity-key fingerprint and storage location
    Show,
    /// Discard the current key pair and generate a fresh one
    Rotate,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Write a default config file if none exists
    Init,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = load_config_or_default(cli.config.as_ref())?;

    match cli.command {
        Commands::Connect { address } => {
            let watch = ConnectionWatch::new();
            // The link stays up for subsequent commands; only a failed
            // attempt tears anything down.
            connect_session(&config, &watch, &address).await?;
        }

        Commands::Exec { address, command } => {
            let watch = ConnectionWatch::new();
            let session = connect_session(&config, &watch, &address).await?;
            let command = command.join(" ");

            let result = instrumented(
                &watch,
                "cli",
                "executing remote command",
                session.execute(&command),
            )
            .await;

            finish(&session).await;
            println!("{}", result?);
        }

        Commands::Install { address, package } => {
            let watch = ConnectionWatch::new();
            let session = connect_session(&config, &watch, &address).await?;
            let orchestrator = InstallOrchestrator::new(Arc::clone(&session));

            let (tx, mut rx) = mpsc::unbounded_channel::<TransferProgress>();
            let printer = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    match event.state {
                        TransferState::Transferring => print_info(&format!(
                            "Transferring {} ...",
                            format_file_size(event.total_bytes)
                        )),
                        TransferState::Completed => print_success(&format!(
                            "Installed {} at {}",
                            format_file_size(event.total_bytes),
                            format_speed(event.speed)
                        )),
                        TransferState::Error => print_error(
                            event.error_message.as_deref().unwrap_or("install failed"),
                        ),
                        _ => {}
                    }
                }
            });

            let result = orchestrator.install(&package, &tx).await;
            drop(tx);
            let _ = printer.await;

            finish(&session).await;
            result?;
        }

        Commands::Uninstall { address, package } => {
            let watch = ConnectionWatch::new();
            let session = connect_session(&config, &watch, &address).await?;
            let orchestrator = UninstallOrchestrator::new(Arc::clone(&session));

            let result = instrumented(
                &watch,
                "cli",
                &format!("uninstalling {}", package),
                orchestrator.uninstall(&package),
            )
            .await;

            finish(&session).await;
            print_success(&result?);
        }

        Commands::List { address } => {
            let watch = ConnectionWatch::new();
            let session = connect_session(&config, &watch, &address).await?;
            let orchestrator = ListOrchestrator::new(Arc::clone(&session));

            let result =
                instrumented(&watch, "cli", "listing installed apps", orchestrator.list_apps())
                    .await;

            finish(&session).await;
            println!("{}", format_apps(&result?));
        }

        Commands::Cache { action } => match action {
            CacheAction::Clean { dir } => {
                let dir = dir.unwrap_or_else(|| config.cache.local_dir());
                let (count, bytes) = cache::clear_local_cache(&dir);
                print_success(&format!(
                    "Removed {} cached package files ({})",
                    count,
                    format_file_size(bytes)
                ));
            }
        },

        Commands::Identity { action } => {
            let manager = IdentityManager::persistent(config.session.data_dir());
            match action {
                IdentityAction::Show => {
                    let credential = manager
                        .get_or_create()
                        .context("Failed to load identity credential")?;
                    println!("Fingerprint: {}", credential.fingerprint());
                    println!("Public key:  {}", credential.public_key_hex());
                    if let Some(dir) = manager.storage_dir() {
                        println!("Storage:     {}", dir.display());
                    }
                }
                IdentityAction::Rotate => {
                    let credential = manager
                        .rotate()
                        .context("Failed to rotate identity credential")?;
                    print_success(&format!(
                        "Generated new identity key (fingerprint {})",
                        &credential.fingerprint()[..16]
                    ));
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let content =
                    toml::to_string_pretty(&config).context("Failed to render configuration")?;
                print!("{}", content);
            }
            ConfigAction::Init => {
                let path = config::default_config_path();
                if path.exists() {
                    print_warning(&format!("Config already exists at {}", path.display()));
                } else {
                    config::save_config(&path, &ConfigFile::default())
                        .context("Failed to write default config")?;
                    print_success(&format!("Wrote default config to {}", path.display()));
                }
            }
            ConfigAction::Path => {
                println!("{}", config::default_config_path().display());
            }
        },
    }

    Ok(())
}

fn load_config_or_default(path: Option<&PathBuf>) -> Result<ConfigFile> {
    if let Some(path) = path {
        return config::load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        Ok(config::load_config(&default_path).unwrap_or_else(|e| {
            tracing::warn!(
                "Failed to load config from {}: {}",
                default_path.display(),
                e
            );
            ConfigFile::default()
        }))
    } else {
        Ok(ConfigFile::default())
    }
}

fn build_session(config: &ConfigFile) -> Arc<DeviceSession> {
    let identity = IdentityManager::persistent(config.session.data_dir());
    Arc::new(DeviceSession::new(Arc::new(AdbExecDialer::new()), identity))
}

/// Connect, validate, and publish the transitions into `watch`.
async fn connect_session(
    config: &ConfigFile,
    watch: &ConnectionWatch,
    address: &str,
) -> Result<Arc<DeviceSession>> {
    let session = build_session(config);
    let target = DeviceAddress::parse_with_port(address, config.session.default_port);

    watch.set_connecting();
    let connected = instrumented(
        watch,
        "cli",
        &format!("connecting to {}", target),
        session.connect(&target.host, target.port, config.session.connect_timeout()),
    )
    .await;

    match connected {
        Ok(device_address) => {
            watch.set_connected(&device_address);
            print_success(&format!("Connected to {}", device_address));
            Ok(session)
        }
        Err(e) => {
            print_error(&format!("Connection failed: {}", e));
            Err(e.into())
        }
    }
}

/// Best-effort session teardown at the end of a one-shot command.
async fn finish(session: &DeviceSession) {
    if let Err(e) = session.disconnect().await {
        print_warning(&format!("Session teardown failed: {}", e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exec_takes_trailing_command() {
        let cli = Cli::parse_from(["devlink", "exec", "10.0.0.2", "ls", "-la", "/sdcard"]);
        match cli.command {
            Commands::Exec { address, command } => {
                assert_eq!(address, "10.0.0.2");
                assert_eq!(command, vec!["ls", "-la", "/sdcard"]);
            }
            _ => panic!("expected exec command"),
        }
    }
}
