//! CLI command definitions and handlers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use relaydrop_core::config::Config;

pub mod config;
pub mod connect;
pub mod history;

/// Load configuration.
///
/// An explicit `--config` file must load; the default file falls back to
/// defaults when it is missing or unreadable.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Configuration file {} does not exist", path.display());
            }
            Config::load_from(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
        None => Ok(Config::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring unreadable configuration");
            Config::default()
        })),
    }
}

/// Relaydrop - send files to other clients of the same relay
#[derive(Parser)]
#[command(name = "relaydrop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "RELAYDROP_CONFIG")]
    pub config: Option<PathBuf>,

    /// The command to execute (defaults to `connect`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Connect to the relay and send or receive files interactively
    Connect(ConnectArgs),

    /// View transfer history
    History(HistoryArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the connect command
#[derive(Parser, Default)]
pub struct ConnectArgs {
    /// Relay base URL, e.g. https://relay.lan:8080
    #[arg(long, env = "RELAYDROP_RELAY")]
    pub relay: Option<String>,

    /// Directory for received files
    #[arg(short = 'o', long)]
    pub download_dir: Option<PathBuf>,

    /// Accept every incoming offer without asking
    #[arg(long)]
    pub auto_accept: bool,

    /// Do not ring the terminal bell on incoming offers
    #[arg(long)]
    pub quiet: bool,
}

impl ConnectArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(relay) = &self.relay {
            config.relay.url.clone_from(relay);
        }
        if let Some(dir) = &self.download_dir {
            config.transfer.download_dir = Some(dir.clone());
        }
        if self.auto_accept {
            config.ui.auto_accept = true;
        }
        if self.quiet {
            config.ui.sound = false;
        }
    }
}

/// Arguments for the history command
#[derive(Parser)]
pub struct HistoryArgs {
    /// Number of entries to show
    #[arg(short = 'n', long, default_value = "5")]
    pub limit: usize,

    /// Clear history
    #[arg(long)]
    pub clear: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show the configuration file path
    Path,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
