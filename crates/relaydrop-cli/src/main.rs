//! Relaydrop CLI - send files to other clients of the same relay
//!
//! Every client connected to a relay sees the others in a presence list.
//! Offers and answers travel over the relay's WebSocket, file bytes over
//! its HTTP stream endpoint.
//!
//! ## Quick Start
//!
//! ```bash
//! # Join the relay (on both machines)
//! relaydrop --relay https://relay.lan:8080
//!
//! # Then, at the prompt
//! send User-48213 ./document.pdf
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

use anyhow::Result;
use clap::Parser;

mod commands;
pub mod ui;

use commands::{Cli, Command, ConnectArgs};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        None => commands::connect::run(ConnectArgs::default(), config_path).await,
        Some(Command::Connect(args)) => commands::connect::run(args, config_path).await,
        Some(Command::History(args)) => commands::history::run(args, config_path).await,
        Some(Command::Config(args)) => commands::config::run(args, config_path).await,
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,relaydrop=info,relaydrop_core=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
