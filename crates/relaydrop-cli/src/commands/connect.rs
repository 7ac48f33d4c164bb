//! Connect command implementation.
//!
//! Joins the relay and reads one command per line from stdin until the user
//! quits, the relay goes away or Ctrl+C is pressed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use relaydrop_core::channel::{PresenceChannel, RelayEndpoints};
use relaydrop_core::client::{Client, ClientCommand, Collaborators};
use relaydrop_core::display::{Notifier, SilentNotifier};
use relaydrop_core::file::PathSelector;
use relaydrop_core::history::Journal;
use relaydrop_core::transfer::{HttpDownloader, HttpUploader};

use super::ConnectArgs;
use crate::ui::{TerminalBell, TerminalDisplay};

const HELP: &str = "\
  peers                 list connected clients
  send <peer> <path>    offer a file to a peer
  y | accept            accept the pending offer
  n | decline           decline the pending offer
  status                show both transfer lanes
  quit                  disconnect";

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Command(ClientCommand),
    Help,
}

/// Run the connect command.
pub async fn run(args: ConnectArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = super::load_config(config_path)?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let endpoints = RelayEndpoints::parse(&config.relay.url)?;
    let download_dir = config.transfer.resolved_download_dir();

    println!();
    println!("Relaydrop v{}", relaydrop_core::VERSION);
    println!("{}", "-".repeat(37));
    println!("  Relay:     {}", config.relay.url);
    println!("  Downloads: {}", download_dir.display());
    println!();

    let journal = Journal::open(&config.history);
    let uploader = HttpUploader::new(&config.relay, &config.transfer)?;
    let downloader = HttpDownloader::new(&config.relay, download_dir, journal.clone())?;

    let (handle, events) = match PresenceChannel::connect(&endpoints, &config.relay).await {
        Ok(connected) => connected,
        Err(e) => {
            if let Some(suggestion) = e.suggestion() {
                eprintln!("{suggestion}");
            }
            return Err(e.into());
        }
    };

    let notifier: Box<dyn Notifier> = if config.ui.sound {
        Box::new(TerminalBell)
    } else {
        Box::new(SilentNotifier)
    };
    let io = Collaborators {
        outbox: Box::new(handle),
        selector: Box::new(PathSelector),
        uploader: Box::new(uploader),
        downloader: Box::new(downloader),
        display: Box::new(TerminalDisplay::new()),
        notifier,
    };

    let client = Client::new(&config, endpoints, io, journal);
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    tokio::spawn(read_commands(commands_tx));

    println!("  Type 'help' for commands.");

    let result = tokio::select! {
        result = client.run(events, commands_rx) => result,
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("  Disconnected.");
            Ok(())
        }
    };

    if let Err(e) = result {
        if let Some(suggestion) = e.suggestion() {
            eprintln!("{suggestion}");
        }
        return Err(e.into());
    }
    Ok(())
}

async fn read_commands(commands: mpsc::UnboundedSender<ClientCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read from stdin");
                break;
            }
        };

        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(Input::Help)) => println!("{HELP}"),
            Ok(Some(Input::Command(command))) => {
                let quit = command == ClientCommand::Quit;
                if commands.send(command).is_err() || quit {
                    break;
                }
            }
            Err(message) => println!("  {message}"),
        }
    }
}

fn parse_command(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut parts = line.splitn(3, char::is_whitespace);
    let verb = parts.next().unwrap_or_default().to_lowercase();

    let command = match verb.as_str() {
        "peers" | "ls" => ClientCommand::ShowPeers,
        "y" | "yes" | "accept" => ClientCommand::Respond { accept: true },
        "n" | "no" | "decline" => ClientCommand::Respond { accept: false },
        "status" => ClientCommand::ShowStatus,
        "quit" | "exit" | "q" => ClientCommand::Quit,
        "help" | "?" => return Ok(Some(Input::Help)),
        "send" => {
            let target = parts
                .next()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| "Usage: send <peer> <path>".to_string())?;
            let path = parts
                .next()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| "Usage: send <peer> <path>".to_string())?;
            ClientCommand::Send {
                target: target.into(),
                path: Some(PathBuf::from(path)),
            }
        }
        other => return Err(format!("Unknown command '{other}'. Type 'help' for commands.")),
    };

    Ok(Some(Input::Command(command)))
}
