//! The client event loop.
//!
//! One task owns the [`SessionContext`] and everything that mutates it.
//! Four sources feed it, each through an mpsc channel:
//!
//! - presence channel events
//! - upload events from the uploader task
//! - elapsed status resets from completion timers
//! - commands from the front-end
//!
//! Inputs are handled one at a time, to completion, in the order the loop
//! receives them. Errors from an input are logged and the loop carries on;
//! only the loss of the presence channel ends it.

use std::ops::ControlFlow;
use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::channel::{Outbox, RelayEndpoints};
use crate::config::Config;
use crate::display::{Notifier, Status, StatusDisplay};
use crate::error::{Error, Result};
use crate::file::FileSelector;
use crate::history::Journal;
use crate::negotiate::{AcceptPolicy, OfferNegotiator};
use crate::protocol::ChannelEvent;
use crate::reconcile::{CompletionKind, CompletionReconciler, StatusReset};
use crate::session::{ClientId, PresenceList, SessionContext};
use crate::transfer::{DownloadAgent, TransferSender, UploadEvent, Uploader};

/// Side-effecting collaborators used by the client.
pub struct Collaborators {
    /// Presence channel send side
    pub outbox: Box<dyn Outbox>,
    /// File picker
    pub selector: Box<dyn FileSelector>,
    /// Upload runner
    pub uploader: Box<dyn Uploader>,
    /// Download runner
    pub downloader: Box<dyn DownloadAgent>,
    /// Status line, progress and banners
    pub display: Box<dyn StatusDisplay>,
    /// Offer cue
    pub notifier: Box<dyn Notifier>,
}

/// A request from the front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Offer a file to `target`
    Send {
        /// Peer to offer to
        target: ClientId,
        /// Path suggested to the file selector
        path: Option<PathBuf>,
    },
    /// Answer the pending offer
    Respond {
        /// Accept (`true`) or decline
        accept: bool,
    },
    /// Show the presence list again
    ShowPeers,
    /// Describe both negotiation lanes
    ShowStatus,
    /// Stop the client
    Quit,
}

/// A session driven by a single task.
pub struct Client {
    session: SessionContext,
    io: Collaborators,
    negotiator: OfferNegotiator,
    sender: TransferSender,
    reconciler: CompletionReconciler,
    uploads: mpsc::UnboundedReceiver<UploadEvent>,
    resets: mpsc::UnboundedReceiver<StatusReset>,
}

impl Client {
    /// Create a client for the relay at `endpoints`.
    pub fn new(
        config: &Config,
        endpoints: RelayEndpoints,
        io: Collaborators,
        journal: Option<Journal>,
    ) -> Self {
        let (upload_tx, upload_rx) = mpsc::unbounded_channel();
        let (reset_tx, reset_rx) = mpsc::unbounded_channel();

        Self {
            session: SessionContext::new(),
            io,
            negotiator: OfferNegotiator::new(
                AcceptPolicy::from_config(&config.ui),
                endpoints.clone(),
            ),
            sender: TransferSender::new(endpoints, upload_tx, journal),
            reconciler: CompletionReconciler::new(&config.completion, reset_tx),
            uploads: upload_rx,
            resets: reset_rx,
        }
    }

    /// Current session state.
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Run until the presence channel closes or a `Quit` command arrives.
    ///
    /// When the command sender is dropped the client keeps serving the
    /// presence channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] when the relay drops the connection.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<ChannelEvent>,
        mut commands: mpsc::UnboundedReceiver<ClientCommand>,
    ) -> Result<()> {
        self.io.display.status(&Status::Connecting);
        let mut commands_open = true;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        tracing::warn!("Relay closed the presence channel");
                        return Err(Error::ChannelClosed);
                    }
                },
                Some(event) = self.uploads.recv() => self.handle_upload(event),
                Some(reset) = self.resets.recv() => self.handle_reset(reset),
                command = commands.recv(), if commands_open => match command {
                    Some(command) => {
                        if self.handle_command(command).is_break() {
                            tracing::info!("Client stopped");
                            return Ok(());
                        }
                    }
                    None => commands_open = false,
                },
            }
        }
    }

    /// Apply one presence channel event.
    pub fn handle_event(&mut self, event: ChannelEvent) {
        tracing::debug!(kind = event.kind(), "Handling presence event");
        let Self {
            session,
            io,
            negotiator,
            sender,
            reconciler,
            ..
        } = self;

        let result = match event {
            ChannelEvent::Welcome { id } => {
                tracing::info!(id = %id, "Connected to relay");
                session.welcome(id);
                io.display.status(&Status::ready(session.my_id()));
                Ok(())
            }
            ChannelEvent::Presence { users } => {
                session.set_presence(PresenceList::new(users));
                io.display.presence(session.my_id(), session.presence());
                Ok(())
            }
            ChannelEvent::Offer(offer) => negotiator.on_offer(session, io, offer),
            ChannelEvent::Accept { from } => negotiator
                .on_accept(session, io, sender, &from)
                .map(|_| ()),
            ChannelEvent::Complete => {
                reconciler.on_completion(session, io.display.as_mut(), CompletionKind::Complete);
                Ok(())
            }
            ChannelEvent::Done => {
                reconciler.on_completion(session, io.display.as_mut(), CompletionKind::Done);
                Ok(())
            }
        };

        if let Err(e) = result {
            log_dropped_input(&e);
        }
    }

    /// Apply one upload event.
    pub fn handle_upload(&mut self, event: UploadEvent) {
        if let Err(e) = self
            .sender
            .on_event(&mut self.session, self.io.display.as_mut(), event)
        {
            log_dropped_input(&e);
        }
    }

    /// Apply one elapsed status reset.
    pub fn handle_reset(&mut self, reset: StatusReset) {
        self.reconciler
            .on_reset(&self.session, self.io.display.as_mut(), reset);
    }

    /// Apply one front-end command. Breaks on [`ClientCommand::Quit`].
    pub fn handle_command(&mut self, command: ClientCommand) -> ControlFlow<()> {
        let result = match command {
            ClientCommand::Send { target, path } => self
                .negotiator
                .initiate_send(&mut self.session, &mut self.io, target, path.as_deref())
                .map(|_| ()),
            ClientCommand::Respond { accept } => self
                .negotiator
                .respond_to_offer(&mut self.session, &mut self.io, accept)
                .map(|_| ()),
            ClientCommand::ShowPeers => {
                self.io
                    .display
                    .presence(self.session.my_id(), self.session.presence());
                Ok(())
            }
            ClientCommand::ShowStatus => {
                let summary = format!(
                    "outgoing: {}; incoming: {}",
                    self.session.outbound_phase(),
                    self.session.inbound_phase()
                );
                self.io.display.notice(&summary);
                Ok(())
            }
            ClientCommand::Quit => return ControlFlow::Break(()),
        };

        if let Err(e) = result {
            if e.is_stale_input() {
                log_dropped_input(&e);
            } else {
                tracing::warn!(error = %e, "Command failed");
                let message = e
                    .suggestion()
                    .map_or_else(|| e.to_string(), |hint| format!("{e}. {hint}"));
                self.io.display.notice(&message);
            }
        }
        ControlFlow::Continue(())
    }

    /// Apply every upload event and status reset already queued.
    pub fn drain_pending(&mut self) {
        while let Ok(event) = self.uploads.try_recv() {
            self.handle_upload(event);
        }
        while let Ok(reset) = self.resets.try_recv() {
            self.handle_reset(reset);
        }
    }
}

fn log_dropped_input(error: &Error) {
    if error.is_stale_input() {
        tracing::debug!(error = %error, "Ignoring input");
    } else {
        tracing::warn!(error = %error, "Input handling failed");
    }
}
