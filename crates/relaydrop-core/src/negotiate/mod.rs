//! Offer and accept negotiation.
//!
//! Sending starts with an `offer` naming the file and its size. Nothing
//! else happens until the addressed peer answers with an `accept`, at
//! which point the staged file is uploaded. Declining is silent: the
//! offerer is never told and stays in its waiting state until it offers
//! again.

use std::path::Path;

use crate::channel::RelayEndpoints;
use crate::client::Collaborators;
use crate::config::UiConfig;
use crate::display::Status;
use crate::error::{Error, Result};
use crate::protocol::ClientMessage;
use crate::session::{ClientId, SessionContext, TransferOffer};
use crate::transfer::{DownloadRequest, TransferSender, UploadId};

/// How inbound offers are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceptPolicy {
    /// Wait for the user to accept or decline
    #[default]
    Prompt,
    /// Accept every offer as soon as it arrives
    AutoAccept,
}

impl AcceptPolicy {
    /// Policy selected by the UI configuration.
    pub fn from_config(ui: &UiConfig) -> Self {
        if ui.auto_accept {
            Self::AutoAccept
        } else {
            Self::Prompt
        }
    }
}

/// Builds and answers offers.
#[derive(Debug, Clone)]
pub struct OfferNegotiator {
    policy: AcceptPolicy,
    endpoints: RelayEndpoints,
}

impl OfferNegotiator {
    /// Create a negotiator for the relay at `endpoints`.
    pub fn new(policy: AcceptPolicy, endpoints: RelayEndpoints) -> Self {
        Self { policy, endpoints }
    }

    /// Select a file and offer it to `target`.
    ///
    /// Returns `Ok(false)` when the selection was dismissed; nothing is
    /// staged or sent in that case. A file already staged for another
    /// peer is replaced without telling that peer.
    ///
    /// # Errors
    ///
    /// Rejects targeting ourselves, a peer missing from a non-empty
    /// presence list, and sending while an upload is in progress.
    pub fn initiate_send(
        &self,
        session: &mut SessionContext,
        io: &mut Collaborators,
        target: ClientId,
        suggested: Option<&Path>,
    ) -> Result<bool> {
        let me = session.my_id().ok_or(Error::NoIdentity)?;
        if *me == target {
            return Err(Error::SelfTarget);
        }
        if !session.presence().is_empty() && !session.presence().contains(&target) {
            return Err(Error::UnknownPeer(target.to_string()));
        }
        if session.active_upload().is_some() {
            return Err(Error::InvalidTransition {
                event: "send",
                phase: session.outbound_phase(),
            });
        }

        let Some(file) = io.selector.select(suggested)? else {
            tracing::debug!(to = %target, "File selection dismissed");
            return Ok(false);
        };

        let offer = ClientMessage::offer(target.clone(), file.name.clone(), file.size);
        if let Some(previous) = session.stage(target.clone(), file)? {
            tracing::debug!(previous = %previous, "Replacing unaccepted offer");
        }

        tracing::info!(to = %target, "Offering file");
        io.outbox.send(offer)?;
        io.display.status(&Status::AwaitingConfirmation(target));
        Ok(true)
    }

    /// Answer the pending inbound offer.
    ///
    /// Accepting sends `accept` to the offerer and hands the download to the
    /// download agent. Declining only clears the offer. Returns the answered
    /// offer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] when no offer is pending. If the
    /// accept cannot be sent the offer stays pending. In both cases the
    /// session is not touched.
    pub fn respond_to_offer(
        &self,
        session: &mut SessionContext,
        io: &mut Collaborators,
        accept: bool,
    ) -> Result<TransferOffer> {
        if accept {
            if let Some(offer) = session.pending_offer() {
                io.outbox.send(ClientMessage::Accept {
                    to: offer.from.clone(),
                })?;
            }
        }

        let offer = session.take_offer(accept)?;
        io.display.dismiss_offer();

        if !accept {
            tracing::info!(from = %offer.from, file = %offer.name, "Declined offer");
            return Ok(offer);
        }

        let me = session.my_id().unwrap_or(&offer.to).clone();
        tracing::info!(from = %offer.from, file = %offer.name, size = offer.size, "Accepted offer");

        io.downloader
            .start(DownloadRequest::for_offer(&self.endpoints, &me, &offer));
        io.display.status(&Status::Receiving);
        Ok(offer)
    }

    /// Handle an inbound offer: it becomes the single pending offer.
    ///
    /// A failing notification cue is ignored. Under
    /// [`AcceptPolicy::AutoAccept`] the offer is accepted straight away.
    pub fn on_offer(
        &self,
        session: &mut SessionContext,
        io: &mut Collaborators,
        offer: TransferOffer,
    ) -> Result<()> {
        tracing::info!(from = %offer.from, file = %offer.name, size = offer.size, "Offer received");

        io.display.offer(&offer);
        if let Some(previous) = session.receive_offer(offer) {
            tracing::debug!(from = %previous.from, file = %previous.name, "Unanswered offer replaced");
        }

        if let Err(e) = io.notifier.play() {
            tracing::debug!(error = %e, "Notification cue failed");
        }

        if self.policy == AcceptPolicy::AutoAccept {
            self.respond_to_offer(session, io, true)?;
        }
        Ok(())
    }

    /// Handle a peer's accept by uploading the file staged for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] when nothing is staged for
    /// `from`, including duplicate and stale accepts.
    pub fn on_accept(
        &self,
        session: &mut SessionContext,
        io: &mut Collaborators,
        sender: &mut TransferSender,
        from: &ClientId,
    ) -> Result<UploadId> {
        tracing::info!(from = %from, "Offer accepted");
        sender.upload(
            session,
            io.uploader.as_mut(),
            io.display.as_mut(),
            from,
        )
    }
}
