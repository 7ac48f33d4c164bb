//! Status line and presentation collaborators.
//!
//! Rendering is not part of the core. The client reports what changed
//! through [`StatusDisplay`] and plays cues through [`Notifier`]; front-ends
//! decide how that looks.

use std::fmt;

use crate::session::{ClientId, PresenceList, TransferOffer};

/// The shared status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Waiting for the relay's welcome
    Connecting,
    /// Idle, showing our identity
    Ready(ClientId),
    /// Offer sent, waiting for the peer
    AwaitingConfirmation(ClientId),
    /// Upload body being sent
    Sending(u8),
    /// Upload request finished; the relay is still delivering
    EnRoute,
    /// Download handed off
    Receiving,
    /// A completion notification arrived
    Complete,
    /// Upload request failed
    UploadFailed,
}

impl Status {
    /// Idle status for the given identity.
    pub fn ready(my_id: Option<&ClientId>) -> Self {
        my_id.map_or(Self::Connecting, |id| Self::Ready(id.clone()))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting to relay..."),
            Self::Ready(id) => write!(f, "Your ID: {id}"),
            Self::AwaitingConfirmation(target) => {
                write!(f, "Waiting for confirmation from {target}...")
            }
            Self::Sending(percent) => write!(f, "Sending: {percent}%"),
            Self::EnRoute => write!(f, "File en route to recipient..."),
            Self::Receiving => write!(f, "Receiving file..."),
            Self::Complete => write!(f, "Transfer complete!"),
            Self::UploadFailed => write!(f, "Upload failed"),
        }
    }
}

/// Progress and status display collaborator.
pub trait StatusDisplay: Send {
    /// Replace the status line.
    fn status(&mut self, status: &Status);

    /// Show the progress indicator at `percent`.
    fn progress(&mut self, percent: u8);

    /// Hide the progress indicator.
    fn hide_progress(&mut self);

    /// Render the presence list.
    fn presence(&mut self, me: Option<&ClientId>, list: &PresenceList);

    /// Show the notification banner for an inbound offer.
    fn offer(&mut self, offer: &TransferOffer);

    /// Dismiss the notification banner.
    fn dismiss_offer(&mut self);

    /// Tell the user why a request of theirs was not carried out.
    fn notice(&mut self, message: &str);
}

/// Notification cue collaborator. Failures are ignored by the caller.
pub trait Notifier: Send {
    /// Play the cue.
    fn play(&mut self) -> std::io::Result<()>;
}

/// A notifier that plays nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn play(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
