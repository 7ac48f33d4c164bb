//! Session context and negotiation state machine.
//!
//! A client runs two independent lanes:
//!
//! - **Outbound**: `Idle → OutboundOfferSent → Transferring → Idle`
//! - **Inbound**: `Idle → InboundOfferPending → Receiving → Idle`
//!
//! Each lane holds at most one offer, so a client has at most one pending
//! inbound offer and at most one staged outbound file at any time. The
//! [`SessionContext`] is owned by the client task and passed explicitly to
//! every operation; nothing here is shared across threads.
//!
//! | lane | phase | event | next |
//! |------|-------|-------|------|
//! | out | Idle, OutboundOfferSent | stage | OutboundOfferSent |
//! | out | Transferring | stage | rejected |
//! | out | OutboundOfferSent{to} | accept from `to` | Transferring |
//! | out | OutboundOfferSent{to} | accept from other | rejected |
//! | out | Idle, Transferring | accept | rejected |
//! | out | Transferring{upload} | upload ended (same id) | Idle |
//! | in | any | offer | InboundOfferPending |
//! | in | InboundOfferPending | respond | Receiving or Idle |
//! | in | Idle, Receiving | respond | rejected |
//! | in | Receiving | complete, done | Idle |

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::file::StagedFile;
use crate::transfer::{UploadId, UploadProgress};

/// Identity assigned to a client by the relay on connect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Wrap a relay-assigned identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Clients currently connected to the relay.
///
/// Each broadcast from the relay replaces the previous list wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceList {
    users: Vec<ClientId>,
}

impl PresenceList {
    /// Build a list from the relay's broadcast.
    pub fn new(users: Vec<ClientId>) -> Self {
        Self { users }
    }

    /// Whether `id` is present.
    pub fn contains(&self, id: &ClientId) -> bool {
        self.users.contains(id)
    }

    /// Iterate over connected identities.
    pub fn iter(&self) -> impl Iterator<Item = &ClientId> {
        self.users.iter()
    }

    /// Peers other than `me`.
    pub fn peers<'a>(&'a self, me: Option<&'a ClientId>) -> impl Iterator<Item = &'a ClientId> {
        self.users.iter().filter(move |id| Some(*id) != me)
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// A proposal from one client to send a named file to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOffer {
    /// Offering client
    pub from: ClientId,
    /// Addressed client
    pub to: ClientId,
    /// File name as chosen by the sender
    pub name: String,
    /// File size in bytes
    pub size: u64,
}

/// Phase of one negotiation lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing in flight
    Idle,
    /// Offer sent, waiting for the peer to accept
    OutboundOfferSent,
    /// Upload request in flight
    Transferring,
    /// Offer received, waiting for the local user
    InboundOfferPending,
    /// Accepted an offer, download handed off
    Receiving,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::OutboundOfferSent => "awaiting an accept",
            Self::Transferring => "an upload is in progress",
            Self::InboundOfferPending => "an offer is pending",
            Self::Receiving => "receiving",
        };
        f.write_str(s)
    }
}

/// Outbound lane state.
#[derive(Debug)]
pub enum Outbound {
    /// No file staged
    Idle,
    /// File staged and offered to `to`
    OfferSent {
        /// Offer recipient
        to: ClientId,
        /// File to upload once accepted
        file: StagedFile,
    },
    /// Upload dispatched
    Transferring(ActiveUpload),
}

/// An upload handed to the uploader and not yet finished.
#[derive(Debug)]
pub struct ActiveUpload {
    /// Local upload identifier
    pub id: UploadId,
    /// Receiving client
    pub to: ClientId,
    /// The file being sent
    pub file: StagedFile,
    /// Progress of the request body
    pub progress: UploadProgress,
    /// When the upload was dispatched
    pub started: Instant,
}

/// Inbound lane state.
#[derive(Debug)]
pub enum Inbound {
    /// No offer pending
    Idle,
    /// Offer waiting for a response
    OfferPending(TransferOffer),
    /// Download handed to the download agent
    Receiving {
        /// Sending client
        from: ClientId,
    },
}

/// Per-client session state, owned by the client task.
#[derive(Debug)]
pub struct SessionContext {
    my_id: Option<ClientId>,
    presence: PresenceList,
    outbound: Outbound,
    inbound: Inbound,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    /// Create an empty session (not yet welcomed by the relay).
    pub fn new() -> Self {
        Self {
            my_id: None,
            presence: PresenceList::default(),
            outbound: Outbound::Idle,
            inbound: Inbound::Idle,
        }
    }

    /// Identity assigned by the relay, if welcomed.
    pub fn my_id(&self) -> Option<&ClientId> {
        self.my_id.as_ref()
    }

    /// Record the identity from the relay's welcome.
    ///
    /// The identity is fixed for the connection; a second welcome is ignored.
    pub fn welcome(&mut self, id: ClientId) {
        if let Some(current) = &self.my_id {
            tracing::warn!(current = %current, ignored = %id, "Relay sent a second welcome");
            return;
        }
        self.my_id = Some(id);
    }

    /// Latest presence list.
    pub fn presence(&self) -> &PresenceList {
        &self.presence
    }

    /// Replace the presence list.
    pub fn set_presence(&mut self, presence: PresenceList) {
        self.presence = presence;
    }

    /// Phase of the outbound lane.
    pub fn outbound_phase(&self) -> SessionPhase {
        match self.outbound {
            Outbound::Idle => SessionPhase::Idle,
            Outbound::OfferSent { .. } => SessionPhase::OutboundOfferSent,
            Outbound::Transferring(_) => SessionPhase::Transferring,
        }
    }

    /// Phase of the inbound lane.
    pub fn inbound_phase(&self) -> SessionPhase {
        match self.inbound {
            Inbound::Idle => SessionPhase::Idle,
            Inbound::OfferPending(_) => SessionPhase::InboundOfferPending,
            Inbound::Receiving { .. } => SessionPhase::Receiving,
        }
    }

    /// Pending inbound offer, if any.
    pub fn pending_offer(&self) -> Option<&TransferOffer> {
        match &self.inbound {
            Inbound::OfferPending(offer) => Some(offer),
            _ => None,
        }
    }

    /// Staged outbound file and its recipient, if an offer is outstanding.
    pub fn staged(&self) -> Option<(&ClientId, &StagedFile)> {
        match &self.outbound {
            Outbound::OfferSent { to, file } => Some((to, file)),
            _ => None,
        }
    }

    /// Active upload, if any.
    pub fn active_upload(&self) -> Option<&ActiveUpload> {
        match &self.outbound {
            Outbound::Transferring(upload) => Some(upload),
            _ => None,
        }
    }

    /// Mutable access to the active upload.
    pub fn active_upload_mut(&mut self) -> Option<&mut ActiveUpload> {
        match &mut self.outbound {
            Outbound::Transferring(upload) => Some(upload),
            _ => None,
        }
    }

    /// Stage `file` for `to`, replacing any unaccepted staged file.
    ///
    /// Returns the replaced recipient, if any. No message is sent to it.
    pub fn stage(&mut self, to: ClientId, file: StagedFile) -> Result<Option<ClientId>> {
        let replaced = match std::mem::replace(&mut self.outbound, Outbound::Idle) {
            Outbound::Idle => None,
            Outbound::OfferSent { to: previous, .. } => Some(previous),
            transferring @ Outbound::Transferring(_) => {
                self.outbound = transferring;
                return Err(Error::InvalidTransition {
                    event: "send",
                    phase: SessionPhase::Transferring,
                });
            }
        };
        self.outbound = Outbound::OfferSent { to, file };
        Ok(replaced)
    }

    /// Take the staged file for an accept from `from`, moving to Transferring.
    pub fn begin_upload(&mut self, from: &ClientId, id: UploadId) -> Result<&ActiveUpload> {
        let phase = self.outbound_phase();
        match std::mem::replace(&mut self.outbound, Outbound::Idle) {
            Outbound::OfferSent { to, file } if &to == from => {
                let progress = UploadProgress::new(file.size);
                self.outbound = Outbound::Transferring(ActiveUpload {
                    id,
                    to,
                    file,
                    progress,
                    started: Instant::now(),
                });
                match &self.outbound {
                    Outbound::Transferring(upload) => Ok(upload),
                    _ => Err(Error::Internal("outbound lane not transferring".into())),
                }
            }
            other => {
                self.outbound = other;
                Err(Error::InvalidTransition {
                    event: "accept",
                    phase,
                })
            }
        }
    }

    /// End the upload `id`, returning it. Other ids are rejected.
    pub fn finish_upload(&mut self, id: UploadId) -> Result<ActiveUpload> {
        let phase = self.outbound_phase();
        match std::mem::replace(&mut self.outbound, Outbound::Idle) {
            Outbound::Transferring(upload) if upload.id == id => Ok(upload),
            other => {
                self.outbound = other;
                Err(Error::InvalidTransition {
                    event: "upload finished",
                    phase,
                })
            }
        }
    }

    /// Store an inbound offer, replacing any unanswered one.
    ///
    /// Returns the replaced offer, if any.
    pub fn receive_offer(&mut self, offer: TransferOffer) -> Option<TransferOffer> {
        match std::mem::replace(&mut self.inbound, Inbound::OfferPending(offer)) {
            Inbound::OfferPending(previous) => Some(previous),
            Inbound::Idle | Inbound::Receiving { .. } => None,
        }
    }

    /// Consume the pending offer. Accepting moves the lane to Receiving.
    pub fn take_offer(&mut self, accept: bool) -> Result<TransferOffer> {
        let phase = self.inbound_phase();
        match std::mem::replace(&mut self.inbound, Inbound::Idle) {
            Inbound::OfferPending(offer) => {
                if accept {
                    self.inbound = Inbound::Receiving {
                        from: offer.from.clone(),
                    };
                }
                Ok(offer)
            }
            other => {
                self.inbound = other;
                Err(Error::InvalidTransition {
                    event: "respond",
                    phase,
                })
            }
        }
    }

    /// Leave the Receiving phase after a completion notification.
    ///
    /// Returns the sender we were receiving from, if any.
    pub fn finish_receiving(&mut self) -> Option<ClientId> {
        match std::mem::replace(&mut self.inbound, Inbound::Idle) {
            Inbound::Receiving { from } => Some(from),
            other => {
                self.inbound = other;
                None
            }
        }
    }
}
