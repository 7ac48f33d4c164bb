//! Presence channel wire format.
//!
//! Every WebSocket text frame carries one JSON object tagged by `type`:
//!
//! | type | direction | fields |
//! |------|-----------|--------|
//! | `welcome` | relay → client | `id` |
//! | `list` | relay → client | `users` (array, or `null` when empty) |
//! | `offer` | peer → peer | `to`, `name`, `size` (decimal string); relay adds `from` |
//! | `accept` | peer → peer | `to`; relay adds `from` |
//! | `complete` | relay → client | none |
//! | `done` | relay → client | none |
//!
//! The relay forwards peer messages as string maps, which is why `size`
//! travels as a string.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::session::{ClientId, TransferOffer};

/// Messages a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Propose sending a file
    Offer {
        /// Addressed client
        to: ClientId,
        /// File name
        name: String,
        /// File size in bytes, as a decimal string
        size: String,
    },
    /// Accept the offer from `to`
    Accept {
        /// The offering client
        to: ClientId,
    },
}

impl ClientMessage {
    /// Build an offer for `size` bytes.
    pub fn offer(to: ClientId, name: impl Into<String>, size: u64) -> Self {
        Self::Offer {
            to,
            name: name.into(),
            size: size.to_string(),
        }
    }

    /// Message type tag.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Accept { .. } => "accept",
        }
    }
}

/// Messages the relay delivers to a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Identity assignment
    Welcome {
        /// Our identity
        id: ClientId,
    },
    /// Full presence list
    List {
        /// Connected clients
        #[serde(default)]
        users: Option<Vec<ClientId>>,
    },
    /// Forwarded offer
    Offer {
        /// Offering client (set by the relay)
        from: ClientId,
        /// Addressed client
        #[serde(default)]
        to: Option<ClientId>,
        /// File name
        name: String,
        /// File size, decimal string
        size: String,
    },
    /// Forwarded accept
    Accept {
        /// Accepting client (set by the relay)
        from: ClientId,
    },
    /// Transfer finished (relay's view)
    Complete,
    /// Transfer finished (peer's view)
    Done,
    /// Any type this client does not know
    #[serde(other)]
    Unknown,
}

/// Typed event delivered by the presence channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Our identity
    Welcome {
        /// Assigned identity
        id: ClientId,
    },
    /// Presence list replacement
    Presence {
        /// Connected clients
        users: Vec<ClientId>,
    },
    /// Inbound offer
    Offer(TransferOffer),
    /// Peer accepted our offer
    Accept {
        /// Accepting client
        from: ClientId,
    },
    /// Completion notification, sender side
    Complete,
    /// Completion notification, receiver side
    Done,
}

impl ChannelEvent {
    /// Event name for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::Presence { .. } => "list",
            Self::Offer(_) => "offer",
            Self::Accept { .. } => "accept",
            Self::Complete => "complete",
            Self::Done => "done",
        }
    }
}

impl TryFrom<ServerMessage> for ChannelEvent {
    type Error = Error;

    fn try_from(message: ServerMessage) -> Result<Self> {
        match message {
            ServerMessage::Welcome { id } => Ok(Self::Welcome { id }),
            ServerMessage::List { users } => Ok(Self::Presence {
                users: users.unwrap_or_default(),
            }),
            ServerMessage::Offer {
                from,
                to,
                name,
                size,
            } => {
                let size = size.trim().parse::<u64>().map_err(|e| {
                    Error::ProtocolError(format!("offer size '{size}' is not a byte count: {e}"))
                })?;
                Ok(Self::Offer(TransferOffer {
                    from,
                    to: to.unwrap_or_else(|| ClientId::new("")),
                    name,
                    size,
                }))
            }
            ServerMessage::Accept { from } => Ok(Self::Accept { from }),
            ServerMessage::Complete => Ok(Self::Complete),
            ServerMessage::Done => Ok(Self::Done),
            ServerMessage::Unknown => Err(Error::ProtocolError("unknown message type".into())),
        }
    }
}

/// Serialize an outbound message into a text frame.
pub fn encode_frame(message: &ClientMessage) -> Result<String> {
    serde_json::to_string(message).map_err(Into::into)
}

/// Parse a text frame into a channel event.
///
/// # Errors
///
/// Returns [`Error::ProtocolError`] for invalid JSON, unknown types and
/// offers with a non-numeric size.
pub fn decode_frame(text: &str) -> Result<ChannelEvent> {
    let message: ServerMessage = serde_json::from_str(text)
        .map_err(|e| Error::ProtocolError(format!("undecodable frame: {e}")))?;
    ChannelEvent::try_from(message)
}
