//! Error types for Relaydrop.
//!
//! This module provides a unified error type for all Relaydrop operations,
//! with specific error variants for different failure modes.

use std::io;

use thiserror::Error;

use crate::session::SessionPhase;

/// A specialized `Result` type for Relaydrop operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Relaydrop.
#[derive(Error, Debug)]
pub enum Error {
    /// Relay URL could not be parsed or has an unsupported scheme
    #[error("invalid relay URL '{url}': {reason}")]
    InvalidRelayUrl {
        /// The URL as given
        url: String,
        /// Reason for rejection
        reason: String,
    },

    /// Presence channel handshake failed
    #[error("failed to connect to relay at {url}: {reason}")]
    ConnectFailed {
        /// Presence channel URL
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// Presence channel closed; the client does not reconnect
    #[error("presence channel closed by relay")]
    ChannelClosed,

    /// Malformed presence channel frame
    #[error("invalid protocol message: {0}")]
    ProtocolError(String),

    /// Event or operation not valid in the current session phase
    #[error("'{event}' is not valid while {phase}")]
    InvalidTransition {
        /// What was attempted
        event: &'static str,
        /// Phase of the lane at the time
        phase: SessionPhase,
    },

    /// Target is not in the current presence list
    #[error("peer '{0}' is not connected to the relay")]
    UnknownPeer(String),

    /// Attempted to send a file to ourselves
    #[error("cannot send a file to yourself")]
    SelfTarget,

    /// Operation needs the identity assigned by the relay
    #[error("no identity assigned by the relay yet")]
    NoIdentity,

    /// File not found
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Path is not a regular file
    #[error("not a regular file: {0}")]
    NotAFile(String),

    /// Bulk transfer request failed
    #[error("transfer request failed: {0}")]
    TransferFailed(String),

    /// Relay answered a transfer request with a non-success status
    #[error("relay returned HTTP {status} for {url}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Request URL (without query)
        url: String,
    },

    /// TLS configuration failed
    #[error("TLS error: {0}")]
    TlsError(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Reason for invalidity
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operation timeout
    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns whether the error is a silent no-op in the negotiation flow.
    ///
    /// Duplicate accepts, responses without a pending offer and similar
    /// stale inputs surface as these; callers log them at debug level.
    #[must_use]
    pub const fn is_stale_input(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }

    /// Returns a helpful suggestion for resolving the error, if applicable.
    #[must_use]
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ConnectFailed { .. } | Self::Timeout(_) => Some(
                "Check that the relay is running and reachable.\n\
                 Use --relay or RELAYDROP_RELAY to point at another relay.",
            ),
            Self::InvalidRelayUrl { .. } => Some(
                "Relay URLs look like https://host:8080 or ws://host:8080.",
            ),
            Self::ChannelClosed => Some(
                "The relay dropped the connection. Start relaydrop again to reconnect.",
            ),
            Self::UnknownPeer(_) => Some("Run 'peers' to list connected clients."),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::TransferFailed(err.without_url().to_string())
    }
}
