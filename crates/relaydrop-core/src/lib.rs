//! # Relaydrop Core Library
//!
//! `relaydrop-core` lets a set of clients connected to the same relay server
//! find each other and hand a file from one client to another.
//!
//! Two independent transports are involved:
//!
//! - **Presence channel**: a persistent WebSocket (`/ws`) carrying presence
//!   lists, offers, accepts and completion notifications as JSON frames.
//! - **Bulk transfer endpoint**: plain HTTP (`/stream`); the sender `POST`s
//!   the file bytes, the receiver `GET`s them.
//!
//! The two never share a request identifier. Everything in this crate is
//! about keeping the small negotiation state machine honest across them.
//!
//! ## Modules
//!
//! - [`channel`] - Presence channel connection and typed events
//! - [`client`] - The single-task event loop driving a session
//! - [`config`] - Configuration management
//! - [`display`] - Status line and presentation collaborators
//! - [`error`] - Error types
//! - [`mod@file`] - File selection, naming and size formatting
//! - [`history`] - Transfer history tracking and persistence
//! - [`negotiate`] - Offer / accept negotiation
//! - [`protocol`] - Presence channel wire format
//! - [`reconcile`] - Completion notifications and status reset
//! - [`session`] - Session context and per-direction state machine
//! - [`tls`] - TLS client configuration for self-signed relays
//! - [`transfer`] - Bulk upload and download over the transfer endpoint
//!
//! ## Example
//!
//! ```rust,ignore
//! use relaydrop_core::channel::{PresenceChannel, RelayEndpoints};
//! use relaydrop_core::client::Client;
//!
//! let endpoints = RelayEndpoints::parse(&config.relay.url)?;
//! let (handle, events) = PresenceChannel::connect(&endpoints, &config.relay).await?;
//! let client = Client::new(&config, endpoints, collaborators_for(handle), None);
//! client.run(events, commands).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod channel;
pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod file;
pub mod history;
pub mod negotiate;
pub mod protocol;
pub mod reconcile;
pub mod session;
pub mod tls;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default relay base URL
pub const DEFAULT_RELAY_URL: &str = "https://localhost:8080";

/// Path of the presence channel on the relay
pub const PRESENCE_PATH: &str = "/ws";

/// Path of the bulk transfer endpoint on the relay
pub const TRANSFER_PATH: &str = "/stream";

/// Default chunk size for streaming uploads (1 MB, the relay's copy buffer)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Delay before the status resets after a `complete` notification
pub const DEFAULT_SENDER_RESET_DELAY_MS: u64 = 4000;

/// Delay before the status resets after a `done` notification
pub const DEFAULT_RECEIVER_RESET_DELAY_MS: u64 = 3000;

/// Default timeout for the presence channel handshake in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
