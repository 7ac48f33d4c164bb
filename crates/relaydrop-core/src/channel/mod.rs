//! Presence channel connection.
//!
//! One WebSocket per client, opened once at startup. A reader task turns
//! text frames into [`ChannelEvent`]s, delivered in arrival order on an
//! unbounded receiver; a writer task serializes outbound
//! [`ClientMessage`]s. There is no reconnection: when the relay drops the
//! socket the event receiver ends and the client goes quiet.

use futures::{SinkExt, Stream, StreamExt};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::Connector;

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::protocol::{self, ChannelEvent, ClientMessage};

/// URLs of the two relay endpoints, derived from one base URL.
///
/// The presence channel is secure exactly when the transfer endpoint is:
/// `https` ⇒ `wss`, `http` ⇒ `ws`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEndpoints {
    presence: Url,
    transfer: Url,
}

impl RelayEndpoints {
    /// Derive both endpoints from a relay base URL.
    ///
    /// Accepts `http`, `https`, `ws` and `wss` bases; any path on the base
    /// is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRelayUrl`] for unparsable URLs or other schemes.
    pub fn parse(base: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidRelayUrl {
            url: base.to_string(),
            reason,
        };

        let parsed = Url::parse(base.trim()).map_err(|e| invalid(e.to_string()))?;
        if parsed.host_str().is_none() {
            return Err(invalid("missing host".into()));
        }

        let (http_scheme, ws_scheme) = match parsed.scheme() {
            "https" | "wss" => ("https", "wss"),
            "http" | "ws" => ("http", "ws"),
            other => return Err(invalid(format!("unsupported scheme '{other}'"))),
        };

        let mut transfer = parsed.clone();
        transfer
            .set_scheme(http_scheme)
            .map_err(|()| invalid("cannot use http scheme".into()))?;
        transfer.set_path(crate::TRANSFER_PATH);
        transfer.set_query(None);
        transfer.set_fragment(None);

        let mut presence = parsed;
        presence
            .set_scheme(ws_scheme)
            .map_err(|()| invalid("cannot use ws scheme".into()))?;
        presence.set_path(crate::PRESENCE_PATH);
        presence.set_query(None);
        presence.set_fragment(None);

        Ok(Self { presence, transfer })
    }

    /// Presence channel URL (`ws(s)://host/ws`).
    pub fn presence_url(&self) -> &Url {
        &self.presence
    }

    /// Bulk transfer endpoint URL (`http(s)://host/stream`), without query.
    pub fn transfer_url(&self) -> &Url {
        &self.transfer
    }

    /// Whether both channels use TLS.
    pub fn is_secure(&self) -> bool {
        self.transfer.scheme() == "https"
    }
}

/// Outbound side of the presence channel.
pub trait Outbox: Send {
    /// Queue a message for the relay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] once the connection is gone.
    fn send(&mut self, message: ClientMessage) -> Result<()>;
}

/// Handle for sending on an open presence channel.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    outgoing: mpsc::UnboundedSender<ClientMessage>,
}

impl Outbox for ChannelHandle {
    fn send(&mut self, message: ClientMessage) -> Result<()> {
        tracing::debug!(kind = message.kind(), "Queueing presence message");
        self.outgoing
            .send(message)
            .map_err(|_| Error::ChannelClosed)
    }
}

/// Connector for the persistent relay connection.
#[derive(Debug)]
pub struct PresenceChannel;

impl PresenceChannel {
    /// Open the presence channel.
    ///
    /// Returns the send handle and the receiver of typed events. The
    /// receiver yields `None` once the relay closes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake fails or exceeds
    /// `config.connect_timeout`.
    pub async fn connect(
        endpoints: &RelayEndpoints,
        config: &RelayConfig,
    ) -> Result<(ChannelHandle, mpsc::UnboundedReceiver<ChannelEvent>)> {
        let url = endpoints.presence_url().as_str();

        crate::tls::install_crypto_provider();
        let connector = if endpoints.is_secure() && config.accept_invalid_certs {
            Some(Connector::Rustls(crate::tls::insecure_client_config()?))
        } else {
            None
        };

        tracing::info!(url, "Connecting to relay");

        let handshake =
            tokio_tungstenite::connect_async_tls_with_config(url, None, false, connector);
        let (stream, _response) = tokio::time::timeout(config.connect_timeout, handshake)
            .await
            .map_err(|_| Error::Timeout(config.connect_timeout.as_secs()))?
            .map_err(|e| Error::ConnectFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(url, "Presence channel open");

        let (write_half, read_half) = stream.split();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(write_loop(write_half, outgoing_rx));
        tokio::spawn(read_loop(read_half, events_tx));

        Ok((
            ChannelHandle {
                outgoing: outgoing_tx,
            },
            events_rx,
        ))
    }
}

async fn write_loop<S>(mut sink: S, mut outgoing: mpsc::UnboundedReceiver<ClientMessage>)
where
    S: futures::Sink<Message, Error = tungstenite::Error> + Unpin,
{
    while let Some(message) = outgoing.recv().await {
        match protocol::encode_frame(&message) {
            Ok(text) => {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::warn!(error = %e, "Presence channel write failed");
                    break;
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode presence message"),
        }
    }

    let _ = sink.close().await;
}

async fn read_loop<S>(mut stream: S, events: mpsc::UnboundedSender<ChannelEvent>)
where
    S: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Presence channel read failed");
                break;
            }
        };

        match message {
            Message::Text(text) => match protocol::decode_frame(&text) {
                Ok(event) => {
                    tracing::trace!(kind = event.kind(), "Presence event");
                    if events.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::debug!(error = %e, "Ignoring presence frame"),
            },
            Message::Binary(_) => tracing::debug!("Ignoring binary presence frame"),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }

    tracing::info!("Presence channel closed");
}
