//! Common test utilities for `Relaydrop` integration tests.
//!
//! Provides an in-process relay on a loopback port and a display that
//! forwards everything it is shown to the test.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use relaydrop_core::config::Config;
use relaydrop_core::display::{Status, StatusDisplay};
use relaydrop_core::session::{ClientId, PresenceList, TransferOffer};

/// How long any single wait in a test may take.
pub const WAIT: Duration = Duration::from_secs(10);

/// Create a temporary directory for test files.
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a test file with the given content.
pub fn create_test_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Deterministic non-repeating-looking content.
pub fn patterned_bytes(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 31 % 251) as u8).collect()
}

/// Client configuration pointing at `relay`.
pub fn test_config(relay: &TestRelay, download_dir: &Path) -> Config {
    let mut config = Config::default();
    config.relay.url = relay.base_url();
    config.relay.accept_invalid_certs = false;
    config.relay.connect_timeout = Duration::from_secs(5);
    config.transfer.chunk_size = 64 * 1024;
    config.transfer.download_dir = Some(download_dir.to_path_buf());
    config.ui.sound = false;
    config
}

// ============================================================================
// In-process relay
// ============================================================================

#[derive(Default)]
struct Pipe {
    tx: Option<mpsc::Sender<Bytes>>,
    rx: Option<mpsc::Receiver<Bytes>>,
}

impl Pipe {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel(16);
        Self {
            tx: Some(tx),
            rx: Some(rx),
        }
    }
}

#[derive(Clone, Default)]
struct RelayState {
    clients: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<String>>>>,
    pipes: Arc<Mutex<HashMap<String, Pipe>>>,
    next_id: Arc<AtomicU32>,
}

impl RelayState {
    fn broadcast(&self) {
        let clients = self.clients.lock().unwrap();
        let mut users: Vec<&String> = clients.keys().collect();
        users.sort();
        let frame = serde_json::json!({"type": "list", "users": users}).to_string();
        for tx in clients.values() {
            let _ = tx.send(frame.clone());
        }
    }

    fn send_to(&self, id: &str, frame: String) {
        if let Some(tx) = self.clients.lock().unwrap().get(id) {
            let _ = tx.send(frame);
        }
    }

    fn take_sender(&self, to: &str) -> Option<mpsc::Sender<Bytes>> {
        let mut pipes = self.pipes.lock().unwrap();
        pipes.entry(to.to_string()).or_insert_with(Pipe::new).tx.take()
    }

    fn take_receiver(&self, to: &str) -> Option<mpsc::Receiver<Bytes>> {
        let mut pipes = self.pipes.lock().unwrap();
        pipes.entry(to.to_string()).or_insert_with(Pipe::new).rx.take()
    }
}

/// Serve `app` on an ephemeral loopback port.
pub async fn serve(app: Router) -> (SocketAddr, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind server");
    let addr = listener.local_addr().expect("server address");
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server failed");
    });
    (addr, server)
}

/// A relay serving `/ws` and `/stream` on a loopback port.
pub struct TestRelay {
    addr: SocketAddr,
    state: RelayState,
    server: JoinHandle<()>,
}

impl TestRelay {
    /// Start the relay on an ephemeral port.
    pub async fn start() -> Self {
        let state = RelayState::default();
        let app = Router::new()
            .route("/ws", get(presence))
            .route("/stream", get(download).post(upload))
            .with_state(state.clone());
        let (addr, server) = serve(app).await;

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL clients should be configured with.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Identities currently connected.
    pub fn connected(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.clients.lock().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Push a raw text frame to one client.
    pub fn inject(&self, id: &str, frame: &str) {
        self.state.send_to(id, frame.to_string());
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn presence(ws: WebSocketUpgrade, State(state): State<RelayState>) -> Response {
    ws.on_upgrade(move |socket| serve_client(socket, state))
}

async fn serve_client(socket: WebSocket, state: RelayState) {
    let id = format!("User-{:05}", state.next_id.fetch_add(1, Ordering::SeqCst) + 1);
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let _ = tx.send(serde_json::json!({"type": "welcome", "id": id}).to_string());
    state.clients.lock().unwrap().insert(id.clone(), tx);
    state.broadcast();

    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(mut fields) = serde_json::from_str::<HashMap<String, String>>(text.as_str()) else {
            continue;
        };
        let target = fields.get("to").cloned().unwrap_or_default();
        fields.insert("from".to_string(), id.clone());
        state.send_to(&target, serde_json::to_string(&fields).unwrap());
    }

    state.clients.lock().unwrap().remove(&id);
    state.broadcast();
    writer.abort();
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    #[serde(default)]
    to: String,
    #[serde(default)]
    from: String,
}

async fn upload(
    State(state): State<RelayState>,
    Query(query): Query<StreamQuery>,
    body: Body,
) -> StatusCode {
    let Some(tx) = state.take_sender(&query.to) else {
        return StatusCode::CONFLICT;
    };

    let mut chunks = body.into_data_stream();
    while let Some(chunk) = chunks.next().await {
        let Ok(chunk) = chunk else {
            return StatusCode::BAD_REQUEST;
        };
        if tx.send(chunk).await.is_err() {
            return StatusCode::GONE;
        }
    }
    StatusCode::OK
}

async fn download(State(state): State<RelayState>, Query(query): Query<StreamQuery>) -> Response {
    let Some(mut rx) = state.take_receiver(&query.to) else {
        return StatusCode::CONFLICT.into_response();
    };

    let mut data = Vec::new();
    while let Some(chunk) = rx.recv().await {
        data.extend_from_slice(&chunk);
    }
    state.pipes.lock().unwrap().remove(&query.to);

    let complete = serde_json::json!({"type": "complete"}).to_string();
    state.send_to(&query.from, complete.clone());
    state.send_to(&query.to, complete);

    ([(header::CONTENT_TYPE, "application/octet-stream")], data).into_response()
}

// ============================================================================
// Display probe
// ============================================================================

/// Something a client showed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Status(Status),
    Progress(u8),
    HideProgress,
    Presence(Vec<ClientId>),
    Offer(TransferOffer),
    DismissOffer,
    Notice(String),
}

/// A display forwarding every call to the test.
pub struct ProbeDisplay(mpsc::UnboundedSender<Seen>);

impl ProbeDisplay {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Seen>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

impl StatusDisplay for ProbeDisplay {
    fn status(&mut self, status: &Status) {
        let _ = self.0.send(Seen::Status(status.clone()));
    }

    fn progress(&mut self, percent: u8) {
        let _ = self.0.send(Seen::Progress(percent));
    }

    fn hide_progress(&mut self) {
        let _ = self.0.send(Seen::HideProgress);
    }

    fn presence(&mut self, _me: Option<&ClientId>, list: &PresenceList) {
        let _ = self.0.send(Seen::Presence(list.iter().cloned().collect()));
    }

    fn offer(&mut self, offer: &TransferOffer) {
        let _ = self.0.send(Seen::Offer(offer.clone()));
    }

    fn dismiss_offer(&mut self) {
        let _ = self.0.send(Seen::DismissOffer);
    }

    fn notice(&mut self, message: &str) {
        let _ = self.0.send(Seen::Notice(message.to_string()));
    }
}

/// Wait until the display shows something `pick` accepts, returning what it
/// extracted. Everything shown before that is returned too.
pub async fn wait_for<T>(
    seen: &mut mpsc::UnboundedReceiver<Seen>,
    mut pick: impl FnMut(&Seen) -> Option<T>,
) -> (T, Vec<Seen>) {
    let mut before = Vec::new();
    let found = tokio::time::timeout(WAIT, async {
        loop {
            let item = seen.recv().await.expect("display closed");
            if let Some(found) = pick(&item) {
                return found;
            }
            before.push(item);
        }
    })
    .await
    .expect("timed out waiting for display");
    (found, before)
}

/// Wait until `path` holds exactly `expected`.
pub async fn wait_for_file(path: &Path, expected: &[u8]) {
    tokio::time::timeout(WAIT, async {
        loop {
            if std::fs::read(path).is_ok_and(|data| data == expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("file never arrived");
}
