//! Recording collaborators for unit tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::channel::Outbox;
use crate::client::Collaborators;
use crate::display::{Notifier, Status, StatusDisplay};
use crate::error::{Error, Result};
use crate::file::{FileSelector, StagedFile};
use crate::protocol::ClientMessage;
use crate::session::{ClientId, PresenceList, TransferOffer};
use crate::transfer::{DownloadAgent, DownloadRequest, UploadEvent, UploadRequest, Uploader};

pub fn staged(name: &str, size: u64) -> StagedFile {
    StagedFile {
        name: name.to_string(),
        size,
        path: PathBuf::from(name),
    }
}

pub fn offer(from: &str, to: &str, name: &str, size: u64) -> TransferOffer {
    TransferOffer {
        from: from.into(),
        to: to.into(),
        name: name.to_string(),
        size,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shown {
    Status(Status),
    Progress(u8),
    HideProgress,
    Presence(Vec<ClientId>),
    Offer(TransferOffer),
    DismissOffer,
    Notice(String),
}

#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    log: Arc<Mutex<Vec<Shown>>>,
}

impl RecordingDisplay {
    pub fn take(&self) -> Vec<Shown> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    pub fn last_status(&self) -> Option<Status> {
        self.log.lock().unwrap().iter().rev().find_map(|shown| match shown {
            Shown::Status(status) => Some(status.clone()),
            _ => None,
        })
    }

    fn push(&self, shown: Shown) {
        self.log.lock().unwrap().push(shown);
    }
}

impl StatusDisplay for RecordingDisplay {
    fn status(&mut self, status: &Status) {
        self.push(Shown::Status(status.clone()));
    }

    fn progress(&mut self, percent: u8) {
        self.push(Shown::Progress(percent));
    }

    fn hide_progress(&mut self) {
        self.push(Shown::HideProgress);
    }

    fn presence(&mut self, _me: Option<&ClientId>, list: &PresenceList) {
        self.push(Shown::Presence(list.iter().cloned().collect()));
    }

    fn offer(&mut self, offer: &TransferOffer) {
        self.push(Shown::Offer(offer.clone()));
    }

    fn dismiss_offer(&mut self) {
        self.push(Shown::DismissOffer);
    }

    fn notice(&mut self, message: &str) {
        self.push(Shown::Notice(message.to_string()));
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingOutbox {
    sent: Arc<Mutex<Vec<ClientMessage>>>,
    closed: bool,
}

impl RecordingOutbox {
    pub fn closed() -> Self {
        Self {
            sent: Arc::default(),
            closed: true,
        }
    }

    pub fn take(&self) -> Vec<ClientMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl Outbox for RecordingOutbox {
    fn send(&mut self, message: ClientMessage) -> Result<()> {
        if self.closed {
            return Err(Error::ChannelClosed);
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingUploader {
    started: Arc<Mutex<Vec<UploadRequest>>>,
}

impl RecordingUploader {
    pub fn take(&self) -> Vec<UploadRequest> {
        std::mem::take(&mut *self.started.lock().unwrap())
    }
}

impl Uploader for RecordingUploader {
    fn start(&mut self, request: UploadRequest, _events: mpsc::UnboundedSender<UploadEvent>) {
        self.started.lock().unwrap().push(request);
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingDownloader {
    started: Arc<Mutex<Vec<DownloadRequest>>>,
}

impl RecordingDownloader {
    pub fn take(&self) -> Vec<DownloadRequest> {
        std::mem::take(&mut *self.started.lock().unwrap())
    }
}

impl DownloadAgent for RecordingDownloader {
    fn start(&mut self, request: DownloadRequest) {
        self.started.lock().unwrap().push(request);
    }
}

#[derive(Debug, Clone, Default)]
pub struct CountingNotifier {
    plays: Arc<AtomicUsize>,
    broken: bool,
}

impl CountingNotifier {
    pub fn broken() -> Self {
        Self {
            plays: Arc::default(),
            broken: true,
        }
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl Notifier for CountingNotifier {
    fn play(&mut self) -> std::io::Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            Err(std::io::Error::other("no audio device"))
        } else {
            Ok(())
        }
    }
}

/// Selects a fixed file regardless of the suggestion.
#[derive(Debug, Clone, Default)]
pub struct FixedSelector(pub Option<StagedFile>);

impl FileSelector for FixedSelector {
    fn select(&mut self, _suggested: Option<&Path>) -> Result<Option<StagedFile>> {
        Ok(self.0.clone())
    }
}

/// One recorder per collaborator, shared with the boxes handed to the code
/// under test.
#[derive(Debug, Clone, Default)]
pub struct Fakes {
    pub outbox: RecordingOutbox,
    pub uploader: RecordingUploader,
    pub downloader: RecordingDownloader,
    pub display: RecordingDisplay,
    pub notifier: CountingNotifier,
}

impl Fakes {
    pub fn collaborators(&self, selected: Option<StagedFile>) -> Collaborators {
        Collaborators {
            outbox: Box::new(self.outbox.clone()),
            selector: Box::new(FixedSelector(selected)),
            uploader: Box::new(self.uploader.clone()),
            downloader: Box::new(self.downloader.clone()),
            display: Box::new(self.display.clone()),
            notifier: Box::new(self.notifier.clone()),
        }
    }
}
