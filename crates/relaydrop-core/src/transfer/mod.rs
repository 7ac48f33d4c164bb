//! Bulk data plane.
//!
//! File bytes never touch the presence channel. Once an offer is accepted
//! the sender POSTs the file to the relay's `/stream` endpoint and the
//! receiver GETs it from the same endpoint; the relay pipes one into the
//! other.
//!
//! Uploads and downloads run in their own tasks. An upload reports back to
//! the client through [`UploadEvent`]s tagged with the [`UploadId`] it was
//! started with, so events from a superseded upload can be told apart.
//! Downloads report nothing back; their outcome goes to the history.

mod download;
mod http;
pub mod sender;

pub use download::DownloadRequest;
pub use http::{HttpDownloader, HttpUploader};
pub use sender::TransferSender;

use reqwest::Url;
use tokio::sync::mpsc;

use crate::file::StagedFile;
use crate::session::ClientId;

/// Local identifier of one upload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadId(pub u64);

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upload-{}", self.0)
    }
}

/// Progress of an upload request body.
///
/// The percentage is `floor(sent * 100 / total)` and never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    total: u64,
    sent: u64,
}

impl UploadProgress {
    /// Start tracking an upload of `total` bytes.
    pub const fn new(total: u64) -> Self {
        Self { total, sent: 0 }
    }

    /// Record that `sent` bytes have gone out and return the percentage.
    ///
    /// Reports that go backwards are ignored.
    pub fn advance(&mut self, sent: u64) -> u8 {
        self.sent = self.sent.max(sent);
        self.percent()
    }

    /// Current percentage, 0 to 100. An empty file is always at 100.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let percent = u128::from(self.sent.min(self.total)) * 100 / u128::from(self.total);
        u8::try_from(percent).unwrap_or(100)
    }

    /// Bytes reported so far.
    pub const fn sent(&self) -> u64 {
        self.sent
    }
}

/// What an [`Uploader`] needs to send one file.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Tag for every event this upload produces
    pub id: UploadId,
    /// Full `/stream?to=..&name=..&size=..` URL
    pub url: Url,
    /// Receiving client
    pub to: ClientId,
    /// File to send
    pub file: StagedFile,
}

/// Report from a running upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// Some of the body has been handed to the connection
    Progress {
        /// Upload reporting
        id: UploadId,
        /// Bytes sent so far
        sent: u64,
        /// Bytes expected
        total: u64,
    },
    /// The relay answered with a success status
    Finished {
        /// Upload reporting
        id: UploadId,
    },
    /// The request failed or the relay refused it
    Failed {
        /// Upload reporting
        id: UploadId,
        /// What went wrong
        error: String,
    },
}

impl UploadEvent {
    /// The upload this event belongs to.
    pub const fn id(&self) -> UploadId {
        match self {
            Self::Progress { id, .. } | Self::Finished { id } | Self::Failed { id, .. } => *id,
        }
    }
}

/// Upload collaborator.
///
/// `start` returns at once; the upload runs elsewhere and reports through
/// `events`, ending with exactly one `Finished` or `Failed`.
pub trait Uploader: Send {
    /// Begin sending `request.file` to `request.url`.
    fn start(&mut self, request: UploadRequest, events: mpsc::UnboundedSender<UploadEvent>);
}

/// Download collaborator. Fire and forget.
pub trait DownloadAgent: Send {
    /// Begin fetching the file described by `request`.
    fn start(&mut self, request: DownloadRequest);
}
