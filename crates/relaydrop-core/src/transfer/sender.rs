//! Sending side of a transfer.
//!
//! Once the peer accepts, the staged file is POSTed to
//! `/stream?to=<peer>&name=<file>&size=<bytes>`. The request's own
//! completion only means the relay has taken the body; delivery is
//! confirmed later by a `complete` notification on the presence channel.

use reqwest::Url;
use tokio::sync::mpsc;

use super::{UploadEvent, UploadId, UploadRequest, Uploader};
use crate::channel::RelayEndpoints;
use crate::display::{Status, StatusDisplay};
use crate::error::{Error, Result};
use crate::history::{Journal, TransferDirection, TransferHistoryEntry};
use crate::session::{ActiveUpload, ClientId, SessionContext};

/// Dispatches uploads and folds their events back into the session.
#[derive(Debug)]
pub struct TransferSender {
    endpoints: RelayEndpoints,
    events: mpsc::UnboundedSender<UploadEvent>,
    journal: Option<Journal>,
    last_id: u64,
}

impl TransferSender {
    /// Create a sender whose uploads report into `events`.
    pub fn new(
        endpoints: RelayEndpoints,
        events: mpsc::UnboundedSender<UploadEvent>,
        journal: Option<Journal>,
    ) -> Self {
        Self {
            endpoints,
            events,
            journal,
            last_id: 0,
        }
    }

    /// Upload URL for a file addressed to `to`.
    pub fn upload_url(&self, to: &ClientId, name: &str, size: u64) -> Url {
        let mut url = self.endpoints.transfer_url().clone();
        url.query_pairs_mut()
            .append_pair("to", to.as_str())
            .append_pair("name", name)
            .append_pair("size", &size.to_string());
        url
    }

    /// Start uploading the file staged for `target`.
    ///
    /// Without a file staged for `target` nothing happens and an
    /// [`Error::InvalidTransition`] is returned.
    pub fn upload(
        &mut self,
        session: &mut SessionContext,
        uploader: &mut dyn Uploader,
        display: &mut dyn StatusDisplay,
        target: &ClientId,
    ) -> Result<UploadId> {
        let id = UploadId(self.last_id + 1);
        let upload = session.begin_upload(target, id)?;
        self.last_id = id.0;

        let percent = upload.progress.percent();
        let request = UploadRequest {
            id,
            url: self.upload_url(&upload.to, &upload.file.name, upload.file.size),
            to: upload.to.clone(),
            file: upload.file.clone(),
        };

        tracing::info!(%id, to = %request.to, file = %request.file.name, "Starting upload");

        display.progress(percent);
        display.status(&Status::Sending(percent));
        uploader.start(request, self.events.clone());
        Ok(id)
    }

    /// Apply an event from a running upload.
    ///
    /// Events whose id is not the active upload's are rejected without
    /// touching the session or the display.
    pub fn on_event(
        &mut self,
        session: &mut SessionContext,
        display: &mut dyn StatusDisplay,
        event: UploadEvent,
    ) -> Result<()> {
        match event {
            UploadEvent::Progress { id, sent, .. } => {
                let phase = session.outbound_phase();
                let upload = session
                    .active_upload_mut()
                    .filter(|upload| upload.id == id)
                    .ok_or(Error::InvalidTransition {
                        event: "upload progress",
                        phase,
                    })?;
                let percent = upload.progress.advance(sent);
                display.progress(percent);
                display.status(&Status::Sending(percent));
            }
            UploadEvent::Finished { id } => {
                let mut upload = session.finish_upload(id)?;
                tracing::info!(%id, to = %upload.to, "Upload accepted by relay");
                display.progress(upload.progress.advance(upload.file.size));
                display.status(&Status::EnRoute);
                self.record(&upload, None);
            }
            UploadEvent::Failed { id, error } => {
                let upload = session.finish_upload(id)?;
                tracing::warn!(%id, to = %upload.to, error = %error, "Upload failed");
                display.hide_progress();
                display.status(&Status::UploadFailed);
                self.record(&upload, Some(error));
            }
        }
        Ok(())
    }

    fn record(&self, upload: &ActiveUpload, error: Option<String>) {
        let Some(journal) = &self.journal else {
            return;
        };
        let entry = TransferHistoryEntry::new(
            TransferDirection::Sent,
            upload.to.clone(),
            upload.file.name.clone(),
            upload.file.size,
        )
        .with_bytes(upload.progress.sent());
        let entry = match error {
            Some(error) => entry.with_error(error),
            None => entry,
        };
        journal.record(entry.started(upload.started.elapsed()));
    }
}
