//! reqwest implementations of the upload and download collaborators.

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;

use super::{DownloadAgent, DownloadRequest, UploadEvent, UploadRequest, Uploader};
use crate::config::{RelayConfig, TransferConfig};
use crate::error::{Error, Result};
use crate::file;
use crate::history::{Journal, TransferDirection, TransferHistoryEntry};

fn build_client(relay: &RelayConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(relay.accept_invalid_certs)
        .connect_timeout(relay.connect_timeout)
        .user_agent(concat!("relaydrop/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::TlsError(format!("Failed to build HTTP client: {e}")))
}

fn check_status(response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::HttpStatus {
            status: status.as_u16(),
            url: response.url().path().to_string(),
        })
    }
}

/// Streams files to the relay with `POST /stream`.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    chunk_size: usize,
}

impl HttpUploader {
    /// Build an uploader for the configured relay.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(relay: &RelayConfig, transfer: &TransferConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(relay)?,
            chunk_size: transfer.chunk_size.max(1),
        })
    }
}

impl Uploader for HttpUploader {
    fn start(&mut self, request: UploadRequest, events: mpsc::UnboundedSender<UploadEvent>) {
        let client = self.client.clone();
        let chunk_size = self.chunk_size;

        tokio::spawn(async move {
            let id = request.id;
            let outcome = post_file(&client, &request, chunk_size, &events).await;
            let event = match outcome {
                Ok(()) => UploadEvent::Finished { id },
                Err(e) => UploadEvent::Failed {
                    id,
                    error: e.to_string(),
                },
            };
            let _ = events.send(event);
        });
    }
}

async fn post_file(
    client: &reqwest::Client,
    request: &UploadRequest,
    chunk_size: usize,
    events: &mpsc::UnboundedSender<UploadEvent>,
) -> Result<()> {
    let source = tokio::fs::File::open(&request.file.path).await?;
    let id = request.id;
    let total = request.file.size;
    let progress = events.clone();
    let mut sent = 0u64;

    let body = ReaderStream::with_capacity(source, chunk_size).map(move |chunk| {
        if let Ok(bytes) = &chunk {
            sent += bytes.len() as u64;
            let _ = progress.send(UploadEvent::Progress { id, sent, total });
        }
        chunk
    });

    tracing::debug!(%id, to = %request.to, file = %request.file.name, total, "Uploading");

    let response = client
        .post(request.url.clone())
        .body(reqwest::Body::wrap_stream(body))
        .send()
        .await?;
    check_status(&response)
}

/// Fetches offered files with `GET /stream` into the download directory.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
    download_dir: PathBuf,
    journal: Option<Journal>,
}

impl HttpDownloader {
    /// Build a downloader writing into `download_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        relay: &RelayConfig,
        download_dir: PathBuf,
        journal: Option<Journal>,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(relay)?,
            download_dir,
            journal,
        })
    }
}

impl DownloadAgent for HttpDownloader {
    fn start(&mut self, request: DownloadRequest) {
        let client = self.client.clone();
        let dir = self.download_dir.clone();
        let journal = self.journal.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let entry = TransferHistoryEntry::new(
                TransferDirection::Received,
                request.from.clone(),
                request.name.clone(),
                request.size,
            );

            let entry = match fetch_file(&client, &request, &dir).await {
                Ok((path, written)) => {
                    tracing::info!(
                        from = %request.from,
                        path = %path.display(),
                        size = %file::format_bytes(written),
                        "File received"
                    );
                    entry.with_bytes(written).with_output_path(path)
                }
                Err(e) => {
                    tracing::warn!(from = %request.from, file = %request.name, error = %e, "Download failed");
                    entry.with_error(e.to_string())
                }
            };

            if let Some(journal) = journal {
                journal.record(entry.started(started.elapsed()));
            }
        });
    }
}

async fn fetch_file(
    client: &reqwest::Client,
    request: &DownloadRequest,
    dir: &Path,
) -> Result<(PathBuf, u64)> {
    let response = client.get(request.url.clone()).send().await?;
    check_status(&response)?;

    tokio::fs::create_dir_all(dir).await?;
    let (path, mut output) = create_output(dir, &request.name).await?;

    let mut body = response.bytes_stream();
    let mut written = 0u64;
    let copied: Result<()> = async {
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            output.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        output.flush().await?;
        Ok(())
    }
    .await;

    if let Err(e) = copied {
        drop(output);
        let _ = tokio::fs::remove_file(&path).await;
        return Err(e);
    }

    Ok((path, written))
}

/// Create a fresh file for `name` in `dir`, never reusing an existing one.
async fn create_output(dir: &Path, name: &str) -> Result<(PathBuf, tokio::fs::File)> {
    const ATTEMPTS: usize = 64;

    for _ in 0..ATTEMPTS {
        let path = file::unique_download_path(dir, name);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(output) => return Ok((path, output)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!(path = %path.display(), "Download name taken, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::Internal(format!(
        "no free file name for {name} in {}",
        dir.display()
    )))
}
