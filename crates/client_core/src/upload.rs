use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::{multipart, Body, Client, StatusCode};
use shared::protocol::IngestResponse;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    error::UploadError, progress, ClientEvent, PDF_EXTENSION, PDF_MEDIA_TYPE, UPLOAD_CHUNK_SIZE,
};

const GENERIC_FAILURE_MESSAGE: &str = "Upload failed.";

/// A document picked for ingestion: the declared name and media type plus the
/// full payload.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub filename: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UploadState {
    #[default]
    Idle,
    InProgress {
        percent: u8,
    },
    Failed {
        message: String,
    },
}

impl UploadState {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, UploadState::InProgress { .. })
    }
}

pub struct UploadController {
    http: Client,
    ingest_url: String,
    state: Arc<Mutex<UploadState>>,
    events: broadcast::Sender<ClientEvent>,
}

impl UploadController {
    pub(crate) fn new(
        http: Client,
        ingest_url: String,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            http,
            ingest_url,
            state: Arc::new(Mutex::new(UploadState::Idle)),
            events,
        }
    }

    pub fn state(&self) -> UploadState {
        lock_state(&self.state).clone()
    }

    /// Validates the picked document and, when it passes, streams it to the
    /// ingestion endpoint. Validation failures never touch the network.
    pub async fn select_document(&self, upload: DocumentUpload) -> Result<(), UploadError> {
        if self.state().is_in_progress() {
            return Err(UploadError::AlreadyInProgress);
        }

        // A fresh pick clears whatever the previous attempt left behind.
        self.clear_failure();

        if !is_supported_pdf(&upload) {
            let err = UploadError::UnsupportedFile;
            self.set_state(UploadState::Failed {
                message: err.to_string(),
            });
            return Err(err);
        }

        self.start_upload(upload).await
    }

    async fn start_upload(&self, upload: DocumentUpload) -> Result<(), UploadError> {
        {
            let mut state = lock_state(&self.state);
            if state.is_in_progress() {
                return Err(UploadError::AlreadyInProgress);
            }
            *state = UploadState::InProgress { percent: 0 };
        }
        let _ = self
            .events
            .send(ClientEvent::UploadStateChanged(UploadState::InProgress {
                percent: 0,
            }));
        let _ = self.events.send(ClientEvent::LoadingChanged(true));
        info!(
            filename = %upload.filename,
            size_bytes = upload.bytes.len(),
            "upload: transfer started"
        );

        // The guard releases the loading collaborator and leaves `InProgress`
        // on every exit path, early drops included.
        let _finish = TransferReset { controller: self };
        let outcome = self.transfer(upload).await;
        match &outcome {
            Ok(()) => self.set_state(UploadState::Idle),
            Err(err) => {
                warn!("upload: transfer failed: {err}");
                self.set_state(UploadState::Failed {
                    message: err.to_string(),
                });
            }
        }
        outcome
    }

    async fn transfer(&self, upload: DocumentUpload) -> Result<(), UploadError> {
        let DocumentUpload {
            filename,
            media_type,
            bytes,
        } = upload;
        let total = bytes.len() as u64;

        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let stream = progress::chunked_with_progress(bytes, UPLOAD_CHUNK_SIZE, move |sent, total| {
            record_progress(&state, &events, sent, total);
        });

        let part = multipart::Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(filename)
            .mime_str(&media_type)
            .map_err(|err| {
                warn!("upload: media type not usable for a multipart part: {err}");
                UploadError::UnsupportedFile
            })?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(&self.ingest_url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                warn!("upload: transport failure: {err}");
                UploadError::Transport
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            warn!("upload: failed to read response body: {err}");
            UploadError::Transport
        })?;

        classify_completion(status, &body)
    }

    fn clear_failure(&self) {
        let mut state = lock_state(&self.state);
        if matches!(*state, UploadState::Failed { .. }) {
            *state = UploadState::Idle;
            drop(state);
            let _ = self
                .events
                .send(ClientEvent::UploadStateChanged(UploadState::Idle));
        }
    }

    fn set_state(&self, next: UploadState) {
        {
            let mut state = lock_state(&self.state);
            if *state == next {
                return;
            }
            *state = next.clone();
        }
        let _ = self.events.send(ClientEvent::UploadStateChanged(next));
    }
}

struct TransferReset<'a> {
    controller: &'a UploadController,
}

impl Drop for TransferReset<'_> {
    fn drop(&mut self) {
        {
            let mut state = lock_state(&self.controller.state);
            if state.is_in_progress() {
                *state = UploadState::Idle;
                drop(state);
                let _ = self
                    .controller
                    .events
                    .send(ClientEvent::UploadStateChanged(UploadState::Idle));
            }
        }
        let _ = self
            .controller
            .events
            .send(ClientEvent::LoadingChanged(false));
    }
}

fn is_supported_pdf(upload: &DocumentUpload) -> bool {
    upload.filename.to_ascii_lowercase().ends_with(PDF_EXTENSION)
        && upload.media_type == PDF_MEDIA_TYPE
}

/// Maps the ingestion endpoint's terminal response onto the error taxonomy.
/// An empty body counts as an empty JSON object per the service contract.
fn classify_completion(status: StatusCode, body: &str) -> Result<(), UploadError> {
    let body = body.trim();
    let parsed: IngestResponse = if body.is_empty() {
        IngestResponse::default()
    } else {
        serde_json::from_str(body).map_err(|_| UploadError::UnexpectedResponse)?
    };

    match parsed.error {
        Some(message) => Err(UploadError::Rejected(message)),
        None if status.is_success() => Ok(()),
        None => Err(UploadError::Rejected(GENERIC_FAILURE_MESSAGE.to_string())),
    }
}

fn record_progress(
    state: &Mutex<UploadState>,
    events: &broadcast::Sender<ClientEvent>,
    sent: u64,
    total: u64,
) {
    if total == 0 {
        return;
    }
    let percent = progress::percent_of(sent, total);
    let mut guard = lock_state(state);
    if let UploadState::InProgress { percent: current } = &*guard {
        // The transport reports cumulative counts; never regress on replays.
        if percent > *current {
            *guard = UploadState::InProgress { percent };
            drop(guard);
            let _ = events.send(ClientEvent::UploadStateChanged(UploadState::InProgress {
                percent,
            }));
        }
    }
}

fn lock_state(state: &Mutex<UploadState>) -> MutexGuard<'_, UploadState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;
