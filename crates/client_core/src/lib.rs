use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use shared::domain::Message;
use tokio::sync::broadcast;

mod chat;
pub mod error;
mod progress;
mod upload;

pub use chat::{ChatController, ChatSession};
pub use error::{AskError, UploadError};
pub use upload::{DocumentUpload, UploadController, UploadState};

/// Retrieval depth the answering protocol fixes; not user-configurable.
pub(crate) const ANSWER_TOP_K: u32 = 3;
pub const PDF_MEDIA_TYPE: &str = "application/pdf";
pub(crate) const PDF_EXTENSION: &str = ".pdf";
pub const DEFAULT_UPLOAD_PATH: &str = "/api/upload";
pub(crate) const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;
const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub upload_path: String,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            upload_path: DEFAULT_UPLOAD_PATH.to_string(),
        }
    }

    pub fn with_upload_path(mut self, upload_path: impl Into<String>) -> Self {
        self.upload_path = upload_path.into();
        self
    }
}

/// State transitions pushed to the presentation layer. Snapshots remain the
/// authority; events only announce what changed.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    MessageAppended(Message),
    ChatPendingChanged(bool),
    UploadStateChanged(UploadState),
    LoadingChanged(bool),
    Error(String),
}

/// Command surface handed to the presentation layer. Frontends hold this as a
/// trait object and never reach into controller internals.
#[async_trait]
pub trait ClientHandle: Send + Sync {
    async fn submit(&self, text: &str) -> Result<(), AskError>;
    async fn select_document(&self, upload: DocumentUpload) -> Result<(), UploadError>;
    fn chat_snapshot(&self) -> ChatSession;
    fn upload_state(&self) -> UploadState;
    fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent>;
}

pub struct AssistantClient {
    chat: ChatController,
    upload: UploadController,
    events: broadcast::Sender<ClientEvent>,
}

impl AssistantClient {
    pub fn new(config: ClientConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let http = Client::new();
        let server_url = config.server_url.trim_end_matches('/').to_string();
        let ingest_url = format!("{server_url}{}", config.upload_path);
        Arc::new(Self {
            chat: ChatController::new(http.clone(), server_url, events.clone()),
            upload: UploadController::new(http, ingest_url, events.clone()),
            events,
        })
    }

    pub fn chat(&self) -> &ChatController {
        &self.chat
    }

    pub fn upload(&self) -> &UploadController {
        &self.upload
    }
}

#[async_trait]
impl ClientHandle for AssistantClient {
    async fn submit(&self, text: &str) -> Result<(), AskError> {
        self.chat.submit(text).await
    }

    async fn select_document(&self, upload: DocumentUpload) -> Result<(), UploadError> {
        self.upload.select_document(upload).await
    }

    fn chat_snapshot(&self) -> ChatSession {
        self.chat.snapshot()
    }

    fn upload_state(&self) -> UploadState {
        self.upload.state()
    }

    fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
