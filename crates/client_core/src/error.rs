use thiserror::Error;

/// Failure modes of a single chat exchange. All of them leave the controller
/// ready for the next submission.
#[derive(Debug, Error)]
pub enum AskError {
    #[error("a question is already awaiting an answer")]
    AlreadyPending,
    #[error("failed to reach the answering service: {0}")]
    Transport(reqwest::Error),
    #[error("answering service rejected the request: {0}")]
    Rejected(reqwest::Error),
    #[error("unexpected answer payload: {0}")]
    MalformedAnswer(reqwest::Error),
}

/// Failure modes of a document upload. The `Display` strings are what the
/// presentation layer shows, so they are phrased for end users.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("an upload is already in progress")]
    AlreadyInProgress,
    #[error("Only PDF files are supported.")]
    UnsupportedFile,
    #[error("Upload failed. Check your connection or server.")]
    Transport,
    #[error("Unexpected server response.")]
    UnexpectedResponse,
    #[error("{0}")]
    Rejected(String),
}
