use shared::error::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("unauthorized: session cleared")]
    Unauthorized,
    #[error("server returned {status}: {message}")]
    Status {
        status: u16,
        code: ErrorCode,
        message: String,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("failed to read local file: {0}")]
    Io(#[from] std::io::Error),
    #[error("session storage failed: {0}")]
    Storage(String),
}

impl ApiClientError {
    /// Message suitable for a user-facing notice. Server-provided messages
    /// win over transport details.
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { message, .. } => message.clone(),
            Self::Validation(message) => message.clone(),
            Self::Unauthorized => "Session expired; please log in again".to_string(),
            Self::NotLoggedIn => "Please log in first".to_string(),
            _ => "Something went wrong".to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("refusing to send an empty message")]
    EmptyMessage,
    #[error("chat session is not connected")]
    NotConnected,
    #[error("chat session is closed")]
    Closed,
}
