use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            400 | 409 | 422 => Self::Validation,
            429 => Self::RateLimited,
            _ => Self::Internal,
        }
    }
}

/// Error document returned by the backend. Only `message` is reliably
/// present; some routes answer with an empty body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct ApiException {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiException {
    /// Builds an exception from an HTTP status and whatever body the server
    /// sent, falling back to the canonical reason phrase.
    pub fn from_response(status: u16, body: Option<ApiError>, fallback: &str) -> Self {
        let body = body.unwrap_or_default();
        Self {
            code: body.code.unwrap_or_else(|| ErrorCode::from_status(status)),
            message: body
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string()),
        }
    }
}
