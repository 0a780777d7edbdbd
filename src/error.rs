//! Client error type and failure classification

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, ClientError>;

/// Every failure the engine can observe
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP 404. Drives polling while a backend job is still running.
    #[error("Not found: {detail}")]
    NotFound { detail: String },

    /// Any other non-success response
    #[error("Server returned {status}: {detail}")]
    Http { status: StatusCode, detail: String },

    /// Transport-level failure (connection refused, timeout, ...)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body was not the JSON we expected
    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A body stream broke after it started
    #[error("Stream interrupted: {0}")]
    Stream(String),

    /// Local validation refused the value before any request was made
    #[error("Rejected: {0}")]
    Rejected(String),

    /// A guarded operation is already running
    #[error("Another operation is already in progress")]
    Busy,

    /// The media element refused an operation
    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// How a failure should be treated by callers that poll or retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Expected transient state while a backend job runs
    NotReady,
    /// The backend job failed and will not progress without a retry
    Terminal,
    /// Anything else; reported once, never retried automatically
    Unexpected,
}

/// Error body shape returned by the API (`{"detail": "..."}`)
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl ClientError {
    /// Build an error from a non-success status and its raw body
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let detail = extract_detail(body);
        if status == StatusCode::NOT_FOUND {
            ClientError::NotFound { detail }
        } else {
            ClientError::Http { status, detail }
        }
    }

    /// Classify against the terminal-failure keyword (case-insensitive)
    pub fn classify(&self, failure_keyword: &str) -> ErrorClass {
        match self {
            ClientError::NotFound { detail } => {
                if contains_keyword(detail, failure_keyword) {
                    ErrorClass::Terminal
                } else {
                    ErrorClass::NotReady
                }
            }
            _ => ErrorClass::Unexpected,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }

    /// Server-provided detail when there is one, otherwise the display text
    pub fn detail(&self) -> String {
        match self {
            ClientError::NotFound { detail } | ClientError::Http { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

fn contains_keyword(detail: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    detail.to_lowercase().contains(&keyword.to_lowercase())
}

fn extract_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { detail: serde_json::Value::String(s) }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => body.trim().to_string(),
    }
}
