// src/error.rs
// Standardized error taxonomy for Slunk (spec §7).

use thiserror::Error;

/// Main error type for the Slunk library.
///
/// Each variant maps onto one row of the error taxonomy in spec §7; the
/// policy (retry / surface / halt) lives with the caller that produced the
/// error, not on the error type itself.
#[derive(Error, Debug)]
pub enum SlunkError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("accessibility tree unavailable: {0}")]
    TreeUnavailable(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("server busy: {0}")]
    Busy(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("store error (retryable): {0}")]
    StoreTransient(String),

    #[error("store error (fatal): {0}")]
    StoreFatal(String),

    #[error("embedding failure: {0}")]
    EmbedFailure(String),

    #[error("store not ready: {0}")]
    NotReady(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("task cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience alias for `Result<T, SlunkError>`.
pub type Result<T> = std::result::Result<T, SlunkError>;

impl SlunkError {
    /// The numeric domain code used on the JSON-RPC error surface (spec §6).
    pub fn code(&self) -> i64 {
        match self {
            SlunkError::InvalidInput(_) => -32602,
            SlunkError::Busy(_) => 1001,
            SlunkError::Timeout(_) => 1002,
            SlunkError::NotReady(_) => 1003,
            SlunkError::TreeUnavailable(_) => 1004,
            SlunkError::EmbedFailure(_) => 1005,
            SlunkError::StoreFatal(_) => 1006,
            SlunkError::StoreTransient(_) => 1007,
            _ => -32603,
        }
    }

    /// One-line cause, safe to show to a caller.
    pub fn to_user_string(&self) -> String {
        self.to_string()
    }

    /// One to three suggested next actions, per spec §7.
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            SlunkError::InvalidInput(_) => vec!["check the argument types and ranges"],
            SlunkError::TreeUnavailable(_) => {
                vec!["retry on the next observation tick", "confirm the chat app is focused"]
            }
            SlunkError::Timeout(_) => vec!["retry the request", "narrow the query or filters"],
            SlunkError::Busy(_) => vec!["retry after a short delay"],
            SlunkError::StoreTransient(_) => vec!["retry the request"],
            SlunkError::StoreFatal(_) => {
                vec!["stop ingestion", "run `slunk index` to rebuild the store"]
            }
            SlunkError::EmbedFailure(_) => {
                vec!["the message is retained and will be retried in the background"]
            }
            SlunkError::NotReady(_) => vec!["retry in a few seconds"],
            _ => vec!["retry the request"],
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        SlunkError::InvalidInput(msg.into())
    }
}

impl From<tokio::task::JoinError> for SlunkError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            SlunkError::Cancelled
        } else {
            SlunkError::Anyhow(anyhow::anyhow!(err.to_string()))
        }
    }
}

impl From<SlunkError> for String {
    fn from(err: SlunkError) -> Self {
        err.to_string()
    }
}
