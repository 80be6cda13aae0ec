use reqwest::StatusCode;
use thiserror::Error;

use crate::retry::is_retryable_status;

/// All the ways a search can go wrong
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("API request failed with status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to fetch after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to fetch first page: {0}")]
    FirstPage(#[source] Box<Error>),

    #[error("Search was cancelled")]
    Cancelled,
}

impl Error {
    /// Whether another attempt at the same request could succeed.
    ///
    /// Transport failures and most non-2xx statuses are transient. Auth and
    /// not-found statuses, bad arguments, and undecodable bodies never get
    /// better on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::NetworkError(err) => !err.is_builder(),
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// HTTP status behind this error, looking through retry and page wrappers
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            Error::NetworkError(err) => err.status(),
            Error::RetriesExhausted { source, .. } | Error::FirstPage(source) => source.status(),
            _ => None,
        }
    }
}
