//! Error types for rare event detection client operations

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, RareClientError>;

/// Coarse grouping of failures, used to pick what to tell the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Required input was missing; nothing was sent
    InvalidInput,
    /// The backend could not be reached
    Connection,
    /// The backend answered with an error or an unreadable body
    Backend,
}

/// Errors that can occur during client operations
#[derive(Error, Debug)]
pub enum RareClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Missing or malformed user input, rejected before any request
    #[error("{0}")]
    InvalidInput(String),

    /// Server returned a non-2xx response
    #[error("Server error {status}: {detail}")]
    ServerError { status: u16, detail: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Malformed `data:` URI in a generation response
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    /// Timeout
    #[error("Request timed out")]
    Timeout,

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

impl RareClientError {
    /// Create a server error from status code and detail message
    pub fn server_error(status: u16, detail: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            detail: detail.into(),
        }
    }

    /// Create an input validation error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Map a transport error onto the connection variants where possible
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else {
            Self::HttpError(err)
        }
    }

    /// Which of the three failure categories this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput(_) | Self::IoError(_) | Self::InvalidUrl(_) => {
                ErrorCategory::InvalidInput
            }
            Self::HttpError(_) | Self::Timeout | Self::ConnectionFailed(_) => {
                ErrorCategory::Connection
            }
            Self::ServerError { .. } | Self::ParseError(_) | Self::InvalidDataUri(_) => {
                ErrorCategory::Backend
            }
        }
    }

    /// The backend-provided `detail`, if this is a server error
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::ServerError { detail, .. } => Some(detail),
            _ => None,
        }
    }
}
