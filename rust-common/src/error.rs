//! Centralized error types for the Vault session libraries.
//!
//! Errors carry enough information to tell a client-side rejection (the
//! server understood the request and refused it) from a failure of the
//! transport or the server itself.

use thiserror::Error;

/// Common error type for platform operations.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// HTTP request could not be executed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The server answered with a non-success status code
    #[error("Status {status}: {message}")]
    Status {
        /// HTTP status code returned by the server
        status: u16,
        /// Error message extracted from the response body
        message: String,
    },

    /// Service is temporarily unavailable
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Timeout occurred
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failed to install the tracing subscriber
    #[error("Tracing initialization failed: {0}")]
    Tracing(String),
}

impl PlatformError {
    /// Build an error from a non-success HTTP status.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_common::PlatformError;
    ///
    /// let err = PlatformError::from_status(403, "permission denied");
    /// assert!(err.is_client_error());
    ///
    /// let err = PlatformError::from_status(503, "sealed");
    /// assert!(!err.is_client_error());
    /// assert!(err.is_retryable());
    /// ```
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code, if the error came from a server response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server rejected the request with a 4xx status.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is retryable.
    ///
    /// Server errors, rate limiting and transport problems are transient;
    /// other client errors are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Unavailable(_) | Self::Timeout(_) | Self::Http(_) => true,
            _ => false,
        }
    }

    /// Create an unavailable error with the given message.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an invalid input error with the given message.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
