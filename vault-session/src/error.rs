//! Vault error types using thiserror 2.0.
//!
//! Provides Vault-specific errors with client-error/retryability
//! classification and integration with platform common errors.

use rust_common::PlatformError;
use thiserror::Error;

/// Vault-specific errors.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Login exchange failed or produced no usable token
    #[error("Unable to establish session: {0}")]
    AuthenticationFailed(String),

    /// Vault answered with a non-success status
    #[error("Vault returned status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Messages from the Vault `errors` array, or the raw body
        message: String,
    },

    /// Vault server unreachable
    #[error("Vault unavailable: {0}")]
    Unavailable(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Local I/O failure, e.g. reading a service account token
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Platform error
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Result type for Vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    /// Whether Vault rejected the request with a 4xx status.
    ///
    /// During renewal this means the token is expired, revoked or unknown.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 400 && *status < 500,
            Self::Platform(e) => e.is_client_error(),
            _ => false,
        }
    }

    /// Check if error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Unavailable(_) | Self::Http(_) => true,
            Self::Platform(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// HTTP status code, if the error came from a Vault response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Platform(e) => e.status(),
            _ => None,
        }
    }

    /// Create a status error.
    #[must_use]
    pub fn status_error(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an authentication failed error.
    #[must_use]
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VaultError::unavailable("connection refused");
        assert_eq!(err.to_string(), "Vault unavailable: connection refused");

        let err = VaultError::auth_failed("login returned no token");
        assert_eq!(
            err.to_string(),
            "Unable to establish session: login returned no token"
        );

        let err = VaultError::status_error(403, "permission denied");
        assert_eq!(err.to_string(), "Vault returned status 403: permission denied");
    }

    #[test]
    fn test_client_errors() {
        assert!(VaultError::status_error(400, "bad token").is_client_error());
        assert!(VaultError::status_error(403, "permission denied").is_client_error());
        assert!(VaultError::status_error(404, "").is_client_error());
        assert!(!VaultError::status_error(500, "internal").is_client_error());
        assert!(!VaultError::status_error(503, "sealed").is_client_error());
        assert!(!VaultError::unavailable("timeout").is_client_error());
        assert!(!VaultError::auth_failed("nope").is_client_error());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(VaultError::unavailable("timeout").is_retryable());
        assert!(VaultError::status_error(429, "").is_retryable());
        assert!(VaultError::status_error(502, "").is_retryable());
        assert!(!VaultError::status_error(403, "").is_retryable());
        assert!(!VaultError::invalid_config("addr").is_retryable());
    }

    #[test]
    fn test_from_platform_error() {
        let vault_err: VaultError = PlatformError::from_status(404, "missing").into();
        assert!(matches!(vault_err, VaultError::Platform(_)));
        assert!(vault_err.is_client_error());
        assert_eq!(vault_err.status(), Some(404));
    }
}
