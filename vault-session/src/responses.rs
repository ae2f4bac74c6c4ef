//! Vault response bodies understood by the session layer.

use serde::Deserialize;

/// Vault auth response
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    /// Auth block of a login response
    pub auth: AuthData,
}

/// Auth block of a login response.
#[derive(Debug, Deserialize)]
pub struct AuthData {
    /// Issued token
    pub client_token: String,
    /// Token accessor
    #[serde(default)]
    pub accessor: String,
    /// Attached policies
    #[serde(default)]
    pub policies: Vec<String>,
    /// Lease duration in seconds
    #[serde(default)]
    pub lease_duration: u64,
    /// Whether the token may be renewed
    #[serde(default)]
    pub renewable: bool,
}

/// Vault error body: `{"errors": ["..."]}`.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<String>,
}

/// Extract a human readable message from a Vault error body.
///
/// Joins the entries of the `errors` array; falls back to the trimmed raw
/// body when it is not a Vault error document.
#[must_use]
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join(", "),
        _ => body.trim().to_string(),
    }
}
