//! Vault JSON response fixtures.

use serde_json::{Value, json};

/// Successful login response of an auth backend.
#[must_use]
pub fn login_response(client_token: &str, lease_duration: u64, renewable: bool) -> Value {
    json!({
        "request_id": "5d3c2a9e-8b2d-4d56-9d0e-1f3a7c6b9e21",
        "lease_id": "",
        "renewable": false,
        "lease_duration": 0,
        "data": null,
        "auth": {
            "client_token": client_token,
            "accessor": "8609694a-cdbc-db9b-d345-e782dbb562ed",
            "policies": ["default", "app"],
            "token_policies": ["default", "app"],
            "lease_duration": lease_duration,
            "renewable": renewable
        }
    })
}

/// Response of `auth/token/renew-self`.
#[must_use]
pub fn renew_self_response(client_token: &str, lease_duration: u64) -> Value {
    login_response(client_token, lease_duration, true)
}

/// Vault error document.
#[must_use]
pub fn error_body(errors: &[&str]) -> Value {
    json!({ "errors": errors })
}

/// Error body Vault returns for an expired or revoked token.
#[must_use]
pub fn permission_denied() -> Value {
    error_body(&["permission denied"])
}
