//! Shared proptest generators for Vault session types.

use proptest::prelude::*;
use std::time::Duration;
use vault_session::VaultToken;

/// Generate Vault service token values (`hvs.` prefixed).
pub fn token_value_strategy() -> impl Strategy<Value = String> {
    "hvs\\.[A-Za-z0-9_-]{24,90}"
}

/// Generate lease durations from 0 to 30 days, including 0.
pub fn lease_duration_strategy() -> impl Strategy<Value = Duration> {
    prop_oneof![
        Just(Duration::ZERO),
        (1u64..=10).prop_map(Duration::from_secs),
        (1u64..=30 * 24 * 3600).prop_map(Duration::from_secs),
    ]
}

/// Generate login tokens with arbitrary lease and renewability.
pub fn login_token_strategy() -> impl Strategy<Value = VaultToken> {
    (token_value_strategy(), lease_duration_strategy(), any::<bool>())
        .prop_map(|(value, lease, renewable)| VaultToken::login(value, lease, renewable))
}

/// Generate static or login tokens.
pub fn vault_token_strategy() -> impl Strategy<Value = VaultToken> {
    prop_oneof![
        token_value_strategy().prop_map(VaultToken::of),
        login_token_strategy(),
    ]
}

/// Generate 4xx status codes Vault uses for rejected tokens.
pub fn client_error_status_strategy() -> impl Strategy<Value = u16> {
    prop_oneof![Just(400u16), Just(401u16), Just(403u16), Just(404u16), 405u16..=499u16]
}

/// Generate 5xx status codes.
pub fn server_error_status_strategy() -> impl Strategy<Value = u16> {
    prop_oneof![Just(500u16), Just(502u16), Just(503u16), 504u16..=599u16]
}
