//! Session tokens produced by a login exchange.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::time::Duration;

/// Where a token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Supplied by the caller; never renewed or revoked by a session manager.
    Static,
    /// Issued by Vault through a login exchange.
    Login,
}

/// An immutable Vault token.
///
/// Tokens are never mutated in place. A session manager hands them out as
/// `Arc<VaultToken>` and replaces the whole value on re-login.
#[derive(Clone)]
pub struct VaultToken {
    token: SecretString,
    lease_duration: Duration,
    renewable: bool,
    kind: TokenKind,
}

impl VaultToken {
    /// Create a static token. It has no lease and is not renewable.
    #[must_use]
    pub fn of(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            lease_duration: Duration::ZERO,
            renewable: false,
            kind: TokenKind::Static,
        }
    }

    /// Create a token issued by a login exchange.
    ///
    /// A zero `lease_duration` means the token is not lease-bound.
    #[must_use]
    pub fn login(token: impl Into<String>, lease_duration: Duration, renewable: bool) -> Self {
        Self {
            token: SecretString::from(token.into()),
            lease_duration,
            renewable,
            kind: TokenKind::Login,
        }
    }

    /// The bearer value sent to Vault.
    #[must_use]
    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    /// Server-declared validity window.
    #[must_use]
    pub const fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    /// Renewability flag as reported by the issuing auth backend.
    #[must_use]
    pub const fn renewable(&self) -> bool {
        self.renewable
    }

    /// Token origin.
    #[must_use]
    pub const fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Whether this token is a Vault login session.
    #[must_use]
    pub const fn is_login_token(&self) -> bool {
        matches!(self.kind, TokenKind::Login)
    }

    /// Whether a session manager should schedule renewal for this token.
    #[must_use]
    pub const fn is_renewable(&self) -> bool {
        self.is_login_token() && self.renewable && !self.lease_duration.is_zero()
    }
}

impl fmt::Debug for VaultToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultToken")
            .field("token", &"[REDACTED]")
            .field("lease_duration", &self.lease_duration)
            .field("renewable", &self.renewable)
            .field("kind", &self.kind)
            .finish()
    }
}
