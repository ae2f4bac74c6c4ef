//! Login strategies producing a [`VaultToken`].

use crate::{
    config::VaultConfig,
    error::{VaultError, VaultResult},
    responses::AuthResponse,
    token::VaultToken,
    transport::VaultTransport,
};
use async_trait::async_trait;
use reqwest::{Method, header::HeaderMap};
use std::{sync::Arc, time::Duration};
use tracing::{info, instrument};

/// Obtains a Vault token through some login mechanism.
///
/// Implementations may perform arbitrary network I/O. Session managers call
/// `login` at most once at a time.
#[async_trait]
pub trait ClientAuthentication: Send + Sync {
    /// Perform the login exchange.
    async fn login(&self) -> VaultResult<VaultToken>;
}

/// Authentication with a pre-issued static token.
pub struct TokenAuthentication {
    token: VaultToken,
}

impl TokenAuthentication {
    /// Use `token` as-is.
    #[must_use]
    pub const fn new(token: VaultToken) -> Self {
        Self { token }
    }

    /// Use a static token given by value.
    #[must_use]
    pub fn from_value(token: impl Into<String>) -> Self {
        Self::new(VaultToken::of(token))
    }
}

#[async_trait]
impl ClientAuthentication for TokenAuthentication {
    async fn login(&self) -> VaultResult<VaultToken> {
        Ok(self.token.clone())
    }
}

/// Kubernetes auth method: exchanges the pod's service account JWT for a
/// Vault token.
pub struct KubernetesAuthentication {
    role: String,
    mount: String,
    token_path: String,
    transport: Arc<dyn VaultTransport>,
}

impl KubernetesAuthentication {
    /// Create the strategy from the role, mount and token path in `config`.
    #[must_use]
    pub fn new(config: &VaultConfig, transport: Arc<dyn VaultTransport>) -> Self {
        Self {
            role: config.role.clone(),
            mount: config.kubernetes_mount.trim_matches('/').to_string(),
            token_path: config.token_path.clone(),
            transport,
        }
    }

    fn login_path(&self) -> String {
        format!("auth/{}/login", self.mount)
    }
}

#[async_trait]
impl ClientAuthentication for KubernetesAuthentication {
    #[instrument(skip(self), fields(role = %self.role, mount = %self.mount))]
    async fn login(&self) -> VaultResult<VaultToken> {
        let jwt = tokio::fs::read_to_string(&self.token_path)
            .await
            .map_err(|e| VaultError::auth_failed(format!("{}: {e}", self.token_path)))?;

        let body = serde_json::json!({
            "role": self.role,
            "jwt": jwt.trim()
        });

        let response = self
            .transport
            .request(Method::POST, &self.login_path(), HeaderMap::new(), Some(body))
            .await
            .map_err(|e| VaultError::auth_failed(e.to_string()))?;

        let auth_response: AuthResponse = serde_json::from_value(response)
            .map_err(|e| VaultError::auth_failed(format!("malformed login response: {e}")))?;

        if auth_response.auth.client_token.is_empty() {
            return Err(VaultError::auth_failed("login response carried no client token"));
        }

        let ttl = Duration::from_secs(auth_response.auth.lease_duration);
        info!(
            ttl_secs = ttl.as_secs(),
            renewable = auth_response.auth.renewable,
            "Authenticated with Vault"
        );

        Ok(VaultToken::login(
            auth_response.auth.client_token,
            ttl,
            auth_response.auth.renewable,
        ))
    }
}
