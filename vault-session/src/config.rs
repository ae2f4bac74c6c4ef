//! Vault client configuration.

use crate::error::{VaultError, VaultResult};
use rust_common::HttpConfig;
use std::time::Duration;
use url::Url;

/// Default location of the Kubernetes service account token.
pub const DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Vault client configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server address, without the `/v1` prefix
    pub addr: String,
    /// Enterprise namespace sent as `X-Vault-Namespace`
    pub namespace: Option<String>,
    /// Kubernetes auth role name
    pub role: String,
    /// Kubernetes auth mount path
    pub kubernetes_mount: String,
    /// Service account token path
    pub token_path: String,
    /// HTTP client settings
    pub http: HttpConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            addr: std::env::var("VAULT_ADDR")
                .unwrap_or_else(|_| "https://vault.vault.svc:8200".to_string()),
            namespace: std::env::var("VAULT_NAMESPACE").ok().filter(|ns| !ns.is_empty()),
            role: std::env::var("VAULT_ROLE").unwrap_or_default(),
            kubernetes_mount: "kubernetes".to_string(),
            token_path: DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH.to_string(),
            http: HttpConfig::default(),
        }
    }
}

impl VaultConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(addr: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            role: role.into(),
            ..Default::default()
        }
    }

    /// Set the Vault namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the Kubernetes auth mount path.
    #[must_use]
    pub fn with_kubernetes_mount(mut self, mount: impl Into<String>) -> Self {
        self.kubernetes_mount = mount.into();
        self
    }

    /// Set the service account token path.
    #[must_use]
    pub fn with_token_path(mut self, path: impl Into<String>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Set request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    /// Replace the HTTP client settings.
    #[must_use]
    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Parse and check the server address.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] if the address is not an
    /// absolute `http`/`https` URL.
    pub fn base_url(&self) -> VaultResult<Url> {
        let url = Url::parse(self.addr.trim_end_matches('/'))
            .map_err(|e| VaultError::invalid_config(format!("addr {:?}: {e}", self.addr)))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(VaultError::invalid_config(format!(
                "unsupported scheme {other:?} in addr"
            ))),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] for a malformed address or an
    /// empty Kubernetes mount.
    pub fn validate(&self) -> VaultResult<()> {
        self.base_url()?;
        if self.kubernetes_mount.trim_matches('/').is_empty() {
            return Err(VaultError::invalid_config("kubernetes mount must not be empty"));
        }
        Ok(())
    }
}
