//! HTTP transport used for login, renewal and revocation calls.

use crate::{
    config::VaultConfig,
    error::{VaultError, VaultResult},
    responses,
    token::VaultToken,
};
use async_trait::async_trait;
use reqwest::{
    Client, Method,
    header::{HeaderMap, HeaderValue},
};
use rust_common::build_http_client;
use serde_json::Value;
use tracing::{debug, instrument};

/// Self-renewal endpoint of the token auth backend.
pub const RENEW_SELF_PATH: &str = "auth/token/renew-self";

/// Self-revocation endpoint of the token auth backend.
pub const REVOKE_SELF_PATH: &str = "auth/token/revoke-self";

/// Header carrying the Vault token.
pub const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";

/// Header carrying the Vault Enterprise namespace.
pub const VAULT_NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Executes requests against the Vault HTTP API.
///
/// Paths are relative to `/v1/`. Non-success responses must be reported as
/// [`VaultError::Status`] so callers can tell client errors from the rest.
#[async_trait]
pub trait VaultTransport: Send + Sync {
    /// Perform a request and return the decoded JSON body
    /// (`Value::Null` for an empty body).
    async fn request(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: Option<Value>,
    ) -> VaultResult<Value>;
}

/// Builds Vault authentication headers.
pub struct VaultHttpHeaders;

impl VaultHttpHeaders {
    /// Headers authenticating a request with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] if the token contains bytes
    /// that cannot appear in an HTTP header.
    pub fn from_token(token: &VaultToken) -> VaultResult<HeaderMap> {
        let mut value = HeaderValue::from_str(token.token())
            .map_err(|_| VaultError::invalid_config("token is not a valid header value"))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(VAULT_TOKEN_HEADER, value);
        Ok(headers)
    }
}

/// reqwest-backed [`VaultTransport`].
pub struct HttpTransport {
    base: String,
    http: Client,
    namespace: Option<HeaderValue>,
}

impl HttpTransport {
    /// Create a transport for the configured Vault server.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid address or namespace, or if the HTTP
    /// client cannot be built.
    pub fn new(config: &VaultConfig) -> VaultResult<Self> {
        let base = config.base_url()?.as_str().trim_end_matches('/').to_string();
        let http = build_http_client(&config.http)?;
        let namespace = config
            .namespace
            .as_deref()
            .map(HeaderValue::from_str)
            .transpose()
            .map_err(|_| VaultError::invalid_config("namespace is not a valid header value"))?;

        Ok(Self {
            base,
            http,
            namespace,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl VaultTransport for HttpTransport {
    #[instrument(skip(self, headers, body))]
    async fn request(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: Option<Value>,
    ) -> VaultResult<Value> {
        let mut request = self.http.request(method, self.url(path)).headers(headers);

        if let Some(namespace) = &self.namespace {
            request = request.header(VAULT_NAMESPACE_HEADER, namespace.clone());
        }
        if let Some(b) = body {
            request = request.json(&b);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VaultError::unavailable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| VaultError::unavailable(e.to_string()))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "Vault rejected request");
            return Err(VaultError::status_error(
                status.as_u16(),
                responses::error_message(&text),
            ));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}
