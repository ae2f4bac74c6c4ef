//! Vault session token lifecycle management.
//!
//! Obtains a Vault token lazily through a pluggable [`ClientAuthentication`],
//! shares it between concurrent callers, renews it in the background before
//! its lease expires and revokes it on shutdown.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vault_session::{
//!     HttpTransport, KubernetesAuthentication, LifecycleAwareSessionManager, SessionManager,
//!     TokioScheduler, VaultConfig,
//! };
//!
//! # async fn run() -> vault_session::VaultResult<()> {
//! let config = VaultConfig::new("https://vault.example.com:8200", "billing");
//! let transport = Arc::new(HttpTransport::new(&config)?);
//! let authentication = Arc::new(KubernetesAuthentication::new(&config, transport.clone()));
//! let manager = LifecycleAwareSessionManager::new(
//!     authentication,
//!     Arc::new(TokioScheduler::current()?),
//!     transport,
//! );
//!
//! let token = manager.session_token().await?;
//! # let _ = token;
//! manager.destroy().await;
//! # Ok(())
//! # }
//! ```

pub mod authentication;
pub mod config;
pub mod error;
pub mod responses;
pub mod scheduler;
pub mod session;
pub mod token;
pub mod transport;

pub use authentication::{ClientAuthentication, KubernetesAuthentication, TokenAuthentication};
pub use config::VaultConfig;
pub use error::{VaultError, VaultResult};
pub use scheduler::{
    OneShotTrigger, ScheduledTask, Task, TaskFuture, TaskScheduler, TokioScheduler, Trigger,
    TriggerContext,
};
pub use session::{
    LifecycleAwareSessionManager, REFRESH_PERIOD_BEFORE_EXPIRY, RenewalOutcome, SessionManager,
    SimpleSessionManager, renewal_delay,
};
pub use token::{TokenKind, VaultToken};
pub use transport::{HttpTransport, VaultHttpHeaders, VaultTransport};
