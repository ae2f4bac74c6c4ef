//! Session managers caching the Vault token used for every request.
//!
//! [`SimpleSessionManager`] logs in once and keeps the token forever.
//! [`LifecycleAwareSessionManager`] additionally renews login tokens in the
//! background shortly before their lease expires and revokes them on
//! [`destroy`](LifecycleAwareSessionManager::destroy).
//!
//! Both use double-checked acquisition: a lock-free read of the cached token,
//! and on a miss a mutex around the re-check and the login exchange, so
//! concurrent callers never trigger more than one login.

use crate::{
    authentication::ClientAuthentication,
    error::{VaultError, VaultResult},
    scheduler::{OneShotTrigger, ScheduledTask, Task, TaskFuture, TaskScheduler},
    token::VaultToken,
    transport::{RENEW_SELF_PATH, REVOKE_SELF_PATH, VaultHttpHeaders, VaultTransport},
};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use reqwest::Method;
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Renewal fires this long before the lease runs out.
pub const REFRESH_PERIOD_BEFORE_EXPIRY: Duration = Duration::from_secs(5);

/// Delay until renewal of a token with the given lease: the lease minus
/// [`REFRESH_PERIOD_BEFORE_EXPIRY`], but at least one second.
#[must_use]
pub fn renewal_delay(lease_duration: Duration) -> Duration {
    lease_duration
        .saturating_sub(REFRESH_PERIOD_BEFORE_EXPIRY)
        .max(Duration::from_secs(1))
}

/// Provides the token used to authenticate against Vault.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Return the cached token, logging in first if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::AuthenticationFailed`] if the login exchange
    /// fails. Nothing is cached in that case.
    async fn session_token(&self) -> VaultResult<Arc<VaultToken>>;
}

/// Result of a single renewal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// Vault extended the lease; another renewal gets scheduled.
    Renewed,
    /// Vault rejected the token; the cache was cleared so the next access
    /// logs in again.
    Reset,
    /// The token was replaced, discarded or is not renewable.
    Skipped,
}

async fn login(authentication: &dyn ClientAuthentication) -> VaultResult<Arc<VaultToken>> {
    let token = authentication.login().await.map_err(|e| match e {
        VaultError::AuthenticationFailed(_) => e,
        other => VaultError::auth_failed(other.to_string()),
    })?;

    if token.token().is_empty() {
        return Err(VaultError::auth_failed("login returned an empty token"));
    }

    info!(
        kind = ?token.kind(),
        lease_secs = token.lease_duration().as_secs(),
        renewable = token.renewable(),
        "Obtained Vault session token"
    );
    Ok(Arc::new(token))
}

/// Session manager without renewal or revocation.
///
/// Suited to non-expiring tokens or callers managing the token lifecycle
/// themselves.
pub struct SimpleSessionManager {
    authentication: Arc<dyn ClientAuthentication>,
    token: ArcSwapOption<VaultToken>,
    lock: Mutex<()>,
}

impl SimpleSessionManager {
    /// Create a manager logging in through `authentication`.
    #[must_use]
    pub fn new(authentication: Arc<dyn ClientAuthentication>) -> Self {
        Self {
            authentication,
            token: ArcSwapOption::empty(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl SessionManager for SimpleSessionManager {
    async fn session_token(&self) -> VaultResult<Arc<VaultToken>> {
        if let Some(token) = self.token.load_full() {
            return Ok(token);
        }

        let _guard = self.lock.lock().await;
        if let Some(token) = self.token.load_full() {
            return Ok(token);
        }

        let token = login(self.authentication.as_ref()).await?;
        self.token.store(Some(Arc::clone(&token)));
        Ok(token)
    }
}

struct Inner {
    authentication: Arc<dyn ClientAuthentication>,
    scheduler: Arc<dyn TaskScheduler>,
    transport: Arc<dyn VaultTransport>,
    token: ArcSwapOption<VaultToken>,
    /// Serialises login, renewal and revocation; holds the pending renewal.
    renewal: Mutex<Option<ScheduledTask>>,
}

impl Inner {
    /// The cached token, if it still is the `generation` a task was bound to.
    fn current_generation(&self, generation: &Weak<VaultToken>) -> Option<Arc<VaultToken>> {
        self.token
            .load_full()
            .filter(|current| std::ptr::eq(Arc::as_ptr(current), generation.as_ptr()))
    }

    fn schedule_renewal(self: &Arc<Self>, token: &Arc<VaultToken>) -> ScheduledTask {
        let delay = renewal_delay(token.lease_duration());
        info!(delay_secs = delay.as_secs(), "Scheduling token renewal");

        let manager = Arc::downgrade(self);
        let generation = Arc::downgrade(token);
        let task: Task = Arc::new(move || -> TaskFuture {
            let manager = Weak::clone(&manager);
            let generation = Weak::clone(&generation);
            Box::pin(async move {
                if let Some(inner) = manager.upgrade() {
                    inner.run_renewal(&generation).await;
                }
            })
        });

        self.scheduler
            .schedule(task, Arc::new(OneShotTrigger::new(delay)))
    }

    /// Body of the scheduled renewal task. Errors end here: nobody awaits it.
    async fn run_renewal(self: &Arc<Self>, generation: &Weak<VaultToken>) {
        let mut renewal = self.renewal.lock().await;

        match self.renew_token(generation).await {
            Ok(RenewalOutcome::Renewed) => {
                *renewal = self
                    .current_generation(generation)
                    .map(|token| self.schedule_renewal(&token));
            }
            Ok(RenewalOutcome::Reset) => *renewal = None,
            // A newer generation may own the pending handle.
            Ok(RenewalOutcome::Skipped) => debug!("Token renewal skipped"),
            Err(e) => {
                *renewal = None;
                error!(error = %e, "Cannot renew VaultToken");
            }
        }
    }

    /// Must be called with the `renewal` lock held.
    async fn renew_token(&self, generation: &Weak<VaultToken>) -> VaultResult<RenewalOutcome> {
        let Some(token) = self.current_generation(generation) else {
            return Ok(RenewalOutcome::Skipped);
        };
        if !token.is_renewable() {
            return Ok(RenewalOutcome::Skipped);
        }

        info!("Renewing token");
        let headers = VaultHttpHeaders::from_token(&token)?;
        match self
            .transport
            .request(Method::POST, RENEW_SELF_PATH, headers, None)
            .await
        {
            Ok(_) => Ok(RenewalOutcome::Renewed),
            Err(e) if e.is_client_error() => {
                debug!(
                    error = %e,
                    "Cannot refresh token, resetting token and performing re-login"
                );
                self.token.store(None);
                Ok(RenewalOutcome::Reset)
            }
            Err(e) => Err(e),
        }
    }

    async fn revoke(&self, token: &VaultToken) {
        let headers = match VaultHttpHeaders::from_token(token) {
            Ok(headers) => headers,
            Err(e) => {
                warn!(error = %e, "Cannot revoke VaultToken");
                return;
            }
        };

        match self
            .transport
            .request(Method::POST, REVOKE_SELF_PATH, headers, None)
            .await
        {
            Ok(_) => info!("Revoked VaultToken"),
            Err(e) => warn!(error = %e, "Cannot revoke VaultToken"),
        }
    }
}

/// Session manager renewing login tokens in the background and revoking them
/// on [`destroy`](Self::destroy).
///
/// Renewal is scheduled [`REFRESH_PERIOD_BEFORE_EXPIRY`] before the lease
/// ends. When Vault rejects a renewal with a client error the token is
/// discarded and the next [`session_token`](SessionManager::session_token)
/// call logs in again. Any other renewal failure is logged and renewal stops;
/// the token stays cached until it is discarded some other way.
pub struct LifecycleAwareSessionManager {
    inner: Arc<Inner>,
}

impl LifecycleAwareSessionManager {
    /// Create a manager logging in through `authentication`, scheduling
    /// renewals on `scheduler` and renewing/revoking through `transport`.
    #[must_use]
    pub fn new(
        authentication: Arc<dyn ClientAuthentication>,
        scheduler: Arc<dyn TaskScheduler>,
        transport: Arc<dyn VaultTransport>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                authentication,
                scheduler,
                transport,
                token: ArcSwapOption::empty(),
                renewal: Mutex::new(None),
            }),
        }
    }

    /// The cached token, without logging in.
    #[must_use]
    pub fn cached_token(&self) -> Option<Arc<VaultToken>> {
        self.inner.token.load_full()
    }

    /// Renew the cached token now instead of waiting for the scheduled
    /// renewal, which is replaced by a freshly scheduled one on success.
    ///
    /// # Errors
    ///
    /// Returns the transport error for failures other than a client error;
    /// the pending renewal is left untouched in that case.
    pub async fn renew_token(&self) -> VaultResult<RenewalOutcome> {
        let Some(generation) = self.cached_token().as_ref().map(Arc::downgrade) else {
            return Ok(RenewalOutcome::Skipped);
        };

        let mut renewal = self.inner.renewal.lock().await;
        let outcome = self.inner.renew_token(&generation).await?;

        if outcome != RenewalOutcome::Skipped {
            if let Some(pending) = renewal.take() {
                pending.cancel();
            }
        }
        if outcome == RenewalOutcome::Renewed {
            *renewal = self
                .inner
                .current_generation(&generation)
                .map(|token| self.inner.schedule_renewal(&token));
        }
        Ok(outcome)
    }

    /// Discard the cached token and revoke it if it is a login token.
    ///
    /// Revocation is best-effort: failures are logged. Calling this again is
    /// a no-op, and a later [`session_token`](SessionManager::session_token)
    /// call logs in afresh.
    #[instrument(skip(self))]
    pub async fn destroy(&self) {
        let token = {
            let mut renewal = self.inner.renewal.lock().await;
            if let Some(pending) = renewal.take() {
                pending.cancel();
            }
            self.inner.token.swap(None)
        };

        match token {
            Some(token) if token.is_login_token() => self.inner.revoke(&token).await,
            Some(_) => debug!("Static token discarded without revocation"),
            None => debug!("No session to destroy"),
        }
    }
}

#[async_trait]
impl SessionManager for LifecycleAwareSessionManager {
    async fn session_token(&self) -> VaultResult<Arc<VaultToken>> {
        if let Some(token) = self.inner.token.load_full() {
            return Ok(token);
        }

        let mut renewal = self.inner.renewal.lock().await;
        if let Some(token) = self.inner.token.load_full() {
            return Ok(token);
        }

        let token = login(self.inner.authentication.as_ref()).await?;
        self.inner.token.store(Some(Arc::clone(&token)));

        if token.is_renewable() {
            if let Some(stale) = renewal.replace(self.inner.schedule_renewal(&token)) {
                stale.cancel();
            }
        }
        Ok(token)
    }
}

impl Drop for LifecycleAwareSessionManager {
    fn drop(&mut self) {
        // A renewal holding the lock is not cancelled here; once it finishes,
        // any task it schedules fails to upgrade its `Weak` and does nothing.
        if let Ok(mut renewal) = self.inner.renewal.try_lock() {
            if let Some(pending) = renewal.take() {
                pending.cancel();
            }
        }
    }
}
