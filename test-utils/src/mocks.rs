//! Mock collaborators for session manager tests.
//!
//! Every mock records what it was asked to do so tests can assert on login
//! counts, renew/revoke calls and scheduled delays.
//!
//! `ManualScheduler` keeps its queue behind a std mutex because
//! [`TaskScheduler::schedule`] is synchronous.

use async_trait::async_trait;
use reqwest::{Method, header::HeaderMap};
use serde_json::Value;
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{sync::RwLock, time::Instant};
use vault_session::{
    ClientAuthentication, ScheduledTask, Task, TaskScheduler, Trigger, TriggerContext, VaultError,
    VaultResult, VaultToken, VaultTransport, transport::VAULT_TOKEN_HEADER,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock login strategy.
///
/// Returns scripted results first; afterwards it issues login tokens named
/// `t1`, `t2`, ... after the login number.
#[derive(Debug)]
pub struct MockAuthentication {
    scripted: Arc<RwLock<VecDeque<Result<VaultToken, String>>>>,
    lease: Duration,
    renewable: bool,
    delay: Duration,
    logins: AtomicUsize,
}

impl MockAuthentication {
    /// Issue login tokens with the given lease and renewability.
    #[must_use]
    pub fn new(lease: Duration, renewable: bool) -> Self {
        Self {
            scripted: Arc::new(RwLock::new(VecDeque::new())),
            lease,
            renewable,
            delay: Duration::ZERO,
            logins: AtomicUsize::new(0),
        }
    }

    /// Issue renewable login tokens with the given lease.
    #[must_use]
    pub fn renewable(lease: Duration) -> Self {
        Self::new(lease, true)
    }

    /// Sleep this long inside every login exchange.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Return `token` from the next login.
    pub async fn push_token(&self, token: VaultToken) {
        self.scripted.write().await.push_back(Ok(token));
    }

    /// Fail the next login with an unavailable error.
    pub async fn push_failure(&self, message: impl Into<String>) {
        self.scripted.write().await.push_back(Err(message.into()));
    }

    /// Number of login exchanges performed.
    #[must_use]
    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientAuthentication for MockAuthentication {
    async fn login(&self) -> VaultResult<VaultToken> {
        let number = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self.scripted.write().await.pop_front();
        match scripted {
            Some(Ok(token)) => Ok(token),
            Some(Err(message)) => Err(VaultError::unavailable(message)),
            None => Ok(VaultToken::login(
                format!("t{number}"),
                self.lease,
                self.renewable,
            )),
        }
    }
}

/// Scripted answer of [`MockTransport`].
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Success with a JSON body
    Ok(Value),
    /// Vault status error
    Status(u16, String),
    /// Transport failure
    Unavailable(String),
}

impl MockResponse {
    fn into_result(self) -> VaultResult<Value> {
        match self {
            Self::Ok(body) => Ok(body),
            Self::Status(status, message) => Err(VaultError::status_error(status, message)),
            Self::Unavailable(message) => Err(VaultError::unavailable(message)),
        }
    }
}

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// HTTP method
    pub method: Method,
    /// Path relative to `/v1/`
    pub path: String,
    /// Value of the `X-Vault-Token` header
    pub token: Option<String>,
    /// JSON body
    pub body: Option<Value>,
}

/// Mock Vault transport answering per path from a script; unscripted calls
/// succeed with `null`.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Arc<RwLock<HashMap<String, VecDeque<MockResponse>>>>,
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    delay: Duration,
}

impl MockTransport {
    /// Create a transport where every call succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every request.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue the answer for the next request to `path`.
    pub async fn push_response(&self, path: &str, response: MockResponse) {
        self.responses
            .write()
            .await
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    /// All recorded requests in order.
    #[must_use]
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// Number of requests made to `path`.
    #[must_use]
    pub async fn calls_to(&self, path: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.path == path)
            .count()
    }
}

#[async_trait]
impl VaultTransport for MockTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: Option<Value>,
    ) -> VaultResult<Value> {
        self.calls.write().await.push(RecordedCall {
            method,
            path: path.to_string(),
            token: headers
                .get(VAULT_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            body,
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self
            .responses
            .write()
            .await
            .get_mut(path)
            .and_then(VecDeque::pop_front);
        scripted.map_or(Ok(Value::Null), MockResponse::into_result)
    }
}

struct Entry {
    task: Task,
    trigger: Arc<dyn Trigger>,
    at: Instant,
    context: TriggerContext,
    handle: ScheduledTask,
}

/// Scheduler that only runs tasks when the test asks it to.
///
/// Honours the trigger protocol: after each run the trigger is asked again
/// and the task is re-queued if it answers with a time.
#[derive(Default)]
pub struct ManualScheduler {
    entries: Mutex<Vec<Entry>>,
    delays: Mutex<Vec<Duration>>,
    ignore_cancellation: bool,
}

impl ManualScheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scheduler that records cancellation but still runs
    /// cancelled tasks, like a scheduler without cancellation support.
    #[must_use]
    pub fn ignoring_cancellation() -> Self {
        Self {
            ignore_cancellation: true,
            ..Self::default()
        }
    }

    /// Delays requested by every `schedule` call, in order.
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        lock(&self.delays).clone()
    }

    /// Number of `schedule` calls that produced an execution time.
    #[must_use]
    pub fn scheduled_count(&self) -> usize {
        lock(&self.delays).len()
    }

    /// Queued executions that will still run.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.entries)
            .iter()
            .filter(|e| self.ignore_cancellation || !e.handle.is_cancelled())
            .count()
    }

    /// Queued executions whose handle was cancelled.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        lock(&self.entries)
            .iter()
            .filter(|e| e.handle.is_cancelled())
            .count()
    }

    /// Run the earliest queued execution that will still run.
    ///
    /// Returns `false` when nothing was left to run.
    pub async fn run_next(&self) -> bool {
        let next = {
            let mut entries = lock(&self.entries);
            if !self.ignore_cancellation {
                entries.retain(|e| !e.handle.is_cancelled());
            }
            let earliest = entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| e.at)
                .map(|(index, _)| index);
            earliest.map(|index| entries.remove(index))
        };
        let Some(mut entry) = next else {
            return false;
        };

        (entry.task)().await;

        entry.context.update(entry.at, Instant::now());
        if let Some(at) = entry.trigger.next_execution_time(&entry.context) {
            entry.at = at;
            lock(&self.entries).push(entry);
        }
        true
    }
}

impl TaskScheduler for ManualScheduler {
    fn schedule(&self, task: Task, trigger: Arc<dyn Trigger>) -> ScheduledTask {
        let handle = ScheduledTask::new();
        let now = Instant::now();
        let context = TriggerContext::default();

        if let Some(at) = trigger.next_execution_time(&context) {
            lock(&self.delays).push(at.saturating_duration_since(now));
            lock(&self.entries).push(Entry {
                task,
                trigger,
                at,
                context,
                handle: handle.clone(),
            });
        }
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_session::{OneShotTrigger, TaskFuture};

    #[tokio::test]
    async fn test_mock_authentication_sequence() {
        let auth = MockAuthentication::renewable(Duration::from_secs(10));
        auth.push_failure("sealed").await;

        assert!(auth.login().await.is_err());
        let token = auth.login().await.unwrap();
        assert_eq!(token.token(), "t2");
        assert!(token.is_renewable());
        assert_eq!(auth.login_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_transport_script() {
        let transport = MockTransport::new();
        transport
            .push_response("auth/token/renew-self", MockResponse::Status(403, "denied".into()))
            .await;

        let err = transport
            .request(Method::POST, "auth/token/renew-self", HeaderMap::new(), None)
            .await
            .unwrap_err();
        assert!(err.is_client_error());

        let ok = transport
            .request(Method::POST, "auth/token/renew-self", HeaderMap::new(), None)
            .await
            .unwrap();
        assert_eq!(ok, Value::Null);
        assert_eq!(transport.calls_to("auth/token/renew-self").await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_scheduler_one_shot() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let task: Task = Arc::new(move || -> TaskFuture {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });

        let scheduler = ManualScheduler::new();
        scheduler.schedule(task, Arc::new(OneShotTrigger::new(Duration::from_secs(7))));

        assert_eq!(scheduler.delays(), vec![Duration::from_secs(7)]);
        assert_eq!(scheduler.pending(), 1);
        assert!(scheduler.run_next().await);
        assert!(!scheduler.run_next().await);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_scheduler_ignoring_cancellation() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let task: Task = Arc::new(move || -> TaskFuture {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });

        let scheduler = ManualScheduler::ignoring_cancellation();
        let handle = scheduler.schedule(task, Arc::new(OneShotTrigger::new(Duration::from_secs(1))));
        handle.cancel();

        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.cancelled(), 1);
        assert!(scheduler.run_next().await);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
