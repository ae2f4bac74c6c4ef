//! Trigger-driven task scheduling.
//!
//! A [`TaskScheduler`] keeps asking its [`Trigger`] for the next execution
//! time and runs the task at each one until the trigger returns `None`.
//! [`OneShotTrigger`] answers exactly once, so a task scheduled with it runs
//! exactly once no matter how the scheduler handles repetition.

use crate::error::{VaultError, VaultResult};
use futures::FutureExt;
use std::{
    any::Any,
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{runtime::Handle, task::AbortHandle, time::Instant};
use tracing::{error, trace};

/// Stand-in for delays past what [`Instant`] can represent: about 30 years.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Future produced by a [`Task`] invocation.
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A reusable asynchronous callback.
pub type Task = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Execution history handed to a [`Trigger`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerContext {
    last_scheduled: Option<Instant>,
    last_completion: Option<Instant>,
}

impl TriggerContext {
    /// Instant the previous execution was scheduled for.
    #[must_use]
    pub const fn last_scheduled_time(&self) -> Option<Instant> {
        self.last_scheduled
    }

    /// Instant the previous execution completed.
    #[must_use]
    pub const fn last_completion_time(&self) -> Option<Instant> {
        self.last_completion
    }

    /// Record a finished execution.
    pub fn update(&mut self, scheduled: Instant, completion: Instant) {
        self.last_scheduled = Some(scheduled);
        self.last_completion = Some(completion);
    }
}

/// Decides when a scheduled task runs next.
pub trait Trigger: Send + Sync {
    /// Next execution time, or `None` when the task must not run again.
    fn next_execution_time(&self, context: &TriggerContext) -> Option<Instant>;
}

/// Trigger yielding a single execution time `delay` after its first query.
///
/// Delays that overflow the clock are clamped to a far-future instant.
#[derive(Debug)]
pub struct OneShotTrigger {
    fired: AtomicBool,
    delay: Duration,
}

impl OneShotTrigger {
    /// Create a trigger firing once after `delay`.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            fired: AtomicBool::new(false),
            delay,
        }
    }

    /// Delay between the first query and the execution time.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

impl Trigger for OneShotTrigger {
    fn next_execution_time(&self, _context: &TriggerContext) -> Option<Instant> {
        self.fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| {
                let now = Instant::now();
                now.checked_add(self.delay)
                    .or_else(|| now.checked_add(FAR_FUTURE))
                    .unwrap_or(now)
            })
    }
}

/// Handle to a scheduled task.
///
/// Dropping the handle does not cancel the task.
#[derive(Debug, Clone, Default)]
pub struct ScheduledTask {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl ScheduledTask {
    /// Create a handle not yet tied to a tokio task.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort `handle` when this task is cancelled.
    #[must_use]
    pub fn with_abort_handle(mut self, handle: AbortHandle) -> Self {
        self.abort = Some(handle);
        self
    }

    /// Prevent any further execution.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(handle) = &self.abort {
            handle.abort();
        }
    }

    /// Whether [`cancel`](Self::cancel) was called on this handle or a clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Runs tasks at the times chosen by their trigger.
pub trait TaskScheduler: Send + Sync {
    /// Schedule `task`; the trigger is queried before every execution.
    fn schedule(&self, task: Task, trigger: Arc<dyn Trigger>) -> ScheduledTask;
}

/// [`TaskScheduler`] spawning one tokio task per scheduling call.
///
/// A panic inside the task is caught and logged at `error`; the trigger is
/// still asked for the next execution.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Schedule onto the given runtime.
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Schedule onto the runtime of the calling context.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] outside a tokio runtime.
    pub fn current() -> VaultResult<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| VaultError::invalid_config(format!("no tokio runtime: {e}")))
    }
}

impl TaskScheduler for TokioScheduler {
    fn schedule(&self, task: Task, trigger: Arc<dyn Trigger>) -> ScheduledTask {
        let scheduled = ScheduledTask::new();
        let cancelled = scheduled.clone();

        let join = self.handle.spawn(async move {
            let mut context = TriggerContext::default();
            while let Some(at) = trigger.next_execution_time(&context) {
                tokio::time::sleep_until(at).await;
                if cancelled.is_cancelled() {
                    trace!("Scheduled task cancelled before execution");
                    break;
                }
                if let Err(panic) = AssertUnwindSafe(task()).catch_unwind().await {
                    error!(panic = panic_message(&*panic), "Scheduled task panicked");
                }
                context.update(at, Instant::now());
            }
        });

        scheduled.with_abort_handle(join.abort_handle())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_task(counter: &Arc<AtomicUsize>) -> Task {
        let counter = Arc::clone(counter);
        Arc::new(move || -> TaskFuture {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    struct EveryTrigger {
        period: Duration,
        remaining: AtomicUsize,
    }

    impl Trigger for EveryTrigger {
        fn next_execution_time(&self, context: &TriggerContext) -> Option<Instant> {
            let left = self.remaining.load(Ordering::SeqCst);
            if left == 0 {
                return None;
            }
            self.remaining.store(left - 1, Ordering::SeqCst);
            let base = context.last_completion_time().unwrap_or_else(Instant::now);
            Some(base + self.period)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_trigger_fires_once() {
        let trigger = OneShotTrigger::new(Duration::from_secs(5));
        let context = TriggerContext::default();

        let first = trigger.next_execution_time(&context).unwrap();
        assert_eq!(first - Instant::now(), Duration::from_secs(5));
        assert!(trigger.next_execution_time(&context).is_none());
        assert!(trigger.next_execution_time(&context).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_runs_once_after_delay() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = TokioScheduler::current().unwrap();

        scheduler.schedule(
            counting_task(&counter),
            Arc::new(OneShotTrigger::new(Duration::from_secs(5))),
        );

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_honours_repeating_trigger() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = TokioScheduler::current().unwrap();

        scheduler.schedule(
            counting_task(&counter),
            Arc::new(EveryTrigger {
                period: Duration::from_secs(1),
                remaining: AtomicUsize::new(3),
            }),
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_task_never_runs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = TokioScheduler::current().unwrap();

        let handle = scheduler.schedule(
            counting_task(&counter),
            Arc::new(OneShotTrigger::new(Duration::from_secs(1))),
        );
        handle.cancel();
        assert!(handle.is_cancelled());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_task_does_not_stop_scheduler() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = TokioScheduler::current().unwrap();

        let panicking: Task = Arc::new(|| -> TaskFuture {
            Box::pin(async {
                if std::hint::black_box(true) {
                    panic!("renewal blew up");
                }
            })
        });
        scheduler.schedule(panicking, Arc::new(OneShotTrigger::new(Duration::from_secs(1))));
        scheduler.schedule(
            counting_task(&counter),
            Arc::new(OneShotTrigger::new(Duration::from_secs(2))),
        );

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_trigger_clamps_overflowing_delay() {
        let trigger = OneShotTrigger::new(Duration::from_secs(u64::MAX));

        let at = trigger
            .next_execution_time(&TriggerContext::default())
            .unwrap();
        assert!(at - Instant::now() >= Duration::from_secs(86_400 * 365));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_keeps_going_after_panic() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let task: Task = Arc::new(move || -> TaskFuture {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first run blew up");
                }
            })
        });

        let scheduler = TokioScheduler::current().unwrap();
        scheduler.schedule(
            task,
            Arc::new(EveryTrigger {
                period: Duration::from_secs(1),
                remaining: AtomicUsize::new(3),
            }),
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_panicking_task_is_logged() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        runtime.block_on(async {
            let panicking: Task = Arc::new(|| -> TaskFuture {
                Box::pin(async {
                    if std::hint::black_box(true) {
                        panic!("renewal blew up");
                    }
                })
            });
            let scheduler = TokioScheduler::current().unwrap();
            scheduler.schedule(panicking, Arc::new(OneShotTrigger::new(Duration::from_secs(1))));
            tokio::time::sleep(Duration::from_secs(3)).await;
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Scheduled task panicked"));
        assert!(output.contains("renewal blew up"));
    }

    #[test]
    fn test_current_outside_runtime() {
        assert!(matches!(
            TokioScheduler::current(),
            Err(VaultError::InvalidConfig(_))
        ));
    }
}
