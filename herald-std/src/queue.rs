//! # Cooperative delivery queue
//!
//! A single FIFO of pending single-listener deliveries, shared by every
//! dispatcher built on the same [`DeliveryQueue`].
//!
//! ## Architecture
//! ```text
//! notify(n) ──► [t1 t2 t3 ...] ──► drain loop
//!               (append at tail)       │
//!                                      ├─► t.run()  ── Err / panic → DispatchError (logged, counted)
//!                                      ├─► counter += 1
//!                                      └─► counter > max_sync ? reset, pacer.pause(delay)
//! ```
//!
//! ## Rules
//! - **FIFO**: tasks run in enqueue order; one `enqueue` call is one contiguous run.
//! - **One drain loop**: at most one loop consumes the queue at a time, so
//!   listener invocations never overlap.
//! - **Bounded bursts**: the queue-wide counter survives between drains; it is
//!   only reset when it exceeds `max_sync`.
//! - **Isolation**: a failing or panicking listener never stops the loop.
//!
//! ## Driving the queue
//! `enqueue` spawns the drain loop on the ambient Tokio runtime. Without a
//! runtime the tasks stay queued until [`DeliveryQueue::drain`] is awaited.

use crate::config::DispatchConfig;
use futures::future::BoxFuture;
use herald_core::{BoxError, ConfigError, DispatchError, Pacer, SubscriberId};
use std::{
    any::Any,
    collections::VecDeque,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::Notify;

/// Callback receiving every listener failure caught by the queue.
pub type FailureCallback = Arc<dyn Fn(&DispatchError) + Send + Sync>;

/// A pending delivery to a single listener.
pub struct DeliveryTask {
    event: Arc<str>,
    subscriber: SubscriberId,
    run: Box<dyn FnOnce() -> Result<(), BoxError> + Send>,
}

impl DeliveryTask {
    /// Create a task. `event` and `subscriber` are only used for reporting.
    pub fn new<F>(event: Arc<str>, subscriber: SubscriberId, run: F) -> Self
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        Self {
            event,
            subscriber,
            run: Box::new(run),
        }
    }

    /// Event being delivered.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Subscriber being delivered to.
    pub fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }
}

impl fmt::Debug for DeliveryTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryTask")
            .field("event", &self.event)
            .field("subscriber", &self.subscriber)
            .finish_non_exhaustive()
    }
}

/// Counters describing a queue's activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Listener invocations that completed.
    pub delivered: u64,
    /// Listener invocations that returned an error or panicked.
    pub failed: u64,
    /// Pauses taken between bursts.
    pub yields: u64,
    /// Tasks waiting in the queue.
    pub pending: usize,
}

/// [`Pacer`] backed by the Tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

impl Pacer for TokioPacer {
    fn pause(&self, delay: Duration) -> BoxFuture<'static, ()> {
        if delay.is_zero() {
            Box::pin(tokio::task::yield_now())
        } else {
            Box::pin(tokio::time::sleep(delay))
        }
    }
}

/// Shared, time-sliced FIFO of delivery tasks.
///
/// Cloning is cheap; clones share the same queue.
#[derive(Clone)]
pub struct DeliveryQueue {
    inner: Arc<Inner>,
}

struct Inner {
    config: DispatchConfig,
    pacer: Arc<dyn Pacer>,
    on_failure: Option<FailureCallback>,
    tasks: Mutex<VecDeque<DeliveryTask>>,
    draining: AtomicBool,
    burst: AtomicUsize,
    delivered: AtomicU64,
    failed: AtomicU64,
    yields: AtomicU64,
    idle: Notify,
}

impl DeliveryQueue {
    /// Create a queue paced by [`TokioPacer`].
    pub fn new(config: DispatchConfig) -> Result<Self, ConfigError> {
        Self::builder().config(config).build()
    }

    /// Start building a queue.
    pub fn builder() -> DeliveryQueueBuilder {
        DeliveryQueueBuilder::default()
    }

    /// The time slicing settings.
    pub fn config(&self) -> DispatchConfig {
        self.inner.config
    }

    /// Append tasks at the tail, in iteration order, and make sure a drain
    /// loop will pick them up.
    ///
    /// Returns the number of tasks appended.
    pub fn enqueue<I>(&self, tasks: I) -> usize
    where
        I: IntoIterator<Item = DeliveryTask>,
    {
        let appended = {
            let mut queue = self.inner.lock_tasks();
            let before = queue.len();
            queue.extend(tasks);
            queue.len() - before
        };

        if appended > 0 {
            #[cfg(feature = "tracing")]
            tracing::debug!(appended, "enqueued deliveries");
            self.inner.schedule();
        }
        appended
    }

    /// Append a single task.
    pub fn push(&self, task: DeliveryTask) {
        self.enqueue(std::iter::once(task));
    }

    /// Run the queue until it is empty and no drain loop is active.
    ///
    /// If another loop is already draining, waits for it to finish instead of
    /// competing with it.
    pub async fn drain(&self) {
        loop {
            let idle = self.inner.idle.notified();
            if self.inner.try_begin() {
                Arc::clone(&self.inner).run().await;
            } else if self.is_draining() {
                idle.await;
            }
            if self.is_idle() {
                return;
            }
        }
    }

    /// Number of tasks waiting.
    pub fn pending(&self) -> usize {
        self.inner.lock_tasks().len()
    }

    /// Returns `true` while a drain loop is running.
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Acquire)
    }

    /// Returns `true` when nothing is queued and nothing is running.
    pub fn is_idle(&self) -> bool {
        !self.is_draining() && self.pending() == 0
    }

    /// Snapshot of the queue counters.
    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            yields: self.inner.yields.load(Ordering::Relaxed),
            pending: self.pending(),
        }
    }
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        DeliveryQueueBuilder::default().assemble()
    }
}

impl fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("config", &self.inner.config)
            .field("draining", &self.is_draining())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Inner {
    fn lock_tasks(&self) -> MutexGuard<'_, VecDeque<DeliveryTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_begin(&self) -> bool {
        self.draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn schedule(self: &Arc<Self>) {
        if !self.try_begin() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(Arc::clone(self).run());
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("no tokio runtime, deliveries wait for an explicit drain");
                self.draining.store(false, Ordering::Release);
                self.idle.notify_waiters();
            }
        }
    }

    async fn run(self: Arc<Self>) {
        #[cfg(feature = "tracing")]
        tracing::debug!("drain started");

        loop {
            let next = self.lock_tasks().pop_front();
            let Some(task) = next else {
                self.draining.store(false, Ordering::Release);
                self.idle.notify_waiters();
                // A producer may have appended after the pop but before the
                // flag was released; it saw `draining == true` and left.
                if self.lock_tasks().is_empty() || !self.try_begin() {
                    break;
                }
                continue;
            };

            self.deliver(task);

            if self.end_of_burst() {
                self.yields.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                tracing::debug!(delay = ?self.config.delay, "burst limit reached, yielding");
                self.pacer.pause(self.config.delay).await;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("drain finished");
    }

    fn end_of_burst(&self) -> bool {
        let count = self.burst.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        if count > self.config.max_sync {
            self.burst.store(0, Ordering::Release);
            true
        } else {
            false
        }
    }

    fn deliver(&self, task: DeliveryTask) {
        let DeliveryTask {
            event,
            subscriber,
            run,
        } = task;

        let failure = match panic::catch_unwind(AssertUnwindSafe(run)) {
            Ok(Ok(())) => None,
            Ok(Err(source)) => Some(DispatchError::MisbehavingListener {
                event,
                subscriber,
                source,
            }),
            Err(payload) => Some(DispatchError::ListenerPanicked {
                event,
                subscriber,
                message: panic_message(&*payload),
            }),
        };

        let Some(err) = failure else {
            self.delivered.fetch_add(1, Ordering::Relaxed);
            return;
        };

        self.failed.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "tracing")]
        tracing::warn!(
            event = err.event(),
            subscriber = %err.subscriber(),
            error = %err,
            "listener failed, continuing delivery"
        );
        if let Some(callback) = &self.on_failure {
            callback(&err);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder for [`DeliveryQueue`].
#[derive(Default)]
pub struct DeliveryQueueBuilder {
    config: DispatchConfig,
    pacer: Option<Arc<dyn Pacer>>,
    on_failure: Option<FailureCallback>,
}

impl DeliveryQueueBuilder {
    /// Set the time slicing settings.
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default [`TokioPacer`].
    pub fn pacer<P: Pacer>(self, pacer: P) -> Self {
        self.shared_pacer(Arc::new(pacer))
    }

    /// Replace the default [`TokioPacer`] with a shared pacer.
    pub fn shared_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = Some(pacer);
        self
    }

    /// Observe listener failures.
    pub fn on_failure<F>(self, callback: F) -> Self
    where
        F: Fn(&DispatchError) + Send + Sync + 'static,
    {
        self.shared_on_failure(Arc::new(callback))
    }

    /// Observe listener failures through a shared callback.
    pub fn shared_on_failure(mut self, callback: FailureCallback) -> Self {
        self.on_failure = Some(callback);
        self
    }

    /// Validate the configuration and build the queue.
    pub fn build(self) -> Result<DeliveryQueue, ConfigError> {
        self.config.validate()?;
        Ok(self.assemble())
    }

    fn assemble(self) -> DeliveryQueue {
        DeliveryQueue {
            inner: Arc::new(Inner {
                config: self.config,
                pacer: self.pacer.unwrap_or_else(|| Arc::new(TokioPacer)),
                on_failure: self.on_failure,
                tasks: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                burst: AtomicUsize::new(0),
                delivered: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                yields: AtomicU64::new(0),
                idle: Notify::new(),
            }),
        }
    }
}
