//! Concurrency-Limited Submission Pool
//!
//! Runs query tasks against the remote engine with two independent
//! throttles:
//! - at most `concurrency_limit` tasks executing at once
//! - at most `frequency_limit` task starts in any sliding `frequency_window`
//!
//! ## Design
//!
//! ```text
//! submit() ──► queue (unbounded mpsc, submission order)
//!                 ↓
//!             dispatcher task:  slot permit → rate window → hand permit over
//!                 ↓
//!             spawned task:     runs the generator while holding the permit
//! ```
//!
//! Every submission is spawned onto the runtime immediately and parks until
//! the single dispatcher hands it a slot. The dispatcher serves the queue in
//! order, so a task never starts before one submitted earlier, whatever the
//! runtime flavor. Dropping a [`TaskHandle`] detaches the task; aborting it
//! cancels only that task, and its slot returns to the pool when the permit
//! drops.

use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::PoolConfig;
use crate::error::{AdapterError, AdapterResult};

/// Largest accepted concurrency limit; higher values are clamped
pub const MAX_CONCURRENCY_LIMIT: usize = if Semaphore::MAX_PERMITS < u32::MAX as usize {
    Semaphore::MAX_PERMITS
} else {
    u32::MAX as usize
};

/// Snapshot of pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Tasks currently executing
    pub active: usize,
    /// Highest number of simultaneously executing tasks observed
    pub peak_active: usize,
    pub submitted: u64,
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Default)]
struct PoolCounters {
    active: AtomicUsize,
    peak_active: AtomicUsize,
    submitted: AtomicU64,
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Marks one task as executing; unwinding counts as a failure
struct ActiveGuard<'a> {
    counters: &'a PoolCounters,
    finished: bool,
}

impl<'a> ActiveGuard<'a> {
    fn enter(counters: &'a PoolCounters) -> Self {
        let now_active = counters.active.fetch_add(1, Ordering::AcqRel) + 1;
        counters.peak_active.fetch_max(now_active, Ordering::AcqRel);
        counters.started.fetch_add(1, Ordering::Relaxed);
        ActiveGuard {
            counters,
            finished: false,
        }
    }

    fn finish(mut self, ok: bool) {
        self.finished = true;
        let counter = if ok {
            &self.counters.completed
        } else {
            &self.counters.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Sliding-window start limiter
struct RateWindow {
    /// 0 = unlimited
    limit: usize,
    window: Duration,
    starts: AsyncMutex<VecDeque<Instant>>,
}

impl RateWindow {
    fn new(limit: usize, window: Duration) -> Self {
        RateWindow {
            limit,
            window,
            starts: AsyncMutex::new(VecDeque::new()),
        }
    }

    fn is_unlimited(&self) -> bool {
        self.limit == 0 || self.window.is_zero()
    }

    /// Wait until a start fits in the window, then record it
    async fn admit(&self, task_id: u64) {
        if self.is_unlimited() {
            return;
        }
        let mut starts = self.starts.lock().await;
        loop {
            let now = Instant::now();
            while starts
                .front()
                .is_some_and(|started| now.duration_since(*started) >= self.window)
            {
                starts.pop_front();
            }
            if starts.len() < self.limit {
                starts.push_back(now);
                return;
            }
            // Full window: limit >= 1, so the oldest start exists
            let wake_at = starts[0] + self.window;
            trace!(
                task_id,
                wait_ms = wake_at.saturating_duration_since(now).as_millis() as u64,
                "pool_rate_limited"
            );
            tokio::time::sleep_until(wake_at).await;
        }
    }
}

/// Requests served by the dispatcher, in arrival order
enum Dispatch {
    Start {
        task_id: u64,
        ready: oneshot::Sender<OwnedSemaphorePermit>,
    },
    Close {
        done: oneshot::Sender<()>,
    },
}

/// Hands out slots in submission order until the pool closes or is dropped
async fn dispatch(
    mut queue: mpsc::UnboundedReceiver<Dispatch>,
    slots: Arc<Semaphore>,
    rate: Arc<RateWindow>,
    concurrency_limit: usize,
) {
    while let Some(request) = queue.recv().await {
        match request {
            Dispatch::Start { task_id, ready } => {
                if ready.is_closed() {
                    trace!(task_id, "pool_task_dropped_while_queued");
                    continue;
                }
                let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
                    break;
                };
                rate.admit(task_id).await;
                // An aborted task refuses the permit, which returns it to the pool
                if ready.send(permit).is_err() {
                    trace!(task_id, "pool_task_dropped_while_queued");
                }
            }
            Dispatch::Close { done } => {
                let permits = u32::try_from(concurrency_limit).unwrap_or(u32::MAX);
                if let Ok(all) = slots.acquire_many(permits).await {
                    slots.close();
                    drop(all);
                }
                let _ = done.send(());
                break;
            }
        }
    }
    debug!("pool_dispatcher_stopped");
}

struct PoolInner {
    concurrency_limit: usize,
    slots: Arc<Semaphore>,
    rate: Arc<RateWindow>,
    counters: Arc<PoolCounters>,
    next_task_id: AtomicU64,
    queue: mpsc::UnboundedSender<Dispatch>,
    /// Taken when the dispatcher is spawned on first use
    idle_receiver: Mutex<Option<mpsc::UnboundedReceiver<Dispatch>>>,
}

/// Concurrency- and rate-limited task scheduler
#[derive(Clone)]
pub struct ConcurrencyLimitedPool {
    inner: Arc<PoolInner>,
}

impl ConcurrencyLimitedPool {
    /// Create a pool. A concurrency limit of 0 is raised to 1 and values above
    /// [`MAX_CONCURRENCY_LIMIT`] are clamped; a frequency limit of 0 disables
    /// rate limiting.
    ///
    /// Does not need a runtime; the dispatcher starts on the first
    /// submission.
    pub fn new(concurrency_limit: usize, frequency_limit: usize, frequency_window: Duration) -> Self {
        let concurrency_limit = concurrency_limit.clamp(1, MAX_CONCURRENCY_LIMIT);
        let (queue, receiver) = mpsc::unbounded_channel();
        ConcurrencyLimitedPool {
            inner: Arc::new(PoolInner {
                concurrency_limit,
                slots: Arc::new(Semaphore::new(concurrency_limit)),
                rate: Arc::new(RateWindow::new(frequency_limit, frequency_window)),
                counters: Arc::new(PoolCounters::default()),
                next_task_id: AtomicU64::new(1),
                queue,
                idle_receiver: Mutex::new(Some(receiver)),
            }),
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(
            config.concurrency_limit,
            config.frequency_limit,
            config.frequency_window(),
        )
    }

    pub fn concurrency_limit(&self) -> usize {
        self.inner.concurrency_limit
    }

    pub fn frequency_limit(&self) -> usize {
        self.inner.rate.limit
    }

    pub fn frequency_window(&self) -> Duration {
        self.inner.rate.window
    }

    fn ensure_dispatcher(&self) {
        if let Some(receiver) = self.inner.idle_receiver.lock().take() {
            tokio::spawn(dispatch(
                receiver,
                Arc::clone(&self.inner.slots),
                Arc::clone(&self.inner.rate),
                self.inner.concurrency_limit,
            ));
        }
    }

    /// Queue a task. The generator is called once every earlier submission
    /// has started, a slot is free and the rate window admits another start.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit<F, Fut, T>(&self, generator: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = AdapterResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_dispatcher();
        let task_id = self.inner.next_task_id.fetch_add(1, Ordering::Relaxed);
        self.inner.counters.submitted.fetch_add(1, Ordering::Relaxed);

        // Enqueued before spawning so queue order is submission order
        let (ready, slot) = oneshot::channel();
        if self.inner.queue.send(Dispatch::Start { task_id, ready }).is_err() {
            debug!(task_id, "pool_submit_after_close");
        }

        let counters = Arc::clone(&self.inner.counters);
        let join = tokio::spawn(async move {
            let Ok(_permit) = slot.await else {
                debug!(task_id, "pool_task_rejected_closed");
                return Err(AdapterError::Cancelled);
            };

            let active = ActiveGuard::enter(&counters);
            trace!(task_id, "pool_task_started");
            let result = generator().await;
            active.finish(result.is_ok());
            trace!(task_id, ok = result.is_ok(), "pool_task_finished");
            result
        });

        TaskHandle { task_id, join }
    }

    /// Submit and wait in one step
    pub async fn run<F, Fut, T>(&self, generator: F) -> AdapterResult<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = AdapterResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(generator).await
    }

    /// Wait for queued and running tasks to finish, then refuse new ones
    pub async fn close(&self) {
        self.ensure_dispatcher();
        let (done, closed) = oneshot::channel();
        if self.inner.queue.send(Dispatch::Close { done }).is_ok() {
            // Err means another close got there first and has finished
            let _ = closed.await;
        }
        debug!("pool_closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.slots.is_closed()
    }

    pub fn stats(&self) -> PoolStats {
        let c = &self.inner.counters;
        PoolStats {
            active: c.active.load(Ordering::Acquire),
            peak_active: c.peak_active.load(Ordering::Acquire),
            submitted: c.submitted.load(Ordering::Relaxed),
            started: c.started.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for ConcurrencyLimitedPool {
    fn default() -> Self {
        Self::from_config(&PoolConfig::default())
    }
}

/// Handle to one submitted task; resolves with the generator's result
#[derive(Debug)]
pub struct TaskHandle<T> {
    task_id: u64,
    join: JoinHandle<AdapterResult<T>>,
}

impl<T> TaskHandle<T> {
    pub fn task_id(&self) -> u64 {
        self.task_id
    }

    /// Cancel this task only; it resolves with [`AdapterError::Cancelled`]
    pub fn abort(&self) {
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = AdapterResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.join).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(err) => Err(join_error(err)),
        })
    }
}

fn join_error(err: JoinError) -> AdapterError {
    if err.is_cancelled() {
        return AdapterError::Cancelled;
    }
    match err.try_into_panic() {
        Ok(payload) => AdapterError::PoolRejection(panic_message(payload.as_ref())),
        Err(err) => AdapterError::PoolRejection(err.to_string()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "task panicked".to_string()
    }
}
