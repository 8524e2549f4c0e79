//! Advisory Cancellation and Query Timeouts
//!
//! Cancellation is cooperative: a shared atomic flag is raised by the
//! adapter and polled by the remote client, which decides when to stop.
//! A raised flag is a request, not a guarantee that no more callbacks will
//! arrive.
//!
//! [`QueryTimeout`] layers an optional caller deadline on top of the same
//! flag, so an elapsed timeout and an explicit cancel look identical to
//! the client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timeout error
#[derive(Debug, Clone, thiserror::Error)]
#[error("Query exceeded timeout of {timeout:?} (ran for {elapsed:?})")]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub timeout: Duration,
    /// How long the query actually ran
    pub elapsed: Duration,
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        CancelHandle::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Query deadline bound to a cancellation flag
#[derive(Debug, Clone)]
pub struct QueryTimeout {
    handle: CancelHandle,

    /// When the query started
    start_time: Instant,

    /// Maximum allowed duration
    timeout_duration: Option<Duration>,
}

impl QueryTimeout {
    /// Create a timeout controller that trips `handle` when it expires
    pub fn new(handle: CancelHandle, timeout: Option<Duration>) -> Self {
        QueryTimeout {
            handle,
            start_time: Instant::now(),
            timeout_duration: timeout,
        }
    }

    /// Create a timeout controller with no deadline
    pub fn infinite(handle: CancelHandle) -> Self {
        QueryTimeout::new(handle, None)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.timeout_duration
    }

    /// Check the deadline, raising the cancellation flag once it has passed
    pub fn check(&self) -> Result<(), TimeoutError> {
        if let Some(timeout) = self.timeout_duration {
            let elapsed = self.start_time.elapsed();
            if elapsed > timeout {
                self.handle.cancel();
                return Err(TimeoutError { timeout, elapsed });
            }
        }
        Ok(())
    }

    /// Raise the flag unconditionally and describe the expiry
    pub fn expire(&self) -> TimeoutError {
        self.handle.cancel();
        TimeoutError {
            timeout: self.timeout_duration.unwrap_or(Duration::ZERO),
            elapsed: self.start_time.elapsed(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// Get the elapsed time since the query started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get the remaining time before timeout (if any)
    pub fn remaining(&self) -> Option<Duration> {
        self.timeout_duration
            .map(|timeout| timeout.saturating_sub(self.start_time.elapsed()))
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }
}
