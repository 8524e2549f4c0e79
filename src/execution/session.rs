//! Query Execution Session
//!
//! Bridges the remote client's push-style callbacks to a single awaited
//! outcome. One session covers one query submission.
//!
//! ## State machine
//!
//! ```text
//!             on_data (collector full)
//!   Pending ─────────────────────────────▶ LimitExceeded
//!      │  on_success                   ▶ Succeeded
//!      │  on_error / cancel            ▶ Failed
//!      └─ on_state / on_columns / on_data (room left) ─▶ Pending
//! ```
//!
//! The first terminal transition wins and resolves the completion channel.
//! Every handler starts with the same terminal-state guard, so callbacks the
//! client delivers after cancellation was requested are counted and dropped.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use super::collector::BoundedResultCollector;
use super::limits::{ExecutionLimits, LimitKind};
use super::timeout::CancelHandle;
use crate::client::{ColumnMetadata, EngineError, QueryCallbacks, QueryStats, Row};
use crate::error::{AdapterError, AdapterResult};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Succeeded,
    LimitExceeded,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionState::Pending)
    }
}

/// Everything collected for one query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulatedResult {
    pub rows: Vec<Row>,
    pub columns: Option<Vec<ColumnMetadata>>,
    pub query_id: Option<String>,
    pub stats: Option<QueryStats>,
}

/// Successful end of a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    /// `Succeeded` or `LimitExceeded`
    pub state: SessionState,
    /// Budget that stopped collection, for `LimitExceeded`
    pub limit: Option<LimitKind>,
    pub result: AccumulatedResult,
}

impl SessionOutcome {
    pub fn is_partial(&self) -> bool {
        self.state == SessionState::LimitExceeded
    }
}

type Resolver = oneshot::Sender<Result<SessionOutcome, EngineError>>;

struct SessionInner {
    state: SessionState,
    collector: BoundedResultCollector,
    columns: Option<Vec<ColumnMetadata>>,
    query_id: Option<String>,
    stats: Option<QueryStats>,
    resolver: Option<Resolver>,
    late_callbacks: u64,
}

impl SessionInner {
    fn snapshot(&mut self) -> AccumulatedResult {
        AccumulatedResult {
            rows: self.collector.take_rows(),
            columns: self.columns.take(),
            query_id: self.query_id.take(),
            stats: self.stats.take(),
        }
    }

    fn resolve(&mut self, state: SessionState, outcome: Result<SessionOutcome, EngineError>) {
        self.state = state;
        if let Some(resolver) = self.resolver.take() {
            // The waiting side may have given up (timeout); nothing to do then.
            let _ = resolver.send(outcome);
        }
    }
}

/// One query's execution lifecycle
pub struct QueryExecutionSession {
    id: Uuid,
    cancel: CancelHandle,
    cancel_on_limit: bool,
    inner: Mutex<SessionInner>,
}

/// Receiving half of a session's single resolution
#[derive(Debug)]
pub struct SessionCompletion {
    session_id: Uuid,
    receiver: oneshot::Receiver<Result<SessionOutcome, EngineError>>,
}

impl SessionCompletion {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Wait for the terminal outcome
    ///
    /// Resolves with [`AdapterError::Abandoned`] if the client released the
    /// session without ever reporting success or failure.
    pub async fn wait(self) -> AdapterResult<SessionOutcome> {
        match self.receiver.await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(engine_error)) => Err(AdapterError::RemoteClient(engine_error)),
            Err(_) => Err(AdapterError::Abandoned),
        }
    }
}

impl QueryExecutionSession {
    /// Create a session with a fresh cancellation flag
    ///
    /// The session raises its cancellation flag when the collector trips, so
    /// the remote query stops instead of running to completion.
    pub fn new(limits: ExecutionLimits) -> (Arc<Self>, SessionCompletion) {
        Self::with_cancel_handle(limits, CancelHandle::new(), true)
    }

    /// Create a session around an existing flag
    ///
    /// With `cancel_on_limit = false` a limit trip resolves the session but
    /// leaves the remote query running until it finishes on its own.
    pub fn with_cancel_handle(
        limits: ExecutionLimits,
        cancel: CancelHandle,
        cancel_on_limit: bool,
    ) -> (Arc<Self>, SessionCompletion) {
        let (tx, rx) = oneshot::channel();
        let id = Uuid::new_v4();
        let session = Arc::new(QueryExecutionSession {
            id,
            cancel,
            cancel_on_limit,
            inner: Mutex::new(SessionInner {
                state: SessionState::Pending,
                collector: BoundedResultCollector::new(limits),
                columns: None,
                query_id: None,
                stats: None,
                resolver: Some(tx),
                late_callbacks: 0,
            }),
        });
        let completion = SessionCompletion {
            session_id: id,
            receiver: rx,
        };
        (session, completion)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Callbacks dropped because they arrived after the terminal state
    pub fn late_callbacks(&self) -> u64 {
        self.inner.lock().late_callbacks
    }

    /// Raise the cancellation flag and fail the session if still pending
    pub fn cancel(&self, reason: EngineError) {
        self.cancel.cancel();
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return;
        }
        debug!(session_id = %self.id, reason = %reason, "session_cancelled");
        inner.resolve(SessionState::Failed, Err(reason));
    }

    /// Shared guard: `None` once terminal, counting the dropped callback
    fn pending(&self, hook: &'static str) -> Option<parking_lot::MutexGuard<'_, SessionInner>> {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            inner.late_callbacks += 1;
            debug!(session_id = %self.id, hook, state = ?inner.state, "session_late_callback_ignored");
            return None;
        }
        Some(inner)
    }
}

impl QueryCallbacks for QueryExecutionSession {
    fn on_state(&self, query_id: &str, stats: QueryStats) {
        let Some(mut inner) = self.pending("state") else {
            return;
        };
        inner.query_id = Some(query_id.to_string());
        inner.stats = Some(stats);
    }

    fn on_columns(&self, columns: Vec<ColumnMetadata>) {
        let Some(mut inner) = self.pending("columns") else {
            return;
        };
        inner.columns = Some(columns);
    }

    fn on_data(&self, rows: Vec<Row>, columns: Vec<ColumnMetadata>, stats: QueryStats) {
        let Some(mut inner) = self.pending("data") else {
            return;
        };
        inner.columns = Some(columns);
        inner.stats = Some(stats);
        if inner.collector.push(rows) {
            return;
        }

        if self.cancel_on_limit {
            self.cancel.cancel();
        }
        let limit = inner.collector.exceeded();
        debug!(
            session_id = %self.id,
            rows = inner.collector.row_count(),
            bytes = inner.collector.byte_estimate(),
            limit = ?limit,
            "session_limit_exceeded"
        );
        let result = inner.snapshot();
        inner.resolve(
            SessionState::LimitExceeded,
            Ok(SessionOutcome {
                state: SessionState::LimitExceeded,
                limit,
                result,
            }),
        );
    }

    fn on_success(&self, stats: QueryStats) {
        let Some(mut inner) = self.pending("success") else {
            return;
        };
        inner.stats = Some(stats);
        let result = inner.snapshot();
        debug!(session_id = %self.id, rows = result.rows.len(), "session_succeeded");
        inner.resolve(
            SessionState::Succeeded,
            Ok(SessionOutcome {
                state: SessionState::Succeeded,
                limit: None,
                result,
            }),
        );
    }

    fn on_error(&self, error: EngineError) {
        let Some(mut inner) = self.pending("error") else {
            return;
        };
        self.cancel.cancel();
        warn!(session_id = %self.id, error = %error, "session_failed");
        inner.resolve(SessionState::Failed, Err(error));
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
