//! Query Execution Module
//!
//! Per-query machinery that every `execute` call routes through:
//! - Row/byte ceilings on streamed results
//! - Callback-to-future bridging via an explicit session state machine
//! - Advisory cancellation and caller timeouts

mod collector;
mod limits;
mod session;
mod timeout;

pub use collector::{estimate_row_bytes, BoundedResultCollector};
pub use limits::{ExecutionLimits, LimitKind, DEFAULT_BYTE_LIMIT, DEFAULT_ROW_LIMIT};
pub use session::{
    AccumulatedResult, QueryExecutionSession, SessionCompletion, SessionOutcome, SessionState,
};
pub use timeout::{CancelHandle, QueryTimeout, TimeoutError};
