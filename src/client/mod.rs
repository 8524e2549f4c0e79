//! Remote Query Engine Client Interface
//!
//! The remote engine is driven through a push-style callback contract: a
//! client accepts one query string plus a [`QueryCallbacks`] object and then
//! reports progress exclusively through that object, zero or more times per
//! hook, from whatever task or thread it likes.
//!
//! ## Callback contract
//!
//! - `on_state` / `on_columns` / `on_data` may arrive any number of times
//! - `on_success` or `on_error` ends the query from the client's point of view
//! - `is_cancelled` is polled by the client at a cadence of its choosing; a
//!   `true` answer is a request to abort, not a guarantee that no further
//!   callbacks will be delivered
//!
//! [`http::PrestoHttpClient`] implements this contract over the Presto REST
//! protocol.

pub mod http;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use http::PrestoHttpClient;

/// A result row: ordered, uninterpreted column values
pub type Row = Vec<serde_json::Value>;

/// Column metadata as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        ColumnMetadata {
            name: name.into(),
            column_type: column_type.into(),
        }
    }
}

/// Engine-side progress statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryStats {
    /// QUEUED, PLANNING, STARTING, RUNNING, FINISHED or FAILED
    pub state: String,
    pub queued: bool,
    pub scheduled: bool,
    pub nodes: u64,
    pub total_splits: u64,
    pub queued_splits: u64,
    pub running_splits: u64,
    pub completed_splits: u64,
    pub cpu_time_millis: u64,
    pub wall_time_millis: u64,
    pub processed_rows: u64,
    pub processed_bytes: u64,
}

/// Position of a failure inside the submitted statement (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineErrorLocation {
    pub line_number: u32,
    pub column_number: u32,
}

/// Query failure reported by the remote engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
    #[serde(default)]
    pub error_name: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_location: Option<EngineErrorLocation>,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        EngineError {
            message: message.into(),
            error_name: None,
            error_type: None,
            error_location: None,
        }
    }

    /// Failure that happened between the adapter and the engine rather than
    /// inside the engine
    pub fn transport(message: impl Into<String>) -> Self {
        EngineError {
            error_name: Some("TRANSPORT_ERROR".to_string()),
            error_type: Some("EXTERNAL".to_string()),
            ..EngineError::new(message)
        }
    }

    pub fn with_location(mut self, line_number: u32, column_number: u32) -> Self {
        self.error_location = Some(EngineErrorLocation {
            line_number,
            column_number,
        });
        self
    }
}

/// Hooks a [`QueryClient`] invokes while a query runs
pub trait QueryCallbacks: Send + Sync {
    /// Query id and stats, delivered on every progress update
    fn on_state(&self, query_id: &str, stats: QueryStats);

    /// Column metadata, delivered once it is known
    fn on_columns(&self, columns: Vec<ColumnMetadata>);

    /// One batch of rows
    fn on_data(&self, rows: Vec<Row>, columns: Vec<ColumnMetadata>, stats: QueryStats);

    /// Query finished normally
    fn on_success(&self, stats: QueryStats);

    /// Query failed
    fn on_error(&self, error: EngineError);

    /// Polled by the client; `true` asks it to abort the query
    fn is_cancelled(&self) -> bool;
}

/// A callback-driven remote query engine client
///
/// `execute` must not block: it starts the query and returns, reporting
/// everything else through `callbacks`.
pub trait QueryClient: Send + Sync + 'static {
    fn execute(&self, query: String, callbacks: Arc<dyn QueryCallbacks>);
}

impl<C: QueryClient + ?Sized> QueryClient for Arc<C> {
    fn execute(&self, query: String, callbacks: Arc<dyn QueryCallbacks>) {
        (**self).execute(query, callbacks);
    }
}
