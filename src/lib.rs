//! # Presto Query Adapter
//!
//! Bridges a callback-driven, streaming SQL client to async callers while
//! bounding concurrency, result memory and cancellation latency.
//!
//! ## Architecture
//!
//! ```text
//! QueryAdapter::execute(sql, options)
//!     ↓
//! [ConcurrencyLimitedPool]      ≤ K in flight, ≤ F starts per window
//!     ↓
//! [QueryExecutionSession]       callbacks → single outcome, cancel flag
//!     ↓
//! [BoundedResultCollector]      row / byte ceilings
//!     ↓
//! [QueryClient]                 Presto REST protocol (or any other engine)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use presto_adapter::{Config, QueryAdapter, Target};
//!
//! let config = Config::load()?;
//! let adapter = QueryAdapter::from_config(&config)?;
//!
//! let result = adapter.execute("select * from hive.web.events").await?;
//! println!("{} rows", result.rows.len());
//!
//! let preview = adapter.preview(&Target::new("hive", "web", "events"), 10).await?;
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `execution` | Limits, collector, session state machine, cancellation |
//! | `pool` | Concurrency- and rate-limited scheduler |
//! | `client` | Remote engine callback contract and HTTP client |
//! | `adapter` | `execute` and the introspection helpers |
//! | `config` | Layered configuration |

pub mod adapter;
pub mod client;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod execution;
pub mod pool;
pub mod target;

pub use adapter::{ExecuteOptions, ExecutionResult, QueryAdapter, DEFAULT_PREVIEW_ROWS};
pub use client::{
    ColumnMetadata, EngineError, EngineErrorLocation, PrestoHttpClient, QueryCallbacks,
    QueryClient, QueryStats, Row,
};
pub use config::Config;
pub use error::{AdapterError, AdapterResult};
pub use evaluation::{
    split_statements, ErrorLocation, EvaluationError, EvaluationQuery, EvaluationStatus,
    QueryEvaluation,
};
pub use execution::{
    AccumulatedResult, BoundedResultCollector, CancelHandle, ExecutionLimits, LimitKind,
    QueryExecutionSession, QueryTimeout, SessionCompletion, SessionOutcome, SessionState,
    TimeoutError,
};
pub use pool::{ConcurrencyLimitedPool, PoolStats, TaskHandle, MAX_CONCURRENCY_LIMIT};
pub use target::{Field, TableMetadata, Target};
