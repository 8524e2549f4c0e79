//! Query Adapter
//!
//! Public entry point. Every statement, including the introspection
//! helpers, goes through [`QueryAdapter::execute_with`]:
//!
//! ```text
//! execute(sql, options)
//!     ↓
//! pool.submit(task)            waits for a slot and a rate-window start
//!     ↓
//! QueryExecutionSession        callbacks → collector → single outcome
//!     ↓
//! ExecutionResult { rows, metadata }
//! ```
//!
//! A limit trip is not an error: it resolves normally with the rows
//! collected so far. Engine failures and pool failures reach the caller
//! unchanged.

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::client::{EngineError, PrestoHttpClient, QueryClient, Row};
use crate::config::Config;
use crate::error::{AdapterError, AdapterResult};
use crate::evaluation::{EvaluationQuery, QueryEvaluation};
use crate::execution::{ExecutionLimits, QueryExecutionSession, QueryTimeout, SessionOutcome};
use crate::pool::{ConcurrencyLimitedPool, PoolStats};
use crate::target::{Field, TableMetadata, Target};

/// Default row count for [`QueryAdapter::preview`]
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// Normalized result of one statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub rows: Vec<Row>,
    /// Reserved; currently always empty
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Per-call execution settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecuteOptions {
    pub limits: ExecutionLimits,
    /// Deadline measured from the moment the query starts executing
    pub timeout: Option<Duration>,
}

impl ExecuteOptions {
    pub fn with_limits(limits: ExecutionLimits) -> Self {
        ExecuteOptions {
            limits,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Bounded, rate-limited front end to a remote query engine
pub struct QueryAdapter<C: QueryClient> {
    client: Arc<C>,
    pool: ConcurrencyLimitedPool,
    defaults: ExecuteOptions,
}

impl QueryAdapter<PrestoHttpClient> {
    /// Build an adapter talking to the coordinator named in `config`
    pub fn from_config(config: &Config) -> AdapterResult<Self> {
        let client = PrestoHttpClient::new(&config.client)?;
        let defaults = ExecuteOptions::with_limits(config.limits.execution_limits())
            .with_timeout(config.limits.query_timeout());
        info!(
            base_url = %config.client.base_url(),
            concurrency_limit = config.pool.concurrency_limit,
            frequency_limit = config.pool.frequency_limit,
            "adapter_created"
        );
        Ok(QueryAdapter::new(client, ConcurrencyLimitedPool::from_config(&config.pool))
            .with_defaults(defaults))
    }
}

impl<C: QueryClient> QueryAdapter<C> {
    pub fn new(client: C, pool: ConcurrencyLimitedPool) -> Self {
        QueryAdapter {
            client: Arc::new(client),
            pool,
            defaults: ExecuteOptions::default(),
        }
    }

    /// Options used by `execute` and the introspection helpers
    pub fn with_defaults(mut self, defaults: ExecuteOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> ExecuteOptions {
        self.defaults
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Run a statement with the default limits
    pub async fn execute(&self, sql: &str) -> AdapterResult<ExecutionResult> {
        self.execute_with(sql, self.defaults).await
    }

    /// Run a statement with explicit limits and timeout
    pub async fn execute_with(
        &self,
        sql: &str,
        options: ExecuteOptions,
    ) -> AdapterResult<ExecutionResult> {
        let outcome = self.execute_session(sql, options).await?;
        Ok(ExecutionResult {
            rows: outcome.result.rows,
            metadata: serde_json::Map::new(),
        })
    }

    /// Run a statement and return the full session outcome (columns,
    /// query id, stats and whether a limit stopped collection)
    pub async fn execute_session(
        &self,
        sql: &str,
        options: ExecuteOptions,
    ) -> AdapterResult<SessionOutcome> {
        let client = Arc::clone(&self.client);
        let query = sql.to_string();
        self.pool
            .run(move || async move {
                let (session, completion) = QueryExecutionSession::new(options.limits);
                let deadline = QueryTimeout::new(session.cancel_handle(), options.timeout);
                let weak = Arc::downgrade(&session);
                debug!(session_id = %session.id(), query = %query, "query_submitted");
                client.execute(query, session);

                let Some(remaining) = deadline.remaining() else {
                    return completion.wait().await;
                };
                match tokio::time::timeout(remaining, completion.wait()).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        let expired = deadline.expire();
                        if let Some(session) = weak.upgrade() {
                            session.cancel(EngineError::new(expired.to_string()));
                        }
                        Err(AdapterError::Timeout(expired))
                    }
                }
            })
            .await
    }

    /// `show catalogs`
    pub async fn catalogs(&self) -> AdapterResult<Vec<String>> {
        let result = self.execute("show catalogs").await?;
        Ok(flatten_strings(result.rows))
    }

    /// `show schemas from <catalog>`
    pub async fn schemas(&self, catalog: &str) -> AdapterResult<Vec<String>> {
        let result = self.execute(&format!("show schemas from {catalog}")).await?;
        Ok(flatten_strings(result.rows))
    }

    pub async fn create_schema(&self, catalog: &str, schema: &str) -> AdapterResult<()> {
        self.execute(&format!("create schema if not exists {catalog}.{schema}"))
            .await?;
        Ok(())
    }

    /// Every table in every schema of every catalog
    ///
    /// Schema listings run concurrently, bounded by the pool.
    pub async fn tables(&self) -> AdapterResult<Vec<Target>> {
        let catalogs = self.catalogs().await?;
        let per_catalog = try_join_all(catalogs.iter().map(|catalog| async move {
            let schemas = self.schemas(catalog).await?;
            try_join_all(
                schemas
                    .iter()
                    .map(|schema| self.tables_in(catalog, schema)),
            )
            .await
        }))
        .await?;
        Ok(per_catalog.into_iter().flatten().flatten().collect())
    }

    async fn tables_in(&self, catalog: &str, schema: &str) -> AdapterResult<Vec<Target>> {
        let result = self
            .execute(&format!("show tables from {catalog}.{schema}"))
            .await?;
        Ok(flatten_strings(result.rows)
            .into_iter()
            .map(|name| Target::new(catalog, schema, name))
            .collect())
    }

    /// `describe <target>`; rows are `[name, type, extra, comment]`
    pub async fn table(&self, target: &Target) -> AdapterResult<TableMetadata> {
        let result = self.execute(&format!("describe {}", target.resolve())).await?;
        let fields = result
            .rows
            .iter()
            .filter_map(|column| {
                let name = column.first().map(value_to_string)?;
                let description = column
                    .get(3)
                    .map(value_to_string)
                    .filter(|comment| !comment.is_empty());
                Some(Field { name, description })
            })
            .collect();
        Ok(TableMetadata {
            target: target.clone(),
            fields,
        })
    }

    /// First `limit_rows` rows of a fully qualified table
    pub async fn preview(&self, target: &Target, limit_rows: usize) -> AdapterResult<Vec<Row>> {
        let table = target.fully_qualified()?;
        let mut result = self
            .execute(&format!("select * from {table} limit {limit_rows}"))
            .await?;
        result.rows.truncate(limit_rows);
        Ok(result.rows)
    }

    /// Validate each statement with `explain`
    ///
    /// Statements run one after another; every statement is sent to the
    /// engine and the results keep the input order.
    pub async fn evaluate(&self, queries: &[EvaluationQuery]) -> Vec<QueryEvaluation> {
        let mut evaluations = Vec::with_capacity(queries.len());
        for query in queries {
            let evaluation = match self.execute(&query.validation_sql()).await {
                Ok(_) => QueryEvaluation::success(query),
                Err(err) => {
                    debug!(query = %query.query, error = %err, "evaluation_failed");
                    QueryEvaluation::failure(query, &err)
                }
            };
            evaluations.push(evaluation);
        }
        evaluations
    }

    /// Let in-flight queries finish, then refuse new ones
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Flatten single-column listings into strings
fn flatten_strings(rows: Vec<Row>) -> Vec<String> {
    rows.iter().flatten().map(value_to_string).collect()
}
