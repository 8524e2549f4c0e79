//! Presto REST Protocol Client
//!
//! Drives one statement through the coordinator's paged protocol:
//!
//! ```text
//! POST /v1/statement  (body = SQL)
//!     ↓
//! { id, nextUri, columns?, data?, stats, error? }
//!     ↓  GET nextUri ... until nextUri is absent
//! success
//! ```
//!
//! The cancellation predicate is polled before every page fetch. When it is
//! raised the client sends `DELETE nextUri` and reports an error, which a
//! session that already reached its terminal state ignores.

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, trace};

use super::{ColumnMetadata, EngineError, QueryCallbacks, QueryClient, QueryStats, Row};
use crate::config::ClientConfig;
use crate::error::{AdapterError, AdapterResult};

const USER_HEADER: &str = "x-presto-user";
const SOURCE_HEADER: &str = "x-presto-source";
const CATALOG_HEADER: &str = "x-presto-catalog";
const SCHEMA_HEADER: &str = "x-presto-schema";

/// One page of the statement protocol
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResults {
    id: String,
    #[serde(default)]
    next_uri: Option<String>,
    #[serde(default)]
    columns: Option<Vec<ColumnMetadata>>,
    #[serde(default)]
    data: Option<Vec<Row>>,
    #[serde(default)]
    stats: QueryStats,
    #[serde(default)]
    error: Option<EngineError>,
}

/// [`QueryClient`] speaking the Presto REST protocol
#[derive(Clone)]
pub struct PrestoHttpClient {
    http: reqwest::Client,
    base_url: String,
    config: Arc<ClientConfig>,
}

impl PrestoHttpClient {
    pub fn new(config: &ClientConfig) -> AdapterResult<Self> {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, USER_HEADER, &config.user)?;
        insert_header(&mut headers, SOURCE_HEADER, &config.source)?;
        if let Some(catalog) = &config.catalog {
            insert_header(&mut headers, CATALOG_HEADER, catalog)?;
        }
        if let Some(schema) = &config.schema {
            insert_header(&mut headers, SCHEMA_HEADER, schema)?;
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        Ok(PrestoHttpClient {
            http,
            base_url: config.base_url(),
            config: Arc::new(config.clone()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn run(&self, query: String, callbacks: Arc<dyn QueryCallbacks>) {
        if let Err(error) = self.drive(&query, callbacks.as_ref()).await {
            callbacks.on_error(error);
        }
    }

    async fn drive(&self, query: &str, callbacks: &dyn QueryCallbacks) -> Result<(), EngineError> {
        if callbacks.is_cancelled() {
            return Err(EngineError::new("Query cancelled before submission"));
        }

        let request = self
            .http
            .post(format!("{}/v1/statement", self.base_url))
            .body(query.to_string());
        let mut page = self.fetch(request).await?;
        debug!(query_id = %page.id, "presto_query_started");

        let mut columns: Option<Vec<ColumnMetadata>> = None;
        loop {
            if let Some(error) = page.error.take() {
                return Err(error);
            }
            callbacks.on_state(&page.id, page.stats.clone());

            if columns.is_none() {
                if let Some(page_columns) = page.columns.take() {
                    callbacks.on_columns(page_columns.clone());
                    columns = Some(page_columns);
                }
            }

            let had_data = match page.data.take() {
                Some(rows) if !rows.is_empty() => {
                    trace!(query_id = %page.id, rows = rows.len(), "presto_page_data");
                    callbacks.on_data(rows, columns.clone().unwrap_or_default(), page.stats.clone());
                    true
                }
                _ => false,
            };

            let Some(next_uri) = page.next_uri.take() else {
                callbacks.on_success(page.stats);
                return Ok(());
            };

            if callbacks.is_cancelled() {
                debug!(query_id = %page.id, "presto_query_cancelling");
                self.cancel(&next_uri).await;
                return Err(EngineError::new("Query cancelled"));
            }

            if !had_data {
                tokio::time::sleep(self.config.poll_interval()).await;
            }
            page = self.fetch(self.http.get(&next_uri)).await?;
        }
    }

    async fn fetch(&self, request: reqwest::RequestBuilder) -> Result<QueryResults, EngineError> {
        let response = request
            .send()
            .await
            .map_err(|e| EngineError::transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::transport(format!(
                "Coordinator returned {status}: {body}"
            )));
        }
        response
            .json::<QueryResults>()
            .await
            .map_err(|e| EngineError::transport(format!("Invalid statement response: {e}")))
    }

    /// Best effort; the query is already failed on our side
    async fn cancel(&self, next_uri: &str) {
        if let Err(e) = self.http.delete(next_uri).send().await {
            debug!(error = %e, "presto_cancel_failed");
        }
    }
}

impl QueryClient for PrestoHttpClient {
    fn execute(&self, query: String, callbacks: Arc<dyn QueryCallbacks>) {
        let client = self.clone();
        tokio::spawn(async move {
            client.run(query, callbacks).await;
        });
    }
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) -> AdapterResult<()> {
    let value = HeaderValue::from_str(value)
        .map_err(|_| AdapterError::Config(format!("invalid value for {name}: '{value}'")))?;
    headers.insert(name, value);
    Ok(())
}
