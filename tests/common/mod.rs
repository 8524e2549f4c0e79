//! Shared test helpers: a scripted in-memory query client.

#![allow(dead_code)]

use parking_lot::Mutex;
use presto_adapter::{
    ColumnMetadata, ConcurrencyLimitedPool, EngineError, QueryAdapter, QueryCallbacks,
    QueryClient, QueryStats, Row,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One thing the scripted engine does
#[derive(Debug, Clone)]
pub enum Step {
    State,
    Columns(Vec<ColumnMetadata>),
    Data(Vec<Row>),
    Sleep(Duration),
    Success,
    Error(EngineError),
    /// Poll the cancel predicate; if raised, report an error and stop
    StopIfCancelled,
}

type Responder = dyn Fn(&str) -> Vec<Step> + Send + Sync;

/// Query client that plays back a script chosen per query text
#[derive(Clone)]
pub struct ScriptedClient {
    responder: Arc<Responder>,
    queries: Arc<Mutex<Vec<String>>>,
    cancels_observed: Arc<AtomicUsize>,
}

impl ScriptedClient {
    pub fn new(responder: impl Fn(&str) -> Vec<Step> + Send + Sync + 'static) -> Self {
        ScriptedClient {
            responder: Arc::new(responder),
            queries: Arc::new(Mutex::new(Vec::new())),
            cancels_observed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every query answers with the same script
    pub fn fixed(script: Vec<Step>) -> Self {
        Self::new(move |_| script.clone())
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }

    pub fn cancels_observed(&self) -> usize {
        self.cancels_observed.load(Ordering::SeqCst)
    }
}

impl QueryClient for ScriptedClient {
    fn execute(&self, query: String, callbacks: Arc<dyn QueryCallbacks>) {
        let script = (self.responder)(&query);
        self.queries.lock().push(query);
        let cancels = Arc::clone(&self.cancels_observed);
        tokio::spawn(async move {
            let mut columns = Vec::new();
            for step in script {
                match step {
                    Step::State => callbacks.on_state("scripted_query", stats("RUNNING")),
                    Step::Columns(cols) => {
                        columns = cols.clone();
                        callbacks.on_columns(cols);
                    }
                    Step::Data(rows) => callbacks.on_data(rows, columns.clone(), stats("RUNNING")),
                    Step::Sleep(d) => tokio::time::sleep(d).await,
                    Step::Success => callbacks.on_success(stats("FINISHED")),
                    Step::Error(e) => callbacks.on_error(e),
                    Step::StopIfCancelled => {
                        if callbacks.is_cancelled() {
                            cancels.fetch_add(1, Ordering::SeqCst);
                            callbacks.on_error(EngineError::new("Query cancelled"));
                            return;
                        }
                    }
                }
            }
        });
    }
}

pub fn stats(state: &str) -> QueryStats {
    QueryStats {
        state: state.to_string(),
        ..QueryStats::default()
    }
}

pub fn int_rows(range: std::ops::Range<i64>) -> Vec<Row> {
    range.map(|i| vec![json!(i)]).collect()
}

pub fn string_rows(values: &[&str]) -> Vec<Row> {
    values.iter().map(|v| vec![json!(v)]).collect()
}

pub fn adapter_with(client: ScriptedClient) -> QueryAdapter<ScriptedClient> {
    QueryAdapter::new(client, ConcurrencyLimitedPool::new(4, 0, Duration::ZERO))
}

pub fn success_with(rows: Vec<Row>) -> Vec<Step> {
    vec![
        Step::State,
        Step::Columns(vec![ColumnMetadata::new("c", "varchar")]),
        Step::Data(rows),
        Step::Success,
    ]
}
