//! Result collection benchmarks: collector push cost and end-to-end execute
//! through the pool with an in-memory engine.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use presto_adapter::{
    BoundedResultCollector, ColumnMetadata, ConcurrencyLimitedPool, ExecuteOptions,
    ExecutionLimits, QueryAdapter, QueryCallbacks, QueryClient, QueryStats, Row,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn make_batch(start: usize, len: usize) -> Vec<Row> {
    (start..start + len)
        .map(|i| vec![json!(i), json!(format!("user_{i}")), json!(i as f64 * 0.5)])
        .collect()
}

/// Delivers `batches` pages of `per_batch` rows synchronously
struct InMemoryClient {
    batches: usize,
    per_batch: usize,
}

impl QueryClient for InMemoryClient {
    fn execute(&self, _query: String, callbacks: Arc<dyn QueryCallbacks>) {
        let columns = vec![
            ColumnMetadata::new("id", "bigint"),
            ColumnMetadata::new("name", "varchar"),
            ColumnMetadata::new("score", "double"),
        ];
        callbacks.on_state("bench", QueryStats::default());
        callbacks.on_columns(columns.clone());
        for i in 0..self.batches {
            if callbacks.is_cancelled() {
                return;
            }
            callbacks.on_data(
                make_batch(i * self.per_batch, self.per_batch),
                columns.clone(),
                QueryStats::default(),
            );
        }
        callbacks.on_success(QueryStats::default());
    }
}

fn bench_collector_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("collector_push");
    for &batch_size in &[10usize, 100, 1_000] {
        let batch = make_batch(0, batch_size);
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &batch, |b, batch| {
            b.iter(|| {
                let mut collector = BoundedResultCollector::new(ExecutionLimits::unlimited());
                for _ in 0..10 {
                    collector.push(batch.clone());
                }
                collector.row_count()
            });
        });
    }
    group.finish();
}

fn bench_execute_limited(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("execute_row_limit");
    for &row_limit in &[100usize, 1_000, 10_000] {
        let adapter = QueryAdapter::new(
            InMemoryClient {
                batches: 200,
                per_batch: 100,
            },
            ConcurrencyLimitedPool::new(8, 0, Duration::ZERO),
        );
        let options = ExecuteOptions::with_limits(ExecutionLimits::new(row_limit, usize::MAX));

        group.bench_with_input(BenchmarkId::from_parameter(row_limit), &options, |b, options| {
            b.iter(|| rt.block_on(adapter.execute_with("select * from bench", *options)));
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(3));
    targets = bench_collector_push, bench_execute_limited
}
criterion_main!(benches);
