//! Bounded Result Collector
//!
//! Accumulates streamed row batches until a row-count or byte-size budget
//! is run past. Limits are evaluated after a batch is appended, so the
//! batch that trips a limit is kept in full.

use tracing::trace;

use super::limits::{ExecutionLimits, LimitKind};
use crate::client::Row;

/// Accumulator enforcing [`ExecutionLimits`] on streamed rows
#[derive(Debug)]
pub struct BoundedResultCollector {
    limits: ExecutionLimits,
    rows: Vec<Row>,
    byte_estimate: usize,
    exceeded: Option<LimitKind>,
}

impl BoundedResultCollector {
    pub fn new(limits: ExecutionLimits) -> Self {
        BoundedResultCollector {
            limits,
            rows: Vec::new(),
            byte_estimate: 0,
            exceeded: None,
        }
    }

    /// Append a batch. Returns `false` once a budget has been run past.
    ///
    /// After the first `false` the collector is exhausted: later batches
    /// are dropped and every call returns `false`.
    pub fn push(&mut self, batch: Vec<Row>) -> bool {
        if self.exceeded.is_some() {
            return false;
        }

        self.byte_estimate = batch
            .iter()
            .fold(self.byte_estimate, |acc, row| acc.saturating_add(estimate_row_bytes(row)));
        self.rows.extend(batch);

        match self.limits.exceeded_by(self.rows.len(), self.byte_estimate) {
            Some(kind) => {
                trace!(
                    rows = self.rows.len(),
                    bytes = self.byte_estimate,
                    limit = %kind,
                    "collector_limit_exceeded"
                );
                self.exceeded = Some(kind);
                false
            }
            None => true,
        }
    }

    /// Every accepted row, including the batch that tripped a limit
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Take the accepted rows, leaving the collector empty but still exhausted
    pub fn take_rows(&mut self) -> Vec<Row> {
        std::mem::take(&mut self.rows)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn byte_estimate(&self) -> usize {
        self.byte_estimate
    }

    pub fn is_exhausted(&self) -> bool {
        self.exceeded.is_some()
    }

    /// The budget that was run past, if any
    pub fn exceeded(&self) -> Option<LimitKind> {
        self.exceeded
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }
}

/// Estimated wire size of a row: length of its compact JSON encoding
pub fn estimate_row_bytes(row: &Row) -> usize {
    serde_json::to_vec(row).map_or(0, |encoded| encoded.len())
}
