//! Result Ceilings
//!
//! Per-call row-count and byte-size budgets for collected query results.
//! A `None` budget is unlimited.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default rows collected per query
pub const DEFAULT_ROW_LIMIT: usize = 1000;

/// Default estimated bytes collected per query (1 MiB)
pub const DEFAULT_BYTE_LIMIT: usize = 1024 * 1024;

/// Row and byte budgets for one `execute` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Maximum number of rows (None = unlimited)
    pub row_limit: Option<usize>,

    /// Maximum estimated serialized bytes (None = unlimited)
    pub byte_limit: Option<usize>,
}

/// Which budget a collector ran past
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Rows,
    Bytes,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitKind::Rows => write!(f, "rows"),
            LimitKind::Bytes => write!(f, "bytes"),
        }
    }
}

impl ExecutionLimits {
    pub fn new(row_limit: usize, byte_limit: usize) -> Self {
        ExecutionLimits {
            row_limit: Some(row_limit),
            byte_limit: Some(byte_limit),
        }
    }

    /// No ceilings at all
    pub fn unlimited() -> Self {
        ExecutionLimits {
            row_limit: None,
            byte_limit: None,
        }
    }

    pub fn with_row_limit(mut self, row_limit: Option<usize>) -> Self {
        self.row_limit = row_limit;
        self
    }

    pub fn with_byte_limit(mut self, byte_limit: Option<usize>) -> Self {
        self.byte_limit = byte_limit;
        self
    }

    /// First budget the given totals run past, rows checked before bytes
    pub fn exceeded_by(&self, rows: usize, bytes: usize) -> Option<LimitKind> {
        if self.row_limit.is_some_and(|limit| rows > limit) {
            return Some(LimitKind::Rows);
        }
        if self.byte_limit.is_some_and(|limit| bytes > limit) {
            return Some(LimitKind::Bytes);
        }
        None
    }
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        ExecutionLimits::new(DEFAULT_ROW_LIMIT, DEFAULT_BYTE_LIMIT)
    }
}
