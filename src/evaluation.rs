//! Validation Query Evaluation Results
//!
//! `evaluate` runs each statement through `explain` independently; one
//! failing statement never stops the rest of the batch.

use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// A statement to validate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationQuery {
    pub query: String,
    /// Whether the statement is the incremental variant of an action
    #[serde(default)]
    pub incremental: bool,
}

impl EvaluationQuery {
    pub fn new(query: impl Into<String>) -> Self {
        EvaluationQuery {
            query: query.into(),
            incremental: false,
        }
    }

    pub fn incremental(query: impl Into<String>) -> Self {
        EvaluationQuery {
            query: query.into(),
            incremental: true,
        }
    }

    /// Statement actually sent to the engine
    ///
    /// A blank statement becomes a bare `explain`, which the engine rejects.
    pub fn validation_sql(&self) -> String {
        format!("explain {}", self.query.trim()).trim_end().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationStatus {
    Success,
    Failure,
}

/// 1-based position of a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_location: Option<ErrorLocation>,
}

impl From<&AdapterError> for EvaluationError {
    fn from(err: &AdapterError) -> Self {
        EvaluationError {
            message: err.to_string(),
            error_location: err.error_location().map(|loc| ErrorLocation {
                line: loc.line_number,
                column: loc.column_number,
            }),
        }
    }
}

/// Outcome for one validated statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEvaluation {
    pub status: EvaluationStatus,
    /// The statement as given, without the `explain` wrapper
    pub query: String,
    pub incremental: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EvaluationError>,
}

impl QueryEvaluation {
    pub fn success(query: &EvaluationQuery) -> Self {
        QueryEvaluation {
            status: EvaluationStatus::Success,
            query: query.query.clone(),
            incremental: query.incremental,
            error: None,
        }
    }

    pub fn failure(query: &EvaluationQuery, err: &AdapterError) -> Self {
        QueryEvaluation {
            status: EvaluationStatus::Failure,
            query: query.query.clone(),
            incremental: query.incremental,
            error: Some(err.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EvaluationStatus::Success
    }
}

/// Split a script into statements on `;`, dropping blank statements
///
/// Quoted `;` are not understood; scripts needing them should be passed
/// statement by statement.
pub fn split_statements(script: &str) -> Vec<EvaluationQuery> {
    script
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(EvaluationQuery::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::EngineError;

    #[test]
    fn test_validation_sql_wraps_in_explain() {
        let q = EvaluationQuery::new("  select 1 ");
        assert_eq!(q.validation_sql(), "explain select 1");
        assert_eq!(EvaluationQuery::new("   ").validation_sql(), "explain");
    }

    #[test]
    fn test_failure_carries_location() {
        let err = AdapterError::RemoteClient(EngineError::new("bad column").with_location(4, 9));
        let eval = QueryEvaluation::failure(&EvaluationQuery::incremental("select x"), &err);
        assert_eq!(eval.status, EvaluationStatus::Failure);
        assert!(eval.incremental);
        let error = eval.error.unwrap();
        assert_eq!(error.message, "bad column");
        assert_eq!(error.error_location, Some(ErrorLocation { line: 4, column: 9 }));
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let eval = QueryEvaluation::success(&EvaluationQuery::new("select 1"));
        let json = serde_json::to_value(&eval).unwrap();
        assert_eq!(json["status"], "SUCCESS");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_split_statements() {
        let queries = split_statements("select 1;\n\n select 2 ;;  ");
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].query, "select 1");
        assert_eq!(queries[1].query, "select 2");
    }
}
