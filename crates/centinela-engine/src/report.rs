//! Execution report types.
//!
//! Reports are created fresh per invocation and owned by the caller; the
//! engine never persists them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Overall status of one control execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Trigger condition met; dependents were dispatched.
    Fired,
    /// Trigger condition not met; dependents were skipped.
    NotFired,
    /// Validation, connection, or trigger failure. A run cancelled
    /// after the trigger fired keeps `Fired` with a partial report.
    Error,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fired => write!(f, "fired"),
            Self::NotFired => write!(f, "not_fired"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Result of one executed query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryExecutionResult {
    /// Query name from the configuration record.
    pub query_name: String,

    /// The SQL actually sent, after parameter substitution.
    pub sql_sent: String,

    /// Rows returned or affected.
    pub rows: u64,

    /// Wall-clock latency in milliseconds.
    pub elapsed_ms: u64,

    pub success: bool,

    /// Normalized error detail when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Captured column names, for tabular notification rendering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,

    /// Captured row data, keyed by column name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub row_data: Vec<serde_json::Value>,
}

impl QueryExecutionResult {
    /// Build a failed result with a normalized error message.
    pub fn failure(
        query_name: impl Into<String>,
        sql_sent: impl Into<String>,
        elapsed_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            query_name: query_name.into(),
            sql_sent: sql_sent.into(),
            rows: 0,
            elapsed_ms,
            success: false,
            error: Some(error.into()),
            columns: vec![],
            row_data: vec![],
        }
    }
}

/// The structured report of one control execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Control name the report belongs to.
    pub control_name: String,

    pub status: ExecutionStatus,

    /// Human-readable outcome summary; never empty.
    pub message: String,

    /// When the engine entered the connecting phase.
    pub started_at: DateTime<Utc>,

    /// Wall-clock span from connecting to a terminal state.
    pub elapsed_ms: u64,

    /// Trigger query result; absent when execution failed before the
    /// trigger ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<QueryExecutionResult>,

    /// Dependent query results, in the control's declared order.
    #[serde(default)]
    pub dependents: Vec<QueryExecutionResult>,

    /// Enumerated validation problems when status is `error` for that
    /// reason.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<ValidationError>,
}

impl ExecutionResult {
    /// Whether the control fired.
    pub fn fired(&self) -> bool {
        self.status == ExecutionStatus::Fired
    }

    /// Count of dependent queries that failed.
    pub fn failed_dependents(&self) -> usize {
        self.dependents.iter().filter(|d| !d.success).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ExecutionStatus::Fired.to_string(), "fired");
        assert_eq!(ExecutionStatus::NotFired.to_string(), "not_fired");
        assert_eq!(ExecutionStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ExecutionStatus::NotFired).unwrap();
        assert_eq!(json, "\"not_fired\"");
    }

    #[test]
    fn test_failure_result() {
        let result = QueryExecutionResult::failure("detail", "SELECT 1", 12, "boom");
        assert!(!result.success);
        assert_eq!(result.rows, 0);
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_failed_dependents_count() {
        let report = ExecutionResult {
            control_name: "c".to_string(),
            status: ExecutionStatus::Fired,
            message: "fired".to_string(),
            started_at: Utc::now(),
            elapsed_ms: 5,
            trigger: None,
            dependents: vec![
                QueryExecutionResult::failure("a", "SELECT 1", 1, "x"),
                QueryExecutionResult {
                    query_name: "b".to_string(),
                    sql_sent: "SELECT 2".to_string(),
                    rows: 2,
                    elapsed_ms: 1,
                    success: true,
                    error: None,
                    columns: vec![],
                    row_data: vec![],
                },
            ],
            validation_errors: vec![],
        };
        assert_eq!(report.failed_dependents(), 1);
        assert!(report.fired());
    }
}
