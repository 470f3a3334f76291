//! Query outcome types shared by all adapters.

use serde::{Deserialize, Serialize};

/// Result of one statement sent over a connection.
///
/// SELECT-shaped statements capture the returned rows; other allow-listed
/// forms carry the engine-reported affected count. The fire policy only
/// ever reads [`QueryOutcome::row_count`], so both shapes feed it uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// A captured result set.
    Rows {
        /// Column names, in select order.
        columns: Vec<String>,
        /// One JSON object per row, keyed by column name.
        rows: Vec<serde_json::Value>,
        /// Number of rows returned.
        row_count: u64,
    },
    /// Affected-row count for a non-SELECT-shaped statement.
    Affected { count: u64 },
}

impl QueryOutcome {
    /// Build a row-set outcome; `row_count` is derived from the row list.
    pub fn rows(columns: Vec<String>, rows: Vec<serde_json::Value>) -> Self {
        let row_count = rows.len() as u64;
        Self::Rows {
            columns,
            rows,
            row_count,
        }
    }

    /// Build an empty row-set outcome.
    pub fn empty() -> Self {
        Self::rows(vec![], vec![])
    }

    /// Build an affected-count outcome.
    pub fn affected(count: u64) -> Self {
        Self::Affected { count }
    }

    /// Rows returned or affected, whichever shape this is.
    pub fn row_count(&self) -> u64 {
        match self {
            Self::Rows { row_count, .. } => *row_count,
            Self::Affected { count } => *count,
        }
    }

    /// Column names, empty for affected-count outcomes.
    pub fn columns(&self) -> &[String] {
        match self {
            Self::Rows { columns, .. } => columns,
            Self::Affected { .. } => &[],
        }
    }

    /// Row data, empty for affected-count outcomes.
    pub fn row_data(&self) -> &[serde_json::Value] {
        match self {
            Self::Rows { rows, .. } => rows,
            Self::Affected { .. } => &[],
        }
    }
}

/// Whether a statement is SELECT-shaped (returns a result set).
pub fn is_select_shaped(sql: &str) -> bool {
    let upper = sql.trim_start().to_uppercase();
    ["SELECT", "WITH", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "PRAGMA"]
        .iter()
        .any(|kw| {
            upper.starts_with(kw)
                && upper[kw.len()..]
                    .chars()
                    .next()
                    .map(|c| !c.is_alphanumeric() && c != '_')
                    .unwrap_or(true)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_count_from_rows() {
        let outcome = QueryOutcome::rows(
            vec!["id".to_string()],
            vec![serde_json::json!({"id": 1}), serde_json::json!({"id": 2})],
        );
        assert_eq!(outcome.row_count(), 2);
        assert_eq!(outcome.columns(), &["id".to_string()]);
    }

    #[test]
    fn test_row_count_from_affected() {
        let outcome = QueryOutcome::affected(7);
        assert_eq!(outcome.row_count(), 7);
        assert!(outcome.columns().is_empty());
        assert!(outcome.row_data().is_empty());
    }

    #[test]
    fn test_is_select_shaped() {
        assert!(is_select_shaped("SELECT 1"));
        assert!(is_select_shaped("  with cte as (select 1) select * from cte"));
        assert!(is_select_shaped("EXPLAIN SELECT 1"));
        assert!(is_select_shaped("DESC accounts"));
        assert!(!is_select_shaped("CALL audit_snapshot()"));
        assert!(!is_select_shaped("EXEC sp_who"));
        // Prefix of a longer identifier is not a keyword match.
        assert!(!is_select_shaped("SELECTED_VIEW"));
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = QueryOutcome::affected(3);
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"kind\":\"affected\""));
        assert!(json.contains("\"count\":3"));
    }
}
