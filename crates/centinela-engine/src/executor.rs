//! Single-statement query execution.

use std::time::{Duration, Instant};

use centinela_adapters::ConnectionHandle;

use crate::report::QueryExecutionResult;

/// Runs one SQL statement over an open connection, measuring latency and
/// capturing the outcome.
///
/// Failures never propagate past this boundary: engine-reported errors
/// and timeouts are represented in the returned result, so the
/// orchestrator decides how to proceed.
pub struct QueryExecutor;

impl QueryExecutor {
    /// Execute `sql` with a wall-clock bound of `timeout`.
    ///
    /// On expiry the in-flight driver future is dropped, which cancels
    /// the statement at the transport level where the engine supports it.
    pub async fn execute(
        handle: &mut ConnectionHandle,
        query_name: &str,
        sql: &str,
        timeout: Duration,
    ) -> QueryExecutionResult {
        let start = Instant::now();

        let outcome = tokio::time::timeout(timeout, handle.execute(sql)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(outcome)) => {
                tracing::debug!(
                    query = query_name,
                    rows = outcome.row_count(),
                    elapsed_ms,
                    "Query executed"
                );
                QueryExecutionResult {
                    query_name: query_name.to_string(),
                    sql_sent: sql.to_string(),
                    rows: outcome.row_count(),
                    elapsed_ms,
                    success: true,
                    error: None,
                    columns: outcome.columns().to_vec(),
                    row_data: outcome.row_data().to_vec(),
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(query = query_name, error = %e, "Query failed");
                QueryExecutionResult::failure(query_name, sql, elapsed_ms, e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    query = query_name,
                    timeout_secs = timeout.as_secs(),
                    "Query timed out"
                );
                QueryExecutionResult::failure(
                    query_name,
                    sql,
                    elapsed_ms,
                    format!("Timeout after {} seconds", timeout.as_secs()),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use centinela_adapters::adapters::MockAdapter;
    use centinela_adapters::{
        ConnectionConfig, DatabaseAdapter, EngineKind, TransportPreference,
    };
    use uuid::Uuid;

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            id: Uuid::new_v4(),
            name: "mock".to_string(),
            engine: EngineKind::Postgres,
            transport: TransportPreference::Automatic,
            host: "localhost".to_string(),
            port: None,
            database: None,
            user: "u".to_string(),
            password: String::new(),
            bridge_url: None,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_success_captures_rows_and_latency() {
        let adapter = MockAdapter::new();
        adapter.script().respond_rows(3);
        let mut handle = adapter.open(&config()).await.unwrap();

        let result = QueryExecutor::execute(
            &mut handle,
            "trigger",
            "SELECT 1",
            Duration::from_secs(5),
        )
        .await;

        assert!(result.success);
        assert_eq!(result.rows, 3);
        assert_eq!(result.sql_sent, "SELECT 1");
        assert_eq!(result.row_data.len(), 3);
    }

    #[tokio::test]
    async fn test_timeout_marks_result_failed() {
        let adapter = MockAdapter::new();
        adapter
            .script()
            .respond_rows_after(1, Duration::from_millis(500));
        let mut handle = adapter.open(&config()).await.unwrap();

        let result = QueryExecutor::execute(
            &mut handle,
            "slow",
            "SELECT 1",
            Duration::from_millis(20),
        )
        .await;

        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("Timeout after"));
        assert_eq!(result.rows, 0);
    }

    #[tokio::test]
    async fn test_engine_failure_is_represented_not_raised() {
        let adapter = MockAdapter::new();
        adapter.script().fail("ORA-00942 table does not exist");
        let mut handle = adapter.open(&config()).await.unwrap();

        let result = QueryExecutor::execute(
            &mut handle,
            "detail",
            "SELECT * FROM missing",
            Duration::from_secs(5),
        )
        .await;

        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("ORA-00942"));
        assert_eq!(result.rows, 0);
    }
}
