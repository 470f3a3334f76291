//! Trigger evaluation and the fire decision.

use std::time::Duration;

use centinela_adapters::ConnectionHandle;

use crate::executor::QueryExecutor;
use crate::report::QueryExecutionResult;

/// Runs the trigger query and applies the control's fire policy.
pub struct TriggerEvaluator;

impl TriggerEvaluator {
    /// Execute the bound trigger SQL and decide whether the control fires.
    ///
    /// `fires_on_rows_present = true` fires on `row_count > 0`; false
    /// fires on `row_count == 0`. A failed trigger query always means
    /// `fired = false`; the orchestrator treats it as fatal to the run.
    pub async fn evaluate(
        fires_on_rows_present: bool,
        handle: &mut ConnectionHandle,
        query_name: &str,
        bound_sql: &str,
        timeout: Duration,
    ) -> (bool, QueryExecutionResult) {
        let result = QueryExecutor::execute(handle, query_name, bound_sql, timeout).await;

        if !result.success {
            return (false, result);
        }

        let fired = if fires_on_rows_present {
            result.rows > 0
        } else {
            result.rows == 0
        };

        tracing::info!(
            query = query_name,
            rows = result.rows,
            fires_on_rows_present,
            fired,
            "Trigger evaluated"
        );

        (fired, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use centinela_adapters::adapters::MockAdapter;
    use centinela_adapters::{ConnectionConfig, DatabaseAdapter, EngineKind, TransportPreference};
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

    async fn evaluate_with(rows: u64, fires_on_rows_present: bool) -> (bool, QueryExecutionResult) {
        let adapter = MockAdapter::new();
        adapter.script().respond_rows(rows);
        let mut handle = adapter.open(&config()).await.unwrap();
        TriggerEvaluator::evaluate(
            fires_on_rows_present,
            &mut handle,
            "trigger",
            "SELECT 1",
            Duration::from_secs(5),
        )
        .await
    }

    #[tokio::test]
    async fn test_fires_on_rows_present() {
        let (fired, result) = evaluate_with(3, true).await;
        assert!(fired);
        assert_eq!(result.rows, 3);

        let (fired, _) = evaluate_with(0, true).await;
        assert!(!fired);
    }

    #[tokio::test]
    async fn test_fires_on_rows_absent() {
        let (fired, _) = evaluate_with(0, false).await;
        assert!(fired);

        let (fired, _) = evaluate_with(2, false).await;
        assert!(!fired);
    }

    #[tokio::test]
    async fn test_trigger_failure_never_fires() {
        let adapter = MockAdapter::new();
        adapter.script().fail("connection reset");
        let mut handle = adapter.open(&config()).await.unwrap();

        let (fired, result) = TriggerEvaluator::evaluate(
            false, // rows-absent policy would fire on 0 rows...
            &mut handle,
            "trigger",
            "SELECT 1",
            Duration::from_secs(5),
        )
        .await;

        // ...but a failed trigger must not.
        assert!(!fired);
        assert!(!result.success);
    }
}
