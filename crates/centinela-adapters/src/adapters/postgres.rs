//! Native PostgreSQL adapter.

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::NoTls;

use crate::config::{ConnectionConfig, EngineKind, TransportKind};
use crate::error::AdapterError;
use crate::outcome::{is_select_shaped, QueryOutcome};
use crate::registry::{AdapterConnection, ConnectionHandle, DatabaseAdapter};

/// Native PostgreSQL adapter.
///
/// Connections are per-execution; there is deliberately no pool. The
/// connection driver runs on a spawned task that ends when the client is
/// dropped.
pub struct PostgresAdapter;

impl PostgresAdapter {
    /// Create a new PostgreSQL adapter.
    pub fn new() -> Self {
        Self
    }

    fn connection_string(config: &ConnectionConfig) -> String {
        format!(
            "host={} port={} user={} password={} dbname={}",
            config.host,
            config.effective_port(),
            config.user,
            config.password,
            config.database.as_deref().unwrap_or("postgres"),
        )
    }
}

impl Default for PostgresAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::Postgres
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Native
    }

    async fn open(&self, config: &ConnectionConfig) -> Result<ConnectionHandle, AdapterError> {
        let conn_str = Self::connection_string(config);

        let (client, connection) =
            tokio_postgres::connect(&conn_str, NoTls)
                .await
                .map_err(|e| {
                    let msg = e.to_string();
                    if msg.contains("password authentication")
                        || msg.contains("authentication failed")
                    {
                        AdapterError::Auth(msg)
                    } else {
                        AdapterError::Connect(msg)
                    }
                })?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "PostgreSQL connection task ended with error");
            }
        });

        tracing::debug!(host = %config.host, "PostgreSQL connection opened");

        Ok(Box::new(PostgresConnection {
            client: Some(client),
            driver,
        }))
    }
}

struct PostgresConnection {
    client: Option<tokio_postgres::Client>,
    driver: JoinHandle<()>,
}

#[async_trait]
impl AdapterConnection for PostgresConnection {
    async fn execute(&mut self, sql: &str) -> Result<QueryOutcome, AdapterError> {
        let client = self.client.as_ref().ok_or(AdapterError::Closed)?;

        if is_select_shaped(sql) {
            let rows = client
                .query(sql, &[])
                .await
                .map_err(|e| AdapterError::Query(e.to_string()))?;

            if rows.is_empty() {
                return Ok(QueryOutcome::empty());
            }

            let columns: Vec<String> = rows[0]
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect();

            let json_rows: Vec<serde_json::Value> = rows
                .iter()
                .map(|row| {
                    let mut obj = serde_json::Map::new();
                    for (i, col) in row.columns().iter().enumerate() {
                        obj.insert(col.name().to_string(), pg_value_to_json(row, i));
                    }
                    serde_json::Value::Object(obj)
                })
                .collect();

            Ok(QueryOutcome::rows(columns, json_rows))
        } else {
            let affected = client
                .execute(sql, &[])
                .await
                .map_err(|e| AdapterError::Query(e.to_string()))?;
            Ok(QueryOutcome::affected(affected))
        }
    }

    async fn close(mut self: Box<Self>) -> Result<(), AdapterError> {
        // Dropping the client tears down the socket and ends the driver task.
        self.client.take();
        let _ = (&mut self.driver).await;
        Ok(())
    }
}

/// Convert a PostgreSQL row value to JSON.
fn pg_value_to_json(row: &tokio_postgres::Row, idx: usize) -> serde_json::Value {
    // Try common types in turn; unknown types degrade to null.
    if let Ok(v) = row.try_get::<_, Option<i64>>(idx) {
        return v.map(|n| serde_json::json!(n)).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<_, Option<i32>>(idx) {
        return v.map(|n| serde_json::json!(n)).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<_, Option<f64>>(idx) {
        return v.map(|n| serde_json::json!(n)).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<_, Option<bool>>(idx) {
        return v.map(|b| serde_json::json!(b)).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<_, Option<String>>(idx) {
        return v.map(|s| serde_json::json!(s)).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<_, Option<serde_json::Value>>(idx) {
        return v.unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<_, Option<chrono::NaiveDate>>(idx) {
        return v
            .map(|d| serde_json::json!(d.to_string()))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx) {
        return v
            .map(|dt| serde_json::json!(dt.to_rfc3339()))
            .unwrap_or(serde_json::Value::Null);
    }

    serde_json::Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportPreference;

    #[test]
    fn test_connection_string() {
        let config = ConnectionConfig {
            id: uuid::Uuid::new_v4(),
            name: "audit".to_string(),
            engine: EngineKind::Postgres,
            transport: TransportPreference::Native,
            host: "db.bank.local".to_string(),
            port: Some(5433),
            database: Some("audit".to_string()),
            user: "monitor".to_string(),
            password: "pw".to_string(),
            bridge_url: None,
            active: true,
        };

        let conn_str = PostgresAdapter::connection_string(&config);
        assert!(conn_str.contains("host=db.bank.local"));
        assert!(conn_str.contains("port=5433"));
        assert!(conn_str.contains("dbname=audit"));
    }

    #[test]
    fn test_adapter_identity() {
        let adapter = PostgresAdapter::new();
        assert_eq!(adapter.engine(), EngineKind::Postgres);
        assert_eq!(adapter.transport(), TransportKind::Native);
    }
}
