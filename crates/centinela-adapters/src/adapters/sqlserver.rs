//! Native SQL Server (TDS) adapter.

use async_trait::async_trait;
use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::config::{ConnectionConfig, EngineKind, TransportKind};
use crate::error::AdapterError;
use crate::outcome::{is_select_shaped, QueryOutcome};
use crate::registry::{AdapterConnection, ConnectionHandle, DatabaseAdapter};

/// Native SQL Server adapter over the TDS wire protocol.
pub struct SqlServerAdapter;

impl SqlServerAdapter {
    /// Create a new SQL Server adapter.
    pub fn new() -> Self {
        Self
    }

    fn tds_config(config: &ConnectionConfig) -> Config {
        let mut tds = Config::new();
        tds.host(&config.host);
        tds.port(config.effective_port());
        tds.authentication(AuthMethod::sql_server(&config.user, &config.password));
        tds.trust_cert();
        if let Some(db) = &config.database {
            tds.database(db);
        }
        tds
    }
}

impl Default for SqlServerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseAdapter for SqlServerAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::SqlServer
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Native
    }

    async fn open(&self, config: &ConnectionConfig) -> Result<ConnectionHandle, AdapterError> {
        let tds = Self::tds_config(config);

        let tcp = TcpStream::connect(tds.get_addr())
            .await
            .map_err(|e| AdapterError::Connect(e.to_string()))?;
        tcp.set_nodelay(true)
            .map_err(|e| AdapterError::Connect(e.to_string()))?;

        let client = Client::connect(tds, tcp.compat_write())
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("Login failed") {
                    AdapterError::Auth(msg)
                } else {
                    AdapterError::Connect(msg)
                }
            })?;

        tracing::debug!(host = %config.host, "SQL Server connection opened");

        Ok(Box::new(SqlServerConnection {
            client: Some(client),
        }))
    }
}

struct SqlServerConnection {
    client: Option<Client<Compat<TcpStream>>>,
}

#[async_trait]
impl AdapterConnection for SqlServerConnection {
    async fn execute(&mut self, sql: &str) -> Result<QueryOutcome, AdapterError> {
        let client = self.client.as_mut().ok_or(AdapterError::Closed)?;

        if is_select_shaped(sql) {
            let stream = client
                .simple_query(sql)
                .await
                .map_err(|e| AdapterError::Query(e.to_string()))?;
            let rows = stream
                .into_first_result()
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
                        obj.insert(col.name().to_string(), tds_value_to_json(row, i));
                    }
                    serde_json::Value::Object(obj)
                })
                .collect();

            Ok(QueryOutcome::rows(columns, json_rows))
        } else {
            let result = client
                .execute(sql, &[])
                .await
                .map_err(|e| AdapterError::Query(e.to_string()))?;
            Ok(QueryOutcome::affected(result.total()))
        }
    }

    async fn close(mut self: Box<Self>) -> Result<(), AdapterError> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| AdapterError::Query(e.to_string()))?;
        }
        Ok(())
    }
}

/// Convert a TDS row value to JSON.
fn tds_value_to_json(row: &tiberius::Row, idx: usize) -> serde_json::Value {
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return v.map(|n| serde_json::json!(n)).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<i32, _>(idx) {
        return v.map(|n| serde_json::json!(n)).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return v.map(|n| serde_json::json!(n)).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<bool, _>(idx) {
        return v.map(|b| serde_json::json!(b)).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<&str, _>(idx) {
        return v.map(|s| serde_json::json!(s)).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<chrono::NaiveDateTime, _>(idx) {
        return v
            .map(|dt| serde_json::json!(dt.to_string()))
            .unwrap_or(serde_json::Value::Null);
    }

    serde_json::Value::Null
}
