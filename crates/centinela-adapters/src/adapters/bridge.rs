//! HTTP SQL bridge adapter.
//!
//! Talks to a gateway service hosting JDBC/ODBC drivers for engines that
//! have no native Rust driver (IBM i in particular), and doubles as the
//! `bridge` transport for every other engine. The gateway speaks a small
//! JSON protocol: open a session, post statements against it, close it.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::{ConnectionConfig, EngineKind, TransportKind};
use crate::error::AdapterError;
use crate::outcome::QueryOutcome;
use crate::registry::{AdapterConnection, ConnectionHandle, DatabaseAdapter};

/// Bridge adapter for one engine kind.
pub struct BridgeAdapter {
    engine: EngineKind,
    http: Client,
}

/// Session open request sent to the gateway.
#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    engine: EngineKind,
    host: &'a str,
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    user: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    session_id: String,
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
}

/// Statement response from the gateway.
#[derive(Debug, Deserialize)]
struct StatementResponse {
    status: String,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<serde_json::Value>,
    #[serde(default)]
    affected: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

impl BridgeAdapter {
    /// Create a bridge adapter serving the given engine kind.
    pub fn new(engine: EngineKind) -> Self {
        Self {
            engine,
            http: Client::new(),
        }
    }

    fn basic_auth(config: &ConnectionConfig) -> String {
        let token = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", config.user, config.password));
        format!("Basic {}", token)
    }

    fn base_url(config: &ConnectionConfig) -> Result<String, AdapterError> {
        config
            .bridge_url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                AdapterError::Configuration(format!(
                    "Connection '{}' has no bridge_url for the bridge transport",
                    config.name
                ))
            })
    }
}

#[async_trait]
impl DatabaseAdapter for BridgeAdapter {
    fn engine(&self) -> EngineKind {
        self.engine
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Bridge
    }

    async fn open(&self, config: &ConnectionConfig) -> Result<ConnectionHandle, AdapterError> {
        let base = Self::base_url(config)?;

        let request = SessionRequest {
            engine: self.engine,
            host: &config.host,
            port: config.effective_port(),
            database: config.database.as_deref(),
            user: &config.user,
        };

        let response = self
            .http
            .post(format!("{}/v1/sessions", base))
            .header("Authorization", Self::basic_auth(config))
            .json(&request)
            .send()
            .await
            .map_err(|e| AdapterError::Connect(e.to_string()))?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(AdapterError::Auth(format!(
                    "Gateway rejected credentials for '{}'",
                    config.user
                )));
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(AdapterError::Connect(format!(
                    "Gateway returned {}: {}",
                    status, body
                )));
            }
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Bridge(e.to_string()))?;

        tracing::debug!(
            engine = %self.engine,
            session_id = %session.session_id,
            "Bridge session opened"
        );

        Ok(Box::new(BridgeConnection {
            http: self.http.clone(),
            base,
            auth: Self::basic_auth(config),
            session_id: Some(session.session_id),
        }))
    }
}

struct BridgeConnection {
    http: Client,
    base: String,
    auth: String,
    session_id: Option<String>,
}

#[async_trait]
impl AdapterConnection for BridgeConnection {
    async fn execute(&mut self, sql: &str) -> Result<QueryOutcome, AdapterError> {
        let session_id = self.session_id.as_deref().ok_or(AdapterError::Closed)?;

        let response = self
            .http
            .post(format!("{}/v1/sessions/{}/statements", self.base, session_id))
            .header("Authorization", &self.auth)
            .json(&StatementRequest { statement: sql })
            .send()
            .await
            .map_err(|e| AdapterError::Bridge(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Bridge(format!(
                "Gateway returned {}: {}",
                status, body
            )));
        }

        let payload: StatementResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Bridge(e.to_string()))?;

        if payload.status != "ok" {
            return Err(AdapterError::Query(
                payload
                    .message
                    .unwrap_or_else(|| "gateway reported failure without a message".to_string()),
            ));
        }

        if let Some(affected) = payload.affected {
            Ok(QueryOutcome::affected(affected))
        } else {
            Ok(QueryOutcome::rows(payload.columns, payload.rows))
        }
    }

    async fn close(mut self: Box<Self>) -> Result<(), AdapterError> {
        if let Some(session_id) = self.session_id.take() {
            // Session teardown failure is not fatal to the report.
            if let Err(e) = self
                .http
                .delete(format!("{}/v1/sessions/{}", self.base, session_id))
                .header("Authorization", &self.auth)
                .send()
                .await
            {
                tracing::warn!(error = %e, "Bridge session close failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportPreference;

    fn config(bridge_url: Option<&str>) -> ConnectionConfig {
        ConnectionConfig {
            id: uuid::Uuid::new_v4(),
            name: "ibmi".to_string(),
            engine: EngineKind::Db2i,
            transport: TransportPreference::Bridge,
            host: "as400.bank.local".to_string(),
            port: None,
            database: Some("BANKLIB".to_string()),
            user: "monitor".to_string(),
            password: "pw".to_string(),
            bridge_url: bridge_url.map(|s| s.to_string()),
            active: true,
        }
    }

    #[test]
    fn test_base_url_required() {
        let err = BridgeAdapter::base_url(&config(None)).unwrap_err();
        assert!(matches!(err, AdapterError::Configuration(_)));

        let base = BridgeAdapter::base_url(&config(Some("http://gw:8090/"))).unwrap();
        assert_eq!(base, "http://gw:8090");
    }

    #[test]
    fn test_basic_auth_header() {
        let auth = BridgeAdapter::basic_auth(&config(Some("http://gw")));
        assert!(auth.starts_with("Basic "));
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(auth.trim_start_matches("Basic "))
            .unwrap();
        assert_eq!(decoded, b"monitor:pw");
    }

    #[test]
    fn test_statement_response_shapes() {
        let rows: StatementResponse = serde_json::from_value(serde_json::json!({
            "status": "ok",
            "columns": ["id"],
            "rows": [{"id": 1}]
        }))
        .unwrap();
        assert_eq!(rows.status, "ok");
        assert_eq!(rows.rows.len(), 1);

        let affected: StatementResponse = serde_json::from_value(serde_json::json!({
            "status": "ok",
            "affected": 4
        }))
        .unwrap();
        assert_eq!(affected.affected, Some(4));

        let error: StatementResponse = serde_json::from_value(serde_json::json!({
            "status": "error",
            "message": "SQL0204 table not found"
        }))
        .unwrap();
        assert_eq!(error.message.as_deref(), Some("SQL0204 table not found"));
    }

    #[test]
    fn test_adapter_identity() {
        let adapter = BridgeAdapter::new(EngineKind::Db2i);
        assert_eq!(adapter.engine(), EngineKind::Db2i);
        assert_eq!(adapter.transport(), TransportKind::Bridge);
    }
}
