//! Connection descriptors: engine kinds, transports, and network coordinates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Database engine kind a connection points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Microsoft SQL Server.
    SqlServer,
    /// PostgreSQL.
    Postgres,
    /// IBM i (Db2 for i). Reachable only through a bridge gateway.
    Db2i,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SqlServer => write!(f, "sqlserver"),
            Self::Postgres => write!(f, "postgres"),
            Self::Db2i => write!(f, "db2i"),
        }
    }
}

/// Concrete transport an adapter speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Native wire protocol driver.
    Native,
    /// HTTP SQL bridge gateway (JDBC/ODBC host service).
    Bridge,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Bridge => write!(f, "bridge"),
        }
    }
}

/// Transport preference declared on a connection descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportPreference {
    /// Resolver picks: native first, then bridge.
    #[default]
    Automatic,
    /// Force the native driver.
    Native,
    /// Force the bridge gateway.
    Bridge,
}

/// A connection descriptor loaded from configuration.
///
/// The engine never mutates or persists these; one descriptor yields one
/// exclusive connection handle per execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Record identity.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Human-readable name.
    pub name: String,

    /// Target engine kind.
    pub engine: EngineKind,

    /// Transport preference.
    #[serde(default)]
    pub transport: TransportPreference,

    /// Server host.
    pub host: String,

    /// Server port (engine default when absent).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Database / library name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Username.
    pub user: String,

    /// Password. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Bridge gateway base URL (required when transport resolves to bridge).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge_url: Option<String>,

    /// Whether the connection may be used.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ConnectionConfig {
    /// Port to dial, falling back to the engine's default.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(match self.engine {
            EngineKind::SqlServer => 1433,
            EngineKind::Postgres => 5432,
            EngineKind::Db2i => 8471,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_display() {
        assert_eq!(EngineKind::SqlServer.to_string(), "sqlserver");
        assert_eq!(EngineKind::Postgres.to_string(), "postgres");
        assert_eq!(EngineKind::Db2i.to_string(), "db2i");
    }

    #[test]
    fn test_connection_config_deserialization() {
        let json = serde_json::json!({
            "name": "core_banking",
            "engine": "sql_server",
            "host": "db01.bank.local",
            "user": "monitor",
            "password": "s3cret"
        });

        let config: ConnectionConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.name, "core_banking");
        assert_eq!(config.engine, EngineKind::SqlServer);
        assert_eq!(config.transport, TransportPreference::Automatic);
        assert!(config.active);
        assert_eq!(config.effective_port(), 1433);
    }

    #[test]
    fn test_password_not_serialized() {
        let config = ConnectionConfig {
            id: Uuid::new_v4(),
            name: "c".to_string(),
            engine: EngineKind::Postgres,
            transport: TransportPreference::Native,
            host: "localhost".to_string(),
            port: None,
            database: Some("audit".to_string()),
            user: "monitor".to_string(),
            password: "hunter2".to_string(),
            bridge_url: None,
            active: true,
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn test_effective_port_override() {
        let json = serde_json::json!({
            "name": "ibmi",
            "engine": "db2i",
            "host": "as400.bank.local",
            "port": 9471,
            "user": "monitor",
            "password": ""
        });
        let config: ConnectionConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.effective_port(), 9471);
    }
}
