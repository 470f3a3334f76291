//! Built-in adapter implementations.
//!
//! One adapter per (engine, transport) pair:
//! - `postgres` - native PostgreSQL driver
//! - `sqlserver` - native SQL Server (TDS) driver
//! - `bridge` - HTTP SQL gateway, registered for every engine kind
//! - `mock` - deterministic synthetic responder for mock runs and tests

pub mod bridge;
pub mod mock;
pub mod postgres;
pub mod sqlserver;

pub use self::bridge::BridgeAdapter;
pub use self::mock::{MockAdapter, MockScript};
pub use self::postgres::PostgresAdapter;
pub use self::sqlserver::SqlServerAdapter;

use crate::config::EngineKind;
use crate::registry::AdapterRegistry;

/// Create a registry with all production adapters registered.
///
/// IBM i has no native Rust driver; it is reachable only through the
/// bridge gateway, which the automatic transport fallback lands on.
pub fn default_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();

    registry.register(PostgresAdapter::new());
    registry.register(SqlServerAdapter::new());
    registry.register(BridgeAdapter::new(EngineKind::Postgres));
    registry.register(BridgeAdapter::new(EngineKind::SqlServer));
    registry.register(BridgeAdapter::new(EngineKind::Db2i));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportKind;

    #[test]
    fn test_default_registry_pairs() {
        let registry = default_registry();

        assert!(registry.has(EngineKind::Postgres, TransportKind::Native));
        assert!(registry.has(EngineKind::SqlServer, TransportKind::Native));
        assert!(registry.has(EngineKind::Postgres, TransportKind::Bridge));
        assert!(registry.has(EngineKind::SqlServer, TransportKind::Bridge));
        assert!(registry.has(EngineKind::Db2i, TransportKind::Bridge));
        // No native path to IBM i.
        assert!(!registry.has(EngineKind::Db2i, TransportKind::Native));
    }
}
