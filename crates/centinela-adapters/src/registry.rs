//! Adapter registry and connection resolution.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{ConnectionConfig, EngineKind, TransportKind, TransportPreference};
use crate::error::AdapterError;
use crate::outcome::QueryOutcome;

/// An open connection, exclusive to one control execution.
///
/// Handles are not pooled or shared; the orchestrator closes them on every
/// exit path before returning the execution report.
#[async_trait]
pub trait AdapterConnection: Send {
    /// Send one statement and capture its outcome.
    async fn execute(&mut self, sql: &str) -> Result<QueryOutcome, AdapterError>;

    /// Release the underlying transport.
    async fn close(self: Box<Self>) -> Result<(), AdapterError>;
}

/// Boxed connection handle returned by adapters.
pub type ConnectionHandle = Box<dyn AdapterConnection>;

/// A database adapter for one (engine, transport) pair.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Engine kind this adapter serves.
    fn engine(&self) -> EngineKind;

    /// Transport this adapter speaks.
    fn transport(&self) -> TransportKind;

    /// Open a ready-to-query connection for the descriptor.
    async fn open(&self, config: &ConnectionConfig) -> Result<ConnectionHandle, AdapterError>;
}

/// Registry of available adapters, keyed by (engine, transport).
pub struct AdapterRegistry {
    adapters: HashMap<(EngineKind, TransportKind), Arc<dyn DatabaseAdapter>>,
}

impl AdapterRegistry {
    /// Create a new empty adapter registry.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Register an adapter under its (engine, transport) key.
    pub fn register<A: DatabaseAdapter + 'static>(&mut self, adapter: A) {
        let key = (adapter.engine(), adapter.transport());
        self.adapters.insert(key, Arc::new(adapter));
    }

    /// Get an adapter by engine and transport.
    pub fn get(
        &self,
        engine: EngineKind,
        transport: TransportKind,
    ) -> Option<Arc<dyn DatabaseAdapter>> {
        self.adapters.get(&(engine, transport)).cloned()
    }

    /// Check whether an adapter is registered for the pair.
    pub fn has(&self, engine: EngineKind, transport: TransportKind) -> bool {
        self.adapters.contains_key(&(engine, transport))
    }

    /// List all registered (engine, transport) pairs.
    pub fn list(&self) -> Vec<(EngineKind, TransportKind)> {
        self.adapters.keys().copied().collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Resolves a connection descriptor to one open handle.
///
/// An explicit transport preference selects exactly that adapter; the
/// `Automatic` preference tries native first, then the bridge gateway.
pub struct ConnectionResolver {
    registry: Arc<AdapterRegistry>,
}

impl ConnectionResolver {
    /// Create a resolver over a registry.
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self { registry }
    }

    /// Open a connection for the descriptor.
    pub async fn open(&self, config: &ConnectionConfig) -> Result<ConnectionHandle, AdapterError> {
        if !config.active {
            return Err(AdapterError::Inactive(config.name.clone()));
        }

        let transports: &[TransportKind] = match config.transport {
            TransportPreference::Native => &[TransportKind::Native],
            TransportPreference::Bridge => &[TransportKind::Bridge],
            TransportPreference::Automatic => &[TransportKind::Native, TransportKind::Bridge],
        };

        let mut last_missing = None;
        for &transport in transports {
            match self.registry.get(config.engine, transport) {
                Some(adapter) => {
                    tracing::debug!(
                        connection = %config.name,
                        engine = %config.engine,
                        transport = %transport,
                        "Opening connection"
                    );
                    return adapter.open(config).await;
                }
                None => {
                    last_missing = Some(transport);
                }
            }
        }

        Err(AdapterError::Unsupported {
            engine: config.engine,
            transport: last_missing.unwrap_or(TransportKind::Native),
        })
    }
}

#[cfg(test)]
impl std::fmt::Debug for dyn AdapterConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AdapterConnection")
    }
}
