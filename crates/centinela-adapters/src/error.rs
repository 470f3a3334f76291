//! Adapter error types.

use thiserror::Error;

use crate::config::{EngineKind, TransportKind};

/// Errors that can occur while opening or using a database connection.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// No adapter registered for the engine/transport pair.
    #[error("No adapter for engine '{engine}' over transport '{transport}'")]
    Unsupported {
        engine: EngineKind,
        transport: TransportKind,
    },

    /// Connection descriptor is disabled.
    #[error("Connection '{0}' is inactive")]
    Inactive(String),

    /// Host unreachable or handshake failed.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Credentials rejected by the server.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Engine-reported query failure.
    #[error("Query failed: {0}")]
    Query(String),

    /// Bridge gateway protocol error.
    #[error("Bridge error: {0}")]
    Bridge(String),

    /// Connection was already closed.
    #[error("Connection closed")]
    Closed,

    /// Malformed connection descriptor.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<tokio_postgres::Error> for AdapterError {
    fn from(e: tokio_postgres::Error) -> Self {
        AdapterError::Query(e.to_string())
    }
}

impl From<tiberius::error::Error> for AdapterError {
    fn from(e: tiberius::error::Error) -> Self {
        AdapterError::Query(e.to_string())
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        AdapterError::Bridge(e.to_string())
    }
}
