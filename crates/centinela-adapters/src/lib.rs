//! Centinela Database Adapters
//!
//! Connectivity layer for control execution against heterogeneous database
//! engines.
//!
//! This crate provides:
//! - The `DatabaseAdapter` / `AdapterConnection` traits
//! - An adapter registry keyed by (engine kind, transport)
//! - A connection resolver with automatic native-then-bridge fallback
//! - Built-in adapters: postgres, sqlserver, bridge (HTTP SQL gateway), mock

pub mod adapters;
pub mod config;
pub mod error;
pub mod outcome;
pub mod registry;

pub use config::{ConnectionConfig, EngineKind, TransportKind, TransportPreference};
pub use error::AdapterError;
pub use outcome::QueryOutcome;
pub use registry::{
    AdapterConnection, AdapterRegistry, ConnectionHandle, ConnectionResolver, DatabaseAdapter,
};
