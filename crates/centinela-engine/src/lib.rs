//! Centinela Control Execution Engine
//!
//! Executes "controls": named rules that run a trigger query against a
//! target database, decide from the row count whether to fire, and when
//! fired run an ordered list of dependent reporting queries, producing a
//! structured execution report and notification payloads.
//!
//! This crate provides:
//! - The configuration data model (controls, queries, parameters, referents)
//! - The SQL validity gate (statement allow-list, mutating-verb deny-list)
//! - Parameter placeholder extraction, validation, and textual substitution
//! - The dispatch orchestrator state machine over the adapter layer
//! - Notification payload shaping for subscribed referents

pub mod error;
pub mod executor;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod params;
pub mod report;
pub mod sanitize;
pub mod store;
pub mod trigger;

pub use error::{EngineError, ValidationError, ValidationErrorKind};
pub use model::{Control, Parameter, ParameterKind, Query, Referent, ResolvedControl};
pub use notify::{NotificationPayload, NotificationPreparer, TabularReport};
pub use orchestrator::{DispatchOrchestrator, EngineState, RunOptions};
pub use report::{ExecutionResult, ExecutionStatus, QueryExecutionResult};
pub use store::{ConfigStore, MemoryStore, NotificationDispatcher};
