//! Collaborator interfaces: configuration lookup and notification
//! dispatch.
//!
//! Persistence of configuration entities and delivery of notifications
//! live outside the engine; these traits are the boundary. The engine
//! only performs read-only lookups, once, at the start of an execution.

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use centinela_adapters::ConnectionConfig;

use crate::error::{EngineError, ValidationError, ValidationErrorKind};
use crate::model::{Control, Parameter, Query, Referent, ResolvedControl};
use crate::notify::NotificationPayload;

/// Read-only configuration lookup.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn control(&self, id: Uuid) -> Result<Option<Control>, EngineError>;
    async fn query(&self, id: Uuid) -> Result<Option<Query>, EngineError>;
    async fn parameter(&self, id: Uuid) -> Result<Option<Parameter>, EngineError>;
    async fn connection(&self, id: Uuid) -> Result<Option<ConnectionConfig>, EngineError>;
    async fn referent(&self, id: Uuid) -> Result<Option<Referent>, EngineError>;
}

/// Accepts shaped notification payloads for delivery.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, payload: NotificationPayload) -> Result<(), EngineError>;
}

/// Resolve a control's id lists into an immutable snapshot.
///
/// Every unresolved reference is enumerated; the stored configuration
/// records are never mutated.
pub async fn resolve_control(
    store: &dyn ConfigStore,
    control_id: Uuid,
) -> Result<ResolvedControl, EngineError> {
    let control = store
        .control(control_id)
        .await?
        .ok_or_else(|| EngineError::Store(format!("control {} not found", control_id)))?;

    let mut errors: Vec<ValidationError> = Vec::new();

    let connection = match store.connection(control.connection_id).await? {
        Some(connection) => Some(connection),
        None => {
            errors.push(unresolved("connection", control.connection_id));
            None
        }
    };

    let trigger = match store.query(control.trigger_query_id).await? {
        Some(query) => Some(query),
        None => {
            errors.push(unresolved("trigger query", control.trigger_query_id));
            None
        }
    };

    let mut dependents = Vec::with_capacity(control.dependent_query_ids.len());
    for id in &control.dependent_query_ids {
        match store.query(*id).await? {
            Some(query) => dependents.push(query),
            None => errors.push(unresolved("dependent query", *id)),
        }
    }

    let mut parameters = Vec::with_capacity(control.parameter_ids.len());
    for id in &control.parameter_ids {
        match store.parameter(*id).await? {
            Some(parameter) => parameters.push(parameter),
            None => errors.push(unresolved("parameter", *id)),
        }
    }

    let mut referents = Vec::with_capacity(control.referent_ids.len());
    for id in &control.referent_ids {
        match store.referent(*id).await? {
            Some(referent) => referents.push(referent),
            None => errors.push(unresolved("referent", *id)),
        }
    }

    match (connection, trigger) {
        (Some(connection), Some(trigger)) if errors.is_empty() => {
            ResolvedControl::new(control, connection, trigger, dependents, parameters, referents)
                .map_err(EngineError::Validation)
        }
        _ => Err(EngineError::Validation(errors)),
    }
}

fn unresolved(what: &str, id: Uuid) -> ValidationError {
    ValidationError::new(
        ValidationErrorKind::UnresolvedReference,
        what,
        format!("{} {} could not be resolved", what, id),
    )
}

/// In-memory store for tests and self-contained CLI bundles.
#[derive(Default, Clone)]
pub struct MemoryStore {
    controls: HashMap<Uuid, Control>,
    queries: HashMap<Uuid, Query>,
    parameters: HashMap<Uuid, Parameter>,
    connections: HashMap<Uuid, ConnectionConfig>,
    referents: HashMap<Uuid, Referent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_control(&mut self, control: Control) -> Uuid {
        let id = control.id;
        self.controls.insert(id, control);
        id
    }

    pub fn insert_query(&mut self, query: Query) -> Uuid {
        let id = query.id;
        self.queries.insert(id, query);
        id
    }

    pub fn insert_parameter(&mut self, parameter: Parameter) -> Uuid {
        let id = parameter.id;
        self.parameters.insert(id, parameter);
        id
    }

    pub fn insert_connection(&mut self, connection: ConnectionConfig) -> Uuid {
        let id = connection.id;
        self.connections.insert(id, connection);
        id
    }

    pub fn insert_referent(&mut self, referent: Referent) -> Uuid {
        let id = referent.id;
        self.referents.insert(id, referent);
        id
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn control(&self, id: Uuid) -> Result<Option<Control>, EngineError> {
        Ok(self.controls.get(&id).cloned())
    }

    async fn query(&self, id: Uuid) -> Result<Option<Query>, EngineError> {
        Ok(self.queries.get(&id).cloned())
    }

    async fn parameter(&self, id: Uuid) -> Result<Option<Parameter>, EngineError> {
        Ok(self.parameters.get(&id).cloned())
    }

    async fn connection(&self, id: Uuid) -> Result<Option<ConnectionConfig>, EngineError> {
        Ok(self.connections.get(&id).cloned())
    }

    async fn referent(&self, id: Uuid) -> Result<Option<Referent>, EngineError> {
        Ok(self.referents.get(&id).cloned())
    }
}
