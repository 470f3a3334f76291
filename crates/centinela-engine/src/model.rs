//! Configuration data model.
//!
//! Controls, queries, parameters, and referents are externally owned
//! configuration records. They are loaded once per invocation, assembled
//! into an immutable [`ResolvedControl`], and never mutated or persisted
//! by the engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use centinela_adapters::ConnectionConfig;

use crate::error::{ValidationError, ValidationErrorKind};
use crate::sanitize;

fn default_active() -> bool {
    true
}

/// A named rule pairing a trigger query, a fire policy, dependent queries,
/// parameters, and notification recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Human-readable name; must be non-empty for an executable control.
    pub name: String,

    /// Fire policy: true fires on rows present, false on rows absent.
    pub fires_on_rows_present: bool,

    /// Connection the control runs against.
    pub connection_id: Uuid,

    /// The query whose row count decides the fire.
    pub trigger_query_id: Uuid,

    /// Dependent queries, in declared execution order. May be empty.
    #[serde(default)]
    pub dependent_query_ids: Vec<Uuid>,

    /// Parameter definitions referenced by the control's queries.
    #[serde(default)]
    pub parameter_ids: Vec<Uuid>,

    /// Notification recipients.
    #[serde(default)]
    pub referent_ids: Vec<Uuid>,

    #[serde(default = "default_active")]
    pub active: bool,
}

/// A stored SQL statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    pub name: String,

    /// Raw SQL text with `:name` placeholders.
    pub sql: String,

    /// Optional connection override; falls back to the control's
    /// connection. One execution opens exactly one connection, so an
    /// override naming a different connection is rejected at resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<Uuid>,

    #[serde(default = "default_active")]
    pub active: bool,
}

/// Declared parameter value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
}

impl std::fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Boolean => write!(f, "boolean"),
            Self::Date => write!(f, "date"),
            Self::Datetime => write!(f, "datetime"),
        }
    }
}

/// A typed parameter definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Placeholder name; must be a valid identifier token.
    pub name: String,

    pub kind: ParameterKind,

    /// Default value used when no value is supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(default)]
    pub required: bool,
}

/// A notification recipient subscribed to a control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referent {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    pub name: String,

    /// Contact address (mailbox, share path owner, ...).
    pub address: String,

    /// Receives the summary message.
    #[serde(default)]
    pub by_message: bool,

    /// Receives the tabular file rendering.
    #[serde(default)]
    pub by_file: bool,

    #[serde(default = "default_active")]
    pub active: bool,
}

/// Immutable, fully-resolved snapshot of a control, assembled once at the
/// start of an execution.
#[derive(Debug, Clone)]
pub struct ResolvedControl {
    pub control: Control,
    pub connection: ConnectionConfig,
    pub trigger: Query,
    /// Dependent queries in the control's declared order.
    pub dependents: Vec<Query>,
    pub parameters: Vec<Parameter>,
    pub referents: Vec<Referent>,
}

impl ResolvedControl {
    /// Assemble a snapshot, enforcing the usability invariant.
    ///
    /// Errors are fully enumerated. The SQL gate is re-asserted here on
    /// the trigger and every dependent even though the configuration
    /// layer is expected to have applied it already.
    pub fn new(
        control: Control,
        connection: ConnectionConfig,
        trigger: Query,
        dependents: Vec<Query>,
        parameters: Vec<Parameter>,
        referents: Vec<Referent>,
    ) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Vec::new();

        if control.name.trim().is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnresolvedReference,
                "control",
                "control has no name",
            ));
        }
        if !control.active {
            errors.push(ValidationError::new(
                ValidationErrorKind::InactiveEntity,
                control.name.clone(),
                "control is inactive",
            ));
        }
        if !trigger.active {
            errors.push(ValidationError::new(
                ValidationErrorKind::InactiveEntity,
                trigger.name.clone(),
                "trigger query is inactive",
            ));
        }

        for query in std::iter::once(&trigger).chain(dependents.iter()) {
            if let Err(violation) = sanitize::check_sql(&query.sql) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::SqlGate,
                    query.name.clone(),
                    violation.to_string(),
                ));
            }
            // One connection per execution; an override may only restate
            // the control's own connection.
            if query
                .connection_id
                .is_some_and(|id| id != control.connection_id)
            {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidValue,
                    query.name.clone(),
                    "query connection override does not match the control's connection",
                ));
            }
        }

        for parameter in &parameters {
            if !is_identifier(&parameter.name) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidValue,
                    parameter.name.clone(),
                    "parameter name is not a valid identifier",
                ));
            }
        }

        if errors.is_empty() {
            Ok(Self {
                control,
                connection,
                trigger,
                dependents,
                parameters,
                referents,
            })
        } else {
            Err(errors)
        }
    }

    /// Active dependent queries, preserving declared order.
    pub fn active_dependents(&self) -> impl Iterator<Item = &Query> {
        self.dependents.iter().filter(|q| q.active)
    }
}

/// Whether a string is a valid placeholder identifier.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use centinela_adapters::{EngineKind, TransportPreference};

    pub(crate) fn connection() -> ConnectionConfig {
        ConnectionConfig {
            id: Uuid::new_v4(),
            name: "audit".to_string(),
            engine: EngineKind::Postgres,
            transport: TransportPreference::Automatic,
            host: "localhost".to_string(),
            port: None,
            database: None,
            user: "monitor".to_string(),
            password: String::new(),
            bridge_url: None,
            active: true,
        }
    }

    fn query(name: &str, sql: &str) -> Query {
        Query {
            id: Uuid::new_v4(),
            name: name.to_string(),
            sql: sql.to_string(),
            connection_id: None,
            active: true,
        }
    }

    fn control(name: &str) -> Control {
        Control {
            id: Uuid::new_v4(),
            name: name.to_string(),
            fires_on_rows_present: true,
            connection_id: Uuid::new_v4(),
            trigger_query_id: Uuid::new_v4(),
            dependent_query_ids: vec![],
            parameter_ids: vec![],
            referent_ids: vec![],
            active: true,
        }
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("fecha"));
        assert!(is_identifier("_t1"));
        assert!(is_identifier("fecha_fin"));
        assert!(!is_identifier("1fecha"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("fe-cha"));
    }

    #[test]
    fn test_resolved_control_ok() {
        let resolved = ResolvedControl::new(
            control("unreconciled_ops"),
            connection(),
            query("trigger", "SELECT COUNT(*) FROM ops WHERE d = :fecha"),
            vec![query("detail", "SELECT id FROM ops WHERE d = :fecha")],
            vec![],
            vec![],
        );
        assert!(resolved.is_ok());
    }

    #[test]
    fn test_resolved_control_enumerates_errors() {
        let mut c = control("");
        c.active = false;

        let errors = ResolvedControl::new(
            c,
            connection(),
            query("bad", "DELETE FROM ops"),
            vec![],
            vec![Parameter {
                id: Uuid::new_v4(),
                name: "1bad".to_string(),
                kind: ParameterKind::String,
                default: None,
                required: false,
            }],
            vec![],
        )
        .unwrap_err();

        // Empty name, inactive, gate violation, and bad parameter name
        // are all reported at once.
        assert_eq!(errors.len(), 4);
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::SqlGate));
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::InactiveEntity));
    }

    #[test]
    fn test_delete_query_rejected_regardless() {
        // A DELETE-prefixed query never reaches execution, whatever else
        // the control looks like.
        let result = ResolvedControl::new(
            control("valid_name"),
            connection(),
            query("purge", "DELETE FROM t WHERE 1=1"),
            vec![],
            vec![],
            vec![],
        );
        let errors = result.unwrap_err();
        assert!(errors.iter().all(|e| e.kind == ValidationErrorKind::SqlGate));
    }

    #[test]
    fn test_foreign_connection_override_rejected() {
        let c = control("c");

        let mut same = query("same", "SELECT 1");
        same.connection_id = Some(c.connection_id);
        let mut foreign = query("foreign", "SELECT 2");
        foreign.connection_id = Some(Uuid::new_v4());

        let errors = ResolvedControl::new(
            c,
            connection(),
            query("t", "SELECT 1"),
            vec![same, foreign],
            vec![],
            vec![],
        )
        .unwrap_err();

        // Restating the control's connection is fine; naming another
        // one is not.
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].subject, "foreign");
        assert_eq!(errors[0].kind, ValidationErrorKind::InvalidValue);
    }

    #[test]
    fn test_active_dependents_keeps_order() {
        let mut inactive = query("skipped", "SELECT 2");
        inactive.active = false;

        let resolved = ResolvedControl::new(
            control("c"),
            connection(),
            query("t", "SELECT 1"),
            vec![query("a", "SELECT 1"), inactive, query("b", "SELECT 3")],
            vec![],
            vec![],
        )
        .unwrap();

        let names: Vec<&str> = resolved
            .active_dependents()
            .map(|q| q.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
