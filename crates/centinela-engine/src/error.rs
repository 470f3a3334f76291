//! Error types for control execution.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-distinguishable kind of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// Required parameter has no supplied value and no default.
    MissingValue,
    /// Supplied value fails the type-specific parse.
    InvalidValue,
    /// SQL references a placeholder no parameter definition declares.
    UnknownPlaceholder,
    /// A referenced entity (query, connection, parameter) could not be loaded.
    UnresolvedReference,
    /// A referenced entity is flagged inactive.
    InactiveEntity,
    /// Query SQL failed the allow-list/deny-list gate.
    SqlGate,
}

impl std::fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingValue => write!(f, "missing_value"),
            Self::InvalidValue => write!(f, "invalid_value"),
            Self::UnknownPlaceholder => write!(f, "unknown_placeholder"),
            Self::UnresolvedReference => write!(f, "unresolved_reference"),
            Self::InactiveEntity => write!(f, "inactive_entity"),
            Self::SqlGate => write!(f, "sql_gate"),
        }
    }
}

/// One validation problem, named after the parameter or entity at fault.
///
/// Validation is fully enumerated: the caller sees every problem at once
/// rather than the first one found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    /// Parameter or entity name the error refers to.
    pub subject: String,
    /// Human-readable description.
    pub message: String,
}

impl ValidationError {
    pub fn new(
        kind: ValidationErrorKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.subject, self.message)
    }
}

/// Errors raised by engine components.
///
/// The orchestrator folds every variant into a classified execution
/// report; `run` itself never surfaces a raw error to the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    /// One or more validation failures, enumerated before any connection
    /// is opened.
    #[error("Validation failed: {}", format_validation(.0))]
    Validation(Vec<ValidationError>),

    /// Connection could not be opened.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The trigger query failed; dependents never run.
    #[error("Trigger query error: {0}")]
    Trigger(String),

    /// Caller-requested abort observed between dependent queries.
    #[error("Execution cancelled")]
    Cancelled,

    /// Configuration store lookup failed.
    #[error("Store error: {0}")]
    Store(String),
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<centinela_adapters::AdapterError> for EngineError {
    fn from(e: centinela_adapters::AdapterError) -> Self {
        EngineError::Connection(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new(
            ValidationErrorKind::MissingValue,
            "fecha",
            "required parameter has no value and no default",
        );
        assert_eq!(
            err.to_string(),
            "[missing_value] fecha: required parameter has no value and no default"
        );
    }

    #[test]
    fn test_engine_error_enumerates_all() {
        let err = EngineError::Validation(vec![
            ValidationError::new(ValidationErrorKind::MissingValue, "a", "missing"),
            ValidationError::new(ValidationErrorKind::InvalidValue, "b", "not an integer"),
        ]);
        let text = err.to_string();
        assert!(text.contains("[missing_value] a"));
        assert!(text.contains("[invalid_value] b"));
    }
}
