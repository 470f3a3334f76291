//! Parameter placeholder extraction, validation, and substitution.
//!
//! Placeholders in stored SQL use the `:name` form, where `name` matches
//! `[A-Za-z_][A-Za-z0-9_]*`. Substitution is textual: the placeholder is
//! replaced with the literal value, not bound as a prepared-statement
//! parameter. Values are not escaped against the target engine's quoting
//! rules; the SQL gate on the stored template is the primary injection
//! defense, as inherited from the original system.

use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::error::{ValidationError, ValidationErrorKind};
use crate::model::{Parameter, ParameterKind};

/// Placeholder token scanner. The double-colon alternative captures
/// engine-side casts (`x::date`) so they are never treated as placeholders.
fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"::?[A-Za-z_][A-Za-z0-9_]*").expect("placeholder regex"))
}

/// Extract the set of distinct placeholder names referenced by `sql`.
///
/// Idempotent, duplicate-free, order-independent.
pub fn required_parameters(sql: &str) -> BTreeSet<String> {
    placeholder_regex()
        .find_iter(sql)
        .filter(|m| !m.as_str().starts_with("::"))
        .map(|m| m.as_str()[1..].to_string())
        .collect()
}

/// Replace every `:name` occurrence with its literal textual value.
///
/// Placeholders with no entry in `values` are left untouched; token
/// matching keeps `:fecha_fin` distinct from `:fecha`.
pub fn substitute(sql: &str, values: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;

    for m in placeholder_regex().find_iter(sql) {
        out.push_str(&sql[last..m.start()]);
        let token = m.as_str();
        if let Some(value) = token
            .strip_prefix(':')
            .filter(|t| !t.starts_with(':'))
            .and_then(|name| values.get(name))
        {
            out.push_str(value);
        } else {
            out.push_str(token);
        }
        last = m.end();
    }
    out.push_str(&sql[last..]);
    out
}

/// Validate supplied values against the parameter definitions, for the
/// full set of placeholders referenced by the control's queries.
///
/// Every problem is reported; the caller sees the complete list at once.
pub fn validate(
    values: &HashMap<String, String>,
    defs: &[Parameter],
    referenced: &BTreeSet<String>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let by_name: HashMap<&str, &Parameter> =
        defs.iter().map(|p| (p.name.as_str(), p)).collect();

    for name in referenced {
        let Some(def) = by_name.get(name.as_str()) else {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownPlaceholder,
                name.clone(),
                "SQL references a placeholder no parameter declares",
            ));
            continue;
        };

        match values.get(name).or(def.default.as_ref()) {
            None => {
                if def.required {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::MissingValue,
                        name.clone(),
                        "required parameter has no value and no default",
                    ));
                }
            }
            Some(value) => {
                if let Err(reason) = parse_value(def.kind, value) {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::InvalidValue,
                        name.clone(),
                        reason,
                    ));
                }
            }
        }
    }

    errors
}

/// Merge supplied values with parameter defaults for substitution.
pub fn effective_values(
    values: &HashMap<String, String>,
    defs: &[Parameter],
) -> HashMap<String, String> {
    let mut merged: HashMap<String, String> = defs
        .iter()
        .filter_map(|p| p.default.clone().map(|d| (p.name.clone(), d)))
        .collect();
    for (k, v) in values {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Type-specific value parse for a declared parameter kind.
fn parse_value(kind: ParameterKind, value: &str) -> Result<(), String> {
    match kind {
        ParameterKind::String => Ok(()),
        ParameterKind::Integer => value
            .trim()
            .parse::<i64>()
            .map(|_| ())
            .map_err(|_| format!("'{}' is not an integer", value)),
        ParameterKind::Float => value
            .trim()
            .parse::<f64>()
            .map(|_| ())
            .map_err(|_| format!("'{}' is not a number", value)),
        ParameterKind::Boolean => {
            let lower = value.trim().to_lowercase();
            if matches!(lower.as_str(), "true" | "false" | "1" | "0" | "yes" | "no") {
                Ok(())
            } else {
                Err(format!("'{}' is not a boolean literal", value))
            }
        }
        ParameterKind::Date => chrono::NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map(|_| ())
            .map_err(|_| format!("'{}' is not a date (expected YYYY-MM-DD)", value)),
        ParameterKind::Datetime => {
            let trimmed = value.trim();
            if chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S").is_ok()
                || chrono::DateTime::parse_from_rfc3339(trimmed).is_ok()
            {
                Ok(())
            } else {
                Err(format!(
                    "'{}' is not a datetime (expected YYYY-MM-DD HH:MM:SS or RFC 3339)",
                    value
                ))
            }
        }
    }
}
