//! SQL validity gate for stored queries.
//!
//! Two mandatory checks before a query may ever be bound to a control:
//! the statement must start with an allow-listed read-only/introspective
//! form, and it must not contain any deny-listed mutating verb anywhere
//! in its text. The configuration layer applies this gate on save; the
//! engine re-asserts it defensively before every execution.

use thiserror::Error;

/// Statement prefixes a stored query may start with.
static ALLOWED_PREFIXES: &[&str] = &[
    "SELECT", "WITH", "EXPLAIN", "SHOW", "DESCRIBE", "DESC", "PRAGMA", "CALL", "EXECUTE", "EXEC",
];

/// Mutating verbs that must not appear anywhere in a stored query.
static DENIED_KEYWORDS: &[&str] = &["DROP", "DELETE", "UPDATE", "INSERT", "TRUNCATE", "ALTER"];

/// A gate violation, naming the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlGateViolation {
    #[error("SQL is empty")]
    Empty,

    #[error("SQL must start with one of {}", ALLOWED_PREFIXES.join(", "))]
    DisallowedPrefix,

    #[error("SQL contains forbidden keyword '{0}'")]
    ForbiddenKeyword(&'static str),
}

/// Check a stored SQL text against the gate.
pub fn check_sql(sql: &str) -> Result<(), SqlGateViolation> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(SqlGateViolation::Empty);
    }

    let upper = trimmed.to_uppercase();

    let allowed = ALLOWED_PREFIXES
        .iter()
        .any(|prefix| starts_with_word(&upper, prefix));
    if !allowed {
        return Err(SqlGateViolation::DisallowedPrefix);
    }

    for keyword in DENIED_KEYWORDS {
        if contains_word(&upper, keyword) {
            return Err(SqlGateViolation::ForbiddenKeyword(keyword));
        }
    }

    Ok(())
}

/// Whether `upper` starts with `word` as a whole word.
fn starts_with_word(upper: &str, word: &str) -> bool {
    upper.starts_with(word)
        && upper[word.len()..]
            .chars()
            .next()
            .map(|c| !is_word_char(c))
            .unwrap_or(true)
}

/// Whether `upper` contains `word` on word boundaries.
fn contains_word(upper: &str, word: &str) -> bool {
    let mut from = 0;
    while let Some(pos) = upper[from..].find(word) {
        let start = from + pos;
        let end = start + word.len();
        let before_ok = start == 0
            || !upper[..start]
                .chars()
                .next_back()
                .map(is_word_char)
                .unwrap_or(false);
        let after_ok = upper[end..]
            .chars()
            .next()
            .map(|c| !is_word_char(c))
            .unwrap_or(true);
        if before_ok && after_ok {
            return true;
        }
        from = end;
    }
    false
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
