//! Notification payload shaping.
//!
//! Maps an execution report plus the control's referents into outbound
//! payloads. Delivery (SMTP, spreadsheet writers, file-share drops) is an
//! external collaborator; this module only shapes what gets sent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::Referent;
use crate::report::{ExecutionResult, QueryExecutionResult};

/// Tabular rendering of one dependent query's captured rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularReport {
    pub columns: Vec<String>,
    /// Stringified cell grid, one entry per row in column order.
    pub rows: Vec<Vec<String>>,
}

impl TabularReport {
    fn from_result(result: &QueryExecutionResult) -> Self {
        let rows = result
            .row_data
            .iter()
            .map(|row| {
                result
                    .columns
                    .iter()
                    .map(|col| cell_to_string(row.get(col)))
                    .collect()
            })
            .collect();
        Self {
            columns: result.columns.clone(),
            rows,
        }
    }
}

fn cell_to_string(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// One outbound notification for one referent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Recipient contact address.
    pub recipient: String,

    /// Referent name.
    pub referent_name: String,

    /// Whether a summary message goes out.
    pub by_message: bool,

    /// Whether a tabular file rendering goes out.
    pub by_file: bool,

    /// Subject line: control name plus status.
    pub subject: String,

    /// Human-readable body summary.
    pub body: String,

    /// Tabular renderings, keyed by dependent query name. Present only
    /// when `by_file` is set.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tables: BTreeMap<String, TabularReport>,
}

/// Shapes notification payloads from execution reports.
pub struct NotificationPreparer;

impl NotificationPreparer {
    /// Build one payload per active referent subscribed to at least one
    /// channel.
    pub fn prepare(result: &ExecutionResult, referents: &[Referent]) -> Vec<NotificationPayload> {
        let subscribed: Vec<&Referent> = referents
            .iter()
            .filter(|r| r.active && (r.by_message || r.by_file))
            .collect();

        if subscribed.is_empty() {
            return vec![];
        }

        let subject = format!("[{}] control '{}'", result.status, result.control_name);
        let body = render_body(result);
        let tables: BTreeMap<String, TabularReport> = result
            .dependents
            .iter()
            .filter(|d| d.success)
            .map(|d| (d.query_name.clone(), TabularReport::from_result(d)))
            .collect();

        subscribed
            .into_iter()
            .map(|referent| NotificationPayload {
                recipient: referent.address.clone(),
                referent_name: referent.name.clone(),
                by_message: referent.by_message,
                by_file: referent.by_file,
                subject: subject.clone(),
                body: body.clone(),
                tables: if referent.by_file {
                    tables.clone()
                } else {
                    BTreeMap::new()
                },
            })
            .collect()
    }
}

/// One-paragraph summary plus one line per query result.
fn render_body(result: &ExecutionResult) -> String {
    let mut lines = vec![result.message.clone()];

    if let Some(trigger) = &result.trigger {
        lines.push(format!(
            "trigger '{}': {} row(s), {} ms{}",
            trigger.query_name,
            trigger.rows,
            trigger.elapsed_ms,
            if trigger.success { "" } else { " [FAILED]" },
        ));
    }

    for dependent in &result.dependents {
        let detail = match &dependent.error {
            Some(error) => format!(" [FAILED: {}]", error),
            None => String::new(),
        };
        lines.push(format!(
            "dependent '{}': {} row(s), {} ms{}",
            dependent.query_name, dependent.rows, dependent.elapsed_ms, detail,
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ExecutionStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn referent(name: &str, by_message: bool, by_file: bool, active: bool) -> Referent {
        Referent {
            id: Uuid::new_v4(),
            name: name.to_string(),
            address: format!("{}@bank.example", name),
            by_message,
            by_file,
            active,
        }
    }

    fn fired_report() -> ExecutionResult {
        ExecutionResult {
            control_name: "unreconciled_ops".to_string(),
            status: ExecutionStatus::Fired,
            message: "Control fired: trigger returned 2 row(s)".to_string(),
            started_at: Utc::now(),
            elapsed_ms: 40,
            trigger: Some(QueryExecutionResult {
                query_name: "trigger".to_string(),
                sql_sent: "SELECT COUNT(*) FROM ops".to_string(),
                rows: 2,
                elapsed_ms: 12,
                success: true,
                error: None,
                columns: vec![],
                row_data: vec![],
            }),
            dependents: vec![QueryExecutionResult {
                query_name: "detail".to_string(),
                sql_sent: "SELECT id, amount FROM ops".to_string(),
                rows: 2,
                elapsed_ms: 9,
                success: true,
                error: None,
                columns: vec!["id".to_string(), "amount".to_string()],
                row_data: vec![
                    serde_json::json!({"id": 1, "amount": 120.5}),
                    serde_json::json!({"id": 2, "amount": null}),
                ],
            }],
            validation_errors: vec![],
        }
    }

    #[test]
    fn test_filters_inactive_and_unsubscribed() {
        let referents = vec![
            referent("ana", true, false, true),
            referent("gone", true, true, false), // inactive
            referent("mute", false, false, true), // no channel
        ];

        let payloads = NotificationPreparer::prepare(&fired_report(), &referents);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].referent_name, "ana");
    }

    #[test]
    fn test_tables_only_for_by_file() {
        let referents = vec![
            referent("message_only", true, false, true),
            referent("file_too", true, true, true),
        ];

        let payloads = NotificationPreparer::prepare(&fired_report(), &referents);
        assert!(payloads[0].tables.is_empty());
        assert_eq!(payloads[1].tables.len(), 1);

        let table = payloads[1].tables.get("detail").unwrap();
        assert_eq!(table.columns, vec!["id", "amount"]);
        assert_eq!(table.rows[0], vec!["1", "120.5"]);
        // Nulls render as empty cells.
        assert_eq!(table.rows[1], vec!["2", ""]);
    }

    #[test]
    fn test_body_lists_every_query() {
        let payloads =
            NotificationPreparer::prepare(&fired_report(), &[referent("ana", true, false, true)]);
        let body = &payloads[0].body;
        assert!(body.contains("trigger 'trigger': 2 row(s)"));
        assert!(body.contains("dependent 'detail': 2 row(s)"));
    }

    #[test]
    fn test_subject_carries_status() {
        let payloads =
            NotificationPreparer::prepare(&fired_report(), &[referent("ana", true, false, true)]);
        assert_eq!(payloads[0].subject, "[fired] control 'unreconciled_ops'");
    }

    #[test]
    fn test_no_referents_no_payloads() {
        assert!(NotificationPreparer::prepare(&fired_report(), &[]).is_empty());
    }
}
