//! Self-contained control bundle files.
//!
//! A bundle is one YAML (or JSON) document carrying a control together
//! with everything it references: connection, trigger query, dependent
//! queries, parameters, and referents. Loading a bundle seeds an
//! in-memory store so the engine resolves it exactly like a
//! database-backed control.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use uuid::Uuid;

use centinela_adapters::ConnectionConfig;
use centinela_engine::{Control, MemoryStore, Parameter, Query, Referent};

fn default_active() -> bool {
    true
}

/// Control fields as written in a bundle; references are positional
/// (the bundle's own sections), never by id.
#[derive(Debug, Deserialize)]
pub struct ControlSpec {
    pub name: String,
    pub fires_on_rows_present: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// A parsed control bundle.
#[derive(Debug, Deserialize)]
pub struct ControlBundle {
    pub control: ControlSpec,
    pub connection: ConnectionConfig,
    pub trigger: Query,
    #[serde(default)]
    pub dependents: Vec<Query>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub referents: Vec<Referent>,
    /// Parameter values baked into the bundle; `--set` overrides these.
    #[serde(default)]
    pub values: HashMap<String, String>,
}

impl ControlBundle {
    /// Parse a bundle file, choosing the format by extension
    /// (`.json` is JSON, everything else is YAML).
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading bundle file {}", path.display()))?;

        let bundle = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&text)
                .with_context(|| format!("parsing JSON bundle {}", path.display()))?
        } else {
            serde_yaml::from_str(&text)
                .with_context(|| format!("parsing YAML bundle {}", path.display()))?
        };
        Ok(bundle)
    }

    /// Seed a store with the bundle's records and return the control id.
    pub fn into_store(self) -> (MemoryStore, Uuid) {
        let mut store = MemoryStore::new();

        let connection_id = store.insert_connection(self.connection);
        let trigger_query_id = store.insert_query(self.trigger);
        let dependent_query_ids: Vec<Uuid> = self
            .dependents
            .into_iter()
            .map(|q| store.insert_query(q))
            .collect();
        let parameter_ids: Vec<Uuid> = self
            .parameters
            .into_iter()
            .map(|p| store.insert_parameter(p))
            .collect();
        let referent_ids: Vec<Uuid> = self
            .referents
            .into_iter()
            .map(|r| store.insert_referent(r))
            .collect();

        let control_id = store.insert_control(Control {
            id: Uuid::new_v4(),
            name: self.control.name,
            fires_on_rows_present: self.control.fires_on_rows_present,
            connection_id,
            trigger_query_id,
            dependent_query_ids,
            parameter_ids,
            referent_ids,
            active: self.control.active,
        });

        (store, control_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE: &str = r#"
control:
  name: unreconciled_ops
  fires_on_rows_present: true
connection:
  name: core_banking
  engine: sql_server
  host: db01.bank.local
  user: monitor
  password: ""
trigger:
  name: count_unreconciled
  sql: "SELECT COUNT(*) FROM ops WHERE state = 'PENDING' AND d = :fecha"
dependents:
  - name: detail
    sql: "SELECT id, amount FROM ops WHERE state = 'PENDING' AND d = :fecha"
parameters:
  - name: fecha
    kind: date
    required: true
referents:
  - name: ops-team
    address: ops@bank.local
    by_message: true
values:
  fecha: "2024-01-01"
"#;

    #[test]
    fn test_parse_yaml_bundle() {
        let bundle: ControlBundle = serde_yaml::from_str(BUNDLE).unwrap();
        assert_eq!(bundle.control.name, "unreconciled_ops");
        assert_eq!(bundle.dependents.len(), 1);
        assert_eq!(bundle.values.get("fecha").unwrap(), "2024-01-01");
    }

    #[tokio::test]
    async fn test_into_store_wires_references() {
        let bundle: ControlBundle = serde_yaml::from_str(BUNDLE).unwrap();
        let (store, control_id) = bundle.into_store();

        let resolved = centinela_engine::store::resolve_control(&store, control_id)
            .await
            .unwrap();
        assert_eq!(resolved.trigger.name, "count_unreconciled");
        assert_eq!(resolved.dependents.len(), 1);
        assert_eq!(resolved.parameters.len(), 1);
        assert_eq!(resolved.referents.len(), 1);
    }
}
