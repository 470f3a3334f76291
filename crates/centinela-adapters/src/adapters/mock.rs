//! Deterministic synthetic adapter for mock runs and tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{ConnectionConfig, EngineKind, TransportKind};
use crate::error::AdapterError;
use crate::outcome::QueryOutcome;
use crate::registry::{AdapterConnection, ConnectionHandle, DatabaseAdapter};

/// Scripted responses shared between an adapter and its open connections.
///
/// Outcomes are consumed in order; once the script is exhausted every
/// statement answers with an empty row set, which keeps mock runs
/// deterministic without requiring a script at all.
#[derive(Clone, Default)]
pub struct MockScript {
    responses: Arc<Mutex<VecDeque<Scripted>>>,
    executed: Arc<Mutex<Vec<String>>>,
}

/// One queued response, optionally held back to simulate a slow engine.
struct Scripted {
    delay: Option<Duration>,
    outcome: Result<QueryOutcome, String>,
}

impl MockScript {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful outcome.
    pub fn respond(&self, outcome: QueryOutcome) -> &Self {
        self.push(Scripted {
            delay: None,
            outcome: Ok(outcome),
        })
    }

    /// Queue a row-set outcome with `n` synthetic rows.
    pub fn respond_rows(&self, n: u64) -> &Self {
        self.respond(synthetic_rows(n))
    }

    /// Queue a row-set outcome answered only after `delay` has passed,
    /// to exercise query timeouts.
    pub fn respond_rows_after(&self, n: u64, delay: Duration) -> &Self {
        self.push(Scripted {
            delay: Some(delay),
            outcome: Ok(synthetic_rows(n)),
        })
    }

    /// Queue an engine-reported failure.
    pub fn fail(&self, message: impl Into<String>) -> &Self {
        self.push(Scripted {
            delay: None,
            outcome: Err(message.into()),
        })
    }

    /// SQL statements received so far, in execution order.
    pub fn executed_sql(&self) -> Vec<String> {
        self.executed.lock().expect("mock script lock").clone()
    }

    fn push(&self, scripted: Scripted) -> &Self {
        self.responses
            .lock()
            .expect("mock script lock")
            .push_back(scripted);
        self
    }

    fn next(&self, sql: &str) -> (Option<Duration>, Result<QueryOutcome, AdapterError>) {
        self.executed
            .lock()
            .expect("mock script lock")
            .push(sql.to_string());
        match self.responses.lock().expect("mock script lock").pop_front() {
            Some(Scripted {
                delay,
                outcome: Ok(outcome),
            }) => (delay, Ok(outcome)),
            Some(Scripted {
                delay,
                outcome: Err(message),
            }) => (delay, Err(AdapterError::Query(message))),
            None => (None, Ok(QueryOutcome::empty())),
        }
    }
}

fn synthetic_rows(n: u64) -> QueryOutcome {
    let rows = (0..n)
        .map(|i| serde_json::json!({ "value": i + 1 }))
        .collect();
    QueryOutcome::rows(vec!["value".to_string()], rows)
}

/// Synthetic adapter that answers from a [`MockScript`].
#[derive(Clone)]
pub struct MockAdapter {
    engine: EngineKind,
    transport: TransportKind,
    script: MockScript,
    refuse_open: bool,
}

impl MockAdapter {
    /// Create a mock postgres/native adapter with an empty script.
    pub fn new() -> Self {
        Self::with_identity(EngineKind::Postgres, TransportKind::Native)
    }

    /// Create a mock adapter masquerading as the given pair.
    pub fn with_identity(engine: EngineKind, transport: TransportKind) -> Self {
        Self {
            engine,
            transport,
            script: MockScript::new(),
            refuse_open: false,
        }
    }

    /// Attach a shared script.
    pub fn with_script(mut self, script: MockScript) -> Self {
        self.script = script;
        self
    }

    /// Make `open` fail, to simulate an unreachable host.
    pub fn refusing_connections(mut self) -> Self {
        self.refuse_open = true;
        self
    }

    /// The script backing this adapter.
    pub fn script(&self) -> &MockScript {
        &self.script
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseAdapter for MockAdapter {
    fn engine(&self) -> EngineKind {
        self.engine
    }

    fn transport(&self) -> TransportKind {
        self.transport
    }

    async fn open(&self, config: &ConnectionConfig) -> Result<ConnectionHandle, AdapterError> {
        if self.refuse_open {
            return Err(AdapterError::Connect(format!(
                "mock refused connection to {}",
                config.host
            )));
        }
        Ok(Box::new(MockConnection {
            script: self.script.clone(),
            closed: false,
        }))
    }
}

struct MockConnection {
    script: MockScript,
    closed: bool,
}

#[async_trait]
impl AdapterConnection for MockConnection {
    async fn execute(&mut self, sql: &str) -> Result<QueryOutcome, AdapterError> {
        if self.closed {
            return Err(AdapterError::Closed);
        }
        let (delay, outcome) = self.script.next(sql);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    async fn close(mut self: Box<Self>) -> Result<(), AdapterError> {
        self.closed = true;
        Ok(())
    }
}
