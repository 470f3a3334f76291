//! Dispatch orchestration for control execution.
//!
//! Sequences validation, connection, trigger evaluation, and dependent
//! query dispatch through an explicit state machine:
//!
//! `Validating -> Connecting -> EvaluatingTrigger -> {Firing | Suppressed}
//!  -> Completed | Failed`
//!
//! The connection handle is released on every path leading to a terminal
//! state. Dependent queries are independent reporting artifacts: one
//! failing is recorded and the rest still run, while a trigger failure is
//! fatal to the whole run.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use centinela_adapters::adapters::{default_registry, MockAdapter, MockScript};
use centinela_adapters::{
    AdapterRegistry, ConnectionHandle, ConnectionResolver, TransportKind,
};

use crate::error::{ValidationError, ValidationErrorKind};
use crate::executor::QueryExecutor;
use crate::model::ResolvedControl;
use crate::params;
use crate::report::{ExecutionResult, ExecutionStatus, QueryExecutionResult};
use crate::sanitize;
use crate::trigger::TriggerEvaluator;

/// Pipeline state of one control execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Validating,
    Connecting,
    EvaluatingTrigger,
    Firing,
    Suppressed,
    Completed,
    Failed,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validating => write!(f, "validating"),
            Self::Connecting => write!(f, "connecting"),
            Self::EvaluatingTrigger => write!(f, "evaluating_trigger"),
            Self::Firing => write!(f, "firing"),
            Self::Suppressed => write!(f, "suppressed"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Options for one engine invocation.
#[derive(Clone)]
pub struct RunOptions {
    /// Bypass real adapters with the deterministic mock responder. The
    /// run still traverses the same state machine and produces a
    /// structurally identical report.
    pub mock_execution: bool,

    /// Per-query wall-clock bound.
    pub query_timeout: Duration,

    /// Caller-requested abort, checked before each dependent query.
    pub cancellation: CancellationToken,

    /// Scripted outcomes for mock runs; an empty script answers every
    /// statement with an empty row set.
    pub mock_script: Option<MockScript>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mock_execution: false,
            query_timeout: Duration::from_secs(60),
            cancellation: CancellationToken::new(),
            mock_script: None,
        }
    }
}

impl RunOptions {
    /// Options for a mock run with the given script.
    pub fn mock(script: MockScript) -> Self {
        Self {
            mock_execution: true,
            mock_script: Some(script),
            ..Self::default()
        }
    }
}

/// The control execution engine entry point.
pub struct DispatchOrchestrator {
    registry: Arc<AdapterRegistry>,
}

impl DispatchOrchestrator {
    /// Create an orchestrator over the production adapter registry.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(default_registry()),
        }
    }

    /// Create an orchestrator over a caller-supplied registry.
    pub fn with_registry(registry: Arc<AdapterRegistry>) -> Self {
        Self { registry }
    }

    /// Execute one resolved control with the supplied parameter values.
    ///
    /// Never returns a raw error: every failure is folded into a
    /// classified report with a non-empty status and message.
    pub async fn run(
        &self,
        resolved: &ResolvedControl,
        values: &HashMap<String, String>,
        options: RunOptions,
    ) -> ExecutionResult {
        let control_name = resolved.control.name.clone();
        let started_at = Utc::now();
        let mut state = EngineState::Validating;

        tracing::info!(control = %control_name, state = %state, "Control execution started");

        // Validating: the union of placeholders across the trigger and
        // every dependent, enumerated fully before any connection opens.
        let mut referenced: BTreeSet<String> = params::required_parameters(&resolved.trigger.sql);
        for dependent in resolved.active_dependents() {
            referenced.extend(params::required_parameters(&dependent.sql));
        }

        let mut validation_errors = params::validate(values, &resolved.parameters, &referenced);

        // The gate is re-asserted here regardless of what resolution
        // checked; the engine never trusts the configuration layer alone.
        for query in std::iter::once(&resolved.trigger).chain(resolved.active_dependents()) {
            if let Err(violation) = sanitize::check_sql(&query.sql) {
                validation_errors.push(ValidationError::new(
                    ValidationErrorKind::SqlGate,
                    query.name.clone(),
                    violation.to_string(),
                ));
            }
        }

        if !validation_errors.is_empty() {
            state = EngineState::Failed;
            tracing::warn!(
                control = %control_name,
                state = %state,
                problems = validation_errors.len(),
                "Validation failed"
            );
            return ExecutionResult {
                control_name,
                status: ExecutionStatus::Error,
                message: format!(
                    "Validation failed with {} problem(s): {}",
                    validation_errors.len(),
                    validation_errors
                        .iter()
                        .map(|e| e.to_string())
                        .collect::<Vec<_>>()
                        .join("; ")
                ),
                started_at,
                elapsed_ms: 0,
                trigger: None,
                dependents: vec![],
                validation_errors,
            };
        }

        let bound = params::effective_values(values, &resolved.parameters);
        let trigger_sql = params::substitute(&resolved.trigger.sql, &bound);

        // Connecting: elapsed time on the report spans from here to the
        // terminal state.
        state = EngineState::Connecting;
        let clock = Instant::now();
        tracing::debug!(control = %control_name, state = %state, connection = %resolved.connection.name, "Opening connection");

        let resolver = if options.mock_execution {
            ConnectionResolver::new(Arc::new(mock_registry(
                resolved,
                options.mock_script.clone().unwrap_or_default(),
            )))
        } else {
            ConnectionResolver::new(self.registry.clone())
        };

        let mut handle = match resolver.open(&resolved.connection).await {
            Ok(handle) => handle,
            Err(e) => {
                state = EngineState::Failed;
                tracing::warn!(control = %control_name, state = %state, error = %e, "Connection failed");
                return ExecutionResult {
                    control_name,
                    status: ExecutionStatus::Error,
                    message: format!("Connection error: {}", e),
                    started_at,
                    elapsed_ms: elapsed_ms(clock),
                    trigger: None,
                    dependents: vec![],
                    validation_errors: vec![],
                };
            }
        };

        // EvaluatingTrigger: a trigger failure is fatal; dependents never
        // run.
        state = EngineState::EvaluatingTrigger;
        tracing::debug!(control = %control_name, state = %state, query = %resolved.trigger.name, "Evaluating trigger");
        let (fired, trigger_result) = TriggerEvaluator::evaluate(
            resolved.control.fires_on_rows_present,
            &mut handle,
            &resolved.trigger.name,
            &trigger_sql,
            options.query_timeout,
        )
        .await;

        if !trigger_result.success {
            state = EngineState::Failed;
            let message = format!(
                "Trigger query '{}' failed: {}",
                resolved.trigger.name,
                trigger_result.error.as_deref().unwrap_or("unknown error")
            );
            tracing::warn!(control = %control_name, state = %state, "{}", message);
            close_handle(handle, &control_name).await;
            return ExecutionResult {
                control_name,
                status: ExecutionStatus::Error,
                message,
                started_at,
                elapsed_ms: elapsed_ms(clock),
                trigger: Some(trigger_result),
                dependents: vec![],
                validation_errors: vec![],
            };
        }

        let (status, message, dependents) = if fired {
            state = EngineState::Firing;
            tracing::info!(control = %control_name, state = %state, trigger_rows = trigger_result.rows, "Control fired");

            let (dependents, cancelled) = self
                .run_dependents(resolved, &bound, &mut handle, &options)
                .await;

            let failed = dependents.iter().filter(|d| !d.success).count();
            let mut message = format!(
                "Control fired: trigger returned {} row(s); {} dependent quer{} executed",
                trigger_result.rows,
                dependents.len(),
                if dependents.len() == 1 { "y" } else { "ies" },
            );
            if failed > 0 {
                message.push_str(&format!(", {} failed", failed));
            }
            if cancelled {
                message.push_str("; execution cancelled before remaining dependents");
            }
            (ExecutionStatus::Fired, message, dependents)
        } else {
            state = EngineState::Suppressed;
            tracing::info!(control = %control_name, state = %state, trigger_rows = trigger_result.rows, "Control did not fire");
            (
                ExecutionStatus::NotFired,
                format!(
                    "Control did not fire: trigger returned {} row(s)",
                    trigger_result.rows
                ),
                vec![],
            )
        };

        close_handle(handle, &control_name).await;
        state = EngineState::Completed;
        tracing::info!(control = %control_name, state = %state, status = %status, "Control execution finished");

        ExecutionResult {
            control_name,
            status,
            message,
            started_at,
            elapsed_ms: elapsed_ms(clock),
            trigger: Some(trigger_result),
            dependents,
            validation_errors: vec![],
        }
    }

    /// Run dependent queries in declared order; returns the collected
    /// results and whether a pending cancellation cut the loop short.
    async fn run_dependents(
        &self,
        resolved: &ResolvedControl,
        bound: &HashMap<String, String>,
        handle: &mut ConnectionHandle,
        options: &RunOptions,
    ) -> (Vec<QueryExecutionResult>, bool) {
        let mut results = Vec::new();

        for dependent in resolved.active_dependents() {
            // Abort boundary: a pending cancellation prevents starting the
            // next dependent; the partial report is returned as-is.
            if options.cancellation.is_cancelled() {
                tracing::warn!(
                    control = %resolved.control.name,
                    collected = results.len(),
                    "Cancellation requested, skipping remaining dependents"
                );
                return (results, true);
            }

            let sql = params::substitute(&dependent.sql, bound);
            let result =
                QueryExecutor::execute(handle, &dependent.name, &sql, options.query_timeout).await;

            if !result.success {
                // Non-fatal: dependents are independent reporting
                // artifacts, so the remaining ones still run.
                tracing::warn!(
                    control = %resolved.control.name,
                    query = %dependent.name,
                    "Dependent query failed, continuing"
                );
            }
            results.push(result);
        }

        (results, false)
    }
}

impl Default for DispatchOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry answering every engine/transport pair of the control's
/// connection from one shared mock script.
fn mock_registry(resolved: &ResolvedControl, script: MockScript) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    let engine = resolved.connection.engine;
    registry.register(MockAdapter::with_identity(engine, TransportKind::Native).with_script(script.clone()));
    registry.register(MockAdapter::with_identity(engine, TransportKind::Bridge).with_script(script));
    registry
}

/// Wall-clock span in milliseconds; sub-millisecond runs round up so a
/// report that reached a terminal state never shows zero elapsed time.
fn elapsed_ms(clock: Instant) -> u64 {
    (clock.elapsed().as_millis() as u64).max(1)
}

async fn close_handle(handle: ConnectionHandle, control_name: &str) {
    if let Err(e) = handle.close().await {
        tracing::warn!(control = %control_name, error = %e, "Connection close failed");
    }
}
