mod bundle;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use centinela_adapters::adapters::MockScript;
use centinela_engine::store::resolve_control;
use centinela_engine::{
    params, sanitize, DispatchOrchestrator, ExecutionResult, ExecutionStatus, RunOptions,
};

use crate::bundle::ControlBundle;

#[derive(Parser)]
#[command(name = "centinela")]
#[command(version, about = "Centinela control execution CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a control bundle and print the execution report.
    ///
    /// Exits non-zero when the report status is `error`.
    Run {
        /// Bundle file (YAML, or JSON with a .json extension)
        #[arg(value_name = "BUNDLE")]
        path: PathBuf,

        /// Set parameter values (format: key=value), can be repeated
        #[arg(long = "set", value_name = "KEY=VALUE")]
        values: Vec<String>,

        /// Use the deterministic mock responder instead of real databases
        #[arg(long)]
        mock: bool,

        /// Per-query timeout in seconds
        #[arg(long, default_value = "60")]
        timeout: u64,

        /// Emit the report as JSON instead of pretty text
        #[arg(short, long)]
        json: bool,
    },
    /// Validate a bundle without connecting: SQL gate, placeholder and
    /// parameter consistency.
    Check {
        /// Bundle file (YAML, or JSON with a .json extension)
        #[arg(value_name = "BUNDLE")]
        path: PathBuf,

        /// Set parameter values (format: key=value), can be repeated
        #[arg(long = "set", value_name = "KEY=VALUE")]
        values: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            path,
            values,
            mock,
            timeout,
            json,
        } => run(path, values, mock, timeout, json).await,
        Commands::Check { path, values } => check(path, values),
    }
}

async fn run(
    path: PathBuf,
    overrides: Vec<String>,
    mock: bool,
    timeout: u64,
    json: bool,
) -> Result<()> {
    let bundle = ControlBundle::load(&path)?;
    let mut values = bundle.values.clone();
    merge_overrides(&mut values, &overrides)?;

    let (store, control_id) = bundle.into_store();
    let resolved = match resolve_control(&store, control_id).await {
        Ok(resolved) => resolved,
        Err(e) => bail!("control did not resolve: {}", e),
    };

    let options = RunOptions {
        mock_execution: mock,
        query_timeout: Duration::from_secs(timeout),
        mock_script: mock.then(MockScript::new),
        ..RunOptions::default()
    };

    let orchestrator = DispatchOrchestrator::new();
    let report = orchestrator.run(&resolved, &values, options).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.status == ExecutionStatus::Error {
        std::process::exit(1);
    }
    Ok(())
}

fn check(path: PathBuf, overrides: Vec<String>) -> Result<()> {
    let bundle = ControlBundle::load(&path)?;
    let mut values = bundle.values.clone();
    merge_overrides(&mut values, &overrides)?;

    let mut problems = 0usize;

    for (name, sql) in std::iter::once((bundle.trigger.name.as_str(), bundle.trigger.sql.as_str()))
        .chain(bundle.dependents.iter().map(|q| (q.name.as_str(), q.sql.as_str())))
    {
        match sanitize::check_sql(sql) {
            Ok(()) => println!("query '{}': gate ok", name),
            Err(violation) => {
                println!("query '{}': {}", name, violation);
                problems += 1;
            }
        }
    }

    let mut referenced = params::required_parameters(&bundle.trigger.sql);
    for dependent in &bundle.dependents {
        referenced.extend(params::required_parameters(&dependent.sql));
    }
    println!(
        "placeholders: {}",
        if referenced.is_empty() {
            "none".to_string()
        } else {
            referenced.iter().cloned().collect::<Vec<_>>().join(", ")
        }
    );

    let errors = params::validate(&values, &bundle.parameters, &referenced);
    for error in &errors {
        println!("{}", error);
    }
    problems += errors.len();

    if problems > 0 {
        bail!("{} problem(s) found", problems);
    }
    println!("bundle '{}' is consistent", bundle.control.name);
    Ok(())
}

fn merge_overrides(values: &mut HashMap<String, String>, overrides: &[String]) -> Result<()> {
    for pair in overrides {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("--set '{}' is not of the form key=value", pair))?;
        values.insert(key.to_string(), value.to_string());
    }
    Ok(())
}

fn print_report(report: &ExecutionResult) {
    println!("control:  {}", report.control_name);
    println!("status:   {}", report.status);
    println!("message:  {}", report.message);
    println!("started:  {}", report.started_at.to_rfc3339());
    println!("elapsed:  {} ms", report.elapsed_ms);

    if !report.validation_errors.is_empty() {
        println!("validation errors:");
        for error in &report.validation_errors {
            println!("  {}", error);
        }
    }

    if let Some(trigger) = &report.trigger {
        println!(
            "trigger:  {} -> {} row(s) in {} ms{}",
            trigger.query_name,
            trigger.rows,
            trigger.elapsed_ms,
            trigger
                .error
                .as_deref()
                .map(|e| format!(" [{}]", e))
                .unwrap_or_default()
        );
    }

    for dependent in &report.dependents {
        println!(
            "  {}: {} -> {} row(s) in {} ms{}",
            if dependent.success { "ok  " } else { "FAIL" },
            dependent.query_name,
            dependent.rows,
            dependent.elapsed_ms,
            dependent
                .error
                .as_deref()
                .map(|e| format!(" [{}]", e))
                .unwrap_or_default()
        );
    }
}
