//! gqlmetrics replay demo.
//!
//! Feeds recorded execution results through an `ExecutionPipeline` with the
//! metrics observer attached, then prints the registry as Prometheus text or
//! JSON snapshots.
//!
//! Run with: cargo run -- --input executions.json
//!
//! The input file holds a JSON array of `{"operationName": ..., "result": ...}`
//! entries. Without `--input` a built-in sample is replayed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use gqlmetrics_core::proto::ExecutionResult;
use gqlmetrics_core::{ExecutionPipeline, MetricsConfig, MetricsInstrumentation, MetricsRegistry};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Replay recorded GraphQL executions through the metrics instrumentation.
#[derive(Debug, Parser)]
#[command(name = "replay-demo")]
#[command(about = "Replay GraphQL execution results and print the recorded metrics")]
struct Args {
    /// JSON file with recorded executions. Uses a built-in sample when omitted.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Keep tracing reports in the replayed responses.
    #[arg(long, default_value_t = false)]
    tracing_enabled: bool,

    /// Output format for the recorded metrics.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Prometheus)]
    format: OutputFormat,

    /// Print each response after instrumentation.
    #[arg(long, default_value_t = false)]
    show_responses: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Prometheus,
    Json,
}

impl From<&Args> for MetricsConfig {
    fn from(args: &Args) -> Self {
        MetricsConfig::new().with_tracing_enabled(args.tracing_enabled)
    }
}

/// One recorded execution.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordedExecution {
    #[serde(default)]
    operation_name: Option<String>,
    result: ExecutionResult,
}

const SAMPLE: &str = r#"[
  {
    "operationName": "GetUser",
    "result": {
      "data": { "user": { "name": "Ada", "email": null } },
      "errors": [{
        "message": "email is private",
        "path": ["user", "email"],
        "extensions": { "code": "FORBIDDEN", "classification": "DataFetchingException" }
      }],
      "extensions": {
        "tracing": {
          "version": 1,
          "startTime": "2024-03-01T10:00:00.000Z",
          "endTime": "2024-03-01T10:00:00.005Z",
          "duration": 5000000,
          "parsing": { "startOffset": 12000, "duration": 200000 },
          "validation": { "startOffset": 220000, "duration": 100000 },
          "execution": {
            "resolvers": [
              { "path": ["user"], "parentType": "Query", "fieldName": "user", "returnType": "User", "startOffset": 400000, "duration": 3200000 },
              { "path": ["user", "email"], "parentType": "User", "fieldName": "email", "returnType": "String", "startOffset": 3700000, "duration": 30000 }
            ]
          }
        }
      }
    }
  },
  {
    "result": {
      "data": null,
      "errors": [{ "message": "Validation error of type FieldUndefined" }]
    }
  }
]"#;

fn load_executions(args: &Args) -> anyhow::Result<Vec<RecordedExecution>> {
    let raw = match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => SAMPLE.to_string(),
    };
    serde_json::from_str(&raw).context("failed to parse recorded executions")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = MetricsConfig::from(&args);
    let executions = load_executions(&args)?;

    info!(
        executions = executions.len(),
        tracing_enabled = config.tracing_enabled,
        "Replaying executions"
    );

    let registry = Arc::new(MetricsRegistry::new());
    let pipeline = ExecutionPipeline::new()
        .with_observer(MetricsInstrumentation::from_config(registry.clone(), &config));

    for execution in executions {
        let response = pipeline
            .complete_async(execution.result, execution.operation_name.as_deref())
            .await?;
        if args.show_responses {
            println!("{}", response.to_json()?);
        }
    }

    info!(meters = registry.len(), "Replay finished");

    match args.format {
        OutputFormat::Prometheus => print!("{}", registry.to_prometheus()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&registry.snapshot())?),
    }

    Ok(())
}
