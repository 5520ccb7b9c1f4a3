use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use stepwise_orchestrator::{ChannelNotifier, Engine, EngineConfig, ExecutionEvent, RunOptions};

/// Stepwise - run declarative HTTP step lists
#[derive(Parser)]
#[command(name = "stepwise")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a step list and print the output forest
  Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
  /// Path to the step list (JSON). Read from stdin when omitted
  steps_file: Option<PathBuf>,

  /// Perform live HTTP calls instead of echoing each step's body
  #[arg(long)]
  fetch: bool,

  /// Per-attempt timeout for steps without their own `timeoutMs`
  #[arg(long, env = "STEPWISE_TIMEOUT_MS")]
  timeout_ms: Option<u64>,

  /// Retries for steps without their own `retries`
  #[arg(long, env = "STEPWISE_RETRIES")]
  retries: Option<u32>,

  /// Wait before the first retry, doubled after each one
  #[arg(long, env = "STEPWISE_BACKOFF_MS")]
  backoff_ms: Option<u64>,

  /// JSON file with run options (`fetch`, `timeoutMs`, `retries`, `backoffMs`)
  #[arg(long)]
  options: Option<PathBuf>,

  /// User agent for outgoing requests
  #[arg(long, env = "STEPWISE_USER_AGENT")]
  user_agent: Option<String>,

  /// Print execution events as JSON lines on stderr
  #[arg(long)]
  events: bool,

  /// Print groups, context and outputs instead of just the outputs
  #[arg(long)]
  detailed: bool,
}

impl RunArgs {
  /// Options file first, then env vars and flags on top.
  fn run_options(&self) -> Result<RunOptions> {
    let mut options = match &self.options {
      Some(path) => read_options_file(path)?,
      None => RunOptions::default(),
    };

    options.fetch |= self.fetch;
    if let Some(timeout_ms) = self.timeout_ms {
      options.timeout_ms = timeout_ms;
    }
    if let Some(retries) = self.retries {
      options.retries = retries;
    }
    if let Some(backoff_ms) = self.backoff_ms {
      options.backoff_ms = backoff_ms;
    }

    Ok(options)
  }
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(io::stderr)
    .init();

  match cli.command {
    Some(Commands::Run(args)) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { run_steps_async(args).await })?;
    }
    None => {
      println!("stepwise - use --help to see available commands");
    }
  }

  Ok(())
}

async fn run_steps_async(args: RunArgs) -> Result<()> {
  let input = match &args.steps_file {
    Some(path) => read_steps_file(path).await?,
    None => read_steps_from_stdin()?,
  };
  let options = args.run_options()?;

  let config = EngineConfig {
    user_agent: args.user_agent.clone(),
  };
  let mut engine = Engine::new(config).context("failed to create engine")?;

  let mut printer = None;
  if args.events {
    let (tx, rx) = mpsc::unbounded_channel();
    engine = engine.with_notifier(Arc::new(ChannelNotifier::new(tx)));
    printer = Some(tokio::spawn(print_events(rx)));
  }

  let cancel = CancellationToken::new();
  let interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received, cancelling run");
      interrupt.cancel();
    }
  });

  let result = engine.run_with_cancel(&input, &options, cancel).await;

  // Dropping the engine closes the event channel so the printer drains and exits
  drop(engine);
  if let Some(printer) = printer {
    printer.await.context("event printer failed")?;
  }

  let result = result.context("run failed")?;

  if args.detailed {
    println!("{}", serde_json::to_string_pretty(&result)?);
  } else {
    println!("{}", serde_json::to_string_pretty(&result.outputs)?);
  }

  Ok(())
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<ExecutionEvent>) {
  while let Some(event) = rx.recv().await {
    match serde_json::to_string(&event) {
      Ok(line) => eprintln!("{}", line),
      Err(e) => warn!(error = %e, "event_encode_failed"),
    }
  }
}

fn read_options_file(path: &Path) -> Result<RunOptions> {
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read options file: {}", path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse options file: {}", path.display()))
}

async fn read_steps_file(path: &Path) -> Result<Value> {
  let content = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read steps file: {}", path.display()))?;
  parse_steps(&content).with_context(|| format!("failed to parse steps file: {}", path.display()))
}

fn read_steps_from_stdin() -> Result<Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, nothing to run
    return Ok(Value::Array(Vec::new()));
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read steps from stdin")?;
  parse_steps(&input).context("failed to parse steps from stdin")
}

/// Parse a step list, accepting one wrapped in a ```json fence. Blank input
/// is an empty list.
fn parse_steps(text: &str) -> Result<Value> {
  let body = strip_code_fence(text);
  if body.is_empty() {
    return Ok(Value::Array(Vec::new()));
  }
  Ok(serde_json::from_str(body)?)
}

fn strip_code_fence(text: &str) -> &str {
  let text = text.trim();
  let text = text
    .strip_prefix("```json")
    .or_else(|| text.strip_prefix("```"))
    .unwrap_or(text);
  text.strip_suffix("```").unwrap_or(text).trim()
}
