//! Run entry point.
//!
//! The [`Engine`] validates a step list, hands it to the
//! [`GroupScheduler`], and assembles the output forest. It holds no state
//! between runs, so one engine can serve any number of concurrent callers.

use std::sync::Arc;

use serde_json::Value;
use stepwise_config::normalize_steps;
use stepwise_http::{ReqwestTransport, RequestExecutor, Transport};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::error::EngineError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::options::{EngineConfig, RunOptions};
use crate::output::assemble_outputs;
use crate::result::RunResult;
use crate::scheduler::GroupScheduler;

/// The step orchestration engine.
#[derive(Clone)]
pub struct Engine {
  executor: RequestExecutor,
  notifier: Arc<dyn ExecutionNotifier>,
}

impl Engine {
  /// Create an engine backed by a reqwest client built from `config`.
  ///
  /// Events are discarded. Use [`Engine::with_notifier`] to observe them.
  pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
    let transport = match &config.user_agent {
      Some(user_agent) => {
        ReqwestTransport::with_user_agent(user_agent).map_err(EngineError::Transport)?
      }
      None => ReqwestTransport::new(),
    };
    Ok(Self::with_transport(Arc::new(transport)))
  }

  /// Create an engine that sends requests through `transport`.
  pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
    Self {
      executor: RequestExecutor::new(transport),
      notifier: Arc::new(NoopNotifier),
    }
  }

  /// Replace the event notifier.
  pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  /// Run a step list and return the output forest.
  pub async fn run(&self, input: &Value, options: &RunOptions) -> Result<Vec<Value>, EngineError> {
    self
      .run_with_cancel(input, options, CancellationToken::new())
      .await
      .map(|result| result.outputs)
  }

  /// Run a step list and return every intermediate result.
  pub async fn run_detailed(
    &self,
    input: &Value,
    options: &RunOptions,
  ) -> Result<RunResult, EngineError> {
    self
      .run_with_cancel(input, options, CancellationToken::new())
      .await
  }

  /// Run a step list, stopping with [`EngineError::Cancelled`] once `cancel`
  /// fires.
  ///
  /// The token is checked before each step and raced against in-flight
  /// requests.
  #[instrument(name = "engine_run", skip(self, input, options, cancel))]
  pub async fn run_with_cancel(
    &self,
    input: &Value,
    options: &RunOptions,
    cancel: CancellationToken,
  ) -> Result<RunResult, EngineError> {
    let run_id = uuid::Uuid::new_v4().to_string();

    let steps = normalize_steps(input).inspect_err(|e| {
      error!(run_id = %run_id, error = %e, "run_rejected");
    })?;

    info!(
      run_id = %run_id,
      step_count = steps.len(),
      fetch = options.fetch,
      "run_started"
    );
    self.notifier.notify(ExecutionEvent::RunStarted {
      run_id: run_id.clone(),
      step_count: steps.len(),
    });

    let scheduler = GroupScheduler::new(self.executor.clone(), self.notifier.clone());
    let outcome = match scheduler.schedule(steps, options, &run_id, &cancel).await {
      Ok(outcome) => outcome,
      Err(e) => {
        error!(run_id = %run_id, error = %e, "run_failed");
        self.notifier.notify(ExecutionEvent::RunFailed {
          run_id: run_id.clone(),
          error: e.to_string(),
        });
        return Err(e);
      }
    };

    let outputs = assemble_outputs(&outcome.groups);

    info!(run_id = %run_id, roots = outputs.len(), "run_completed");
    self.notifier.notify(ExecutionEvent::RunCompleted {
      run_id: run_id.clone(),
    });

    Ok(RunResult {
      run_id,
      groups: outcome.groups,
      context: outcome.context,
      outputs,
    })
  }
}

/// Run a step list with a default engine.
///
/// `fetch` enables live HTTP calls; `timeout_ms` and `retries` are the
/// defaults for steps that do not set their own.
pub async fn run_steps(
  input: &Value,
  fetch: bool,
  timeout_ms: u64,
  retries: u32,
) -> Result<Vec<Value>, EngineError> {
  let options = RunOptions {
    fetch,
    timeout_ms,
    retries,
    ..RunOptions::default()
  };
  Engine::new(EngineConfig::default())?
    .run(input, &options)
    .await
}
