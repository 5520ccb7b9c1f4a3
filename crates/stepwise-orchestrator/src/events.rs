//! Execution events for observing a run.
//!
//! The engine emits an event at each run, group and step boundary. Consumers
//! decide what to do with them (print, persist, forward, ignore).

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
  /// The step list was validated and execution is starting.
  RunStarted { run_id: String, step_count: usize },

  /// A group is about to execute. `group` is `None` for the default group.
  GroupStarted {
    run_id: String,
    group: Option<String>,
  },

  StepStarted { run_id: String, step_id: String },

  /// A step produced a result that is not a fetch failure.
  StepCompleted {
    run_id: String,
    step_id: String,
    response: serde_json::Value,
  },

  /// A step's result carries `_fetchError`. The run carries on.
  StepFailed {
    run_id: String,
    step_id: String,
    error: String,
  },

  RunCompleted { run_id: String },

  /// The run stopped before every step executed.
  RunFailed { run_id: String, error: String },
}

/// Receives execution events.
///
/// The engine calls `notify` synchronously for each event and does not wait
/// on delivery.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls a run. Volume is a handful of
  // events per step.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // The receiver may be gone
    let _ = self.sender.send(event);
  }
}
