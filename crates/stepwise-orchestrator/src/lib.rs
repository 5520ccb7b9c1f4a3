//! Stepwise Orchestrator
//!
//! Runs a declarative step list end to end:
//!
//! ```text
//! input ──► normalize_steps ──► GroupScheduler ──► assemble_outputs ──► output forest
//!                                   │
//!                                   ├─ resolve {{ steps.<id>.<path> }} against the context
//!                                   ├─ RequestExecutor (fetch) or templated body
//!                                   └─ collect / record / extract
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use serde_json::json;
//! use stepwise_orchestrator::run_steps;
//!
//! let outputs = run_steps(
//!   &json!([
//!     { "id": "a", "body": "X" },
//!     { "id": "b", "body": "{{steps.a}}-Y", "outputAs": "r.b" }
//!   ]),
//!   false,
//!   10_000,
//!   1,
//! )
//! .await?;
//! ```

mod engine;
mod error;
mod events;
mod options;
mod output;
mod result;
mod scheduler;

pub use engine::{Engine, run_steps};
pub use error::EngineError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use options::{EngineConfig, RunOptions};
pub use output::assemble_outputs;
pub use result::{GroupResult, RunResult, StepResult};
pub use scheduler::{GroupScheduler, ScheduleOutcome, partition_groups};
