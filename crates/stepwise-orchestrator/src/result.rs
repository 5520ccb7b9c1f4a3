//! Run result types.

use serde::Serialize;
use serde_json::Value;
use stepwise_config::StepDescriptor;
use stepwise_template::ExecutionContext;

/// One executed step and the result recorded for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
  /// The step as declared, before templating.
  pub step: StepDescriptor,
  /// The result after `collect`, before any `extract` merge.
  pub response: Value,
}

/// The results of one group, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupResult {
  /// `None` for the default group.
  #[serde(rename = "groupName")]
  pub group_name: Option<String>,
  pub steps: Vec<StepResult>,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
  /// Unique id of this run.
  pub run_id: String,
  pub groups: Vec<GroupResult>,
  /// Final context, including `extract` merges.
  pub context: ExecutionContext,
  /// The output forest.
  pub outputs: Vec<Value>,
}
