//! Group scheduling.
//!
//! Steps are bucketed by `group` in first-seen order and executed one at a
//! time: groups in order, steps within a group in list order. Each step is
//! templated against the results recorded so far, executed (or, without
//! fetch, evaluated to its templated body), and recorded in the context
//! before the next one starts.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use stepwise_config::StepDescriptor;
use stepwise_http::{RequestExecutor, fetch_error_message};
use stepwise_template::{
  ExecutionContext, lookup_path, resolve_str, resolve_value, step_references,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::EngineError;
use crate::events::{ExecutionEvent, ExecutionNotifier};
use crate::options::RunOptions;
use crate::result::{GroupResult, StepResult};

/// Steps of one group, in list order.
type StepGroups = IndexMap<Option<String>, Vec<StepDescriptor>>;

/// What a schedule pass produced.
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
  pub groups: Vec<GroupResult>,
  pub context: ExecutionContext,
}

/// Executes normalized steps group by group.
#[derive(Clone)]
pub struct GroupScheduler {
  executor: RequestExecutor,
  notifier: Arc<dyn ExecutionNotifier>,
}

impl GroupScheduler {
  pub fn new(executor: RequestExecutor, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    Self { executor, notifier }
  }

  /// Run every step and collect the per-group results.
  ///
  /// Only cancellation stops a pass early. Every step failure is recorded
  /// as data and the pass carries on.
  #[instrument(
    name = "schedule",
    skip(self, steps, options, cancel),
    fields(run_id = %run_id, step_count = steps.len(), fetch = options.fetch)
  )]
  pub async fn schedule(
    &self,
    steps: Vec<StepDescriptor>,
    options: &RunOptions,
    run_id: &str,
    cancel: &CancellationToken,
  ) -> Result<ScheduleOutcome, EngineError> {
    let mut context = ExecutionContext::new();
    let mut groups = Vec::new();

    for (group_name, group_steps) in partition_groups(steps) {
      debug!(group = ?group_name, steps = group_steps.len(), "group_started");
      self.notifier.notify(ExecutionEvent::GroupStarted {
        run_id: run_id.to_string(),
        group: group_name.clone(),
      });

      let mut results = Vec::with_capacity(group_steps.len());
      for step in group_steps {
        if cancel.is_cancelled() {
          return Err(EngineError::Cancelled);
        }
        let result = self
          .run_step(step, options, &mut context, run_id, cancel)
          .await?;
        results.push(result);
      }

      groups.push(GroupResult {
        group_name,
        steps: results,
      });
    }

    Ok(ScheduleOutcome { groups, context })
  }

  #[instrument(
    name = "step",
    skip(self, step, options, context, run_id, cancel),
    fields(step_id = %step.step_id())
  )]
  async fn run_step(
    &self,
    step: StepDescriptor,
    options: &RunOptions,
    context: &mut ExecutionContext,
    run_id: &str,
    cancel: &CancellationToken,
  ) -> Result<StepResult, EngineError> {
    let step_id = step.step_id().to_string();
    warn_unresolved_references(&step, context);

    self.notifier.notify(ExecutionEvent::StepStarted {
      run_id: run_id.to_string(),
      step_id: step_id.clone(),
    });

    let templated = template_step(&step, context);

    let raw = if options.fetch {
      let policy = options.retry_policy_for(&templated);
      tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
        value = self.executor.execute(&templated, policy) => value,
      }
    } else {
      templated.body.clone().unwrap_or(Value::Null)
    };

    let response = match &step.collect {
      Some(policy) => policy.apply(raw),
      None => raw,
    };

    context.record(step_id.clone(), response.clone());

    if let Some(extract) = &step.extract {
      let fields: Vec<(String, Value)> = extract
        .iter()
        .map(|(key, path)| {
          let value = lookup_path(&response, path)
            .cloned()
            .unwrap_or(Value::Null);
          (key.clone(), value)
        })
        .collect();
      debug!(fields = fields.len(), "step_extracted");
      context.merge_extracted(&step_id, fields);
    }

    match fetch_error_message(&response) {
      Some(error) => {
        warn!(error = %error, "step_failed");
        self.notifier.notify(ExecutionEvent::StepFailed {
          run_id: run_id.to_string(),
          step_id,
          error: error.to_string(),
        });
      }
      None => {
        info!("step_completed");
        self.notifier.notify(ExecutionEvent::StepCompleted {
          run_id: run_id.to_string(),
          step_id,
          response: response.clone(),
        });
      }
    }

    Ok(StepResult { step, response })
  }
}

/// Bucket steps by group, keeping first-seen group order and list order
/// within each group. `None` is the default group.
pub fn partition_groups(steps: Vec<StepDescriptor>) -> StepGroups {
  let mut groups = StepGroups::new();
  for step in steps {
    groups.entry(step.group.clone()).or_default().push(step);
  }
  groups
}

/// A copy of the step with `url_ext`, `headers` and `body` resolved.
fn template_step(step: &StepDescriptor, context: &ExecutionContext) -> StepDescriptor {
  let mut templated = step.clone();
  templated.url_ext = step
    .url_ext
    .as_deref()
    .map(|ext| resolve_str(ext, context).into_owned());
  templated.headers = step.headers.as_ref().map(|headers| {
    headers
      .iter()
      .map(|(name, value)| (name.clone(), resolve_value(value, context)))
      .collect()
  });
  templated.body = step.body.as_ref().map(|body| resolve_value(body, context));
  templated
}

/// Log placeholders naming steps that have not produced a result yet. They
/// resolve to empty strings.
fn warn_unresolved_references(step: &StepDescriptor, context: &ExecutionContext) {
  let templated_fields = [
    step.url_ext.clone().map(Value::String),
    step.headers.clone().map(Value::Object),
    step.body.clone(),
  ];

  for field in templated_fields.iter().flatten() {
    for reference in step_references(field) {
      if !context.contains(&reference) {
        warn!(reference = %reference, "template_reference_unresolved");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use serde_json::json;
  use stepwise_http::ReqwestTransport;

  use crate::events::NoopNotifier;

  fn steps(value: Value) -> Vec<StepDescriptor> {
    stepwise_config::normalize_steps(&value).unwrap()
  }

  fn scheduler() -> GroupScheduler {
    GroupScheduler::new(
      RequestExecutor::new(Arc::new(ReqwestTransport::new())),
      Arc::new(NoopNotifier),
    )
  }

  async fn run(value: Value) -> ScheduleOutcome {
    scheduler()
      .schedule(
        steps(value),
        &RunOptions::default(),
        "test-run",
        &CancellationToken::new(),
      )
      .await
      .unwrap()
  }

  #[test]
  fn test_partition_keeps_first_seen_order() {
    let groups = partition_groups(steps(json!([
      { "id": "1", "group": "B" },
      { "id": "2", "group": "A" },
      { "id": "3", "group": "B" },
      { "id": "4" },
      { "id": "5", "group": "" }
    ])));

    let layout: Vec<(Option<&str>, Vec<&str>)> = groups
      .iter()
      .map(|(name, steps)| {
        (
          name.as_deref(),
          steps.iter().map(StepDescriptor::step_id).collect(),
        )
      })
      .collect();

    assert_eq!(
      layout,
      vec![
        (Some("B"), vec!["1", "3"]),
        (Some("A"), vec!["2"]),
        (None, vec!["4"]),
        (Some(""), vec!["5"]),
      ]
    );
  }

  #[test]
  fn test_template_step_leaves_original_untouched() {
    let mut context = ExecutionContext::new();
    context.record("a", json!({ "id": 7, "token": "t" }));

    let step = steps(json!([{
      "id": "b",
      "url_ext": "/users/{{steps.a.id}}",
      "headers": { "Authorization": "Bearer {{ steps.a.token }}" },
      "body": { "ref": "{{steps.a.id}}", "n": 1 }
    }]))
    .remove(0);

    let templated = template_step(&step, &context);
    assert_eq!(templated.url_ext.as_deref(), Some("/users/7"));
    assert_eq!(
      templated.headers.unwrap().get("Authorization"),
      Some(&json!("Bearer t"))
    );
    assert_eq!(templated.body, Some(json!({ "ref": "7", "n": 1 })));
    assert_eq!(step.url_ext.as_deref(), Some("/users/{{steps.a.id}}"));
  }

  #[tokio::test]
  async fn test_groups_execute_in_first_seen_order() {
    let outcome = run(json!([
      { "id": "1", "group": "B", "body": 1 },
      { "id": "2", "group": "A", "body": 2 },
      { "id": "3", "group": "B", "body": 3 }
    ]))
    .await;

    let order: Vec<&str> = outcome
      .groups
      .iter()
      .flat_map(|g| g.steps.iter().map(|s| s.step.step_id()))
      .collect();
    assert_eq!(order, vec!["1", "3", "2"]);

    let names: Vec<Option<&str>> = outcome
      .groups
      .iter()
      .map(|g| g.group_name.as_deref())
      .collect();
    assert_eq!(names, vec![Some("B"), Some("A")]);
  }

  #[tokio::test]
  async fn test_body_is_result_without_fetch() {
    let outcome = run(json!([
      { "id": "a", "body": "X" },
      { "id": "b", "body": "{{steps.a}}-Y" },
      { "id": "c" }
    ]))
    .await;

    assert_eq!(outcome.context.get("a"), Some(&json!("X")));
    assert_eq!(outcome.context.get("b"), Some(&json!("X-Y")));
    assert_eq!(outcome.context.get("c"), Some(&Value::Null));
  }

  #[tokio::test]
  async fn test_collect_first() {
    let outcome = run(json!([
      { "id": "list", "collect": "first", "body": [{ "n": 1 }, { "n": 2 }] },
      { "id": "empty", "collect": "first", "body": [] },
      { "id": "scalar", "collect": "first", "body": "x" },
      { "id": "all", "collect": "array", "body": [1, 2] }
    ]))
    .await;

    assert_eq!(outcome.context.get("list"), Some(&json!({ "n": 1 })));
    assert_eq!(outcome.context.get("empty"), Some(&Value::Null));
    assert_eq!(outcome.context.get("scalar"), Some(&json!("x")));
    assert_eq!(outcome.context.get("all"), Some(&json!([1, 2])));
  }

  #[tokio::test]
  async fn test_extract_merges_into_context_only() {
    let outcome = run(json!([
      {
        "id": "u",
        "body": { "user": { "id": 42 } },
        "extract": { "uid": "user.id", "missing": "user.email" }
      },
      { "id": "next", "url_ext": "/{{steps.u.uid}}", "body": "{{steps.u.uid}}" }
    ]))
    .await;

    assert_eq!(
      outcome.context.get("u"),
      Some(&json!({ "user": { "id": 42 }, "uid": 42, "missing": null }))
    );
    assert_eq!(outcome.context.get("next"), Some(&json!("42")));
    assert_eq!(
      outcome.groups[0].steps[0].response,
      json!({ "user": { "id": 42 } })
    );
  }

  #[tokio::test]
  async fn test_extract_promotes_scalar_result() {
    let outcome = run(json!([
      { "id": "s", "body": "plain", "extract": { "whole": "length" } }
    ]))
    .await;

    assert_eq!(outcome.context.get("s"), Some(&json!({ "whole": null })));
  }

  #[tokio::test]
  async fn test_forward_reference_resolves_empty() {
    let outcome = run(json!([
      { "id": "a", "body": "[{{steps.b}}]" },
      { "id": "b", "body": "late" }
    ]))
    .await;

    assert_eq!(outcome.context.get("a"), Some(&json!("[]")));
  }

  #[tokio::test]
  async fn test_cancelled_before_start() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = scheduler()
      .schedule(
        steps(json!([{ "id": "a", "body": 1 }])),
        &RunOptions::default(),
        "test-run",
        &cancel,
      )
      .await;

    assert!(matches!(result, Err(EngineError::Cancelled)));
  }
}
