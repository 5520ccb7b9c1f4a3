//! Output forest assembly.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::result::{GroupResult, StepResult};

/// Build the output forest from ordered group results.
///
/// Each step lands under a root named by the first segment of its `outputAs`
/// path, or `step_<id>` when it has none. Roots keep first-seen order and
/// each becomes a single-key object in the returned list.
///
/// - no `outputAs`: the first write sets `output`, later ones `chainN`
/// - one segment: the first write to an empty root sets `value`, later ones
///   `chainN`
/// - several segments: intermediate objects are created as needed and the
///   last segment is overwritten
///
/// `N` is the root's field count plus one at the time of the write.
pub fn assemble_outputs(groups: &[GroupResult]) -> Vec<Value> {
  let mut roots: IndexMap<String, Map<String, Value>> = IndexMap::new();

  for StepResult { step, response } in groups.iter().flat_map(|g| &g.steps) {
    let response = response.clone();

    let Some(path) = step.output_path() else {
      let root = roots.entry(format!("step_{}", step.step_id())).or_default();
      if root.contains_key("output") {
        append_chain(root, response);
      } else {
        root.insert("output".to_string(), response);
      }
      continue;
    };

    let mut segments = path.split('.');
    let root_name = segments.next().unwrap_or_default();
    let root = roots.entry(root_name.to_string()).or_default();
    let rest: Vec<&str> = segments.collect();

    match rest.split_last() {
      None => {
        if root.is_empty() {
          root.insert("value".to_string(), response);
        } else {
          append_chain(root, response);
        }
      }
      Some((last, parents)) => insert_path(root, parents, last, response),
    }
  }

  roots
    .into_iter()
    .map(|(name, tree)| {
      let mut entry = Map::new();
      entry.insert(name, Value::Object(tree));
      Value::Object(entry)
    })
    .collect()
}

/// Set `last` under the object reached by walking `parents`, creating
/// objects along the way. Non-object values on the path are replaced.
fn insert_path(target: &mut Map<String, Value>, parents: &[&str], last: &str, value: Value) {
  match parents.split_first() {
    None => {
      target.insert(last.to_string(), value);
    }
    Some((head, tail)) => {
      let slot = target
        .entry(head.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
      if !slot.is_object() {
        *slot = Value::Object(Map::new());
      }
      if let Value::Object(child) = slot {
        insert_path(child, tail, last, value);
      }
    }
  }
}

fn append_chain(root: &mut Map<String, Value>, response: Value) {
  let key = format!("chain{}", root.len() + 1);
  root.insert(key, response);
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use serde_json::json;
  use stepwise_config::StepDescriptor;

  fn entry(step: Value, response: Value) -> StepResult {
    StepResult {
      step: serde_json::from_value::<StepDescriptor>(step).unwrap(),
      response,
    }
  }

  fn single_group(steps: Vec<StepResult>) -> Vec<GroupResult> {
    vec![GroupResult {
      group_name: None,
      steps,
    }]
  }

  #[test]
  fn test_no_output_as_uses_step_root() {
    let groups = single_group(vec![entry(json!({ "id": "a" }), json!({ "ok": true }))]);
    assert_eq!(
      assemble_outputs(&groups),
      vec![json!({ "step_a": { "output": { "ok": true } } })]
    );
  }

  #[test]
  fn test_repeated_output_as_chains() {
    let groups = single_group(vec![
      entry(json!({ "id": "x", "outputAs": "a" }), json!("X")),
      entry(json!({ "id": "y", "outputAs": "a" }), json!("Y")),
      entry(json!({ "id": "z", "outputAs": "a" }), json!("Z")),
    ]);
    assert_eq!(
      assemble_outputs(&groups),
      vec![json!({ "a": { "value": "X", "chain2": "Y", "chain3": "Z" } })]
    );
  }

  #[test]
  fn test_nested_output_as() {
    let groups = single_group(vec![
      entry(json!({ "id": "p", "outputAs": "data.post" }), json!({ "id": 1 })),
      entry(json!({ "id": "c", "outputAs": "data.meta.count" }), json!(3)),
    ]);
    assert_eq!(
      assemble_outputs(&groups),
      vec![json!({ "data": { "post": { "id": 1 }, "meta": { "count": 3 } } })]
    );
  }

  #[test]
  fn test_nested_path_replaces_scalars_and_overwrites_leaf() {
    let groups = single_group(vec![
      entry(json!({ "id": "a", "outputAs": "data.post" }), json!("scalar")),
      entry(json!({ "id": "b", "outputAs": "data.post.title" }), json!("first")),
      entry(json!({ "id": "c", "outputAs": "data.post.title" }), json!("second")),
    ]);
    assert_eq!(
      assemble_outputs(&groups),
      vec![json!({ "data": { "post": { "title": "second" } } })]
    );
  }

  #[test]
  fn test_single_segment_on_populated_root_chains() {
    let groups = single_group(vec![
      entry(json!({ "id": "a", "outputAs": "r.x" }), json!(1)),
      entry(json!({ "id": "b", "outputAs": "r" }), json!(2)),
    ]);
    assert_eq!(
      assemble_outputs(&groups),
      vec![json!({ "r": { "x": 1, "chain2": 2 } })]
    );
  }

  #[test]
  fn test_roots_keep_first_seen_order_across_groups() {
    let groups = vec![
      GroupResult {
        group_name: Some("one".to_string()),
        steps: vec![
          entry(json!({ "id": "a", "outputAs": "second" }), json!(1)),
          entry(json!({ "id": "b" }), json!(2)),
        ],
      },
      GroupResult {
        group_name: None,
        steps: vec![entry(json!({ "id": "c", "outputAs": "first" }), json!(3))],
      },
    ];
    assert_eq!(
      assemble_outputs(&groups),
      vec![
        json!({ "second": { "value": 1 } }),
        json!({ "step_b": { "output": 2 } }),
        json!({ "first": { "value": 3 } }),
      ]
    );
  }

  #[test]
  fn test_empty_output_as_is_treated_as_absent() {
    let groups = single_group(vec![
      entry(json!({ "id": "a", "outputAs": "" }), json!(1)),
      entry(json!({ "id": "a", "outputAs": "" }), json!(2)),
    ]);
    assert_eq!(
      assemble_outputs(&groups),
      vec![json!({ "step_a": { "output": 1, "chain2": 2 } })]
    );
  }

  #[test]
  fn test_empty_input() {
    assert!(assemble_outputs(&[]).is_empty());
  }
}
