//! Input normalization.
//!
//! Canonicalizes a step list (array, or object keyed by step name) into an
//! ordered `Vec<StepDescriptor>` where every step has a unique id.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::ConfigError;
use crate::step::StepDescriptor;

/// Normalize raw step input.
///
/// - An array keeps its order; each element must be an object.
/// - An object becomes one step per entry, in entry order, with `_key` set to
///   the entry's key.
///
/// Ids are then assigned: the step's own `id`, else its `_key`, else `s{n}`
/// where `n` is the 1-based position. Clashing ids are made unique with a
/// numeric suffix, so the only failures are a bad top-level shape and a step
/// that is not a well-formed object.
pub fn normalize_steps(input: &Value) -> Result<Vec<StepDescriptor>, ConfigError> {
  let mut steps = match input {
    Value::Array(items) => items
      .iter()
      .enumerate()
      .map(|(index, item)| parse_step(index, item))
      .collect::<Result<Vec<_>, _>>()?,
    Value::Object(entries) => entries
      .iter()
      .enumerate()
      .map(|(index, (key, item))| {
        let mut step = parse_step(index, item)?;
        step.key = Some(key.clone());
        Ok(step)
      })
      .collect::<Result<Vec<_>, ConfigError>>()?,
    other => {
      return Err(ConfigError::InvalidShape {
        found: type_name(other),
      });
    }
  };

  assign_ids(&mut steps);
  Ok(steps)
}

fn parse_step(index: usize, item: &Value) -> Result<StepDescriptor, ConfigError> {
  if !item.is_object() {
    return Err(ConfigError::InvalidStep {
      index,
      message: format!("expected an object, found {}", type_name(item)),
    });
  }

  serde_json::from_value(item.clone()).map_err(|e| ConfigError::InvalidStep {
    index,
    message: e.to_string(),
  })
}

/// Give every step a unique id.
///
/// The first step to declare an id (through `id` or `_key`) keeps it. Later
/// steps declaring the same id, and steps without one (`s{n}`), take the
/// first free `{base}_{k}` suffix.
fn assign_ids(steps: &mut [StepDescriptor]) {
  let mut taken = HashSet::new();
  let owners: Vec<bool> = steps
    .iter()
    .map(|step| {
      step
        .id
        .as_ref()
        .or(step.key.as_ref())
        .is_some_and(|id| taken.insert(id.clone()))
    })
    .collect();

  for (index, (step, owns_id)) in steps.iter_mut().zip(owners).enumerate() {
    let base = step
      .id
      .clone()
      .or_else(|| step.key.clone())
      .unwrap_or_else(|| format!("s{}", index + 1));

    if owns_id {
      step.id = Some(base);
      continue;
    }

    let mut candidate = base.clone();
    let mut suffix = 0;
    while taken.contains(&candidate) {
      suffix += 1;
      candidate = format!("{}_{}", base, suffix);
    }
    taken.insert(candidate.clone());
    step.id = Some(candidate);
  }
}

fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
