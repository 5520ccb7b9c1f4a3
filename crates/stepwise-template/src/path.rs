use serde_json::Value;

/// Navigate a dotted path (`user.posts.0.title`) inside a JSON value.
///
/// A numeric segment indexes into an array; any segment looks up an object
/// key. Returns `None` on an empty path, an out-of-range index, a missing
/// key, or an attempt to descend into a scalar.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
  if path.is_empty() {
    return None;
  }

  path.split('.').try_fold(value, |current, segment| match current {
    Value::Array(items) => parse_index(segment).and_then(|idx| items.get(idx)),
    Value::Object(map) => map.get(segment),
    _ => None,
  })
}

fn parse_index(segment: &str) -> Option<usize> {
  if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  segment.parse().ok()
}
