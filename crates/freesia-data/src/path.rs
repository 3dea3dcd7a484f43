//! Path expressions over the value tree.
//!
//! A path addresses a sub-value: `.` separates map keys, `[N]` indexes
//! arrays, and segments chain freely (`variable.images[0].url`,
//! `a.b[2][0].c`). The empty path addresses the root.

use thiserror::Error;

use crate::value::Value;

/// A single step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// A map key.
  Key(String),
  /// An array index.
  Index(usize),
}

/// Errors from parsing or resolving a path.
#[derive(Debug, Error)]
pub enum PathError {
  /// The path text is malformed, or traversal hit a value of the wrong
  /// variant (keying an array, indexing a map, descending into a scalar).
  #[error("invalid path '{path}': {reason}")]
  Invalid { path: String, reason: String },

  /// The path is well-formed but the addressed value does not exist: a
  /// missing map key or an out-of-range array index.
  #[error("path '{path}' not found")]
  NotFound { path: String },
}

impl PathError {
  fn invalid(path: &str, reason: impl Into<String>) -> Self {
    PathError::Invalid {
      path: path.to_string(),
      reason: reason.into(),
    }
  }

  fn not_found(path: &str) -> Self {
    PathError::NotFound {
      path: path.to_string(),
    }
  }
}

/// Parse a path expression into segments.
///
/// The empty path parses to no segments.
pub fn parse(path: &str) -> Result<Vec<Segment>, PathError> {
  let mut segments = Vec::new();
  let mut rest = path;

  while !rest.is_empty() {
    if let Some(after_bracket) = rest.strip_prefix('[') {
      let end = after_bracket
        .find(']')
        .ok_or_else(|| PathError::invalid(path, "unclosed '['"))?;
      let index = &after_bracket[..end];
      if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PathError::invalid(
          path,
          format!("'{index}' is not an array index"),
        ));
      }
      let index: usize = index
        .parse()
        .map_err(|_| PathError::invalid(path, "array index too large"))?;
      segments.push(Segment::Index(index));

      rest = &after_bracket[end + 1..];
      match rest.as_bytes().first() {
        None | Some(b'[') => {}
        Some(b'.') => rest = consume_separator(path, rest)?,
        Some(_) => {
          return Err(PathError::invalid(path, "expected '.' or '[' after ']'"));
        }
      }
      continue;
    }

    let end = rest.find(['.', '[']).unwrap_or(rest.len());
    let key = &rest[..end];
    if key.is_empty() {
      return Err(PathError::invalid(path, "empty key segment"));
    }
    if key.contains(']') {
      return Err(PathError::invalid(path, "unexpected ']'"));
    }
    segments.push(Segment::Key(key.to_string()));

    rest = &rest[end..];
    if rest.starts_with('.') {
      rest = consume_separator(path, rest)?;
    }
  }

  Ok(segments)
}

/// Consume a `.` separator; a key segment must follow.
fn consume_separator<'a>(path: &str, rest: &'a str) -> Result<&'a str, PathError> {
  let rest = &rest[1..];
  if rest.is_empty() {
    return Err(PathError::invalid(path, "trailing '.'"));
  }
  if rest.starts_with('[') || rest.starts_with('.') {
    return Err(PathError::invalid(path, "empty key segment"));
  }
  Ok(rest)
}

/// Resolve a path expression against a value tree.
///
/// Returns a reference into `root`; the empty path returns `root` itself.
/// Never panics: malformed paths and wrong-variant traversal fail with
/// [`PathError::Invalid`], missing targets with [`PathError::NotFound`].
pub fn resolve<'a>(root: &'a Value, path: &str) -> Result<&'a Value, PathError> {
  let segments = parse(path)?;
  let mut current = root;

  for segment in &segments {
    current = match (segment, current) {
      (Segment::Key(key), Value::Map(fields)) => {
        fields.get(key).ok_or_else(|| PathError::not_found(path))?
      }
      (Segment::Index(index), Value::Array(items)) => {
        items.get(*index).ok_or_else(|| PathError::not_found(path))?
      }
      (Segment::Key(_), other) => {
        return Err(PathError::invalid(
          path,
          format!("cannot key into {}", other.kind()),
        ));
      }
      (Segment::Index(_), other) => {
        return Err(PathError::invalid(
          path,
          format!("cannot index into {}", other.kind()),
        ));
      }
    };
  }

  Ok(current)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> Value {
    Value::from_structural(&serde_json::json!({
      "a": {"b": [{"c": 10}, {"c": 20}]}
    }))
  }

  #[test]
  fn parses_dotted_and_bracketed_segments() {
    let segments = parse("a.b[2][0].c").unwrap();
    assert_eq!(
      segments,
      vec![
        Segment::Key("a".into()),
        Segment::Key("b".into()),
        Segment::Index(2),
        Segment::Index(0),
        Segment::Key("c".into()),
      ]
    );
  }

  #[test]
  fn empty_path_returns_root() {
    let root = sample();
    assert_eq!(resolve(&root, "").unwrap(), &root);
  }

  #[test]
  fn resolves_nested_array_elements() {
    let root = sample();
    assert_eq!(resolve(&root, "a.b[1].c").unwrap(), &Value::Number(20.0));
  }

  #[test]
  fn out_of_range_index_is_not_found() {
    let root = sample();
    assert!(matches!(
      resolve(&root, "a.b[2].c"),
      Err(PathError::NotFound { .. })
    ));
  }

  #[test]
  fn missing_key_is_not_found() {
    let root = sample();
    assert!(matches!(
      resolve(&root, "a.missing"),
      Err(PathError::NotFound { .. })
    ));
  }

  #[test]
  fn keying_into_an_array_is_invalid() {
    let root = sample();
    assert!(matches!(
      resolve(&root, "a.b.c"),
      Err(PathError::Invalid { .. })
    ));
  }

  #[test]
  fn indexing_into_a_map_is_invalid() {
    let root = sample();
    assert!(matches!(
      resolve(&root, "a[0]"),
      Err(PathError::Invalid { .. })
    ));
  }

  #[test]
  fn descending_through_a_scalar_is_invalid() {
    let root = sample();
    assert!(matches!(
      resolve(&root, "a.b[0].c.d"),
      Err(PathError::Invalid { .. })
    ));
  }

  #[test]
  fn rejects_malformed_paths() {
    for path in ["a..b", ".a", "a.", "a[", "a[x]", "a[]", "a[0]b", "a.[0]", "a]b"] {
      assert!(
        matches!(parse(path), Err(PathError::Invalid { .. })),
        "path {path:?} should be invalid"
      );
    }
  }

  #[test]
  fn leading_index_addresses_a_root_array() {
    let root = Value::Array(vec![Value::from("x")]);
    assert_eq!(resolve(&root, "[0]").unwrap(), &Value::from("x"));
  }
}
