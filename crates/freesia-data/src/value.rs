//! The dynamic value tree.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// A dynamic pipeline value.
///
/// Values form an owned tree: maps and arrays contain values by value, so
/// cyclic structures are unrepresentable. `Null` is a real value, distinct
/// from a missing map key.
///
/// The serde implementation is externally tagged; decoding a tag that is not
/// one of these variants fails rather than coercing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
  Null,
  Boolean(bool),
  Number(f64),
  String(String),
  File(FileValue),
  Array(Vec<Value>),
  Map(BTreeMap<String, Value>),
}

impl Value {
  /// An empty map.
  pub fn map() -> Self {
    Value::Map(BTreeMap::new())
  }

  /// An empty array.
  pub fn array() -> Self {
    Value::Array(Vec::new())
  }

  /// The variant name, for error messages.
  pub fn kind(&self) -> &'static str {
    match self {
      Value::Null => "null",
      Value::Boolean(_) => "boolean",
      Value::Number(_) => "number",
      Value::String(_) => "string",
      Value::File(_) => "file",
      Value::Array(_) => "array",
      Value::Map(_) => "map",
    }
  }

  pub fn is_null(&self) -> bool {
    matches!(self, Value::Null)
  }

  pub fn as_boolean(&self) -> Option<bool> {
    match self {
      Value::Boolean(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_number(&self) -> Option<f64> {
    match self {
      Value::Number(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_array(&self) -> Option<&[Value]> {
    match self {
      Value::Array(items) => Some(items),
      _ => None,
    }
  }

  pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
    match self {
      Value::Map(fields) => Some(fields),
      _ => None,
    }
  }

  pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
    match self {
      Value::Map(fields) => Some(fields),
      _ => None,
    }
  }

  /// Project to the JSON-shaped structural envelope used on the wire.
  ///
  /// Projection rules:
  /// - scalars become their JSON scalar form; numbers with no JSON
  ///   representation (NaN, infinities) become null
  /// - files become their canonical data-URI string
  /// - arrays keep null elements at their index
  /// - maps omit keys whose value is `Null` (streaming consumers treat
  ///   absence as null)
  pub fn to_structural(&self) -> serde_json::Value {
    match self {
      Value::Null => serde_json::Value::Null,
      Value::Boolean(b) => serde_json::Value::Bool(*b),
      Value::Number(n) => serde_json::Number::from_f64(*n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null),
      Value::String(s) => serde_json::Value::String(s.clone()),
      Value::File(f) => serde_json::Value::String(f.data_uri()),
      Value::Array(items) => {
        serde_json::Value::Array(items.iter().map(Value::to_structural).collect())
      }
      Value::Map(fields) => {
        let mut object = serde_json::Map::new();
        for (key, value) in fields {
          if value.is_null() {
            continue;
          }
          object.insert(key.clone(), value.to_structural());
        }
        serde_json::Value::Object(object)
      }
    }
  }

  /// Embed a JSON document into the value model.
  ///
  /// The inverse of [`to_structural`](Self::to_structural) up to the lossy
  /// projection rules: strings stay strings (no data-URI sniffing), and
  /// numbers are widened to f64.
  pub fn from_structural(json: &serde_json::Value) -> Self {
    match json {
      serde_json::Value::Null => Value::Null,
      serde_json::Value::Bool(b) => Value::Boolean(*b),
      serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
      serde_json::Value::String(s) => Value::String(s.clone()),
      serde_json::Value::Array(items) => {
        Value::Array(items.iter().map(Value::from_structural).collect())
      }
      serde_json::Value::Object(object) => Value::Map(
        object
          .iter()
          .map(|(k, v)| (k.clone(), Value::from_structural(v)))
          .collect(),
      ),
    }
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Boolean(b)
  }
}

impl From<f64> for Value {
  fn from(n: f64) -> Self {
    Value::Number(n)
  }
}

impl From<i64> for Value {
  fn from(n: i64) -> Self {
    Value::Number(n as f64)
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::String(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::String(s)
  }
}

impl From<FileValue> for Value {
  fn from(f: FileValue) -> Self {
    Value::File(f)
  }
}

impl From<Vec<Value>> for Value {
  fn from(items: Vec<Value>) -> Self {
    Value::Array(items)
  }
}

impl From<BTreeMap<String, Value>> for Value {
  fn from(fields: BTreeMap<String, Value>) -> Self {
    Value::Map(fields)
  }
}

impl FromIterator<(String, Value)> for Value {
  fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
    Value::Map(iter.into_iter().collect())
  }
}

/// An opaque typed leaf: a media type plus base64-encoded content.
///
/// Used for binary payloads (image blobs produced by operators) that must
/// travel through the value tree without interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileValue {
  pub media_type: String,
  /// Base64 (standard alphabet, padded) payload.
  pub data: String,
}

impl FileValue {
  /// Wrap an already-encoded base64 payload.
  pub fn new(media_type: impl Into<String>, data: impl Into<String>) -> Self {
    Self {
      media_type: media_type.into(),
      data: data.into(),
    }
  }

  /// Encode raw bytes.
  pub fn from_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
    Self {
      media_type: media_type.into(),
      data: BASE64.encode(bytes),
    }
  }

  /// The canonical string form used in structural projection.
  pub fn data_uri(&self) -> String {
    format!("data:{};base64,{}", self.media_type, self.data)
  }

  /// Decode the payload back to raw bytes.
  pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(&self.data)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn structural_omits_null_map_keys() {
    let value: Value = [
      ("name".to_string(), Value::from("Ada")),
      ("nickname".to_string(), Value::Null),
    ]
    .into_iter()
    .collect();

    assert_eq!(value.to_structural(), json!({"name": "Ada"}));
  }

  #[test]
  fn structural_preserves_null_array_elements() {
    let value = Value::Array(vec![Value::from(1.0), Value::Null, Value::from(3.0)]);
    assert_eq!(value.to_structural(), json!([1.0, null, 3.0]));
  }

  #[test]
  fn structural_projects_files_as_data_uris() {
    let file = FileValue::from_bytes("image/png", b"\x89PNG");
    let uri = file.data_uri();
    assert!(uri.starts_with("data:image/png;base64,"));
    assert_eq!(Value::File(file).to_structural(), json!(uri));
  }

  #[test]
  fn structural_projects_non_finite_numbers_as_null() {
    assert_eq!(Value::Number(f64::NAN).to_structural(), json!(null));
    assert_eq!(Value::Number(f64::INFINITY).to_structural(), json!(null));
  }

  #[test]
  fn from_structural_embeds_json_documents() {
    let json = json!({"a": {"b": [{"c": 10}, {"c": 20}]}, "flag": true});
    let value = Value::from_structural(&json);

    let a = value.as_map().unwrap().get("a").unwrap();
    let b = a.as_map().unwrap().get("b").unwrap();
    assert_eq!(b.as_array().unwrap().len(), 2);
    assert_eq!(value.to_structural(), json);
  }

  #[test]
  fn file_round_trips_through_base64() {
    let file = FileValue::from_bytes("application/octet-stream", &[0u8, 1, 2, 254, 255]);
    assert_eq!(file.decode().unwrap(), vec![0u8, 1, 2, 254, 255]);
  }
}
