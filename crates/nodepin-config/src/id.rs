use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Normalize a node id as it appears in the graph (integer or string) into a string.
pub fn node_id_from_value(value: &Value) -> Option<String> {
  match value {
    Value::Number(n) => Some(n.to_string()),
    Value::String(s) if !s.is_empty() => Some(s.clone()),
    _ => None,
  }
}

pub(crate) fn deserialize_node_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  node_id_from_value(&value)
    .ok_or_else(|| serde::de::Error::custom(format!("invalid node id: {}", value)))
}
