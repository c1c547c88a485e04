use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A node exactly as saved in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  #[serde(deserialize_with = "crate::id::deserialize_node_id")]
  pub id: String,

  /// Node type name, e.g. "KSampler" or "FaceDetailer"
  #[serde(rename = "type", default)]
  pub node_type: String,

  #[serde(default)]
  pub inputs: Vec<NodeInput>,

  /// Free-form properties. Originating tools embed provenance here
  /// (`cnr_id`, `aux_id`, `ver`).
  #[serde(default)]
  pub properties: Map<String, Value>,

  /// Widget values; usually an array, some custom nodes save an object.
  #[serde(default)]
  pub widgets_values: Value,
}

/// A declared input slot of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInput {
  pub name: String,
  #[serde(rename = "type", default)]
  pub input_type: String,
}
