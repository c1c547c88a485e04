use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use nodepin_config::{NodeDef, NodeInput};

/// Provenance id the editor writes for its own built-in nodes.
pub const CORE_PACKAGE_ID: &str = "comfy-core";

/// Where a provenance id points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceSource {
  /// `cnr_id`: a package id in the registry, `ver` is a release version.
  Registry,
  /// `aux_id`: a git repository as `owner/repo`, `ver` is a commit.
  Git,
}

/// Authoritative package identity embedded in a node's properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
  pub package_id: String,
  pub version: Option<String>,
  pub source: ProvenanceSource,
}

/// A node taken from the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
  pub id: String,
  pub node_type: String,
  pub properties: Map<String, Value>,
  pub widgets_values: Value,
  pub inputs: Vec<NodeInput>,
}

impl From<&NodeDef> for WorkflowNode {
  fn from(def: &NodeDef) -> Self {
    Self {
      id: def.id.clone(),
      node_type: def.node_type.clone(),
      properties: def.properties.clone(),
      widgets_values: def.widgets_values.clone(),
      inputs: def.inputs.clone(),
    }
  }
}

impl WorkflowNode {
  /// Provenance record, if the originating tool embedded one.
  ///
  /// A registry id (`cnr_id`) wins over a git id (`aux_id`).
  pub fn provenance(&self) -> Option<Provenance> {
    let version = self.property_str("ver").map(str::to_string);

    if let Some(id) = self.property_str("cnr_id") {
      return Some(Provenance {
        package_id: id.to_string(),
        version,
        source: ProvenanceSource::Registry,
      });
    }

    self.property_str("aux_id").map(|id| Provenance {
      package_id: id.to_string(),
      version,
      source: ProvenanceSource::Git,
    })
  }

  /// Whether provenance marks this node as part of the editor itself.
  pub fn is_core(&self) -> bool {
    self.property_str("cnr_id") == Some(CORE_PACKAGE_ID)
  }

  /// Short fingerprint of the node's declared inputs, used to tell apart
  /// packages that export nodes with the same type name.
  ///
  /// First 8 hex chars of SHA-256 over the sorted `name:type` pairs.
  /// `None` when the node declares no inputs.
  pub fn input_signature(&self) -> Option<String> {
    if self.inputs.is_empty() {
      return None;
    }

    let mut pairs: Vec<String> = self
      .inputs
      .iter()
      .map(|input| format!("{}:{}", input.name, input.input_type))
      .collect();
    pairs.sort();

    let digest = Sha256::digest(pairs.join("|").as_bytes());
    let hex = format!("{:x}", digest);
    Some(hex[..8].to_string())
  }

  /// String widget values with their positions.
  pub(crate) fn string_widgets(&self) -> Vec<(usize, &str)> {
    match &self.widgets_values {
      Value::Array(values) => values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.as_str().map(|s| (i, s)))
        .collect(),
      Value::Object(map) => map
        .values()
        .enumerate()
        .filter_map(|(i, v)| v.as_str().map(|s| (i, s)))
        .collect(),
      _ => Vec::new(),
    }
  }

  fn property_str(&self, key: &str) -> Option<&str> {
    self
      .properties
      .get(key)
      .and_then(Value::as_str)
      .map(str::trim)
      .filter(|s| !s.is_empty())
  }
}
