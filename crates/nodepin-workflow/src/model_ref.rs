use serde::{Deserialize, Serialize};

/// A model file referenced from a node's widget values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowModelReference {
  pub node_id: String,
  pub node_type: String,
  pub widget_index: usize,
  /// Raw value as saved, e.g. "SDXL/juggernaut_v9.safetensors"
  pub value: String,
  /// Model directory the loader reads from, when the loader is known.
  pub directory: Option<String>,
}

impl WorkflowModelReference {
  /// The file name part of the referenced path.
  pub fn filename(&self) -> &str {
    self
      .value
      .rsplit(['/', '\\'])
      .next()
      .unwrap_or(self.value.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn reference(value: &str) -> WorkflowModelReference {
    WorkflowModelReference {
      node_id: "1".to_string(),
      node_type: "CheckpointLoaderSimple".to_string(),
      widget_index: 0,
      value: value.to_string(),
      directory: Some("checkpoints".to_string()),
    }
  }

  #[test]
  fn test_filename() {
    assert_eq!(reference("x.safetensors").filename(), "x.safetensors");
    assert_eq!(reference("SDXL/x.safetensors").filename(), "x.safetensors");
    assert_eq!(reference("SDXL\\x.safetensors").filename(), "x.safetensors");
  }
}
