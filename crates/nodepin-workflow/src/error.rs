use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzeError {
  #[error("failed to parse workflow: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("node '{node_id}' has no type")]
  MalformedNode { node_id: String },

  #[error("link #{index} is malformed")]
  MalformedLink { index: usize },

  #[error("link references unknown node: {node_id}")]
  InvalidLink { node_id: String },
}
