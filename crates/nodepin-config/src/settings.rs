use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tuning knobs for the resolvers.
///
/// Every field has a default, so a partial `config.json` is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
  /// Fuzzy search results scoring below this are dropped.
  pub fuzzy_min_score: f64,

  /// Maximum number of fuzzy search results offered to a strategy.
  pub fuzzy_limit: usize,

  /// Minimum length of a package-name fragment for the containment heuristic.
  pub heuristic_min_fragment: usize,

  /// File extensions (lowercase, without dot) treated as model files.
  pub model_extensions: Vec<String>,
}

impl Default for ResolverSettings {
  fn default() -> Self {
    Self {
      fuzzy_min_score: 0.3,
      fuzzy_limit: 10,
      heuristic_min_fragment: 4,
      model_extensions: [
        "safetensors",
        "ckpt",
        "pt",
        "pth",
        "bin",
        "gguf",
        "onnx",
        "sft",
      ]
      .iter()
      .map(|ext| ext.to_string())
      .collect(),
    }
  }
}

impl ResolverSettings {
  /// Load settings from a JSON file, falling back to defaults when the file
  /// does not exist.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    if !path.exists() {
      return Ok(Self::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Whether a widget value looks like a model file name.
  pub fn is_model_file(&self, value: &str) -> bool {
    match value.rsplit_once('.') {
      Some((stem, ext)) if !stem.is_empty() => {
        let ext = ext.to_ascii_lowercase();
        self.model_extensions.iter().any(|known| *known == ext)
      }
      _ => false,
    }
  }
}
