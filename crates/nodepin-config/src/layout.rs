use std::path::{Path, PathBuf};

/// On-disk layout of a managed environment.
///
/// ```text
/// {root}/
/// ├── nodepin.toml          persisted resolution manifest
/// ├── workflows/            saved workflow graphs ({name}.json)
/// ├── models/               model files, grouped by category directory
/// ├── custom_nodes/         installed custom node packages
/// └── .nodepin/
///     ├── catalog.json      package catalog snapshot
///     ├── config.json       resolver settings (optional)
///     └── models.db         content-addressable model index
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentLayout {
  root: PathBuf,
}

impl EnvironmentLayout {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn workflows_dir(&self) -> PathBuf {
    self.root.join("workflows")
  }

  /// Path of a workflow by name. A trailing `.json` in the name is accepted.
  pub fn workflow_path(&self, name: &str) -> PathBuf {
    let file_name = if name.ends_with(".json") {
      name.to_string()
    } else {
      format!("{}.json", name)
    };
    self.workflows_dir().join(file_name)
  }

  pub fn models_dir(&self) -> PathBuf {
    self.root.join("models")
  }

  pub fn custom_nodes_dir(&self) -> PathBuf {
    self.root.join("custom_nodes")
  }

  pub fn manifest_path(&self) -> PathBuf {
    self.root.join("nodepin.toml")
  }

  pub fn state_dir(&self) -> PathBuf {
    self.root.join(".nodepin")
  }

  pub fn index_path(&self) -> PathBuf {
    self.state_dir().join("models.db")
  }

  pub fn catalog_path(&self) -> PathBuf {
    self.state_dir().join("catalog.json")
  }

  pub fn settings_path(&self) -> PathBuf {
    self.state_dir().join("config.json")
  }
}
