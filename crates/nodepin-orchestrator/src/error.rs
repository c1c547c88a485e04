//! Error types for the resolution pipeline.

use std::path::PathBuf;

use nodepin_config::ConfigError;
use nodepin_manifest::ManifestError;
use nodepin_models::IndexError;
use nodepin_registry::RegistryError;
use nodepin_workflow::AnalyzeError;
use thiserror::Error;

use crate::result::CommitIssue;

#[derive(Debug, Error)]
pub enum OrchestratorError {
  /// The workflow file could not be read.
  #[error("failed to read workflow {path}: {source}")]
  WorkflowRead {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The workflow graph is malformed.
  #[error("failed to analyze workflow '{workflow}': {source}")]
  Analyze {
    workflow: String,
    #[source]
    source: AnalyzeError,
  },

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error(transparent)]
  Index(#[from] IndexError),

  /// The manifest could not be loaded.
  #[error("failed to load manifest: {0}")]
  ManifestRead(#[source] ManifestError),

  /// Persisting one decision failed. Earlier writes are on disk.
  #[error("failed to persist {item}: {source}")]
  PersistenceWrite {
    item: String,
    #[source]
    source: ManifestError,
  },

  /// The user aborted the session.
  #[error("resolution of '{workflow}' cancelled ({saved} decision(s) saved)")]
  Cancelled { workflow: String, saved: usize },

  /// No indexed or recorded model has this hash.
  #[error("unknown model {hash}")]
  UnknownModel { hash: String },

  #[error("workflow '{workflow}' is not commit-safe: {} issue(s)", .issues.len())]
  CommitBlocked {
    workflow: String,
    issues: Vec<CommitIssue>,
  },
}
