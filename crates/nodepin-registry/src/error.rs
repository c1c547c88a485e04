use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when reading the catalog or the installed packages.
#[derive(Debug, Error)]
pub enum RegistryError {
  /// IO error when reading catalog or package files.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// Failed to parse the catalog JSON.
  #[error("invalid catalog {path}: {source}")]
  InvalidCatalog {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}
