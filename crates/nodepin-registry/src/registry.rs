use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::RegistryError;

/// A custom node package present in the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
  /// Package id, e.g. "comfyui-impact-pack"
  pub id: String,
  /// Version declared by the package, when it declares one.
  pub version: Option<String>,
  /// Directory the package lives in.
  pub path: PathBuf,
}

/// Source of the installed-package set.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
  /// List installed packages, ordered by id.
  async fn list(&self) -> Result<Vec<InstalledPackage>, RegistryError>;
}
