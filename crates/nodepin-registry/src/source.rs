use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::warn;

use crate::catalog::Catalog;
use crate::error::RegistryError;

/// Where a catalog snapshot comes from.
///
/// The remote registry is consumed through this seam; nodepin itself ships
/// only the filesystem implementation.
#[async_trait]
pub trait CatalogSource: Send + Sync {
  async fn load(&self) -> Result<Catalog, RegistryError>;
}

/// Catalog snapshot stored as a JSON file.
pub struct FsCatalogSource {
  path: PathBuf,
}

impl FsCatalogSource {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

#[async_trait]
impl CatalogSource for FsCatalogSource {
  /// A missing file yields an empty catalog; catalog tiers then never match.
  async fn load(&self) -> Result<Catalog, RegistryError> {
    if !self.path.exists() {
      warn!(path = %self.path.display(), "catalog not found, continuing with an empty catalog");
      return Ok(Catalog::empty());
    }

    let content = fs::read_to_string(&self.path).await?;
    Catalog::from_json(&content).map_err(|source| RegistryError::InvalidCatalog {
      path: self.path.clone(),
      source,
    })
  }
}
