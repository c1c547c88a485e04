use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
  Manifest, ManifestError, ManifestStore, ModelEntry, NodeMapping, NodePackageRecord,
  OptionalModel, WorkflowModel,
};

/// TOML file manifest store.
///
/// Every write reads the current document, applies one change, and replaces
/// the file atomically (temporary sibling, fsync, rename). Writes from one
/// store are serialized.
pub struct TomlManifestStore {
  path: PathBuf,
  lock: Mutex<()>,
}

impl TomlManifestStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      lock: Mutex::new(()),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  async fn read(&self) -> Result<Manifest, ManifestError> {
    let text = match fs::read_to_string(&self.path).await {
      Ok(text) => text,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Manifest::default()),
      Err(source) => {
        return Err(ManifestError::Read {
          path: self.path.clone(),
          source,
        });
      }
    };

    toml::from_str(&text).map_err(|source| ManifestError::Parse {
      path: self.path.clone(),
      source,
    })
  }

  async fn write(&self, manifest: &Manifest) -> Result<(), ManifestError> {
    let text = toml::to_string_pretty(manifest)?;
    let write_err = |source| ManifestError::Write {
      path: self.path.clone(),
      source,
    };

    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp = self.path.with_extension("toml.tmp");
    let mut file = File::create(&tmp).await.map_err(write_err)?;
    file.write_all(text.as_bytes()).await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;
    drop(file);

    fs::rename(&tmp, &self.path).await.map_err(write_err)?;
    Ok(())
  }

  async fn update<F>(&self, apply: F) -> Result<bool, ManifestError>
  where
    F: FnOnce(&mut Manifest) -> bool + Send,
  {
    let _guard = self.lock.lock().await;
    let mut manifest = self.read().await?;
    if !apply(&mut manifest) {
      return Ok(false);
    }
    self.write(&manifest).await?;
    debug!(path = %self.path.display(), "manifest updated");
    Ok(true)
  }
}

#[async_trait]
impl ManifestStore for TomlManifestStore {
  async fn load(&self) -> Result<Manifest, ManifestError> {
    self.read().await
  }

  async fn add_node_package(
    &self,
    package_id: &str,
    record: &NodePackageRecord,
  ) -> Result<bool, ManifestError> {
    self
      .update(|m| m.insert_node_package(package_id, record))
      .await
  }

  async fn set_node_mapping(
    &self,
    workflow: &str,
    node_type: &str,
    mapping: &NodeMapping,
  ) -> Result<bool, ManifestError> {
    self
      .update(|m| m.insert_node_mapping(workflow, node_type, mapping))
      .await
  }

  async fn add_required_model(&self, entry: &ModelEntry) -> Result<bool, ManifestError> {
    self.update(|m| m.insert_required_model(entry)).await
  }

  async fn add_optional_model(
    &self,
    key: &str,
    model: &OptionalModel,
  ) -> Result<bool, ManifestError> {
    self.update(|m| m.insert_optional_model(key, model)).await
  }

  async fn record_workflow_model(
    &self,
    workflow: &str,
    key: &str,
    model: &WorkflowModel,
  ) -> Result<bool, ManifestError> {
    self
      .update(|m| m.insert_workflow_model(workflow, key, model))
      .await
  }

  async fn set_workflow_nodes(
    &self,
    workflow: &str,
    package_ids: &[String],
  ) -> Result<bool, ManifestError> {
    self
      .update(|m| m.replace_workflow_nodes(workflow, package_ids))
      .await
  }
}
