//! nodepin Manifest
//!
//! This crate provides the persisted record of resolution decisions, stored
//! as `nodepin.toml` at the environment root. Other tools (installer,
//! exporter) read the same document.
//!
//! The [`ManifestStore`] trait exposes one write per decision rather than a
//! bulk save. Each write is durable before it returns, so an interrupted
//! session keeps every decision confirmed before the interruption.

mod error;
mod store;
mod types;

pub use error::ManifestError;
pub use store::TomlManifestStore;
pub use types::{
  Manifest, ModelCategory, ModelEntry, ModelSections, ModelStatus, ModelUsage, NodeMapping,
  NodePackageRecord, OptionalModel, PackageSource, WorkflowModel, WorkflowSection,
};

use async_trait::async_trait;

/// Storage trait for the resolution manifest.
///
/// Every write returns whether the document changed; unchanged writes do not
/// touch the disk.
#[async_trait]
pub trait ManifestStore: Send + Sync {
  /// Read the whole document. A missing document is empty.
  async fn load(&self) -> Result<Manifest, ManifestError>;

  /// Record a node package used by the environment.
  async fn add_node_package(
    &self,
    package_id: &str,
    record: &NodePackageRecord,
  ) -> Result<bool, ManifestError>;

  /// Persist a confirmed node type decision for one workflow.
  async fn set_node_mapping(
    &self,
    workflow: &str,
    node_type: &str,
    mapping: &NodeMapping,
  ) -> Result<bool, ManifestError>;

  /// Add a model to the global required section.
  async fn add_required_model(&self, entry: &ModelEntry) -> Result<bool, ManifestError>;

  /// Add a model to the global optional section.
  async fn add_optional_model(
    &self,
    key: &str,
    model: &OptionalModel,
  ) -> Result<bool, ManifestError>;

  /// Record how a workflow uses one model.
  async fn record_workflow_model(
    &self,
    workflow: &str,
    key: &str,
    model: &WorkflowModel,
  ) -> Result<bool, ManifestError>;

  /// Replace the list of node packages a workflow depends on.
  async fn set_workflow_nodes(
    &self,
    workflow: &str,
    package_ids: &[String],
  ) -> Result<bool, ManifestError>;
}
