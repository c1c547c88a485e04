use std::collections::{BTreeMap, HashMap};

use nodepin_manifest::{Manifest, ModelSections, NodeMapping, WorkflowModel};
use nodepin_registry::InstalledPackage;

use crate::model::ModelResolution;
use crate::node::ResolvedNodePackage;

/// State for one resolve invocation of one workflow.
///
/// Holds the manifest snapshot the resolvers read decisions from, the
/// installed-package set, and per-run caches. Created at the start of a
/// resolve call and dropped at its end.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
  workflow: String,
  manifest: Manifest,
  installed: BTreeMap<String, InstalledPackage>,
  session_cache: HashMap<String, Vec<ResolvedNodePackage>>,
  model_cache: HashMap<String, ModelResolution>,
}

impl ResolutionContext {
  pub fn new(
    workflow: impl Into<String>,
    manifest: Manifest,
    installed: impl IntoIterator<Item = InstalledPackage>,
  ) -> Self {
    Self {
      workflow: workflow.into(),
      manifest,
      installed: installed
        .into_iter()
        .map(|package| (package.id.clone(), package))
        .collect(),
      session_cache: HashMap::new(),
      model_cache: HashMap::new(),
    }
  }

  pub fn workflow(&self) -> &str {
    &self.workflow
  }

  pub fn manifest(&self) -> &Manifest {
    &self.manifest
  }

  /// Replace the manifest snapshot after a decision was persisted.
  /// Cached outcomes are kept.
  pub fn set_manifest(&mut self, manifest: Manifest) {
    self.manifest = manifest;
  }

  pub fn models(&self) -> &ModelSections {
    &self.manifest.models
  }

  pub fn installed(&self, package_id: &str) -> Option<&InstalledPackage> {
    self.installed.get(package_id)
  }

  pub fn is_installed(&self, package_id: &str) -> bool {
    self.installed.contains_key(package_id)
  }

  /// Installed package ids, ordered.
  pub fn installed_ids(&self) -> impl Iterator<Item = &str> {
    self.installed.keys().map(String::as_str)
  }

  /// The persisted decision for a node type in this workflow.
  pub fn custom_mapping(&self, node_type: &str) -> Option<&NodeMapping> {
    self.manifest.node_mapping(&self.workflow, node_type)
  }

  /// The persisted record of how this workflow uses the model behind a raw
  /// reference value.
  pub fn workflow_model(&self, reference: &str) -> Option<(&str, &WorkflowModel)> {
    self.manifest.workflow_model(&self.workflow, reference)
  }

  pub fn cached_node(&self, node_type: &str) -> Option<&[ResolvedNodePackage]> {
    self.session_cache.get(node_type).map(Vec::as_slice)
  }

  pub fn cache_node(&mut self, node_type: &str, packages: Vec<ResolvedNodePackage>) {
    self.session_cache.insert(node_type.to_string(), packages);
  }

  pub fn cached_model(&self, value: &str) -> Option<&ModelResolution> {
    self.model_cache.get(value)
  }

  pub fn cache_model(&mut self, value: &str, resolution: ModelResolution) {
    self.model_cache.insert(value.to_string(), resolution);
  }
}
