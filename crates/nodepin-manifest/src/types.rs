use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The whole persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
  /// Node packages, keyed by package id.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub nodes: BTreeMap<String, NodePackageRecord>,

  /// Per-workflow dependency records, keyed by workflow name.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub workflows: BTreeMap<String, WorkflowSection>,

  #[serde(default, skip_serializing_if = "ModelSections::is_empty")]
  pub models: ModelSections,
}

/// How a node package was identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageSource {
  Registry,
  Git,
  Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePackageRecord {
  /// Exact version or commit, when known.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  pub source: PackageSource,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub repository: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSection {
  /// Node packages this workflow needs.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub nodes: Vec<String>,

  /// Confirmed decisions for node types, keyed by type.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub custom_node_map: BTreeMap<String, NodeMapping>,

  /// Model usage, keyed by hash (content known) or filename (content unknown).
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub models: BTreeMap<String, WorkflowModel>,
}

/// A confirmed decision for a node type: a package, or the skip sentinel.
///
/// Serialized as the package id string, or `false` for skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNodeMapping", into = "RawNodeMapping")]
pub enum NodeMapping {
  Package(String),
  Skip,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawNodeMapping {
  Package(String),
  Flag(bool),
}

impl TryFrom<RawNodeMapping> for NodeMapping {
  type Error = String;

  fn try_from(raw: RawNodeMapping) -> Result<Self, Self::Error> {
    match raw {
      RawNodeMapping::Package(id) => Ok(NodeMapping::Package(id)),
      RawNodeMapping::Flag(false) => Ok(NodeMapping::Skip),
      RawNodeMapping::Flag(true) => Err("node mapping must be a package id or false".to_string()),
    }
  }
}

impl From<NodeMapping> for RawNodeMapping {
  fn from(mapping: NodeMapping) -> Self {
    match mapping {
      NodeMapping::Package(id) => RawNodeMapping::Package(id),
      NodeMapping::Skip => RawNodeMapping::Flag(false),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCategory {
  Required,
  Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
  Resolved,
  Unresolved,
}

/// One workflow's use of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowModel {
  pub filename: String,
  /// Raw widget values that point at this model, e.g. "SDXL/x.safetensors".
  #[serde(default)]
  pub references: Vec<String>,
  pub status: ModelStatus,
  /// How this workflow uses the model. May differ from the global section
  /// when another workflow already requires the same file.
  pub category: ModelCategory,
  #[serde(default)]
  pub nodes: Vec<ModelUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelUsage {
  pub node_id: String,
  pub widget_index: usize,
}

/// Full metadata for a model whose content is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
  pub hash: String,
  pub filename: String,
  pub size: u64,
  pub relative_path: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub sources: Vec<String>,
}

/// Entry in the optional section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionalModel {
  /// Nice-to-have: content known, keyed by hash.
  Indexed(ModelEntry),
  /// Content unknown, keyed by filename.
  Unresolved { unresolved: bool },
}

impl OptionalModel {
  pub fn unresolved() -> Self {
    OptionalModel::Unresolved { unresolved: true }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSections {
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub required: BTreeMap<String, ModelEntry>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub optional: BTreeMap<String, OptionalModel>,
}

impl ModelSections {
  pub fn is_empty(&self) -> bool {
    self.required.is_empty() && self.optional.is_empty()
  }
}

impl Manifest {
  pub fn workflow(&self, name: &str) -> Option<&WorkflowSection> {
    self.workflows.get(name)
  }

  pub fn node_mapping(&self, workflow: &str, node_type: &str) -> Option<&NodeMapping> {
    self.workflow(workflow)?.custom_node_map.get(node_type)
  }

  /// A model whose content is known, with the section it lives in.
  /// Required wins when a hash somehow sits in both.
  pub fn model_by_hash(&self, hash: &str) -> Option<(&ModelEntry, ModelCategory)> {
    if let Some(entry) = self.models.required.get(hash) {
      return Some((entry, ModelCategory::Required));
    }
    match self.models.optional.get(hash) {
      Some(OptionalModel::Indexed(entry)) => Some((entry, ModelCategory::Optional)),
      _ => None,
    }
  }

  /// Required entries with this file name, ordered by hash.
  pub fn required_by_filename(&self, filename: &str) -> Vec<&ModelEntry> {
    self
      .models
      .required
      .values()
      .filter(|entry| entry.filename == filename)
      .collect()
  }

  /// A workflow's recorded use of the model behind this raw reference value.
  pub fn workflow_model(&self, workflow: &str, reference: &str) -> Option<(&str, &WorkflowModel)> {
    self
      .workflow(workflow)?
      .models
      .iter()
      .find(|(_, model)| model.references.iter().any(|r| r == reference))
      .map(|(key, model)| (key.as_str(), model))
  }

  pub(crate) fn insert_node_package(&mut self, package_id: &str, record: &NodePackageRecord) -> bool {
    if self.nodes.get(package_id) == Some(record) {
      return false;
    }
    self.nodes.insert(package_id.to_string(), record.clone());
    true
  }

  pub(crate) fn insert_node_mapping(
    &mut self,
    workflow: &str,
    node_type: &str,
    mapping: &NodeMapping,
  ) -> bool {
    let section = self.workflows.entry(workflow.to_string()).or_default();
    if section.custom_node_map.get(node_type) == Some(mapping) {
      return false;
    }
    section
      .custom_node_map
      .insert(node_type.to_string(), mapping.clone());
    true
  }

  pub(crate) fn insert_required_model(&mut self, entry: &ModelEntry) -> bool {
    let demoted = self.models.optional.remove(&entry.hash).is_some();
    if !demoted && self.models.required.get(&entry.hash) == Some(entry) {
      return false;
    }

    let merged = match self.models.required.get(&entry.hash) {
      Some(existing) => merge_entry(existing, entry),
      None => entry.clone(),
    };
    self.models.required.insert(entry.hash.clone(), merged);
    true
  }

  /// Insert into the optional section, keeping the filename-keyed and
  /// hash-keyed shapes disjoint. A hash already required stays required.
  pub(crate) fn insert_optional_model(&mut self, key: &str, model: &OptionalModel) -> bool {
    match model {
      OptionalModel::Indexed(entry) => {
        if self.models.required.contains_key(&entry.hash) {
          return false;
        }

        let mut changed = false;
        if matches!(
          self.models.optional.get(&entry.filename),
          Some(OptionalModel::Unresolved { .. })
        ) {
          self.models.optional.remove(&entry.filename);
          changed = true;
        }

        let merged = match self.models.optional.get(&entry.hash) {
          Some(OptionalModel::Indexed(existing)) if existing == entry => return changed,
          Some(OptionalModel::Indexed(existing)) => merge_entry(existing, entry),
          _ => entry.clone(),
        };
        self
          .models
          .optional
          .insert(entry.hash.clone(), OptionalModel::Indexed(merged));
        true
      }
      OptionalModel::Unresolved { .. } => {
        let before = self.models.optional.len();
        self.models.optional.retain(|_, existing| {
          !matches!(existing, OptionalModel::Indexed(entry) if entry.filename == key)
        });
        let removed = before != self.models.optional.len();

        if self.models.optional.get(key) == Some(model) {
          return removed;
        }
        self.models.optional.insert(key.to_string(), model.clone());
        true
      }
    }
  }

  /// Record a workflow's use of a model. A reference recorded under a
  /// different key moves to this one. References sharing a key share one
  /// record, whose usages are the union of theirs.
  pub(crate) fn insert_workflow_model(&mut self, workflow: &str, key: &str, model: &WorkflowModel) -> bool {
    let section = self.workflows.entry(workflow.to_string()).or_default();

    let mut changed = false;
    for (existing_key, existing) in section.models.iter_mut() {
      if existing_key == key {
        continue;
      }
      let before = existing.references.len();
      existing.references.retain(|r| !model.references.contains(r));
      changed |= before != existing.references.len();
    }
    section
      .models
      .retain(|existing_key, existing| existing_key == key || !existing.references.is_empty());

    let mut merged = model.clone();
    if let Some(existing) = section.models.get(key) {
      if existing.references != model.references {
        merged.references = union(&existing.references, &model.references);
        merged.nodes = union(&existing.nodes, &model.nodes);
      }
    }
    merged.references.sort();
    merged.references.dedup();

    if section.models.get(key) == Some(&merged) {
      return changed;
    }
    section.models.insert(key.to_string(), merged);
    true
  }

  pub(crate) fn replace_workflow_nodes(&mut self, workflow: &str, package_ids: &[String]) -> bool {
    let section = self.workflows.entry(workflow.to_string()).or_default();
    if section.nodes == package_ids {
      return false;
    }
    section.nodes = package_ids.to_vec();
    true
  }
}

fn union<T: Clone + Ord>(left: &[T], right: &[T]) -> Vec<T> {
  let mut all: Vec<T> = left.iter().chain(right).cloned().collect();
  all.sort();
  all.dedup();
  all
}

/// Amend metadata of an existing entry. The hash is fixed; sources are
/// append-only.
fn merge_entry(existing: &ModelEntry, update: &ModelEntry) -> ModelEntry {
  let mut merged = update.clone();
  merged.hash = existing.hash.clone();
  merged.sources = existing.sources.clone();
  for source in &update.sources {
    if !merged.sources.contains(source) {
      merged.sources.push(source.clone());
    }
  }
  merged
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(hash: &str, filename: &str) -> ModelEntry {
    ModelEntry {
      hash: hash.to_string(),
      filename: filename.to_string(),
      size: 2048,
      relative_path: format!("checkpoints/{}", filename),
      sources: Vec::new(),
    }
  }

  #[test]
  fn test_node_mapping_serialization() {
    let mut section = WorkflowSection::default();
    section
      .custom_node_map
      .insert("FaceDetailer".to_string(), NodeMapping::Package("comfyui-impact-pack".to_string()));
    section
      .custom_node_map
      .insert("Debug Print".to_string(), NodeMapping::Skip);

    let text = toml::to_string(&section).unwrap();
    assert!(text.contains("Debug Print"));
    assert!(text.contains("= false"));

    let parsed: WorkflowSection = toml::from_str(&text).unwrap();
    assert_eq!(parsed, section);
  }

  #[test]
  fn test_true_is_not_a_mapping() {
    let result: Result<WorkflowSection, _> = toml::from_str("[custom_node_map]\nFoo = true\n");
    assert!(result.is_err());
  }

  #[test]
  fn test_optional_shapes_parse() {
    let sections: ModelSections = toml::from_str(
      r#"
        [optional."x.safetensors"]
        unresolved = true

        [optional.h2]
        hash = "h2"
        filename = "y.safetensors"
        size = 10
        relative_path = "loras/y.safetensors"
      "#,
    )
    .unwrap();

    assert_eq!(sections.optional["x.safetensors"], OptionalModel::unresolved());
    assert!(matches!(sections.optional["h2"], OptionalModel::Indexed(_)));
  }

  #[test]
  fn test_optional_indexed_replaces_unresolved_marker() {
    let mut manifest = Manifest::default();
    manifest.insert_optional_model("x.safetensors", &OptionalModel::unresolved());
    manifest.insert_optional_model("h1", &OptionalModel::Indexed(entry("h1", "x.safetensors")));

    assert!(!manifest.models.optional.contains_key("x.safetensors"));
    assert!(manifest.models.optional.contains_key("h1"));
  }

  #[test]
  fn test_unresolved_marker_replaces_indexed_entry() {
    let mut manifest = Manifest::default();
    manifest.insert_optional_model("h1", &OptionalModel::Indexed(entry("h1", "x.safetensors")));
    manifest.insert_optional_model("x.safetensors", &OptionalModel::unresolved());

    assert!(!manifest.models.optional.contains_key("h1"));
    assert_eq!(manifest.models.optional.len(), 1);
  }

  #[test]
  fn test_required_wins_over_optional() {
    let mut manifest = Manifest::default();
    manifest.insert_optional_model("h1", &OptionalModel::Indexed(entry("h1", "x.safetensors")));
    assert!(manifest.insert_required_model(&entry("h1", "x.safetensors")));
    assert!(!manifest.models.optional.contains_key("h1"));

    assert!(!manifest.insert_optional_model("h1", &OptionalModel::Indexed(entry("h1", "x.safetensors"))));
    assert_eq!(
      manifest.model_by_hash("h1").map(|(_, c)| c),
      Some(ModelCategory::Required)
    );
  }

  #[test]
  fn test_required_sources_are_append_only() {
    let mut manifest = Manifest::default();
    let mut first = entry("h1", "x.safetensors");
    first.sources = vec!["https://a".to_string()];
    manifest.insert_required_model(&first);

    let mut second = entry("h1", "x.safetensors");
    second.sources = vec!["https://b".to_string()];
    manifest.insert_required_model(&second);

    assert_eq!(
      manifest.models.required["h1"].sources,
      vec!["https://a".to_string(), "https://b".to_string()]
    );
    assert!(!manifest.insert_required_model(&manifest.models.required["h1"].clone()));
  }

  fn usage(reference: &str, node_id: &str, status: ModelStatus) -> WorkflowModel {
    WorkflowModel {
      filename: "x.safetensors".to_string(),
      references: vec![reference.to_string()],
      status,
      category: ModelCategory::Required,
      nodes: vec![ModelUsage {
        node_id: node_id.to_string(),
        widget_index: 0,
      }],
    }
  }

  #[test]
  fn test_workflow_model_rekeyed_by_reference() {
    let mut manifest = Manifest::default();
    let unresolved = WorkflowModel {
      category: ModelCategory::Optional,
      ..usage("x.safetensors", "1", ModelStatus::Unresolved)
    };
    let resolved = usage("x.safetensors", "1", ModelStatus::Resolved);

    manifest.insert_workflow_model("wf", "x.safetensors", &unresolved);
    assert!(manifest.insert_workflow_model("wf", "h1", &resolved));
    assert!(!manifest.insert_workflow_model("wf", "h1", &resolved));

    let models = &manifest.workflow("wf").unwrap().models;
    assert_eq!(models.len(), 1);
    assert_eq!(manifest.workflow_model("wf", "x.safetensors").map(|(k, _)| k), Some("h1"));
  }

  #[test]
  fn test_same_file_name_in_different_folders() {
    let mut manifest = Manifest::default();
    manifest.insert_workflow_model("wf", "h1", &usage("SD15/x.safetensors", "1", ModelStatus::Resolved));
    manifest.insert_workflow_model("wf", "h2", &usage("SDXL/x.safetensors", "2", ModelStatus::Resolved));

    assert_eq!(manifest.workflow("wf").unwrap().models.len(), 2);
    assert_eq!(manifest.workflow_model("wf", "SD15/x.safetensors").map(|(k, _)| k), Some("h1"));
    assert_eq!(manifest.workflow_model("wf", "SDXL/x.safetensors").map(|(k, _)| k), Some("h2"));
    assert!(manifest.workflow_model("wf", "x.safetensors").is_none());
  }

  #[test]
  fn test_references_to_one_file_share_a_record() {
    let mut manifest = Manifest::default();
    let first = usage("x.safetensors", "1", ModelStatus::Resolved);
    let second = usage("SD15/x.safetensors", "2", ModelStatus::Resolved);

    assert!(manifest.insert_workflow_model("wf", "h1", &first));
    assert!(manifest.insert_workflow_model("wf", "h1", &second));
    // recording either reference again is a no-op
    assert!(!manifest.insert_workflow_model("wf", "h1", &first));
    assert!(!manifest.insert_workflow_model("wf", "h1", &second));

    let (_, model) = manifest.workflow_model("wf", "x.safetensors").unwrap();
    assert_eq!(model.references, vec!["SD15/x.safetensors", "x.safetensors"]);
    assert_eq!(model.nodes.len(), 2);
  }
}
