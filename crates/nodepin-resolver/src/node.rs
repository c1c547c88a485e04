use nodepin_config::ResolverSettings;
use nodepin_manifest::{NodeMapping, PackageSource};
use nodepin_registry::Catalog;
use nodepin_workflow::{ProvenanceSource, WorkflowNode};
use tracing::debug;

use crate::context::ResolutionContext;
use crate::heuristic;

const SIGNATURE_CONFIDENCE: f64 = 1.0;
const TYPE_CONFIDENCE: f64 = 0.9;
const SUBSTRING_CONFIDENCE: f64 = 0.7;

/// The stage of the resolution chain that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchTier {
  SessionCache,
  CustomMapping,
  Provenance,
  Catalog,
  Heuristic,
  UserConfirmed,
}

impl MatchTier {
  pub fn as_str(&self) -> &'static str {
    match self {
      MatchTier::SessionCache => "session-cache",
      MatchTier::CustomMapping => "custom-mapping",
      MatchTier::Provenance => "provenance",
      MatchTier::Catalog => "catalog",
      MatchTier::Heuristic => "heuristic",
      MatchTier::UserConfirmed => "user-confirmed",
    }
  }
}

/// A package a node type was matched to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNodePackage {
  pub package_id: String,
  /// Version or commit to pin, when known.
  pub version: Option<String>,
  pub source: PackageSource,
  pub tier: MatchTier,
  /// In `[0, 1]`; authoritative tiers use 1.0.
  pub confidence: f64,
}

impl ResolvedNodePackage {
  pub fn new(package_id: impl Into<String>, tier: MatchTier, confidence: f64) -> Self {
    Self {
      package_id: package_id.into(),
      version: None,
      source: PackageSource::Registry,
      tier,
      confidence,
    }
  }

  fn with_version(mut self, version: Option<String>) -> Self {
    self.version = version;
    self
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeResolution {
  /// Matched. An empty list is a node type deliberately left without a
  /// package.
  Resolved(Vec<ResolvedNodePackage>),
  /// Several equally plausible packages.
  Ambiguous(Vec<ResolvedNodePackage>),
  /// No authoritative match. Suggestions are ranked guesses that need
  /// confirmation.
  Unresolved { suggestions: Vec<ResolvedNodePackage> },
}

impl NodeResolution {
  pub fn is_resolved(&self) -> bool {
    matches!(self, NodeResolution::Resolved(_))
  }
}

/// Resolves custom node types against a catalog snapshot.
pub struct NodeResolver<'a> {
  catalog: &'a Catalog,
  settings: &'a ResolverSettings,
}

impl<'a> NodeResolver<'a> {
  pub fn new(catalog: &'a Catalog, settings: &'a ResolverSettings) -> Self {
    Self { catalog, settings }
  }

  /// Walk the tiers for one node, stopping at the first that matches.
  pub fn resolve(&self, node: &WorkflowNode, ctx: &mut ResolutionContext) -> NodeResolution {
    let node_type = node.node_type.as_str();

    if let Some(cached) = ctx.cached_node(node_type) {
      let packages = cached
        .iter()
        .cloned()
        .map(|mut package| {
          package.tier = MatchTier::SessionCache;
          package
        })
        .collect();
      return NodeResolution::Resolved(packages);
    }

    if let Some(packages) = self.from_custom_mapping(node_type, ctx) {
      ctx.cache_node(node_type, packages.clone());
      return NodeResolution::Resolved(packages);
    }

    if let Some(package) = self.from_provenance(node) {
      ctx.cache_node(node_type, vec![package.clone()]);
      return NodeResolution::Resolved(vec![package]);
    }

    match self.from_catalog(node, ctx) {
      Some(NodeResolution::Resolved(packages)) => {
        ctx.cache_node(node_type, packages.clone());
        return NodeResolution::Resolved(packages);
      }
      Some(other) => return other,
      None => {}
    }

    let suggestions = self.heuristic_suggestions(node_type, ctx);
    debug!(
      workflow = %ctx.workflow(),
      node_type = %node_type,
      suggestions = suggestions.len(),
      "node type unresolved"
    );
    NodeResolution::Unresolved { suggestions }
  }

  fn from_custom_mapping(
    &self,
    node_type: &str,
    ctx: &ResolutionContext,
  ) -> Option<Vec<ResolvedNodePackage>> {
    match ctx.custom_mapping(node_type)? {
      NodeMapping::Skip => Some(Vec::new()),
      NodeMapping::Package(id) => {
        let version = ctx.installed(id).and_then(|p| p.version.clone());
        Some(vec![
          ResolvedNodePackage::new(id.clone(), MatchTier::CustomMapping, 1.0).with_version(version),
        ])
      }
    }
  }

  fn from_provenance(&self, node: &WorkflowNode) -> Option<ResolvedNodePackage> {
    let provenance = node.provenance()?;

    match provenance.source {
      ProvenanceSource::Registry => {
        if self.catalog.contains(&provenance.package_id) {
          return Some(
            ResolvedNodePackage::new(provenance.package_id, MatchTier::Provenance, 1.0)
              .with_version(provenance.version),
          );
        }
      }
      ProvenanceSource::Git => {
        if let Some(id) = self.catalog.find_by_repository(&provenance.package_id) {
          let mut package = ResolvedNodePackage::new(id, MatchTier::Provenance, 1.0)
            .with_version(provenance.version);
          package.source = PackageSource::Git;
          return Some(package);
        }
      }
    }

    debug!(
      node_type = %node.node_type,
      package_id = %provenance.package_id,
      "invalid provenance, falling through"
    );
    None
  }

  /// Signature, then type name, then substring; the first stage with any
  /// candidate decides.
  fn from_catalog(&self, node: &WorkflowNode, ctx: &ResolutionContext) -> Option<NodeResolution> {
    let node_type = node.node_type.as_str();

    let stages: [(Vec<String>, f64); 3] = [
      (
        node
          .input_signature()
          .map(|signature| self.catalog.lookup_signature(node_type, &signature))
          .unwrap_or_default(),
        SIGNATURE_CONFIDENCE,
      ),
      (self.catalog.lookup_type(node_type), TYPE_CONFIDENCE),
      (self.catalog.lookup_substring(node_type), SUBSTRING_CONFIDENCE),
    ];

    let (ids, confidence) = stages.into_iter().find(|(ids, _)| !ids.is_empty())?;
    let mut candidates: Vec<ResolvedNodePackage> = ids
      .into_iter()
      .map(|id| {
        let version = ctx.installed(&id).and_then(|p| p.version.clone());
        ResolvedNodePackage::new(id, MatchTier::Catalog, confidence).with_version(version)
      })
      .collect();

    if candidates.len() == 1 {
      return Some(NodeResolution::Resolved(candidates));
    }

    let installed: Vec<usize> = candidates
      .iter()
      .enumerate()
      .filter(|(_, c)| ctx.is_installed(&c.package_id))
      .map(|(i, _)| i)
      .collect();
    if let [only] = installed.as_slice() {
      debug!(node_type = %node_type, package_id = %candidates[*only].package_id, "picked the installed candidate");
      return Some(NodeResolution::Resolved(vec![candidates.swap_remove(*only)]));
    }

    Some(NodeResolution::Ambiguous(candidates))
  }

  fn heuristic_suggestions(&self, node_type: &str, ctx: &ResolutionContext) -> Vec<ResolvedNodePackage> {
    heuristic::rank(
      node_type,
      ctx.installed_ids(),
      self.settings.heuristic_min_fragment,
    )
    .into_iter()
    .map(|(id, confidence)| {
      let version = ctx.installed(&id).and_then(|p| p.version.clone());
      ResolvedNodePackage::new(id, MatchTier::Heuristic, confidence).with_version(version)
    })
    .collect()
  }
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use nodepin_manifest::Manifest;
  use nodepin_registry::InstalledPackage;
  use serde_json::json;

  use super::*;

  fn catalog() -> Catalog {
    Catalog::from_json(
      &json!({
        "packages": {
          "comfyui-impact-pack": { "repository": "https://github.com/ltdrdata/ComfyUI-Impact-Pack" },
          "comfyui-kjnodes": { "repository": "https://github.com/kijai/ComfyUI-KJNodes" },
          "kj-fork": {},
          "was-node-suite": {}
        },
        "mappings": {
          "FaceDetailer": ["comfyui-impact-pack"],
          "GetNode": ["comfyui-kjnodes", "kj-fork"],
          "ImageBlend Plus": ["was-node-suite"]
        }
      })
      .to_string(),
    )
    .unwrap()
  }

  fn node(node_type: &str, properties: serde_json::Value) -> WorkflowNode {
    WorkflowNode {
      id: "1".to_string(),
      node_type: node_type.to_string(),
      properties: properties.as_object().cloned().unwrap_or_default(),
      widgets_values: serde_json::Value::Null,
      inputs: Vec::new(),
    }
  }

  fn installed(id: &str) -> InstalledPackage {
    InstalledPackage {
      id: id.to_string(),
      version: Some("1.0.0".to_string()),
      path: PathBuf::from(format!("custom_nodes/{}", id)),
    }
  }

  fn context(manifest: Manifest, packages: &[&str]) -> ResolutionContext {
    ResolutionContext::new("portrait", manifest, packages.iter().map(|id| installed(id)))
  }

  #[test]
  fn test_catalog_type_match() {
    let catalog = catalog();
    let settings = ResolverSettings::default();
    let resolver = NodeResolver::new(&catalog, &settings);
    let mut ctx = context(Manifest::default(), &[]);

    let resolution = resolver.resolve(&node("FaceDetailer", json!({})), &mut ctx);
    let NodeResolution::Resolved(packages) = resolution else {
      panic!("expected resolved");
    };
    assert_eq!(packages[0].package_id, "comfyui-impact-pack");
    assert_eq!(packages[0].tier, MatchTier::Catalog);

    // Second lookup comes from the session cache.
    let again = resolver.resolve(&node("FaceDetailer", json!({})), &mut ctx);
    let NodeResolution::Resolved(packages) = again else {
      panic!("expected resolved");
    };
    assert_eq!(packages[0].tier, MatchTier::SessionCache);
  }

  #[test]
  fn test_ambiguous_unless_one_installed() {
    let catalog = catalog();
    let settings = ResolverSettings::default();
    let resolver = NodeResolver::new(&catalog, &settings);

    let mut ctx = context(Manifest::default(), &[]);
    let resolution = resolver.resolve(&node("GetNode", json!({})), &mut ctx);
    assert!(matches!(resolution, NodeResolution::Ambiguous(ref c) if c.len() == 2));

    let mut ctx = context(Manifest::default(), &["kj-fork"]);
    let resolution = resolver.resolve(&node("GetNode", json!({})), &mut ctx);
    let NodeResolution::Resolved(packages) = resolution else {
      panic!("expected resolved");
    };
    assert_eq!(packages[0].package_id, "kj-fork");
    assert_eq!(packages[0].version.as_deref(), Some("1.0.0"));
  }

  #[test]
  fn test_substring_stage() {
    let catalog = catalog();
    let settings = ResolverSettings::default();
    let resolver = NodeResolver::new(&catalog, &settings);
    let mut ctx = context(Manifest::default(), &[]);

    let resolution = resolver.resolve(&node("ImageBlend", json!({})), &mut ctx);
    let NodeResolution::Resolved(packages) = resolution else {
      panic!("expected resolved");
    };
    assert_eq!(packages[0].package_id, "was-node-suite");
    assert!(packages[0].confidence < TYPE_CONFIDENCE);
  }

  #[test]
  fn test_provenance_tier() {
    let catalog = catalog();
    let settings = ResolverSettings::default();
    let resolver = NodeResolver::new(&catalog, &settings);
    let mut ctx = context(Manifest::default(), &[]);

    let registry = node("Unlisted", json!({ "cnr_id": "comfyui-kjnodes", "ver": "1.1.2" }));
    let NodeResolution::Resolved(packages) = resolver.resolve(&registry, &mut ctx) else {
      panic!("expected resolved");
    };
    assert_eq!(packages[0].tier, MatchTier::Provenance);
    assert_eq!(packages[0].version.as_deref(), Some("1.1.2"));

    let git = node("AlsoUnlisted", json!({ "aux_id": "ltdrdata/ComfyUI-Impact-Pack", "ver": "abc123" }));
    let NodeResolution::Resolved(packages) = resolver.resolve(&git, &mut ctx) else {
      panic!("expected resolved");
    };
    assert_eq!(packages[0].package_id, "comfyui-impact-pack");
    assert_eq!(packages[0].source, PackageSource::Git);
    assert_eq!(packages[0].version.as_deref(), Some("abc123"));
  }

  #[test]
  fn test_invalid_provenance_falls_through() {
    let catalog = catalog();
    let settings = ResolverSettings::default();
    let resolver = NodeResolver::new(&catalog, &settings);
    let mut ctx = context(Manifest::default(), &[]);

    let bogus = node("FaceDetailer", json!({ "cnr_id": "not-a-package", "ver": "9.9" }));
    let NodeResolution::Resolved(packages) = resolver.resolve(&bogus, &mut ctx) else {
      panic!("expected resolved");
    };
    assert_eq!(packages[0].package_id, "comfyui-impact-pack");
    assert_eq!(packages[0].tier, MatchTier::Catalog);
  }

  #[test]
  fn test_skip_mapping_resolves_to_nothing() {
    let catalog = catalog();
    let settings = ResolverSettings::default();
    let resolver = NodeResolver::new(&catalog, &settings);

    let mut manifest = Manifest::default();
    manifest
      .workflows
      .entry("portrait".to_string())
      .or_default()
      .custom_node_map
      .insert("FaceDetailer".to_string(), NodeMapping::Skip);
    let mut ctx = context(manifest, &[]);

    let resolution = resolver.resolve(&node("FaceDetailer", json!({})), &mut ctx);
    assert_eq!(resolution, NodeResolution::Resolved(Vec::new()));
  }

  #[test]
  fn test_heuristic_is_only_a_suggestion() {
    let catalog = catalog();
    let settings = ResolverSettings::default();
    let resolver = NodeResolver::new(&catalog, &settings);
    let mut ctx = context(Manifest::default(), &["bar-nodes"]);

    let resolution = resolver.resolve(&node("Foo (bar)", json!({})), &mut ctx);
    let NodeResolution::Unresolved { suggestions } = resolution else {
      panic!("expected unresolved");
    };
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].package_id, "bar-nodes");
    assert_eq!(suggestions[0].tier, MatchTier::Heuristic);
    assert!(suggestions[0].confidence < 0.8);
    assert!(ctx.cached_node("Foo (bar)").is_none());
  }

  #[test]
  fn test_unknown_without_suggestions() {
    let catalog = catalog();
    let settings = ResolverSettings::default();
    let resolver = NodeResolver::new(&catalog, &settings);
    let mut ctx = context(Manifest::default(), &[]);

    let resolution = resolver.resolve(&node("Mystery", json!({})), &mut ctx);
    assert_eq!(
      resolution,
      NodeResolution::Unresolved {
        suggestions: Vec::new()
      }
    );
  }
}
