//! The resolution pipeline.
//!
//! `WorkflowOrchestrator` loads a saved workflow, analyzes it, runs the
//! resolvers, and writes every decision through the manifest store before
//! moving to the next item.

use std::collections::HashMap;

use nodepin_config::{EnvironmentLayout, ResolverSettings};
use nodepin_manifest::{
  Manifest, ManifestError, ManifestStore, ModelCategory, ModelStatus, ModelUsage, NodeMapping,
  NodePackageRecord, OptionalModel, TomlManifestStore, WorkflowModel,
};
use nodepin_models::{ModelIndex, ModelScanner, ScanReport, SqliteModelIndex};
use nodepin_registry::{
  Catalog, CatalogSource, FsCatalogSource, FsPackageRegistry, PackageRegistry,
};
use nodepin_resolver::{
  FuzzySearch, ModelDecision, ModelPrompt, ModelResolution, ModelResolver, ModelStrategy,
  NodeDecision, NodePrompt, NodeResolution, NodeResolver, NodeStrategy, ResolutionContext,
  ResolvedNodePackage, SearchScope, StrategyOutcome,
};
use nodepin_workflow::{WorkflowAnalysis, WorkflowModelReference, analyze_json};
use tracing::{debug, info, warn};

use crate::error::OrchestratorError;
use crate::result::{DryRunReport, ModelOutcome, NodeOutcome, ResolutionResult};

/// Map a failed manifest write to the item it was persisting.
fn persist_failed(item: String) -> impl FnOnce(ManifestError) -> OrchestratorError {
  move |source| OrchestratorError::PersistenceWrite { item, source }
}

/// Drives resolution of workflows in one environment.
pub struct WorkflowOrchestrator<R: PackageRegistry, I: ModelIndex, M: ManifestStore> {
  layout: EnvironmentLayout,
  registry: R,
  index: I,
  manifest: M,
  catalog: Catalog,
  settings: ResolverSettings,
}

impl WorkflowOrchestrator<FsPackageRegistry, SqliteModelIndex, TomlManifestStore> {
  /// Wire the file-backed collaborators for an environment root.
  pub async fn open(layout: EnvironmentLayout) -> Result<Self, OrchestratorError> {
    let settings = ResolverSettings::load(&layout.settings_path())?;
    let catalog = FsCatalogSource::new(layout.catalog_path()).load().await?;
    let index = SqliteModelIndex::open(&layout.index_path()).await?;
    let registry = FsPackageRegistry::new(layout.custom_nodes_dir());
    let manifest = TomlManifestStore::new(layout.manifest_path());

    info!(root = %layout.root().display(), packages = catalog.packages().count(), "environment opened");
    Ok(Self::new(layout, registry, index, manifest, catalog, settings))
  }
}

impl<R: PackageRegistry, I: ModelIndex, M: ManifestStore> WorkflowOrchestrator<R, I, M> {
  pub fn new(
    layout: EnvironmentLayout,
    registry: R,
    index: I,
    manifest: M,
    catalog: Catalog,
    settings: ResolverSettings,
  ) -> Self {
    Self {
      layout,
      registry,
      index,
      manifest,
      catalog,
      settings,
    }
  }

  pub fn layout(&self) -> &EnvironmentLayout {
    &self.layout
  }

  pub fn manifest_store(&self) -> &M {
    &self.manifest
  }

  pub fn index(&self) -> &I {
    &self.index
  }

  /// Auto-resolve a workflow and persist what was resolved. Never prompts.
  pub async fn resolve(&self, name: &str) -> Result<ResolutionResult, OrchestratorError> {
    self.fix_resolution(name, None, None, false).await
  }

  /// Auto-resolve, then hand what is left to the strategies.
  ///
  /// Ambiguous nodes are fixed before unresolved nodes, then ambiguous and
  /// unresolved models. Each decision is persisted before the next prompt,
  /// so a cancelled session keeps everything confirmed so far. With
  /// `dry_run` nothing is written and no strategy is consulted.
  pub async fn fix_resolution(
    &self,
    name: &str,
    node_strategy: Option<&mut dyn NodeStrategy>,
    model_strategy: Option<&mut dyn ModelStrategy>,
    dry_run: bool,
  ) -> Result<ResolutionResult, OrchestratorError> {
    let (analysis, mut ctx) = self.prepare(name).await?;
    let mut result = self.auto_resolve(&analysis, &mut ctx).await;
    info!(
      workflow = %name,
      nodes = analysis.custom_nodes.len(),
      models = result.models_resolved.len()
        + result.models_ambiguous.len()
        + result.models_unresolved.len(),
      "auto-resolution finished"
    );

    if dry_run {
      return Ok(result);
    }

    self.persist_auto(name, &result).await?;
    ctx.set_manifest(self.load_manifest().await?);

    let mut saved = 0;
    if let Some(strategy) = node_strategy {
      self
        .fix_nodes(name, strategy, &mut result, &mut ctx, &mut saved)
        .await?;
    }
    if let Some(strategy) = model_strategy {
      self
        .fix_models(name, strategy, &mut result, &mut ctx, &mut saved)
        .await?;
    }

    if saved > 0 {
      info!(workflow = %name, decisions = saved, "interactive resolution finished");
    }
    Ok(result)
  }

  /// Resolve without writing and count what would need a decision.
  pub async fn dry_run(&self, name: &str) -> Result<DryRunReport, OrchestratorError> {
    let result = self.fix_resolution(name, None, None, true).await?;
    Ok(DryRunReport::from_result(result))
  }

  pub async fn is_commit_safe(&self, name: &str) -> Result<bool, OrchestratorError> {
    Ok(self.dry_run(name).await?.result.is_commit_safe())
  }

  /// Fail with every blocking item unless the workflow is commit-safe or
  /// `allow_issues` is set.
  pub async fn check_commit(
    &self,
    name: &str,
    allow_issues: bool,
  ) -> Result<ResolutionResult, OrchestratorError> {
    let result = self.fix_resolution(name, None, None, true).await?;
    if result.is_commit_safe() {
      return Ok(result);
    }

    let issues = result.issues();
    if allow_issues {
      warn!(workflow = %name, issues = issues.len(), "committing with unresolved dependencies");
      return Ok(result);
    }
    Err(OrchestratorError::CommitBlocked {
      workflow: name.to_string(),
      issues,
    })
  }

  /// Remember where a model can be downloaded. The URL goes into the index
  /// and onto the manifest entry for the hash, when there is one.
  pub async fn add_model_source(&self, hash: &str, url: &str) -> Result<bool, OrchestratorError> {
    let indexed = self.index.find_by_hash(hash).await?.is_some();
    let manifest = self.load_manifest().await?;
    let recorded = manifest.model_by_hash(hash);
    if !indexed && recorded.is_none() {
      return Err(OrchestratorError::UnknownModel {
        hash: hash.to_string(),
      });
    }

    if indexed {
      self.index.add_source(hash, url).await?;
    }

    let Some((entry, category)) = recorded else {
      return Ok(false);
    };
    if entry.sources.iter().any(|s| s == url) {
      return Ok(false);
    }
    let mut entry = entry.clone();
    entry.sources.push(url.to_string());

    let item = format!("source of model {}", hash);
    let changed = match category {
      ModelCategory::Required => self.manifest.add_required_model(&entry).await,
      ModelCategory::Optional => {
        self
          .manifest
          .add_optional_model(hash, &OptionalModel::Indexed(entry))
          .await
      }
    }
    .map_err(persist_failed(item))?;
    if changed {
      info!(hash = %hash, url = %url, "model source recorded");
    }
    Ok(changed)
  }

  /// Fingerprint the models directory and bring the index up to date.
  pub async fn scan_models(&self) -> Result<ScanReport, OrchestratorError> {
    let scanner = ModelScanner::new(
      self.layout.models_dir(),
      self.settings.model_extensions.clone(),
    );
    Ok(scanner.scan(&self.index).await?)
  }

  async fn load_manifest(&self) -> Result<Manifest, OrchestratorError> {
    self
      .manifest
      .load()
      .await
      .map_err(OrchestratorError::ManifestRead)
  }

  async fn prepare(
    &self,
    name: &str,
  ) -> Result<(WorkflowAnalysis, ResolutionContext), OrchestratorError> {
    let path = self.layout.workflow_path(name);
    let text = tokio::fs::read_to_string(&path)
      .await
      .map_err(|source| OrchestratorError::WorkflowRead { path, source })?;

    let analysis =
      analyze_json(&text, &self.settings).map_err(|source| OrchestratorError::Analyze {
        workflow: name.to_string(),
        source,
      })?;

    let manifest = self.load_manifest().await?;
    let installed = self.registry.list().await?;
    Ok((analysis, ResolutionContext::new(name, manifest, installed)))
  }

  async fn auto_resolve(
    &self,
    analysis: &WorkflowAnalysis,
    ctx: &mut ResolutionContext,
  ) -> ResolutionResult {
    let mut result = ResolutionResult::new(ctx.workflow());

    let nodes = NodeResolver::new(&self.catalog, &self.settings);
    for node in &analysis.custom_nodes {
      let node_type = node.node_type.clone();
      match nodes.resolve(node, ctx) {
        NodeResolution::Resolved(packages) => {
          result.nodes_resolved.push(NodeOutcome { node_type, packages })
        }
        NodeResolution::Ambiguous(packages) => {
          result.nodes_ambiguous.push(NodeOutcome { node_type, packages })
        }
        NodeResolution::Unresolved { suggestions } => result.nodes_unresolved.push(NodeOutcome {
          node_type,
          packages: suggestions,
        }),
      }
    }

    let models_dir = self.layout.models_dir();
    let models = ModelResolver::new(&self.index, &models_dir);
    for (reference, usages) in group_references(&analysis.models) {
      let resolution = models.resolve(&reference, ctx).await;
      let outcome = ModelOutcome {
        reference,
        usages,
        resolution,
      };
      let bucket = match outcome.resolution {
        ModelResolution::Resolved { .. } | ModelResolution::OptionalUnresolved => {
          &mut result.models_resolved
        }
        ModelResolution::Ambiguous { .. } => &mut result.models_ambiguous,
        ModelResolution::Unresolved => &mut result.models_unresolved,
      };
      bucket.push(outcome);
    }

    result
  }

  /// Write what auto-resolution found. Writes that would not change the
  /// document are skipped by the store.
  async fn persist_auto(&self, name: &str, result: &ResolutionResult) -> Result<(), OrchestratorError> {
    for node in &result.nodes_resolved {
      for package in &node.packages {
        self.persist_package(package).await?;
      }
    }

    for model in &result.models_resolved {
      self.persist_model(name, model).await?;
    }

    self.persist_workflow_nodes(name, result).await
  }

  async fn persist_package(&self, package: &ResolvedNodePackage) -> Result<(), OrchestratorError> {
    let record = NodePackageRecord {
      version: package.version.clone(),
      source: package.source,
      repository: self
        .catalog
        .package(&package.package_id)
        .and_then(|info| info.repository.clone()),
    };
    let changed = self
      .manifest
      .add_node_package(&package.package_id, &record)
      .await
      .map_err(persist_failed(format!("node package '{}'", package.package_id)))?;
    if changed {
      info!(package_id = %package.package_id, tier = package.tier.as_str(), "node package recorded");
    }
    Ok(())
  }

  async fn persist_workflow_nodes(
    &self,
    name: &str,
    result: &ResolutionResult,
  ) -> Result<(), OrchestratorError> {
    self
      .manifest
      .set_workflow_nodes(name, &result.package_ids())
      .await
      .map_err(persist_failed(format!("node list of workflow '{}'", name)))?;
    Ok(())
  }

  /// Record a resolved model in its global section and in the workflow.
  async fn persist_model(&self, name: &str, model: &ModelOutcome) -> Result<(), OrchestratorError> {
    let filename = model.filename().to_string();
    let item = format!("model '{}'", model.reference.value);

    let (key, status, category) = match &model.resolution {
      ModelResolution::Resolved { entry, category } => {
        match category {
          ModelCategory::Required => {
            self
              .manifest
              .add_required_model(entry)
              .await
              .map_err(persist_failed(item.clone()))?;
          }
          ModelCategory::Optional => {
            let written = self
              .manifest
              .add_optional_model(&entry.hash, &OptionalModel::Indexed(entry.clone()))
              .await
              .map_err(persist_failed(item.clone()))?;
            // a hash required elsewhere stays required; the workflow record
            // below carries this workflow's category
            if !written && self.load_manifest().await?.models.required.contains_key(&entry.hash) {
              info!(
                workflow = %name,
                model = %model.reference.value,
                "model is required by another workflow, kept optional for this one"
              );
            }
          }
        }
        (entry.hash.clone(), ModelStatus::Resolved, *category)
      }
      ModelResolution::OptionalUnresolved => {
        self
          .manifest
          .add_optional_model(&filename, &OptionalModel::unresolved())
          .await
          .map_err(persist_failed(item.clone()))?;
        (filename.clone(), ModelStatus::Unresolved, ModelCategory::Optional)
      }
      ModelResolution::Ambiguous { .. } | ModelResolution::Unresolved => return Ok(()),
    };

    let usage = WorkflowModel {
      filename,
      references: vec![model.reference.value.clone()],
      status,
      category,
      nodes: model.usages.clone(),
    };
    let changed = self
      .manifest
      .record_workflow_model(name, &key, &usage)
      .await
      .map_err(persist_failed(item))?;
    if changed {
      info!(workflow = %name, model = %model.reference.value, key = %key, "model recorded");
    }
    Ok(())
  }

  async fn fix_nodes(
    &self,
    name: &str,
    strategy: &mut dyn NodeStrategy,
    result: &mut ResolutionResult,
    ctx: &mut ResolutionContext,
    saved: &mut usize,
  ) -> Result<(), OrchestratorError> {
    let search = FuzzySearch::new(&self.catalog, &self.settings);

    let ambiguous = std::mem::take(&mut result.nodes_ambiguous);
    let unresolved = std::mem::take(&mut result.nodes_unresolved);
    let pending = ambiguous
      .into_iter()
      .map(|node| (true, node))
      .chain(unresolved.into_iter().map(|node| (false, node)));

    for (is_ambiguous, node) in pending {
      let prompt = NodePrompt {
        workflow: name.to_string(),
        node_type: node.node_type.clone(),
        candidates: node.packages.clone(),
        search: search.search(&node.node_type, ctx, SearchScope::All),
      };
      let outcome = if is_ambiguous {
        strategy.resolve_ambiguous_node(&prompt)
      } else {
        strategy.resolve_unknown_node(&prompt)
      };

      let (mapping, packages) = match outcome {
        StrategyOutcome::Decided(NodeDecision::Install(package)) => {
          (NodeMapping::Package(package.package_id.clone()), vec![package])
        }
        StrategyOutcome::Decided(NodeDecision::Optional) => (NodeMapping::Skip, Vec::new()),
        StrategyOutcome::Skip => {
          debug!(workflow = %name, node_type = %node.node_type, "node skipped");
          if is_ambiguous {
            result.nodes_ambiguous.push(node);
          } else {
            result.nodes_unresolved.push(node);
          }
          continue;
        }
        StrategyOutcome::Cancelled => {
          return Err(OrchestratorError::Cancelled {
            workflow: name.to_string(),
            saved: *saved,
          });
        }
      };

      self
        .manifest
        .set_node_mapping(name, &node.node_type, &mapping)
        .await
        .map_err(persist_failed(format!("mapping for node '{}'", node.node_type)))?;
      for package in &packages {
        self.persist_package(package).await?;
      }
      *saved += 1;
      info!(workflow = %name, node_type = %node.node_type, "node decision saved");

      ctx.cache_node(&node.node_type, packages.clone());
      result.nodes_resolved.push(NodeOutcome {
        node_type: node.node_type,
        packages,
      });
      self.persist_workflow_nodes(name, result).await?;
    }

    ctx.set_manifest(self.load_manifest().await?);
    Ok(())
  }

  async fn fix_models(
    &self,
    name: &str,
    strategy: &mut dyn ModelStrategy,
    result: &mut ResolutionResult,
    ctx: &mut ResolutionContext,
    saved: &mut usize,
  ) -> Result<(), OrchestratorError> {
    let models_dir = self.layout.models_dir();
    let resolver = ModelResolver::new(&self.index, &models_dir);

    let ambiguous = std::mem::take(&mut result.models_ambiguous);
    let unresolved = std::mem::take(&mut result.models_unresolved);
    let pending = ambiguous
      .into_iter()
      .map(|model| (true, model))
      .chain(unresolved.into_iter().map(|model| (false, model)));

    for (is_ambiguous, mut model) in pending {
      let candidates = match &model.resolution {
        ModelResolution::Ambiguous { candidates } => candidates.clone(),
        _ => Vec::new(),
      };
      let prompt = ModelPrompt {
        workflow: name.to_string(),
        reference: model.reference.clone(),
        candidates,
      };
      let outcome = if is_ambiguous {
        strategy.resolve_ambiguous_model(&prompt)
      } else {
        strategy.resolve_missing_model(&prompt)
      };

      let resolution = match outcome {
        StrategyOutcome::Decided(ModelDecision::Select { entry, category }) => {
          Some(ModelResolution::Resolved { entry, category })
        }
        StrategyOutcome::Decided(ModelDecision::OptionalUnresolved) => {
          Some(ModelResolution::OptionalUnresolved)
        }
        StrategyOutcome::Decided(ModelDecision::Path(path)) => {
          let found = resolver.resolve_path(&path).await;
          if found.is_none() {
            warn!(workflow = %name, path = %path, "no model file at the given path");
          }
          found.map(|entry| {
            let category = match ctx.models().optional.get(&entry.hash) {
              Some(OptionalModel::Indexed(_)) => ModelCategory::Optional,
              _ => ModelCategory::Required,
            };
            ModelResolution::Resolved { entry, category }
          })
        }
        StrategyOutcome::Skip => {
          debug!(workflow = %name, model = %model.reference.value, "model skipped");
          None
        }
        StrategyOutcome::Cancelled => {
          return Err(OrchestratorError::Cancelled {
            workflow: name.to_string(),
            saved: *saved,
          });
        }
      };

      let Some(resolution) = resolution else {
        if is_ambiguous {
          result.models_ambiguous.push(model);
        } else {
          result.models_unresolved.push(model);
        }
        continue;
      };

      model.resolution = resolution;
      self.persist_model(name, &model).await?;
      *saved += 1;
      info!(workflow = %name, model = %model.reference.value, "model decision saved");

      ctx.set_manifest(self.load_manifest().await?);
      ctx.cache_model(&model.reference.value, model.resolution.clone());
      result.models_resolved.push(model);
    }

    Ok(())
  }
}

/// Collapse references to the same value, keeping first-appearance order.
fn group_references(
  references: &[WorkflowModelReference],
) -> Vec<(WorkflowModelReference, Vec<ModelUsage>)> {
  let mut groups: Vec<(WorkflowModelReference, Vec<ModelUsage>)> = Vec::new();
  let mut positions: HashMap<&str, usize> = HashMap::new();

  for reference in references {
    let usage = ModelUsage {
      node_id: reference.node_id.clone(),
      widget_index: reference.widget_index,
    };
    match positions.get(reference.value.as_str()) {
      Some(&position) => groups[position].1.push(usage),
      None => {
        positions.insert(reference.value.as_str(), groups.len());
        groups.push((reference.clone(), vec![usage]));
      }
    }
  }
  groups
}

#[cfg(test)]
mod tests {
  use super::*;

  fn reference(node_id: &str, value: &str) -> WorkflowModelReference {
    WorkflowModelReference {
      node_id: node_id.to_string(),
      node_type: "LoraLoader".to_string(),
      widget_index: 0,
      value: value.to_string(),
      directory: Some("loras".to_string()),
    }
  }

  #[test]
  fn test_group_references() {
    let groups = group_references(&[
      reference("1", "a.safetensors"),
      reference("2", "b.safetensors"),
      reference("3", "a.safetensors"),
    ]);

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].0.value, "a.safetensors");
    assert_eq!(
      groups[0].1.iter().map(|u| u.node_id.as_str()).collect::<Vec<_>>(),
      vec!["1", "3"]
    );
    assert_eq!(groups[1].0.node_id, "2");
  }
}
