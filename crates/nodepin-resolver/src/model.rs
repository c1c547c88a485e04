use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use nodepin_manifest::{ModelCategory, ModelEntry, ModelStatus, OptionalModel};
use nodepin_models::{IndexedModel, ModelIndex, fingerprint_file};
use nodepin_workflow::WorkflowModelReference;
use tracing::debug;

use crate::context::ResolutionContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelResolution {
  Resolved {
    entry: ModelEntry,
    category: ModelCategory,
  },
  /// Deliberately tracked by file name only. Counts as resolved.
  OptionalUnresolved,
  /// Several distinct files share the referenced name.
  Ambiguous { candidates: Vec<ModelEntry> },
  Unresolved,
}

impl ModelResolution {
  pub fn is_resolved(&self) -> bool {
    matches!(
      self,
      ModelResolution::Resolved { .. } | ModelResolution::OptionalUnresolved
    )
  }
}

/// Matches model references to indexed files by content hash, falling back
/// to file name.
pub struct ModelResolver<'a, I: ModelIndex + ?Sized> {
  index: &'a I,
  models_dir: &'a Path,
}

impl<'a, I: ModelIndex + ?Sized> ModelResolver<'a, I> {
  pub fn new(index: &'a I, models_dir: &'a Path) -> Self {
    Self { index, models_dir }
  }

  /// Resolve one reference. Outcomes are cached per raw value for the run.
  pub async fn resolve(
    &self,
    reference: &WorkflowModelReference,
    ctx: &mut ResolutionContext,
  ) -> ModelResolution {
    if let Some(cached) = ctx.cached_model(&reference.value) {
      return cached.clone();
    }

    let resolution = self.resolve_uncached(reference, ctx).await;
    ctx.cache_model(&reference.value, resolution.clone());
    resolution
  }

  async fn resolve_uncached(
    &self,
    reference: &WorkflowModelReference,
    ctx: &ResolutionContext,
  ) -> ModelResolution {
    let filename = reference.filename();

    if let Some(resolution) = prior_decision(&reference.value, ctx) {
      debug!(model = %reference.value, "using prior workflow decision");
      return resolution;
    }

    for path in self.local_candidates(reference) {
      let Some(entry) = self.local_entry(&path).await else {
        continue;
      };
      let (entry, category) = classify(entry, ctx);
      return ModelResolution::Resolved { entry, category };
    }

    let mut candidates: Vec<ModelEntry> = match self.index.find_by_filename(filename).await {
      Ok(models) => models.into_iter().map(entry_from_index).collect(),
      Err(e) => {
        debug!(filename = %filename, error = %e, "index lookup failed");
        Vec::new()
      }
    };
    for entry in ctx.manifest().required_by_filename(filename) {
      if !candidates.iter().any(|c| c.hash == entry.hash) {
        candidates.push(entry.clone());
      }
    }

    match candidates.len() {
      0 => ModelResolution::Unresolved,
      1 => {
        let (entry, category) = classify(candidates.remove(0), ctx);
        ModelResolution::Resolved { entry, category }
      }
      _ => ModelResolution::Ambiguous { candidates },
    }
  }

  /// Fingerprint a file the user pointed at. Accepts a path relative to the
  /// models directory or an absolute path inside it.
  pub async fn resolve_path(&self, path: &str) -> Option<ModelEntry> {
    let given = PathBuf::from(path.trim());
    let absolute = if given.is_absolute() {
      given
    } else {
      self.models_dir.join(given)
    };
    self.local_entry(&absolute).await
  }

  /// Paths the reference may point at, hint directory first.
  fn local_candidates(&self, reference: &WorkflowModelReference) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(directory) = &reference.directory {
      paths.push(self.models_dir.join(directory).join(&reference.value));
    }
    let direct = self.models_dir.join(&reference.value);
    if !paths.contains(&direct) {
      paths.push(direct);
    }
    paths
  }

  /// Build an entry for a file on disk. Uses the index when its record for
  /// the path is current, otherwise hashes the file.
  async fn local_entry(&self, path: &Path) -> Option<ModelEntry> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
      return None;
    }

    let relative_path = match path.strip_prefix(self.models_dir) {
      Ok(relative) => relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"),
      Err(_) => path.to_string_lossy().into_owned(),
    };
    let filename = path.file_name()?.to_string_lossy().into_owned();
    let mtime = metadata
      .modified()
      .ok()
      .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
      .map(|d| d.as_secs() as i64)
      .unwrap_or_default();

    let indexed = match self.index.find_by_path(&relative_path).await {
      Ok(found) => found,
      Err(e) => {
        debug!(path = %relative_path, error = %e, "index lookup failed");
        None
      }
    };
    if let Some(model) = indexed {
      if model.file_size == metadata.len() && model.mtime == mtime {
        return Some(entry_from_index(model));
      }
    }

    let hash = match fingerprint_file(path.to_path_buf()).await {
      Ok(hash) => hash,
      Err(e) => {
        debug!(path = %path.display(), error = %e, "failed to fingerprint model");
        return None;
      }
    };

    let sources = match self.index.find_by_hash(&hash).await {
      Ok(Some(model)) => model.sources,
      Ok(None) => Vec::new(),
      Err(e) => {
        debug!(hash = %hash, error = %e, "index lookup failed");
        Vec::new()
      }
    };

    Some(ModelEntry {
      hash,
      filename,
      size: metadata.len(),
      relative_path,
      sources,
    })
  }
}

/// The workflow's own category wins over the global section, which may hold
/// the same file as required for another workflow.
fn prior_decision(reference: &str, ctx: &ResolutionContext) -> Option<ModelResolution> {
  let (key, model) = ctx.workflow_model(reference)?;
  match (model.status, model.category) {
    (ModelStatus::Unresolved, ModelCategory::Optional) => Some(ModelResolution::OptionalUnresolved),
    (ModelStatus::Resolved, category) => {
      ctx
        .manifest()
        .model_by_hash(key)
        .map(|(entry, _)| ModelResolution::Resolved {
          entry: entry.clone(),
          category,
        })
    }
    _ => None,
  }
}

/// Persisted metadata wins over what was found locally; the section a hash
/// already lives in decides its category.
fn classify(found: ModelEntry, ctx: &ResolutionContext) -> (ModelEntry, ModelCategory) {
  let models = ctx.models();
  if let Some(entry) = models.required.get(&found.hash) {
    return (entry.clone(), ModelCategory::Required);
  }
  if let Some(OptionalModel::Indexed(entry)) = models.optional.get(&found.hash) {
    return (entry.clone(), ModelCategory::Optional);
  }
  (found, ModelCategory::Required)
}

fn entry_from_index(model: IndexedModel) -> ModelEntry {
  ModelEntry {
    hash: model.hash,
    filename: model.filename,
    size: model.file_size,
    relative_path: model.relative_path,
    sources: model.sources,
  }
}
