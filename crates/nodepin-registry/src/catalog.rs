use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Separator between a node type and its input signature in mapping keys.
const SIGNATURE_SEPARATOR: &str = "::";

/// Minimum length for either side of a substring match.
const MIN_SUBSTRING_LEN: usize = 3;

/// Metadata describing a package in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
  /// Human readable name, e.g. "ComfyUI Impact Pack"
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  /// Source repository URL
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub repository: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub latest_version: Option<String>,
}

/// Catalog file format.
///
/// ```json
/// {
///   "version": "2025.06.01",
///   "packages": {
///     "comfyui-impact-pack": { "display_name": "ComfyUI Impact Pack", "repository": "https://github.com/ltdrdata/ComfyUI-Impact-Pack" }
///   },
///   "mappings": {
///     "FaceDetailer::4be3a1f0": ["comfyui-impact-pack"],
///     "FaceDetailer": ["comfyui-impact-pack"]
///   }
/// }
/// ```
///
/// Mapping keys are a node type, optionally followed by `::` and the node's
/// input signature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default)]
  pub packages: BTreeMap<String, PackageInfo>,
  #[serde(default)]
  pub mappings: BTreeMap<String, Vec<String>>,
}

/// Read-only package catalog snapshot.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
  document: CatalogDocument,
  /// Node type -> mapping keys for that type.
  keys_by_type: HashMap<String, Vec<String>>,
}

impl From<CatalogDocument> for Catalog {
  fn from(document: CatalogDocument) -> Self {
    let mut keys_by_type: HashMap<String, Vec<String>> = HashMap::new();
    for key in document.mappings.keys() {
      keys_by_type
        .entry(base_type(key).to_string())
        .or_default()
        .push(key.clone());
    }

    Self {
      document,
      keys_by_type,
    }
  }
}

impl Catalog {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
    let document: CatalogDocument = serde_json::from_str(text)?;
    Ok(document.into())
  }

  pub fn version(&self) -> Option<&str> {
    self.document.version.as_deref()
  }

  pub fn package(&self, id: &str) -> Option<&PackageInfo> {
    self.document.packages.get(id)
  }

  pub fn contains(&self, id: &str) -> bool {
    self.document.packages.contains_key(id)
  }

  /// All packages, ordered by id.
  pub fn packages(&self) -> impl Iterator<Item = (&str, &PackageInfo)> {
    self
      .document
      .packages
      .iter()
      .map(|(id, info)| (id.as_str(), info))
  }

  /// Find a package whose repository is the given git `owner/repo`.
  pub fn find_by_repository(&self, owner_repo: &str) -> Option<&str> {
    let wanted = owner_repo.trim_matches('/').to_lowercase();
    self.packages().find_map(|(id, info)| {
      let repository = info.repository.as_deref()?.to_lowercase();
      let repository = repository.trim_end_matches('/').trim_end_matches(".git");
      repository
        .ends_with(&format!("/{}", wanted))
        .then_some(id)
    })
  }

  /// Packages mapped to exactly this node type and input signature.
  pub fn lookup_signature(&self, node_type: &str, signature: &str) -> Vec<String> {
    let key = format!("{}{}{}", node_type, SIGNATURE_SEPARATOR, signature);
    self.collect_packages([key.as_str()])
  }

  /// Packages mapped to this node type under any signature.
  pub fn lookup_type(&self, node_type: &str) -> Vec<String> {
    match self.keys_by_type.get(node_type) {
      Some(keys) => self.collect_packages(keys.iter().map(String::as_str)),
      None => Vec::new(),
    }
  }

  /// Packages whose mapped node type contains, or is contained in, the given
  /// type (case-insensitive). Exact type matches are left to [`lookup_type`].
  ///
  /// [`lookup_type`]: Catalog::lookup_type
  pub fn lookup_substring(&self, node_type: &str) -> Vec<String> {
    let needle = node_type.to_lowercase();
    if needle.len() < MIN_SUBSTRING_LEN {
      return Vec::new();
    }

    let mut types: Vec<&String> = self
      .keys_by_type
      .keys()
      .filter(|candidate| {
        let candidate_lower = candidate.to_lowercase();
        candidate.as_str() != node_type
          && candidate_lower.len() >= MIN_SUBSTRING_LEN
          && (candidate_lower.contains(&needle) || needle.contains(&candidate_lower))
      })
      .collect();
    types.sort();

    let keys = types
      .into_iter()
      .flat_map(|t| self.keys_by_type[t].iter().map(String::as_str));
    self.collect_packages(keys)
  }

  /// Package ids for the given mapping keys, deduplicated in first-seen order.
  fn collect_packages<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut packages: Vec<String> = Vec::new();
    for key in keys {
      if let Some(ids) = self.document.mappings.get(key) {
        for id in ids {
          if !packages.contains(id) {
            packages.push(id.clone());
          }
        }
      }
    }
    packages
  }
}

fn base_type(key: &str) -> &str {
  key
    .split_once(SIGNATURE_SEPARATOR)
    .map(|(base, _)| base)
    .unwrap_or(key)
}
