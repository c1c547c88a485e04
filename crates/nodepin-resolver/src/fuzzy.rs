use std::collections::BTreeMap;

use nodepin_config::ResolverSettings;
use nodepin_registry::Catalog;
use strsim::jaro_winkler;

use crate::context::ResolutionContext;
use crate::heuristic::{self, camel_tokens, normalize};

const SIMILARITY_WEIGHT: f64 = 0.5;
const KEYWORD_WEIGHT: f64 = 0.25;
const HINT_WEIGHT: f64 = 0.15;
const INSTALLED_WEIGHT: f64 = 0.10;

/// Which packages a search considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
  /// Every catalog package plus anything installed.
  All,
  InstalledOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPackage {
  pub package_id: String,
  pub display_name: Option<String>,
  pub installed: bool,
  pub score: f64,
}

/// Ranks packages against a node type for interactive selection.
/// Results are suggestions only.
pub struct FuzzySearch<'a> {
  catalog: &'a Catalog,
  settings: &'a ResolverSettings,
}

impl<'a> FuzzySearch<'a> {
  pub fn new(catalog: &'a Catalog, settings: &'a ResolverSettings) -> Self {
    Self { catalog, settings }
  }

  pub fn search(&self, node_type: &str, ctx: &ResolutionContext, scope: SearchScope) -> Vec<ScoredPackage> {
    let base = node_type.split('(').next().unwrap_or(node_type);
    let query = normalize(base);
    if query.is_empty() {
      return Vec::new();
    }
    let keywords: Vec<String> = camel_tokens(node_type)
      .into_iter()
      .map(|token| token.to_lowercase())
      .filter(|token| token.len() >= 3)
      .collect();

    let mut candidates: BTreeMap<&str, Option<&str>> = BTreeMap::new();
    if scope == SearchScope::All {
      for (id, info) in self.catalog.packages() {
        candidates.insert(id, info.display_name.as_deref());
      }
    }
    for id in ctx.installed_ids() {
      let display = self.catalog.package(id).and_then(|info| info.display_name.as_deref());
      candidates.insert(id, display);
    }

    let mut results: Vec<ScoredPackage> = candidates
      .into_iter()
      .map(|(id, display_name)| {
        let installed = ctx.is_installed(id);
        let score = self.score(node_type, &query, &keywords, id, display_name, installed);
        ScoredPackage {
          package_id: id.to_string(),
          display_name: display_name.map(str::to_string),
          installed,
          score,
        }
      })
      .filter(|scored| scored.score >= self.settings.fuzzy_min_score)
      .collect();

    results.sort_by(|a, b| {
      b.score
        .total_cmp(&a.score)
        .then_with(|| a.package_id.cmp(&b.package_id))
    });
    results.truncate(self.settings.fuzzy_limit);
    results
  }

  fn score(
    &self,
    node_type: &str,
    query: &str,
    keywords: &[String],
    package_id: &str,
    display_name: Option<&str>,
    installed: bool,
  ) -> f64 {
    let id = normalize(package_id);
    let display = display_name.map(normalize).unwrap_or_default();

    let similarity = jaro_winkler(query, &id).max(if display.is_empty() {
      0.0
    } else {
      jaro_winkler(query, &display)
    });

    let keyword_overlap = if keywords.is_empty() {
      0.0
    } else {
      let hits = keywords
        .iter()
        .filter(|k| id.contains(k.as_str()) || display.contains(k.as_str()))
        .count();
      hits as f64 / keywords.len() as f64
    };

    let hint = heuristic::match_confidence(node_type, package_id, self.settings.heuristic_min_fragment)
      .is_some();

    SIMILARITY_WEIGHT * similarity
      + KEYWORD_WEIGHT * keyword_overlap
      + HINT_WEIGHT * f64::from(u8::from(hint))
      + INSTALLED_WEIGHT * f64::from(u8::from(installed))
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
          "comfyui-impact-pack": { "display_name": "Impact Pack" },
          "comfyui-easy-use": { "display_name": "Easy Use" },
          "rgthree-comfy": {},
          "zzz-unrelated": {}
        }
      })
      .to_string(),
    )
    .unwrap()
  }

  fn context(installed: &[&str]) -> ResolutionContext {
    ResolutionContext::new(
      "wf",
      Manifest::default(),
      installed.iter().map(|id| InstalledPackage {
        id: id.to_string(),
        version: None,
        path: PathBuf::from(id),
      }),
    )
  }

  #[test]
  fn test_best_match_first() {
    let catalog = catalog();
    let settings = ResolverSettings::default();
    let search = FuzzySearch::new(&catalog, &settings);

    let results = search.search("ImpactWildcardEncode", &context(&[]), SearchScope::All);
    assert_eq!(results[0].package_id, "comfyui-impact-pack");
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(results.iter().all(|r| r.score >= settings.fuzzy_min_score));
  }

  #[test]
  fn test_installed_only_scope() {
    let catalog = catalog();
    let settings = ResolverSettings::default();
    let search = FuzzySearch::new(&catalog, &settings);

    let results = search.search(
      "Seed (rgthree)",
      &context(&["rgthree-comfy", "local-only"]),
      SearchScope::InstalledOnly,
    );
    assert!(results.iter().all(|r| r.installed));
    assert_eq!(results[0].package_id, "rgthree-comfy");
  }

  #[test]
  fn test_limit_is_applied() {
    let catalog = catalog();
    let settings = ResolverSettings {
      fuzzy_min_score: 0.0,
      fuzzy_limit: 2,
      ..ResolverSettings::default()
    };
    let search = FuzzySearch::new(&catalog, &settings);

    let results = search.search("Anything", &context(&[]), SearchScope::All);
    assert_eq!(results.len(), 2);
  }
}
