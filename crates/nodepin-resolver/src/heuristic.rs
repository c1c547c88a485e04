//! Name-based guesses linking a node type to an installed package.
//!
//! These never decide on their own; callers surface them as suggestions.

const HINT_CONFIDENCE: f64 = 0.75;
const FRAGMENT_CONFIDENCE: f64 = 0.6;
const CAMEL_CONFIDENCE: f64 = 0.5;

const ID_PREFIXES: &[&str] = &["comfyui-", "comfyui_", "comfy-", "comfy_"];
const ID_SUFFIXES: &[&str] = &["-nodes", "_nodes", "-node", "-pack", "_pack", "-suite"];

/// Lowercase with everything but ASCII letters and digits removed.
pub(crate) fn normalize(value: &str) -> String {
  value
    .chars()
    .filter(char::is_ascii_alphanumeric)
    .map(|c| c.to_ascii_lowercase())
    .collect()
}

/// Text inside the last parenthesis pair, e.g. "bar" for "Foo (bar)".
pub(crate) fn parenthetical_hint(node_type: &str) -> Option<&str> {
  let open = node_type.rfind('(')?;
  let close = node_type[open..].find(')')? + open;
  let hint = node_type[open + 1..close].trim();
  (!hint.is_empty()).then_some(hint)
}

/// The distinctive part of a package id with common decoration removed.
fn package_core(package_id: &str) -> String {
  let mut core = package_id.to_lowercase();
  for prefix in ID_PREFIXES {
    if let Some(rest) = core.strip_prefix(prefix) {
      core = rest.to_string();
      break;
    }
  }
  for suffix in ID_SUFFIXES {
    if let Some(rest) = core.strip_suffix(suffix) {
      core = rest.to_string();
      break;
    }
  }
  normalize(&core)
}

/// Split "KSamplerAdvancedEfficient" into ["K", "Sampler", "Advanced", "Efficient"].
pub(crate) fn camel_tokens(value: &str) -> Vec<String> {
  let mut tokens = Vec::new();
  let mut current = String::new();
  let mut prev_lower = false;

  for c in value.chars() {
    if !c.is_ascii_alphanumeric() {
      if !current.is_empty() {
        tokens.push(std::mem::take(&mut current));
      }
      prev_lower = false;
      continue;
    }
    if c.is_ascii_uppercase() && prev_lower && !current.is_empty() {
      tokens.push(std::mem::take(&mut current));
    }
    prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
    current.push(c);
  }
  if !current.is_empty() {
    tokens.push(current);
  }
  tokens
}

/// Confidence of the strongest pattern linking `node_type` to `package_id`,
/// or `None` when no pattern fires.
pub(crate) fn match_confidence(node_type: &str, package_id: &str, min_fragment: usize) -> Option<f64> {
  let package = normalize(package_id);
  if package.is_empty() {
    return None;
  }

  if let Some(hint) = parenthetical_hint(node_type).map(normalize) {
    if hint.len() >= 2 && (package.contains(&hint) || hint.contains(&package)) {
      return Some(HINT_CONFIDENCE);
    }
  }

  let core = package_core(package_id);
  if core.len() >= min_fragment && normalize(node_type).contains(&core) {
    return Some(FRAGMENT_CONFIDENCE);
  }

  let base = node_type.split('(').next().unwrap_or(node_type);
  let tokens = camel_tokens(base);
  if tokens.len() >= 2 {
    let joined = format!("{}{}", tokens[0], tokens[1]).to_lowercase();
    if joined.len() >= min_fragment && package.contains(&joined) {
      return Some(CAMEL_CONFIDENCE);
    }
  }

  None
}

/// Ranked heuristic matches among the given packages, strongest first and
/// ties broken by id.
pub(crate) fn rank<'a>(
  node_type: &str,
  packages: impl IntoIterator<Item = &'a str>,
  min_fragment: usize,
) -> Vec<(String, f64)> {
  let mut matches: Vec<(String, f64)> = packages
    .into_iter()
    .filter_map(|id| {
      match_confidence(node_type, id, min_fragment).map(|confidence| (id.to_string(), confidence))
    })
    .collect();
  matches.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
  matches
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parenthetical_hint() {
    assert_eq!(parenthetical_hint("Foo (bar)"), Some("bar"));
    assert_eq!(parenthetical_hint("Foo (a) (rgthree)"), Some("rgthree"));
    assert_eq!(parenthetical_hint("Foo ()"), None);
    assert_eq!(parenthetical_hint("Foo"), None);
  }

  #[test]
  fn test_hint_pattern() {
    assert_eq!(match_confidence("Foo (bar)", "bar-nodes", 4), Some(0.75));
    assert_eq!(match_confidence("Seed (rgthree)", "rgthree-comfy", 4), Some(0.75));
  }

  #[test]
  fn test_fragment_pattern() {
    assert_eq!(match_confidence("ImpactWildcardEncode", "comfyui-impact-pack", 4), Some(0.6));
    assert_eq!(match_confidence("WAS Image Blend", "was-node-suite-comfyui", 3), None);
    assert_eq!(
      match_confidence("IPAdapterAdvanced", "comfyui_ipadapter_plus", 4),
      None
    );
    assert_eq!(match_confidence("KJImageResize", "comfyui-kj-nodes", 2), Some(0.6));
    assert_eq!(match_confidence("EasyLoader", "comfyui-easy-nodes", 4), Some(0.6));
  }

  #[test]
  fn test_camel_pattern() {
    assert_eq!(
      camel_tokens("ImpactWildcardEncode"),
      vec!["Impact", "Wildcard", "Encode"]
    );
    assert_eq!(
      match_confidence("ImpactWildcardEncode", "impactwildcard-tools", 4),
      Some(0.5)
    );
  }

  #[test]
  fn test_short_fragments_ignored() {
    assert_eq!(match_confidence("KJImageResize", "comfyui-kj-nodes", 4), None);
  }

  #[test]
  fn test_rank_orders_by_confidence() {
    let ranked = rank(
      "EasyLoader (bar)",
      ["comfyui-easy-nodes", "bar-nodes", "unrelated"],
      4,
    );
    assert_eq!(
      ranked,
      vec![
        ("bar-nodes".to_string(), 0.75),
        ("comfyui-easy-nodes".to_string(), 0.6)
      ]
    );
  }
}
