use std::fmt;

use nodepin_manifest::ModelUsage;
use nodepin_resolver::{ModelResolution, ResolvedNodePackage};
use nodepin_workflow::WorkflowModelReference;

/// One custom node type and the packages attached to it.
///
/// Holds the matched packages when resolved, the candidates when ambiguous,
/// and ranked suggestions when unresolved.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutcome {
  pub node_type: String,
  pub packages: Vec<ResolvedNodePackage>,
}

/// One referenced model value and every widget that uses it.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutcome {
  /// First reference to the value, in graph order.
  pub reference: WorkflowModelReference,
  pub usages: Vec<ModelUsage>,
  pub resolution: ModelResolution,
}

impl ModelOutcome {
  pub fn filename(&self) -> &str {
    self.reference.filename()
  }
}

/// Outcome of resolving one workflow. Every list keeps first-appearance order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionResult {
  pub workflow: String,
  pub nodes_resolved: Vec<NodeOutcome>,
  pub nodes_ambiguous: Vec<NodeOutcome>,
  pub nodes_unresolved: Vec<NodeOutcome>,
  pub models_resolved: Vec<ModelOutcome>,
  pub models_ambiguous: Vec<ModelOutcome>,
  pub models_unresolved: Vec<ModelOutcome>,
}

impl ResolutionResult {
  pub fn new(workflow: impl Into<String>) -> Self {
    Self {
      workflow: workflow.into(),
      ..Default::default()
    }
  }

  /// No unresolved or ambiguous reference remains.
  pub fn is_commit_safe(&self) -> bool {
    self.nodes_ambiguous.is_empty()
      && self.nodes_unresolved.is_empty()
      && self.models_ambiguous.is_empty()
      && self.models_unresolved.is_empty()
  }

  pub fn issues(&self) -> Vec<CommitIssue> {
    let mut issues = Vec::new();
    for node in &self.nodes_ambiguous {
      issues.push(CommitIssue::AmbiguousNode {
        node_type: node.node_type.clone(),
        candidates: node.packages.iter().map(|p| p.package_id.clone()).collect(),
      });
    }
    for node in &self.nodes_unresolved {
      issues.push(CommitIssue::UnresolvedNode {
        node_type: node.node_type.clone(),
      });
    }
    for model in &self.models_ambiguous {
      let candidates = match &model.resolution {
        ModelResolution::Ambiguous { candidates } => candidates.len(),
        _ => 0,
      };
      issues.push(CommitIssue::AmbiguousModel {
        value: model.reference.value.clone(),
        node_id: model.reference.node_id.clone(),
        candidates,
      });
    }
    for model in &self.models_unresolved {
      issues.push(CommitIssue::UnresolvedModel {
        value: model.reference.value.clone(),
        node_id: model.reference.node_id.clone(),
      });
    }
    issues
  }

  /// Package ids the resolved node types need, sorted and deduplicated.
  pub fn package_ids(&self) -> Vec<String> {
    let mut ids: Vec<String> = self
      .nodes_resolved
      .iter()
      .flat_map(|node| node.packages.iter().map(|p| p.package_id.clone()))
      .collect();
    ids.sort();
    ids.dedup();
    ids
  }

  /// One line per category, for terminal output.
  pub fn summary(&self) -> Vec<String> {
    vec![
      format!(
        "nodes: {} resolved, {} ambiguous, {} unresolved",
        self.nodes_resolved.len(),
        self.nodes_ambiguous.len(),
        self.nodes_unresolved.len()
      ),
      format!(
        "models: {} resolved, {} ambiguous, {} unresolved",
        self.models_resolved.len(),
        self.models_ambiguous.len(),
        self.models_unresolved.len()
      ),
    ]
  }
}

/// A reference that keeps a workflow from being commit-safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitIssue {
  AmbiguousNode {
    node_type: String,
    candidates: Vec<String>,
  },
  UnresolvedNode {
    node_type: String,
  },
  AmbiguousModel {
    value: String,
    node_id: String,
    candidates: usize,
  },
  UnresolvedModel {
    value: String,
    node_id: String,
  },
}

impl fmt::Display for CommitIssue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CommitIssue::AmbiguousNode {
        node_type,
        candidates,
      } => write!(
        f,
        "node '{}' matches several packages: {}",
        node_type,
        candidates.join(", ")
      ),
      CommitIssue::UnresolvedNode { node_type } => {
        write!(f, "node '{}' has no known package", node_type)
      }
      CommitIssue::AmbiguousModel {
        value,
        node_id,
        candidates,
      } => write!(
        f,
        "model '{}' (node {}) matches {} files",
        value, node_id, candidates
      ),
      CommitIssue::UnresolvedModel { value, node_id } => {
        write!(f, "model '{}' (node {}) was not found", value, node_id)
      }
    }
  }
}

/// What a resolve would do, computed without writing anything.
#[derive(Debug, Clone, PartialEq)]
pub struct DryRunReport {
  pub auto_nodes: usize,
  pub auto_models: usize,
  pub interactive_nodes: usize,
  pub interactive_models: usize,
  pub result: ResolutionResult,
}

impl DryRunReport {
  pub fn from_result(result: ResolutionResult) -> Self {
    Self {
      auto_nodes: result.nodes_resolved.len(),
      auto_models: result.models_resolved.len(),
      interactive_nodes: result.nodes_ambiguous.len() + result.nodes_unresolved.len(),
      interactive_models: result.models_ambiguous.len() + result.models_unresolved.len(),
      result,
    }
  }

  pub fn needs_interaction(&self) -> bool {
    self.interactive_nodes + self.interactive_models > 0
  }
}

#[cfg(test)]
mod tests {
  use nodepin_resolver::MatchTier;

  use super::*;

  fn reference(value: &str) -> WorkflowModelReference {
    WorkflowModelReference {
      node_id: "3".to_string(),
      node_type: "LoraLoader".to_string(),
      widget_index: 0,
      value: value.to_string(),
      directory: Some("loras".to_string()),
    }
  }

  #[test]
  fn test_issues_enumerate_each_blocker() {
    let mut result = ResolutionResult::new("wf");
    result.nodes_ambiguous.push(NodeOutcome {
      node_type: "GetNode".to_string(),
      packages: vec![
        ResolvedNodePackage::new("a", MatchTier::Catalog, 0.9),
        ResolvedNodePackage::new("b", MatchTier::Catalog, 0.9),
      ],
    });
    result.models_unresolved.push(ModelOutcome {
      reference: reference("x.safetensors"),
      usages: Vec::new(),
      resolution: ModelResolution::Unresolved,
    });

    assert!(!result.is_commit_safe());
    let issues: Vec<String> = result.issues().iter().map(ToString::to_string).collect();
    assert_eq!(
      issues,
      vec![
        "node 'GetNode' matches several packages: a, b".to_string(),
        "model 'x.safetensors' (node 3) was not found".to_string(),
      ]
    );
  }

  #[test]
  fn test_optional_unresolved_is_safe() {
    let mut result = ResolutionResult::new("wf");
    result.models_resolved.push(ModelOutcome {
      reference: reference("x.safetensors"),
      usages: Vec::new(),
      resolution: ModelResolution::OptionalUnresolved,
    });
    assert!(result.is_commit_safe());

    let report = DryRunReport::from_result(result);
    assert_eq!(report.auto_models, 1);
    assert!(!report.needs_interaction());
  }
}
