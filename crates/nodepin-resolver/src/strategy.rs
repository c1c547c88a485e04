use nodepin_manifest::{ModelCategory, ModelEntry};
use nodepin_workflow::WorkflowModelReference;

use crate::fuzzy::ScoredPackage;
use crate::node::ResolvedNodePackage;

/// Result of asking a strategy for a decision.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome<T> {
  Decided(T),
  /// Leave this item as it is and move on.
  Skip,
  /// Abort the whole session. Decisions made so far stay persisted.
  Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeDecision {
  Install(ResolvedNodePackage),
  /// The workflow does not need a package for this node type.
  Optional,
}

/// What a strategy is shown for one node type.
#[derive(Debug, Clone)]
pub struct NodePrompt {
  pub workflow: String,
  pub node_type: String,
  /// Ambiguous candidates, or ranked heuristic suggestions.
  pub candidates: Vec<ResolvedNodePackage>,
  /// Fuzzy search results for browsing.
  pub search: Vec<ScoredPackage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelDecision {
  Select {
    entry: ModelEntry,
    category: ModelCategory,
  },
  /// Track by file name only.
  OptionalUnresolved,
  /// A path to a local file, relative to the models directory.
  Path(String),
}

#[derive(Debug, Clone)]
pub struct ModelPrompt {
  pub workflow: String,
  pub reference: WorkflowModelReference,
  pub candidates: Vec<ModelEntry>,
}

pub trait NodeStrategy {
  fn resolve_unknown_node(&mut self, prompt: &NodePrompt) -> StrategyOutcome<NodeDecision>;

  fn resolve_ambiguous_node(&mut self, prompt: &NodePrompt) -> StrategyOutcome<NodeDecision>;
}

pub trait ModelStrategy {
  fn resolve_missing_model(&mut self, prompt: &ModelPrompt) -> StrategyOutcome<ModelDecision>;

  fn resolve_ambiguous_model(&mut self, prompt: &ModelPrompt) -> StrategyOutcome<ModelDecision>;
}

/// Never prompts. Ambiguous items stay ambiguous and unresolved items stay
/// unresolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutomaticStrategy;

impl NodeStrategy for AutomaticStrategy {
  fn resolve_unknown_node(&mut self, _prompt: &NodePrompt) -> StrategyOutcome<NodeDecision> {
    StrategyOutcome::Skip
  }

  fn resolve_ambiguous_node(&mut self, _prompt: &NodePrompt) -> StrategyOutcome<NodeDecision> {
    StrategyOutcome::Skip
  }
}

impl ModelStrategy for AutomaticStrategy {
  fn resolve_missing_model(&mut self, _prompt: &ModelPrompt) -> StrategyOutcome<ModelDecision> {
    StrategyOutcome::Skip
  }

  fn resolve_ambiguous_model(&mut self, _prompt: &ModelPrompt) -> StrategyOutcome<ModelDecision> {
    StrategyOutcome::Skip
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::MatchTier;

  #[test]
  fn test_automatic_never_decides() {
    let prompt = NodePrompt {
      workflow: "wf".to_string(),
      node_type: "Foo (bar)".to_string(),
      candidates: vec![ResolvedNodePackage::new("bar-nodes", MatchTier::Heuristic, 0.75)],
      search: Vec::new(),
    };

    let mut strategy = AutomaticStrategy;
    assert_eq!(strategy.resolve_unknown_node(&prompt), StrategyOutcome::Skip);
    assert_eq!(strategy.resolve_ambiguous_node(&prompt), StrategyOutcome::Skip);
  }
}
