use nodepin_manifest::{ModelCategory, ModelEntry, PackageSource};

use crate::node::{MatchTier, ResolvedNodePackage};
use crate::strategy::{
  ModelDecision, ModelPrompt, ModelStrategy, NodeDecision, NodePrompt, NodeStrategy,
  StrategyOutcome,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResponse<T> {
  Answer(T),
  Cancelled,
}

/// Terminal seam used by [`InteractiveStrategy`].
pub trait Prompter {
  /// Pick one of `items` by index.
  fn select(&mut self, prompt: &str, items: &[String]) -> PromptResponse<usize>;

  /// Free text. An empty answer means "nothing entered".
  fn input(&mut self, prompt: &str) -> PromptResponse<String>;
}

const MANUAL_NODE: &str = "Enter package id manually";
const OPTIONAL_NODE: &str = "Mark optional (no package needed)";
const MANUAL_MODEL: &str = "Enter path manually";
const OPTIONAL_MODEL: &str = "Mark optional (track by file name only)";
const SKIP: &str = "Skip for now";

enum Choice<T> {
  Candidate(T),
  Manual,
  Optional,
  Skip,
}

/// Asks the user through a [`Prompter`], presenting ranked candidates first.
pub struct InteractiveStrategy<P: Prompter> {
  prompter: P,
}

impl<P: Prompter> InteractiveStrategy<P> {
  pub fn new(prompter: P) -> Self {
    Self { prompter }
  }

  pub fn into_inner(self) -> P {
    self.prompter
  }

  /// Show `candidates` followed by the fixed actions.
  fn choose<T: Clone>(
    &mut self,
    prompt: &str,
    candidates: &[(String, T)],
    manual: &str,
    optional: &str,
  ) -> PromptResponse<Choice<T>> {
    let mut items: Vec<String> = candidates.iter().map(|(label, _)| label.clone()).collect();
    items.push(manual.to_string());
    items.push(optional.to_string());
    items.push(SKIP.to_string());

    let index = match self.prompter.select(prompt, &items) {
      PromptResponse::Answer(index) => index,
      PromptResponse::Cancelled => return PromptResponse::Cancelled,
    };

    let choice = match index.checked_sub(candidates.len()) {
      None => Choice::Candidate(candidates[index].1.clone()),
      Some(0) => Choice::Manual,
      Some(1) => Choice::Optional,
      Some(_) => Choice::Skip,
    };
    PromptResponse::Answer(choice)
  }

  fn decide_node(&mut self, prompt: &NodePrompt, question: &str) -> StrategyOutcome<NodeDecision> {
    let mut candidates: Vec<(String, ResolvedNodePackage)> = prompt
      .candidates
      .iter()
      .map(|c| {
        let label = format!(
          "{} ({}, {:.0}%)",
          c.package_id,
          c.tier.as_str(),
          c.confidence * 100.0
        );
        (label, c.clone())
      })
      .collect();
    for scored in &prompt.search {
      if candidates.iter().any(|(_, c)| c.package_id == scored.package_id) {
        continue;
      }
      let installed = if scored.installed { ", installed" } else { "" };
      let label = format!("{} (search {:.2}{})", scored.package_id, scored.score, installed);
      let mut package = ResolvedNodePackage::new(scored.package_id.clone(), MatchTier::UserConfirmed, 1.0);
      package.confidence = scored.score;
      candidates.push((label, package));
    }

    let choice = match self.choose(question, &candidates, MANUAL_NODE, OPTIONAL_NODE) {
      PromptResponse::Answer(choice) => choice,
      PromptResponse::Cancelled => return StrategyOutcome::Cancelled,
    };

    match choice {
      Choice::Candidate(mut package) => {
        package.tier = MatchTier::UserConfirmed;
        package.confidence = 1.0;
        StrategyOutcome::Decided(NodeDecision::Install(package))
      }
      Choice::Manual => match self.prompter.input("Package id") {
        PromptResponse::Cancelled => StrategyOutcome::Cancelled,
        PromptResponse::Answer(id) if id.trim().is_empty() => StrategyOutcome::Skip,
        PromptResponse::Answer(id) => {
          let mut package = ResolvedNodePackage::new(id.trim(), MatchTier::UserConfirmed, 1.0);
          package.source = PackageSource::Manual;
          StrategyOutcome::Decided(NodeDecision::Install(package))
        }
      },
      Choice::Optional => StrategyOutcome::Decided(NodeDecision::Optional),
      Choice::Skip => StrategyOutcome::Skip,
    }
  }

  fn decide_model(&mut self, prompt: &ModelPrompt, question: &str) -> StrategyOutcome<ModelDecision> {
    let candidates: Vec<(String, ModelEntry)> = prompt
      .candidates
      .iter()
      .map(|entry| {
        let short = entry.hash.get(..8).unwrap_or(&entry.hash);
        (format!("{} [{}] {}", entry.filename, short, entry.relative_path), entry.clone())
      })
      .collect();

    let choice = match self.choose(question, &candidates, MANUAL_MODEL, OPTIONAL_MODEL) {
      PromptResponse::Answer(choice) => choice,
      PromptResponse::Cancelled => return StrategyOutcome::Cancelled,
    };

    match choice {
      Choice::Candidate(entry) => {
        let importance = [
          "Required".to_string(),
          "Nice-to-have (optional)".to_string(),
        ];
        match self.prompter.select("How important is this model?", &importance) {
          PromptResponse::Cancelled => StrategyOutcome::Cancelled,
          PromptResponse::Answer(index) => {
            let category = if index == 0 {
              ModelCategory::Required
            } else {
              ModelCategory::Optional
            };
            StrategyOutcome::Decided(ModelDecision::Select { entry, category })
          }
        }
      }
      Choice::Manual => match self.prompter.input("Path relative to the models directory") {
        PromptResponse::Cancelled => StrategyOutcome::Cancelled,
        PromptResponse::Answer(path) if path.trim().is_empty() => StrategyOutcome::Skip,
        PromptResponse::Answer(path) => {
          StrategyOutcome::Decided(ModelDecision::Path(path.trim().to_string()))
        }
      },
      Choice::Optional => StrategyOutcome::Decided(ModelDecision::OptionalUnresolved),
      Choice::Skip => StrategyOutcome::Skip,
    }
  }
}

impl<P: Prompter> NodeStrategy for InteractiveStrategy<P> {
  fn resolve_unknown_node(&mut self, prompt: &NodePrompt) -> StrategyOutcome<NodeDecision> {
    let question = format!("Node type '{}' was not found. Which package provides it?", prompt.node_type);
    self.decide_node(prompt, &question)
  }

  fn resolve_ambiguous_node(&mut self, prompt: &NodePrompt) -> StrategyOutcome<NodeDecision> {
    let question = format!("Several packages provide '{}'. Which one?", prompt.node_type);
    self.decide_node(prompt, &question)
  }
}

impl<P: Prompter> ModelStrategy for InteractiveStrategy<P> {
  fn resolve_missing_model(&mut self, prompt: &ModelPrompt) -> StrategyOutcome<ModelDecision> {
    let question = format!(
      "Model '{}' (node {}) was not found locally.",
      prompt.reference.value, prompt.reference.node_id
    );
    self.decide_model(prompt, &question)
  }

  fn resolve_ambiguous_model(&mut self, prompt: &ModelPrompt) -> StrategyOutcome<ModelDecision> {
    let question = format!(
      "Several files match '{}' (node {}). Which one?",
      prompt.reference.value, prompt.reference.node_id
    );
    self.decide_model(prompt, &question)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::VecDeque;

  use nodepin_workflow::WorkflowModelReference;

  use super::*;
  use crate::fuzzy::ScoredPackage;

  /// Replays canned answers and records what was shown.
  #[derive(Default)]
  struct ScriptedPrompter {
    selections: VecDeque<PromptResponse<usize>>,
    inputs: VecDeque<PromptResponse<String>>,
    shown: Vec<Vec<String>>,
  }

  impl Prompter for ScriptedPrompter {
    fn select(&mut self, _prompt: &str, items: &[String]) -> PromptResponse<usize> {
      self.shown.push(items.to_vec());
      self.selections.pop_front().unwrap_or(PromptResponse::Cancelled)
    }

    fn input(&mut self, _prompt: &str) -> PromptResponse<String> {
      self.inputs.pop_front().unwrap_or(PromptResponse::Cancelled)
    }
  }

  fn node_prompt() -> NodePrompt {
    NodePrompt {
      workflow: "wf".to_string(),
      node_type: "Foo (bar)".to_string(),
      candidates: vec![ResolvedNodePackage::new("bar-nodes", MatchTier::Heuristic, 0.75)],
      search: vec![
        ScoredPackage {
          package_id: "bar-nodes".to_string(),
          display_name: None,
          installed: true,
          score: 0.7,
        },
        ScoredPackage {
          package_id: "foo-tools".to_string(),
          display_name: None,
          installed: false,
          score: 0.5,
        },
      ],
    }
  }

  fn model_prompt(candidates: Vec<ModelEntry>) -> ModelPrompt {
    ModelPrompt {
      workflow: "wf".to_string(),
      reference: WorkflowModelReference {
        node_id: "4".to_string(),
        node_type: "CheckpointLoaderSimple".to_string(),
        widget_index: 0,
        value: "x.safetensors".to_string(),
        directory: Some("checkpoints".to_string()),
      },
      candidates,
    }
  }

  fn entry(hash: &str) -> ModelEntry {
    ModelEntry {
      hash: hash.to_string(),
      filename: "x.safetensors".to_string(),
      size: 1,
      relative_path: format!("{}/x.safetensors", hash),
      sources: Vec::new(),
    }
  }

  #[test]
  fn test_heuristic_suggestion_needs_confirmation() {
    let prompter = ScriptedPrompter {
      selections: VecDeque::from([PromptResponse::Answer(0)]),
      ..Default::default()
    };
    let mut strategy = InteractiveStrategy::new(prompter);

    let outcome = strategy.resolve_unknown_node(&node_prompt());
    let StrategyOutcome::Decided(NodeDecision::Install(package)) = outcome else {
      panic!("expected install");
    };
    assert_eq!(package.package_id, "bar-nodes");
    assert_eq!(package.tier, MatchTier::UserConfirmed);

    let prompter = strategy.into_inner();
    // Suggestion first, duplicate search hit dropped, then the fixed actions.
    assert_eq!(prompter.shown[0].len(), 5);
    assert!(prompter.shown[0][0].starts_with("bar-nodes (heuristic, 75%)"));
    assert!(prompter.shown[0][1].starts_with("foo-tools"));
  }

  #[test]
  fn test_node_actions() {
    let prompter = ScriptedPrompter {
      selections: VecDeque::from([
        PromptResponse::Answer(2),
        PromptResponse::Answer(3),
        PromptResponse::Answer(4),
        PromptResponse::Cancelled,
      ]),
      inputs: VecDeque::from([PromptResponse::Answer("my-nodes".to_string())]),
      ..Default::default()
    };
    let mut strategy = InteractiveStrategy::new(prompter);
    let prompt = node_prompt();

    let StrategyOutcome::Decided(NodeDecision::Install(manual)) = strategy.resolve_unknown_node(&prompt)
    else {
      panic!("expected manual install");
    };
    assert_eq!(manual.package_id, "my-nodes");
    assert_eq!(manual.source, PackageSource::Manual);

    assert_eq!(
      strategy.resolve_unknown_node(&prompt),
      StrategyOutcome::Decided(NodeDecision::Optional)
    );
    assert_eq!(strategy.resolve_unknown_node(&prompt), StrategyOutcome::Skip);
    assert_eq!(strategy.resolve_unknown_node(&prompt), StrategyOutcome::Cancelled);
  }

  #[test]
  fn test_select_model_as_nice_to_have() {
    let prompter = ScriptedPrompter {
      selections: VecDeque::from([PromptResponse::Answer(1), PromptResponse::Answer(1)]),
      ..Default::default()
    };
    let mut strategy = InteractiveStrategy::new(prompter);

    let outcome = strategy.resolve_ambiguous_model(&model_prompt(vec![entry("h1"), entry("h2")]));
    assert_eq!(
      outcome,
      StrategyOutcome::Decided(ModelDecision::Select {
        entry: entry("h2"),
        category: ModelCategory::Optional,
      })
    );
  }

  #[test]
  fn test_missing_model_actions() {
    let prompter = ScriptedPrompter {
      selections: VecDeque::from([PromptResponse::Answer(1), PromptResponse::Answer(0)]),
      inputs: VecDeque::from([PromptResponse::Answer(" loras/x.safetensors ".to_string())]),
      ..Default::default()
    };
    let mut strategy = InteractiveStrategy::new(prompter);
    let prompt = model_prompt(Vec::new());

    assert_eq!(
      strategy.resolve_missing_model(&prompt),
      StrategyOutcome::Decided(ModelDecision::OptionalUnresolved)
    );
    assert_eq!(
      strategy.resolve_missing_model(&prompt),
      StrategyOutcome::Decided(ModelDecision::Path("loras/x.safetensors".to_string()))
    );
  }
}
