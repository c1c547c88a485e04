//! nodepin Resolver
//!
//! This crate maps references found by the workflow analyzer to concrete
//! artifacts:
//! - [`NodeResolver`] walks node types through an ordered chain of tiers
//!   (session cache, custom mapping, provenance, catalog, heuristic)
//! - [`FuzzySearch`] ranks packages for interactive prompts
//! - [`ModelResolver`] matches model references by content hash or file name
//!
//! Resolution never fails: a reference that cannot be matched comes back as
//! unresolved or ambiguous, and the caller hands it to a strategy.

mod context;
mod fuzzy;
mod heuristic;
mod interactive;
mod model;
mod node;
mod strategy;

pub use context::ResolutionContext;
pub use fuzzy::{FuzzySearch, ScoredPackage, SearchScope};
pub use interactive::{InteractiveStrategy, PromptResponse, Prompter};
pub use model::{ModelResolution, ModelResolver};
pub use node::{MatchTier, NodeResolution, NodeResolver, ResolvedNodePackage};
pub use strategy::{
  AutomaticStrategy, ModelDecision, ModelPrompt, ModelStrategy, NodeDecision, NodePrompt,
  NodeStrategy, StrategyOutcome,
};
