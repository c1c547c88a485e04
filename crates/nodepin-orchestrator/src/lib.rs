//! nodepin Orchestrator
//!
//! This crate runs the resolution pipeline for one workflow:
//! 1. Load and analyze `workflows/<name>.json`
//! 2. Auto-resolve node types and model references, persisting what matched
//! 3. Hand ambiguous and unresolved items to the configured strategies,
//!    persisting each decision before the next prompt
//!
//! It also answers whether a workflow is commit-safe, and produces dry-run
//! reports without touching the manifest.

mod error;
mod orchestrator;
mod result;

pub use error::OrchestratorError;
pub use orchestrator::WorkflowOrchestrator;
pub use result::{CommitIssue, DryRunReport, ModelOutcome, NodeOutcome, ResolutionResult};
