//! nodepin Workflow
//!
//! This crate turns a saved workflow graph into the dependency lists the
//! resolvers work on. Analysis is a pure transform:
//! - Graph structure is validated (typed nodes, links between known nodes)
//! - Nodes are classified as built-in or custom
//! - Repeated node types are collapsed to one representative, preferring
//!   instances that carry provenance
//! - Model file references are pulled out of widget values

mod analysis;
mod builtin;
mod error;
mod model_ref;
mod node;

pub use analysis::{WorkflowAnalysis, analyze, analyze_json};
pub use builtin::{is_builtin_node, loader_widgets};
pub use error::AnalyzeError;
pub use model_ref::WorkflowModelReference;
pub use node::{CORE_PACKAGE_ID, Provenance, ProvenanceSource, WorkflowNode};
