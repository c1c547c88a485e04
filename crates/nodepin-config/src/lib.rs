//! nodepin Config
//!
//! This crate contains the serializable types nodepin reads from disk before
//! any resolution happens:
//! - the saved workflow graph as written by the visual editor
//! - resolver tuning knobs ([`ResolverSettings`])
//! - the on-disk layout of a managed environment ([`EnvironmentLayout`])
//!
//! The analyzer in `nodepin-workflow` turns a [`WorkflowGraph`] into the
//! dependency lists the resolvers work on.

mod error;
mod graph;
mod id;
mod layout;
mod node;
mod settings;

pub use error::ConfigError;
pub use graph::{Definitions, Link, LinkObject, SubgraphDef, WorkflowGraph};
pub use id::node_id_from_value;
pub use layout::EnvironmentLayout;
pub use node::{NodeDef, NodeInput};
pub use settings::ResolverSettings;
