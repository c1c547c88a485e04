use std::collections::{HashMap, HashSet};

use tracing::debug;

use nodepin_config::{Link, NodeDef, ResolverSettings, WorkflowGraph};

use crate::builtin::{is_builtin_node, loader_widgets};
use crate::error::AnalyzeError;
use crate::model_ref::WorkflowModelReference;
use crate::node::WorkflowNode;

/// Dependency lists extracted from one workflow graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowAnalysis {
  /// Every node, in graph order (top level first, then subgraphs).
  pub nodes: Vec<WorkflowNode>,
  /// One representative per built-in node type.
  pub builtin_nodes: Vec<WorkflowNode>,
  /// One representative per custom node type, in order of first appearance.
  pub custom_nodes: Vec<WorkflowNode>,
  pub models: Vec<WorkflowModelReference>,
}

/// Parse and analyze a workflow from its JSON text.
pub fn analyze_json(text: &str, settings: &ResolverSettings) -> Result<WorkflowAnalysis, AnalyzeError> {
  let graph = WorkflowGraph::from_json(text)?;
  analyze(&graph, settings)
}

/// Analyze a parsed workflow graph.
pub fn analyze(
  graph: &WorkflowGraph,
  settings: &ResolverSettings,
) -> Result<WorkflowAnalysis, AnalyzeError> {
  validate(&graph.nodes, &graph.links)?;
  for subgraph in graph.subgraphs() {
    validate(&subgraph.nodes, &subgraph.links)?;
  }

  let subgraph_ids: HashSet<&str> = graph.subgraphs().iter().map(|s| s.id.as_str()).collect();

  let nodes: Vec<WorkflowNode> = graph
    .nodes
    .iter()
    .chain(graph.subgraphs().iter().flat_map(|s| s.nodes.iter()))
    .map(WorkflowNode::from)
    .collect();

  let mut builtin = Dedup::default();
  let mut custom = Dedup::default();
  let mut models = Vec::new();

  for node in &nodes {
    models.extend(model_references(node, settings));

    if subgraph_ids.contains(node.node_type.as_str()) {
      continue;
    }

    if node.is_core() || is_builtin_node(&node.node_type) {
      builtin.insert(node);
    } else {
      custom.insert(node);
    }
  }

  debug!(
    nodes = nodes.len(),
    custom = custom.nodes.len(),
    models = models.len(),
    "workflow analyzed"
  );

  Ok(WorkflowAnalysis {
    nodes,
    builtin_nodes: builtin.nodes,
    custom_nodes: custom.nodes,
    models,
  })
}

/// Check that every node is typed and every link joins known nodes.
fn validate(nodes: &[NodeDef], links: &[Link]) -> Result<(), AnalyzeError> {
  let mut ids = HashSet::new();
  for node in nodes {
    if node.node_type.trim().is_empty() {
      return Err(AnalyzeError::MalformedNode {
        node_id: node.id.clone(),
      });
    }
    ids.insert(node.id.as_str());
  }

  for (index, link) in links.iter().enumerate() {
    let (origin, target) = link
      .endpoints()
      .ok_or(AnalyzeError::MalformedLink { index })?;

    for endpoint in [origin, target] {
      // negative ids are the virtual input/output nodes of a subgraph
      if endpoint.starts_with('-') {
        continue;
      }
      if !ids.contains(endpoint.as_str()) {
        return Err(AnalyzeError::InvalidLink { node_id: endpoint });
      }
    }
  }

  Ok(())
}

/// Ordered set of node representatives keyed by type.
#[derive(Default)]
struct Dedup {
  nodes: Vec<WorkflowNode>,
  positions: HashMap<String, usize>,
}

impl Dedup {
  fn insert(&mut self, node: &WorkflowNode) {
    match self.positions.get(&node.node_type) {
      Some(&pos) => {
        if self.nodes[pos].provenance().is_none() && node.provenance().is_some() {
          self.nodes[pos] = node.clone();
        }
      }
      None => {
        self
          .positions
          .insert(node.node_type.clone(), self.nodes.len());
        self.nodes.push(node.clone());
      }
    }
  }
}

fn model_references(node: &WorkflowNode, settings: &ResolverSettings) -> Vec<WorkflowModelReference> {
  let widgets = node.string_widgets();

  let reference = |index: usize, value: &str, directory: Option<&str>| WorkflowModelReference {
    node_id: node.id.clone(),
    node_type: node.node_type.clone(),
    widget_index: index,
    value: value.to_string(),
    directory: directory.map(str::to_string),
  };

  if let Some((indices, directory)) = loader_widgets(&node.node_type) {
    return widgets
      .into_iter()
      .filter(|(i, value)| indices.contains(i) && !value.trim().is_empty())
      .map(|(i, value)| reference(i, value, Some(directory)))
      .collect();
  }

  widgets
    .into_iter()
    .filter(|(_, value)| settings.is_model_file(value))
    .map(|(i, value)| reference(i, value, None))
    .collect()
}
