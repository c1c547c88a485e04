use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::node_id_from_value;
use crate::node::NodeDef;

/// A saved workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
  pub nodes: Vec<NodeDef>,
  #[serde(default)]
  pub links: Vec<Link>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub definitions: Option<Definitions>,
}

impl WorkflowGraph {
  /// Parse a workflow graph from its JSON text.
  pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(text)
  }

  /// Subgraph definitions embedded in this workflow, if any.
  pub fn subgraphs(&self) -> &[SubgraphDef] {
    self
      .definitions
      .as_ref()
      .map(|d| d.subgraphs.as_slice())
      .unwrap_or(&[])
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Definitions {
  #[serde(default)]
  pub subgraphs: Vec<SubgraphDef>,
}

/// A reusable subgraph. Instances appear in the parent graph as nodes whose
/// type equals the subgraph id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphDef {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default)]
  pub nodes: Vec<NodeDef>,
  #[serde(default)]
  pub links: Vec<Link>,
}

/// A link between two nodes.
///
/// Top-level graphs store links compactly as
/// `[link_id, origin_id, origin_slot, target_id, target_slot, type]`,
/// subgraphs store them as objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Link {
  Compact(Vec<Value>),
  Object(LinkObject),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkObject {
  #[serde(default)]
  pub id: Value,
  pub origin_id: Value,
  pub target_id: Value,
}

impl Link {
  /// Origin and target node ids, or `None` when the link is malformed.
  pub fn endpoints(&self) -> Option<(String, String)> {
    match self {
      Link::Compact(values) => {
        let origin = node_id_from_value(values.get(1)?)?;
        let target = node_id_from_value(values.get(3)?)?;
        Some((origin, target))
      }
      Link::Object(link) => Some((
        node_id_from_value(&link.origin_id)?,
        node_id_from_value(&link.target_id)?,
      )),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_minimal_graph() {
    let graph = WorkflowGraph::from_json(
      r#"{
        "nodes": [
          {"id": 3, "type": "KSampler", "widgets_values": [42, "fixed", 20]},
          {"id": "7", "type": "SaveImage"}
        ],
        "links": [[1, 3, 0, 7, 0, "IMAGE"]]
      }"#,
    )
    .unwrap();

    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.nodes[0].id, "3");
    assert_eq!(graph.nodes[1].id, "7");
    assert_eq!(
      graph.links[0].endpoints(),
      Some(("3".to_string(), "7".to_string()))
    );
  }

  #[test]
  fn test_parse_object_links_in_subgraph() {
    let graph = WorkflowGraph::from_json(
      r#"{
        "nodes": [],
        "definitions": {"subgraphs": [{
          "id": "4f1c",
          "nodes": [{"id": 1, "type": "VAEDecode"}],
          "links": [{"id": 9, "origin_id": -10, "origin_slot": 0, "target_id": 1, "target_slot": 0}]
        }]}
      }"#,
    )
    .unwrap();

    let subgraph = &graph.subgraphs()[0];
    assert_eq!(subgraph.nodes[0].node_type, "VAEDecode");
    assert_eq!(
      subgraph.links[0].endpoints(),
      Some(("-10".to_string(), "1".to_string()))
    );
  }

  #[test]
  fn test_missing_nodes_is_an_error() {
    assert!(WorkflowGraph::from_json(r#"{"links": []}"#).is_err());
  }

  #[test]
  fn test_malformed_link_has_no_endpoints() {
    let link = Link::Compact(vec![Value::from(1)]);
    assert_eq!(link.endpoints(), None);
  }
}
