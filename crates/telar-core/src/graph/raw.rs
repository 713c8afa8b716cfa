//! Raw graph interchange format.
//!
//! The editor and the s-expression front-end both hand the compiler a graph
//! in this shape:
//!
//! ```json
//! {
//!   "nodes": [{ "id": "3", "type": "wave/sine", "params": [{ "name": "period", "value": 300 }] }],
//!   "edges": [
//!     { "from": ["3", "value"], "to": ["out", "value"] },
//!     { "from": 0.5, "to": ["3", "period"] }
//!   ]
//! }
//! ```
//!
//! A `from` that is a plain number denotes an inline literal constant.
//! [`Graph::from_raw`] validates edge endpoints against the node list, so the
//! IR invariant (every endpoint references an existing node) holds from the
//! moment a [`Graph`] exists.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ir::{Edge, EdgeSource, Endpoint, Graph, GraphError, Node, NodeId, ParamValue};

/// A graph as posted by the editor.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawGraph {
    /// Node list.
    pub nodes: Vec<RawNode>,
    /// Edge list.
    pub edges: Vec<RawEdge>,
}

/// Editor node id: arrives as a JSON string or number, normalized to a string.
#[derive(Clone, Debug, Serialize)]
pub struct RawId(pub String);

impl<'de> Deserialize<'de> for RawId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(i64),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(s) => RawId(s),
            Repr::Number(n) => RawId(n.to_string()),
        })
    }
}

/// A node in the raw interchange format.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawNode {
    /// Node id; numeric editor ids are fine, they are carried as strings.
    pub id: RawId,
    /// Registered node type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Constructor parameters.
    #[serde(default)]
    pub params: Vec<RawParam>,
}

/// A single named parameter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawParam {
    /// Parameter name.
    pub name: String,
    /// Parameter value.
    pub value: ParamValue,
}

/// An edge in the raw interchange format.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawEdge {
    /// Source: either `[nodeId, portName]` or a literal number.
    pub from: RawEdgeSource,
    /// Destination `[nodeId, portName]`.
    pub to: (RawId, String),
}

/// Source half of a raw edge.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawEdgeSource {
    /// `[nodeId, portName]` pair.
    Port((RawId, String)),
    /// Inline literal constant.
    Literal(f64),
}

impl Graph {
    /// Builds a validated IR graph from the raw interchange form.
    ///
    /// Fails with [`GraphError::DanglingEdge`] if any edge endpoint names a
    /// node id that is not in the node list.
    pub fn from_raw(raw: &RawGraph) -> Result<Self, GraphError> {
        let mut graph = Graph::new();
        for raw_node in &raw.nodes {
            let params: BTreeMap<String, ParamValue> = raw_node
                .params
                .iter()
                .map(|p| (p.name.clone(), p.value.clone()))
                .collect();
            graph = graph.with_node(
                NodeId::new(raw_node.id.0.clone()),
                Node {
                    type_name: raw_node.type_name.clone(),
                    params,
                    marks: Default::default(),
                },
            );
        }

        for raw_edge in &raw.edges {
            let to = Endpoint::new(raw_edge.to.0.0.clone(), raw_edge.to.1.clone());
            if !graph.contains(&to.node) {
                return Err(GraphError::DanglingEdge {
                    node: to.node.clone(),
                });
            }
            let from = match &raw_edge.from {
                RawEdgeSource::Port((id, port)) => {
                    let endpoint = Endpoint::new(id.0.clone(), port.clone());
                    if !graph.contains(&endpoint.node) {
                        return Err(GraphError::DanglingEdge {
                            node: endpoint.node.clone(),
                        });
                    }
                    EdgeSource::Port(endpoint)
                }
                RawEdgeSource::Literal(value) => EdgeSource::Literal(*value),
            };
            graph = graph.with_edge(Edge { from, to });
        }

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_editor_json() {
        let raw: RawGraph = serde_json::from_str(
            r#"{
                "nodes": [
                    { "id": 1, "type": "wave/sine", "params": [{ "name": "period", "value": 300 }] },
                    { "id": "out", "type": "io/mono-output" }
                ],
                "edges": [
                    { "from": ["1", "value"], "to": ["out", "value"] },
                    { "from": 0.5, "to": ["1", "period"] }
                ]
            }"#,
        )
        .unwrap();

        let graph = Graph::from_raw(&raw).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(
            graph.node(&NodeId::new("1")).unwrap().number_param("period"),
            Some(300.0)
        );
    }

    #[test]
    fn numeric_ids_are_normalized_to_strings() {
        let raw: RawGraph = serde_json::from_str(
            r#"{
                "nodes": [{ "id": 7, "type": "t" }],
                "edges": [{ "from": 1.0, "to": [7, "in"] }]
            }"#,
        )
        .unwrap();
        let graph = Graph::from_raw(&raw).unwrap();
        assert!(graph.contains(&NodeId::new("7")));
    }

    #[test]
    fn unknown_destination_is_a_dangling_edge() {
        let raw: RawGraph = serde_json::from_str(
            r#"{
                "nodes": [{ "id": "a", "type": "t" }],
                "edges": [{ "from": ["a", "out"], "to": ["ghost", "in"] }]
            }"#,
        )
        .unwrap();
        assert!(matches!(
            Graph::from_raw(&raw),
            Err(GraphError::DanglingEdge { node }) if node.as_str() == "ghost"
        ));
    }

    #[test]
    fn unknown_source_is_a_dangling_edge() {
        let raw: RawGraph = serde_json::from_str(
            r#"{
                "nodes": [{ "id": "a", "type": "t" }],
                "edges": [{ "from": ["ghost", "out"], "to": ["a", "in"] }]
            }"#,
        )
        .unwrap();
        assert!(matches!(
            Graph::from_raw(&raw),
            Err(GraphError::DanglingEdge { .. })
        ));
    }
}
