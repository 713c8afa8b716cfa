//! Graph value types and structural transforms.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Errors raised by graph transforms.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// An edge endpoint references a node id that is not in the graph.
    #[error("edge references unknown node '{node}'")]
    DanglingEdge {
        /// The missing node id.
        node: NodeId,
    },

    /// A node carries both partition marks — the constraints contradict.
    #[error("node '{node}' is marked both control-plane and realtime")]
    ConflictingMarks {
        /// The doubly marked node.
        node: NodeId,
    },

    /// A node reached partitioning without either canonical mark.
    #[error("node '{node}' was never assigned a partition mark")]
    UnmarkedNode {
        /// The unmarked node.
        node: NodeId,
    },

    /// A crossing edge spans the partition in a direction the bridge policy
    /// does not support.
    #[error("unsupported partition crossing on edge {edge}")]
    UnsupportedCrossing {
        /// The offending edge.
        edge: Edge,
    },
}

/// Opaque node identifier, stable within one graph.
///
/// Ids coming from the editor are kept verbatim; synthesized nodes (bridge
/// pairs, materialized constants) get fresh ids allocated in a deterministic
/// order by the transform that creates them.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Partition classification tag accumulated on a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Mark {
    /// Evaluated as discrete jobs on the control plane.
    Control,
    /// Evaluated once per sample inside the realtime process.
    Realtime,
}

/// A node parameter value as supplied by the editor or front-end.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Numeric parameter (all numbers are carried as `f64`).
    Number(f64),
    /// Textual parameter.
    Text(String),
}

impl ParamValue {
    /// Returns the numeric value, if this parameter is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Text(_) => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Number(n)
    }
}

/// A graph node: type name, constructor parameters, and accumulated marks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    /// Registered node type name (e.g. `"wave/sine"`).
    pub type_name: String,
    /// Constructor parameters by name.
    pub params: BTreeMap<String, ParamValue>,
    /// Partition marks accumulated during classification.
    pub marks: BTreeSet<Mark>,
}

impl Node {
    /// Creates a node of the given type with no parameters.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            params: BTreeMap::new(),
            marks: BTreeSet::new(),
        }
    }

    /// Adds a parameter, builder style.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Returns a numeric parameter by name.
    pub fn number_param(&self, name: &str) -> Option<f64> {
        self.params.get(name).and_then(ParamValue::as_number)
    }
}

/// A `(node, port)` edge endpoint.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Endpoint {
    /// The node the endpoint attaches to.
    pub node: NodeId,
    /// The declared port name on that node's type.
    pub port: String,
}

impl Endpoint {
    /// Creates an endpoint.
    pub fn new(node: impl Into<NodeId>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
        }
    }
}

/// The source side of an edge: either another node's output port, or an
/// inline literal constant (an implicit constant source with no node).
#[derive(Clone, Debug)]
pub enum EdgeSource {
    /// Output port of another node.
    Port(Endpoint),
    /// Inline literal constant; materialized as a real constant node before
    /// scheduling.
    Literal(f64),
}

impl PartialEq for EdgeSource {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for EdgeSource {}

impl PartialOrd for EdgeSource {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeSource {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use EdgeSource::{Literal, Port};
        match (self, other) {
            (Port(a), Port(b)) => a.cmp(b),
            (Literal(a), Literal(b)) => a.total_cmp(b),
            (Port(_), Literal(_)) => std::cmp::Ordering::Less,
            (Literal(_), Port(_)) => std::cmp::Ordering::Greater,
        }
    }
}

/// A directed edge from a source (port or literal) to a destination port.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Edge {
    /// Signal source.
    pub from: EdgeSource,
    /// Destination input port.
    pub to: Endpoint,
}

impl Edge {
    /// Creates a port-to-port edge.
    pub fn wire(from: Endpoint, to: Endpoint) -> Self {
        Self {
            from: EdgeSource::Port(from),
            to,
        }
    }

    /// Creates a literal-to-port edge.
    pub fn literal(value: f64, to: Endpoint) -> Self {
        Self {
            from: EdgeSource::Literal(value),
            to,
        }
    }

    /// Returns the source node id, if the source is a port.
    pub fn from_node(&self) -> Option<&NodeId> {
        match &self.from {
            EdgeSource::Port(ep) => Some(&ep.node),
            EdgeSource::Literal(_) => None,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.from {
            EdgeSource::Port(ep) => write!(f, "{}:{}", ep.node, ep.port)?,
            EdgeSource::Literal(v) => write!(f, "{v}")?,
        }
        write!(f, " -> {}:{}", self.to.node, self.to.port)
    }
}

/// Immutable signal-processing graph.
///
/// Ordered containers keep iteration — and therefore every derived numbering
/// downstream — deterministic across compiles of the same graph.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeSet<Edge>,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = (&NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Returns the edges in canonical order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Looks up a node by id.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Returns true if the graph contains the given node id.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns a new graph with the node added (replacing any same-id node).
    pub fn with_node(&self, id: impl Into<NodeId>, node: Node) -> Self {
        let mut next = self.clone();
        next.nodes.insert(id.into(), node);
        next
    }

    /// Returns a new graph with the edge added.
    pub fn with_edge(&self, edge: Edge) -> Self {
        let mut next = self.clone();
        next.edges.insert(edge);
        next
    }

    /// Ids of nodes directly downstream of `id` (following edge direction).
    pub fn successors(&self, id: &NodeId) -> BTreeSet<NodeId> {
        self.edges
            .iter()
            .filter(|e| e.from_node() == Some(id))
            .map(|e| e.to.node.clone())
            .collect()
    }

    /// Ids of nodes directly upstream of `id` (against edge direction).
    ///
    /// Literal edge sources have no source node and contribute nothing.
    pub fn predecessors(&self, id: &NodeId) -> BTreeSet<NodeId> {
        self.edges
            .iter()
            .filter(|e| e.to.node == *id)
            .filter_map(|e| e.from_node().cloned())
            .collect()
    }

    /// Returns a new graph where `classify` has been applied to every node,
    /// adding the returned mark (if any) to that node's mark set.
    pub fn mark_matching(&self, classify: impl Fn(&Node) -> Option<Mark>) -> Self {
        let mut next = self.clone();
        for node in next.nodes.values_mut() {
            if let Some(mark) = classify(node) {
                node.marks.insert(mark);
            }
        }
        next
    }

    /// Propagates `mark` to every node reachable from an already-marked node,
    /// following edge direction.
    pub fn mark_forwards(&self, mark: Mark) -> Self {
        self.mark_in_direction(mark, Self::successors)
    }

    /// Propagates `mark` to every ancestor of an already-marked node,
    /// following edges in reverse.
    pub fn mark_backwards(&self, mark: Mark) -> Self {
        self.mark_in_direction(mark, Self::predecessors)
    }

    /// Replaces nodes with subgraphs, rerouting edges at the boundary.
    ///
    /// `expand` returns `None` to keep a node as is, or a replacement
    /// subgraph. Subgraph node ids are prefixed with the original id
    /// (`"{original}${inner}"`) to stay unique. Inside the subgraph the
    /// reserved id `self` stands for the replaced node's boundary: an edge
    /// `self:p -> inner:q` splices every outside edge arriving at the
    /// original's port `p` onto `inner:q`, and `inner:q -> self:p` splices
    /// `inner:q` onto every outside edge leaving port `p`. Replacement nodes
    /// are not themselves re-expanded.
    pub fn expand_nodes(&self, mut expand: impl FnMut(&NodeId, &Node) -> Option<Graph>) -> Self {
        let self_id = NodeId::new("self");
        let mut next = self.clone();

        for (id, node) in self.nodes() {
            let Some(replacement) = expand(id, node) else {
                continue;
            };
            let renamed = |inner: &NodeId| NodeId::new(format!("{id}${inner}"));

            next.nodes.remove(id);
            for (inner_id, inner_node) in replacement.nodes() {
                next.nodes.insert(renamed(inner_id), inner_node.clone());
            }

            for edge in replacement.edges() {
                if let EdgeSource::Port(from_ep) = &edge.from
                    && from_ep.node == self_id
                {
                    // Boundary input: splice outside producers through.
                    let incoming: Vec<Edge> = next
                        .edges
                        .iter()
                        .filter(|e| e.to.node == *id && e.to.port == from_ep.port)
                        .cloned()
                        .collect();
                    for outside in incoming {
                        next.edges.insert(Edge {
                            from: outside.from,
                            to: Endpoint::new(renamed(&edge.to.node), edge.to.port.clone()),
                        });
                    }
                } else if edge.to.node == self_id {
                    // Boundary output: splice outside consumers through.
                    if let EdgeSource::Port(from_ep) = &edge.from {
                        let outgoing: Vec<Edge> = next
                            .edges
                            .iter()
                            .filter(|e| match &e.from {
                                EdgeSource::Port(ep) => ep.node == *id && ep.port == edge.to.port,
                                EdgeSource::Literal(_) => false,
                            })
                            .cloned()
                            .collect();
                        for outside in outgoing {
                            next.edges.insert(Edge {
                                from: EdgeSource::Port(Endpoint::new(
                                    renamed(&from_ep.node),
                                    from_ep.port.clone(),
                                )),
                                to: outside.to,
                            });
                        }
                    }
                } else {
                    let from = match &edge.from {
                        EdgeSource::Port(ep) => EdgeSource::Port(Endpoint::new(
                            renamed(&ep.node),
                            ep.port.clone(),
                        )),
                        literal @ EdgeSource::Literal(_) => literal.clone(),
                    };
                    next.edges.insert(Edge {
                        from,
                        to: Endpoint::new(renamed(&edge.to.node), edge.to.port.clone()),
                    });
                }
            }

            next.edges
                .retain(|e| e.to.node != *id && e.from_node() != Some(id));
        }

        next
    }

    /// Transitive closure over one traversal direction. Worklist with a
    /// visited check on the mark itself, so cyclic graphs terminate.
    fn mark_in_direction(
        &self,
        mark: Mark,
        neighbours: impl Fn(&Self, &NodeId) -> BTreeSet<NodeId>,
    ) -> Self {
        let mut next = self.clone();
        let mut pending: Vec<NodeId> = next
            .nodes
            .iter()
            .filter(|(_, node)| node.marks.contains(&mark))
            .map(|(id, _)| id.clone())
            .collect();

        while let Some(id) = pending.pop() {
            for neighbour in neighbours(&next, &id) {
                // Edges to unknown ids are caught by `from_raw`; tolerate them
                // here so a partially built graph can still be inspected.
                if let Some(node) = next.nodes.get_mut(&neighbour)
                    && node.marks.insert(mark)
                {
                    pending.push(neighbour);
                }
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(node: &str, port: &str) -> Endpoint {
        Endpoint::new(NodeId::new(node), port)
    }

    fn chain() -> Graph {
        // a -> b -> c
        Graph::new()
            .with_node(NodeId::new("a"), Node::new("t"))
            .with_node(NodeId::new("b"), Node::new("t"))
            .with_node(NodeId::new("c"), Node::new("t"))
            .with_edge(Edge::wire(endpoint("a", "out"), endpoint("b", "in")))
            .with_edge(Edge::wire(endpoint("b", "out"), endpoint("c", "in")))
    }

    #[test]
    fn transforms_leave_the_original_untouched() {
        let graph = chain();
        let marked = graph.mark_matching(|_| Some(Mark::Realtime));
        assert!(graph.nodes().all(|(_, n)| n.marks.is_empty()));
        assert!(marked.nodes().all(|(_, n)| n.marks.contains(&Mark::Realtime)));
    }

    #[test]
    fn successors_and_predecessors() {
        let graph = chain();
        assert_eq!(
            graph.successors(&NodeId::new("a")),
            [NodeId::new("b")].into()
        );
        assert_eq!(
            graph.predecessors(&NodeId::new("c")),
            [NodeId::new("b")].into()
        );
        assert!(graph.predecessors(&NodeId::new("a")).is_empty());
    }

    #[test]
    fn node_ids_build_from_owned_and_borrowed_strings() {
        // Interchange parsing hands endpoints owned strings.
        let owned = Endpoint::new(String::from("a"), String::from("out"));
        assert_eq!(owned, endpoint("a", "out"));
        assert_eq!(NodeId::from(String::from("a")), NodeId::from("a"));
    }

    #[test]
    fn literal_sources_have_no_predecessor() {
        let graph = Graph::new()
            .with_node(NodeId::new("x"), Node::new("t"))
            .with_edge(Edge::literal(2.0, endpoint("x", "in")));
        assert!(graph.predecessors(&NodeId::new("x")).is_empty());
    }

    #[test]
    fn mark_forwards_reaches_transitive_successors() {
        let graph = chain()
            .mark_matching(|_| None)
            .with_node(
                NodeId::new("a"),
                Node {
                    marks: [Mark::Realtime].into(),
                    ..Node::new("t")
                },
            )
            .mark_forwards(Mark::Realtime);

        for id in ["a", "b", "c"] {
            assert!(
                graph
                    .node(&NodeId::new(id))
                    .unwrap()
                    .marks
                    .contains(&Mark::Realtime),
                "{id} should be marked"
            );
        }
    }

    #[test]
    fn mark_backwards_reaches_ancestors_only() {
        let graph = chain()
            .with_node(
                NodeId::new("b"),
                Node {
                    marks: [Mark::Control].into(),
                    ..Node::new("t")
                },
            )
            .with_edge(Edge::wire(endpoint("a", "out"), endpoint("b", "in")))
            .mark_backwards(Mark::Control);

        assert!(
            graph
                .node(&NodeId::new("a"))
                .unwrap()
                .marks
                .contains(&Mark::Control)
        );
        assert!(
            !graph
                .node(&NodeId::new("c"))
                .unwrap()
                .marks
                .contains(&Mark::Control)
        );
    }

    #[test]
    fn expand_replaces_a_node_with_a_wired_subgraph() {
        // a -> mid -> c, where mid expands into pre -> post.
        let graph = Graph::new()
            .with_node(NodeId::new("a"), Node::new("t"))
            .with_node(NodeId::new("mid"), Node::new("composite"))
            .with_node(NodeId::new("c"), Node::new("t"))
            .with_edge(Edge::wire(endpoint("a", "out"), endpoint("mid", "in")))
            .with_edge(Edge::wire(endpoint("mid", "out"), endpoint("c", "in")));

        let expanded = graph.expand_nodes(|_, node| {
            if node.type_name != "composite" {
                return None;
            }
            Some(
                Graph::new()
                    .with_node(NodeId::new("pre"), Node::new("t"))
                    .with_node(NodeId::new("post"), Node::new("t"))
                    .with_edge(Edge::wire(endpoint("self", "in"), endpoint("pre", "in")))
                    .with_edge(Edge::wire(endpoint("pre", "out"), endpoint("post", "in")))
                    .with_edge(Edge::wire(endpoint("post", "out"), endpoint("self", "out"))),
            )
        });

        assert!(!expanded.contains(&NodeId::new("mid")));
        assert!(expanded.contains(&NodeId::new("mid$pre")));
        assert!(expanded.contains(&NodeId::new("mid$post")));

        let edges: Vec<&Edge> = expanded.edges().collect();
        assert!(edges.contains(&&Edge::wire(endpoint("a", "out"), endpoint("mid$pre", "in"))));
        assert!(edges.contains(&&Edge::wire(
            endpoint("mid$pre", "out"),
            endpoint("mid$post", "in")
        )));
        assert!(edges.contains(&&Edge::wire(endpoint("mid$post", "out"), endpoint("c", "in"))));
        assert!(expanded.edges().all(|e| {
            e.to.node != NodeId::new("mid") && e.from_node() != Some(&NodeId::new("mid"))
        }));
    }

    #[test]
    fn expand_keeps_unmapped_nodes_untouched() {
        let graph = chain();
        let expanded = graph.expand_nodes(|_, _| None);
        assert_eq!(expanded, graph);
    }

    #[test]
    fn expand_preserves_literal_edges_inside_the_subgraph() {
        let graph = Graph::new()
            .with_node(NodeId::new("mid"), Node::new("composite"))
            .with_node(NodeId::new("c"), Node::new("t"))
            .with_edge(Edge::wire(endpoint("mid", "out"), endpoint("c", "in")));

        let expanded = graph.expand_nodes(|_, node| {
            if node.type_name != "composite" {
                return None;
            }
            Some(
                Graph::new()
                    .with_node(NodeId::new("inner"), Node::new("t"))
                    .with_edge(Edge::literal(3.0, endpoint("inner", "in")))
                    .with_edge(Edge::wire(endpoint("inner", "out"), endpoint("self", "out"))),
            )
        });

        let edges: Vec<&Edge> = expanded.edges().collect();
        assert!(edges.contains(&&Edge::literal(3.0, endpoint("mid$inner", "in"))));
        assert!(edges.contains(&&Edge::wire(endpoint("mid$inner", "out"), endpoint("c", "in"))));
    }

    #[test]
    fn marking_terminates_on_cycles() {
        let graph = Graph::new()
            .with_node(
                NodeId::new("a"),
                Node {
                    marks: [Mark::Realtime].into(),
                    ..Node::new("t")
                },
            )
            .with_node(NodeId::new("b"), Node::new("t"))
            .with_edge(Edge::wire(endpoint("a", "out"), endpoint("b", "in")))
            .with_edge(Edge::wire(endpoint("b", "out"), endpoint("a", "in")))
            .mark_forwards(Mark::Realtime);

        assert!(
            graph
                .node(&NodeId::new("b"))
                .unwrap()
                .marks
                .contains(&Mark::Realtime)
        );
    }
}
