//! Splitting a marked graph into control-plane and realtime halves.

use super::ir::{Edge, EdgeSource, Endpoint, Graph, GraphError, Mark, Node, NodeId};

/// Which way a crossing edge spans the partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrossingDirection {
    /// Source node is control-plane, destination is realtime.
    ControlToRealtime,
    /// Source node is realtime, destination is control-plane.
    RealtimeToControl,
}

/// Replacement nodes for one crossing edge.
///
/// The control node receives the original source signal on `control_port`;
/// the realtime node re-emits it from `realtime_port`. The two halves are
/// linked out-of-band (by a shared bridge variable index stored in their
/// params) — the graph layer only cares about connectivity.
pub struct BridgePair {
    /// Node inserted on the control side.
    pub control_node: Node,
    /// Input port on the control node that receives the crossing signal.
    pub control_port: String,
    /// Node inserted on the realtime side.
    pub realtime_node: Node,
    /// Output port on the realtime node that re-emits the signal.
    pub realtime_port: String,
}

impl Graph {
    /// Splits the graph into `(control, realtime)` halves by mark.
    ///
    /// Every node must carry exactly one of the two canonical marks; a node
    /// with both is a contradiction ([`GraphError::ConflictingMarks`]), a node
    /// with neither was missed by classification
    /// ([`GraphError::UnmarkedNode`]).
    ///
    /// Edges with both endpoints on one side are copied unchanged. A crossing
    /// edge is replaced by a bridge pair from `bridge`: the control half gets
    /// `original.from -> control_node:control_port`, the realtime half gets
    /// `realtime_node:realtime_port -> original.to`. `bridge` returns `None`
    /// for a direction the bridge policy cannot realize, which aborts with
    /// [`GraphError::UnsupportedCrossing`].
    ///
    /// Synthetic bridge ids are numbered in edge iteration order, which is
    /// canonical, so repeated partitions of one graph are identical.
    pub fn partition(
        &self,
        mut bridge: impl FnMut(CrossingDirection) -> Option<BridgePair>,
    ) -> Result<(Graph, Graph), GraphError> {
        let mut control = Graph::new();
        let mut realtime = Graph::new();

        for (id, node) in self.nodes() {
            let is_control = node.marks.contains(&Mark::Control);
            let is_realtime = node.marks.contains(&Mark::Realtime);
            match (is_control, is_realtime) {
                (true, true) => {
                    return Err(GraphError::ConflictingMarks { node: id.clone() });
                }
                (false, false) => {
                    return Err(GraphError::UnmarkedNode { node: id.clone() });
                }
                (true, false) => control = control.with_node(id.clone(), node.clone()),
                (false, true) => realtime = realtime.with_node(id.clone(), node.clone()),
            }
        }

        let mut bridge_counter = 0u32;
        for edge in self.edges() {
            let to_is_control = control.contains(&edge.to.node);

            let Some(from_node) = edge.from_node() else {
                // Literal source: stays wherever its consumer lives.
                if to_is_control {
                    control = control.with_edge(edge.clone());
                } else {
                    realtime = realtime.with_edge(edge.clone());
                }
                continue;
            };

            let from_is_control = control.contains(from_node);
            if from_is_control == to_is_control {
                if to_is_control {
                    control = control.with_edge(edge.clone());
                } else {
                    realtime = realtime.with_edge(edge.clone());
                }
                continue;
            }

            let direction = if from_is_control {
                CrossingDirection::ControlToRealtime
            } else {
                CrossingDirection::RealtimeToControl
            };
            let Some(pair) = bridge(direction) else {
                return Err(GraphError::UnsupportedCrossing { edge: edge.clone() });
            };

            let control_id = NodeId::new(format!("bridge{bridge_counter}.control"));
            let realtime_id = NodeId::new(format!("bridge{bridge_counter}.realtime"));
            bridge_counter += 1;

            control = control.with_node(control_id.clone(), pair.control_node).with_edge(Edge {
                from: edge.from.clone(),
                to: Endpoint::new(control_id, pair.control_port),
            });
            realtime = realtime
                .with_node(realtime_id.clone(), pair.realtime_node)
                .with_edge(Edge {
                    from: EdgeSource::Port(Endpoint::new(realtime_id, pair.realtime_port)),
                    to: edge.to.clone(),
                });
        }

        Ok((control, realtime))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ir::ParamValue;

    fn marked(type_name: &str, mark: Mark) -> Node {
        Node {
            marks: [mark].into(),
            ..Node::new(type_name)
        }
    }

    fn bridge_pair(direction: CrossingDirection) -> Option<BridgePair> {
        match direction {
            CrossingDirection::ControlToRealtime => Some(BridgePair {
                control_node: Node::new("core/var").with_param("var", 0.0),
                control_port: "value".into(),
                realtime_node: Node::new("core/var").with_param("var", 0.0),
                realtime_port: "out".into(),
            }),
            CrossingDirection::RealtimeToControl => None,
        }
    }

    fn crossing_graph() -> Graph {
        Graph::new()
            .with_node(NodeId::new("cc"), marked("io/midi-cc", Mark::Control))
            .with_node(NodeId::new("osc"), marked("wave/sine", Mark::Realtime))
            .with_edge(Edge::wire(
                Endpoint::new("cc", "value"),
                Endpoint::new("osc", "period"),
            ))
    }

    #[test]
    fn nodes_split_by_mark() {
        let (control, realtime) = crossing_graph().partition(bridge_pair).unwrap();
        assert!(control.contains(&NodeId::new("cc")));
        assert!(realtime.contains(&NodeId::new("osc")));
        assert!(!control.contains(&NodeId::new("osc")));
        assert!(!realtime.contains(&NodeId::new("cc")));
    }

    #[test]
    fn crossing_edge_becomes_matched_bridge_pair() {
        let (control, realtime) = crossing_graph().partition(bridge_pair).unwrap();

        // One synthesized node on each side, wired to the original endpoints.
        assert_eq!(control.node_count(), 2);
        assert_eq!(realtime.node_count(), 2);

        let control_edge = control.edges().next().unwrap();
        assert_eq!(control_edge.from_node(), Some(&NodeId::new("cc")));
        assert_eq!(control_edge.to.node, NodeId::new("bridge0.control"));
        assert_eq!(control_edge.to.port, "value");

        let realtime_edge = realtime.edges().next().unwrap();
        assert_eq!(realtime_edge.from_node(), Some(&NodeId::new("bridge0.realtime")));
        assert_eq!(realtime_edge.to, Endpoint::new("osc", "period"));
    }

    #[test]
    fn same_side_edges_survive_unchanged() {
        let graph = Graph::new()
            .with_node(NodeId::new("a"), marked("wave/sine", Mark::Realtime))
            .with_node(NodeId::new("b"), marked("maths/add", Mark::Realtime))
            .with_edge(Edge::wire(
                Endpoint::new("a", "value"),
                Endpoint::new("b", "a"),
            ));
        let (control, realtime) = graph.partition(bridge_pair).unwrap();
        assert_eq!(control.edge_count(), 0);
        assert_eq!(realtime.edge_count(), 1);
    }

    #[test]
    fn literal_edges_follow_their_consumer() {
        let graph = Graph::new()
            .with_node(NodeId::new("osc"), marked("wave/sine", Mark::Realtime))
            .with_edge(Edge::literal(440.0, Endpoint::new("osc", "period")));
        let (control, realtime) = graph.partition(bridge_pair).unwrap();
        assert_eq!(control.edge_count(), 0);
        assert_eq!(realtime.edge_count(), 1);
    }

    #[test]
    fn double_mark_is_an_error() {
        let graph = Graph::new().with_node(
            NodeId::new("x"),
            Node {
                marks: [Mark::Control, Mark::Realtime].into(),
                ..Node::new("t")
            },
        );
        assert!(matches!(
            graph.partition(bridge_pair),
            Err(GraphError::ConflictingMarks { .. })
        ));
    }

    #[test]
    fn unmarked_node_is_an_error() {
        let graph = Graph::new().with_node(NodeId::new("x"), Node::new("t"));
        assert!(matches!(
            graph.partition(bridge_pair),
            Err(GraphError::UnmarkedNode { .. })
        ));
    }

    #[test]
    fn realtime_to_control_crossing_is_rejected() {
        let graph = Graph::new()
            .with_node(NodeId::new("osc"), marked("wave/sine", Mark::Realtime))
            .with_node(NodeId::new("ui"), marked("io/midi-cc", Mark::Control))
            .with_edge(Edge::wire(
                Endpoint::new("osc", "value"),
                Endpoint::new("ui", "value"),
            ));
        assert!(matches!(
            graph.partition(bridge_pair),
            Err(GraphError::UnsupportedCrossing { .. })
        ));
    }

    #[test]
    fn repeated_partitions_are_identical() {
        let graph = crossing_graph()
            .with_node(NodeId::new("cc2"), marked("io/midi-cc", Mark::Control))
            .with_node(NodeId::new("osc2"), marked("wave/sine", Mark::Realtime))
            .with_edge(Edge::wire(
                Endpoint::new("cc2", "value"),
                Endpoint::new("osc2", "period"),
            ));

        let (c1, r1) = graph.partition(bridge_pair).unwrap();
        let (c2, r2) = graph.partition(bridge_pair).unwrap();
        assert_eq!(c1, c2);
        assert_eq!(r1, r2);
    }

    #[test]
    fn bridge_params_are_kept() {
        let (control, _) = crossing_graph().partition(bridge_pair).unwrap();
        let bridge = control.node(&NodeId::new("bridge0.control")).unwrap();
        assert_eq!(bridge.params.get("var"), Some(&ParamValue::Number(0.0)));
    }
}
