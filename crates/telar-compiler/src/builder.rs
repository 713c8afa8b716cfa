//! Lowering the realtime half of a partitioned graph into a flat model.

use std::collections::BTreeMap;

use telar_core::graph::{EdgeSource, Graph, NodeId};
use telar_core::model::{PortId, RealtimeModel};
use telar_nodes::{NodeRegistry, OUTPUT_TYPE, VAR_TYPE, bridge_var_index};

use crate::{CompileError, Result};

/// Builds the realtime model from the realtime graph half.
///
/// The designated sink must appear exactly once; it becomes the model's
/// `out` source set rather than a node. `core/var` nodes get the fixed
/// shared-variable lowering; every other node lowers through its registered
/// type. Literal edge sources are materialized as constant nodes.
pub(crate) fn build_model(registry: &NodeRegistry, graph: &Graph) -> Result<RealtimeModel> {
    let mut model = RealtimeModel::new();
    let mut indices: BTreeMap<&NodeId, usize> = BTreeMap::new();
    let mut sink: Option<&NodeId> = None;

    for (id, node) in graph.nodes() {
        if node.type_name == OUTPUT_TYPE {
            if sink.is_some() {
                return Err(CompileError::MultipleOutputs);
            }
            sink = Some(id);
            continue;
        }

        let index = if node.type_name == VAR_TYPE {
            model.add_variable(bridge_var_index(node)?, 0.0)
        } else {
            let ty = registry
                .get(&node.type_name)
                .ok_or_else(|| CompileError::UnknownNodeType {
                    node: id.clone(),
                    type_name: node.type_name.clone(),
                })?;
            let def = ty
                .lower_realtime(node)
                .ok_or_else(|| CompileError::NotRealtime {
                    node: id.clone(),
                    type_name: node.type_name.clone(),
                })??;
            model.add_node(def)
        };
        indices.insert(id, index);
    }

    let sink = sink.ok_or(CompileError::NoOutput)?;

    for edge in graph.edges() {
        let invalid = || CompileError::InvalidReference { edge: edge.clone() };

        let from_port: PortId = match &edge.from {
            EdgeSource::Port(ep) => {
                let index = *indices.get(&ep.node).ok_or_else(invalid)?;
                model.output_port(index, &ep.port).ok_or_else(invalid)?
            }
            EdgeSource::Literal(value) => {
                let index = model.add_constant(*value);
                model.output_port(index, "out").ok_or_else(invalid)?
            }
        };

        if edge.to.node == *sink {
            model.connect_out(from_port);
        } else {
            let index = *indices.get(&edge.to.node).ok_or_else(invalid)?;
            if !model.connect(from_port, index, &edge.to.port) {
                return Err(invalid());
            }
        }
    }

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use telar_core::graph::{Edge, Endpoint, Node};

    fn registry() -> NodeRegistry {
        NodeRegistry::new()
    }

    #[test]
    fn literal_edges_materialize_constants() {
        let graph = Graph::new()
            .with_node(NodeId::new("out"), Node::new(OUTPUT_TYPE))
            .with_edge(Edge::literal(2.5, Endpoint::new("out", "value")));
        let model = build_model(&registry(), &graph).unwrap();
        assert_eq!(model.nodes.len(), 1);
        assert_eq!(model.out, vec![0]);
        assert_eq!(model.nodes[0].def.params["value"], "2.5");
    }

    #[test]
    fn var_nodes_size_the_variable_table() {
        let graph = Graph::new()
            .with_node(
                NodeId::new("bridge0.realtime"),
                Node::new(VAR_TYPE).with_param("var", 2.0),
            )
            .with_node(NodeId::new("out"), Node::new(OUTPUT_TYPE))
            .with_edge(Edge::wire(
                Endpoint::new("bridge0.realtime", "out"),
                Endpoint::new("out", "value"),
            ));
        let model = build_model(&registry(), &graph).unwrap();
        assert_eq!(model.var_count, 3);
    }

    #[test]
    fn bad_var_indices_are_rejected_at_lowering() {
        let graph = Graph::new()
            .with_node(
                NodeId::new("v"),
                Node::new(VAR_TYPE).with_param("var", -1.0),
            )
            .with_node(NodeId::new("out"), Node::new(OUTPUT_TYPE));
        assert!(matches!(
            build_model(&registry(), &graph),
            Err(CompileError::Lower(_))
        ));
    }

    #[test]
    fn missing_output_is_an_error() {
        let graph = Graph::new().with_node(NodeId::new("osc"), Node::new("wave/sine"));
        assert!(matches!(
            build_model(&registry(), &graph),
            Err(CompileError::NoOutput)
        ));
    }

    #[test]
    fn second_output_is_an_error() {
        let graph = Graph::new()
            .with_node(NodeId::new("a"), Node::new(OUTPUT_TYPE))
            .with_node(NodeId::new("b"), Node::new(OUTPUT_TYPE));
        assert!(matches!(
            build_model(&registry(), &graph),
            Err(CompileError::MultipleOutputs)
        ));
    }

    #[test]
    fn edge_to_unknown_port_is_reported_with_the_edge() {
        let graph = Graph::new()
            .with_node(NodeId::new("osc"), Node::new("wave/sine"))
            .with_node(NodeId::new("out"), Node::new(OUTPUT_TYPE))
            .with_edge(Edge::wire(
                Endpoint::new("osc", "value"),
                Endpoint::new("out", "value"),
            ))
            .with_edge(Edge::literal(1.0, Endpoint::new("osc", "frequency")));
        assert!(matches!(
            build_model(&registry(), &graph),
            Err(CompileError::InvalidReference { .. })
        ));
    }

    #[test]
    fn multiple_writers_to_the_sink_accumulate() {
        let graph = Graph::new()
            .with_node(NodeId::new("out"), Node::new(OUTPUT_TYPE))
            .with_edge(Edge::literal(1.0, Endpoint::new("out", "value")))
            .with_edge(Edge::literal(2.0, Endpoint::new("out", "value")));
        let model = build_model(&registry(), &graph).unwrap();
        assert_eq!(model.out.len(), 2);
    }
}
