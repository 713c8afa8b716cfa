//! Mark seeding and graph splitting.
//!
//! Classification starts from the registry: types with only a realtime
//! lowering pin their nodes to the realtime side, control-only types to the
//! control side. Realtime marks then flood downstream (everything fed by a
//! realtime signal must run per sample), control marks flood upstream
//! (everything feeding a control job is itself a job), and whatever is left
//! over defaults to the control side, where evaluation is cheap.
//!
//! Crossings are bridged with `core/var` pairs sharing an ascending variable
//! index; only control → realtime crossings are realizable.

use telar_core::graph::{
    BridgePair, CrossingDirection, Graph, GraphError, Mark, Node,
};
use telar_nodes::{Classification, NodeRegistry, VAR_TYPE};

use crate::{CompileError, Result};

/// Splits `graph` into `(control, realtime)` halves.
pub(crate) fn partition(registry: &NodeRegistry, graph: &Graph) -> Result<(Graph, Graph)> {
    for (id, node) in graph.nodes() {
        if registry.get(&node.type_name).is_none() {
            return Err(CompileError::UnknownNodeType {
                node: id.clone(),
                type_name: node.type_name.clone(),
            });
        }
    }

    let marked = graph
        .mark_matching(|node| {
            match registry.get(&node.type_name).map(|t| t.classification()) {
                Some(Classification::RealtimeOnly) => Some(Mark::Realtime),
                Some(Classification::ControlOnly) => Some(Mark::Control),
                _ => None,
            }
        })
        .mark_forwards(Mark::Realtime)
        .mark_backwards(Mark::Control)
        .mark_matching(|node| (!node.marks.contains(&Mark::Realtime)).then_some(Mark::Control));

    let mut next_var = 0u32;
    let split = marked.partition(|direction| match direction {
        CrossingDirection::ControlToRealtime => {
            let var = next_var;
            next_var += 1;
            let half = Node::new(VAR_TYPE).with_param("var", f64::from(var));
            Some(BridgePair {
                control_node: half.clone(),
                control_port: "value".into(),
                realtime_node: half,
                realtime_port: "out".into(),
            })
        }
        CrossingDirection::RealtimeToControl => None,
    });

    match split {
        Ok((control, realtime)) => {
            tracing::debug!(
                bridges = next_var,
                control_nodes = control.node_count(),
                realtime_nodes = realtime.node_count(),
                "partitioned graph"
            );
            Ok((control, realtime))
        }
        Err(GraphError::UnsupportedCrossing { edge }) => {
            Err(CompileError::UnsupportedBridge { edge })
        }
        Err(err) => Err(err.into()),
    }
}
