//! Dead-node elimination and per-sample evaluation ordering.
//!
//! The scheduler flattens a [`RealtimeModel`] into a single linear node order
//! executed once per audio sample. The ordering constraint is asymmetric:
//!
//! - a **direct** consumer needs its producers' fresh values this sample, so
//!   every producer must appear earlier in the schedule;
//! - a **buffered** consumer (`direct == false`) reads last sample's stored
//!   state regardless of position, so its producers may appear anywhere.
//!
//! That asymmetry is what makes feedback loops through delay lines
//! executable: the loop is broken at the buffered node, and the delay's
//! epilogue commits this sample's input only after every direct consumer has
//! read the pre-update output.
//!
//! A cycle composed entirely of direct consumers has no valid order and is
//! reported as [`ScheduleError::DirectCycle`] rather than looping forever.

use std::collections::BTreeSet;

use crate::model::RealtimeModel;

/// Errors raised while ordering the realtime model.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// A dependency cycle passes exclusively through direct nodes, so no
    /// linear per-sample order exists. Insert a buffered node (e.g. a delay)
    /// to break the loop.
    #[error("direct dependency cycle through node {node}")]
    DirectCycle {
        /// Stable model id of a node on the cycle.
        node: u32,
    },
}

/// Removes nodes whose outputs never (transitively) reach the sink set.
///
/// Liveness is computed backwards from the sink: a node survives if one of
/// its outputs feeds the sink or an input of another surviving node. Pure
/// reachability — node state and side-effect-free fragments of dead nodes
/// are simply dropped.
pub fn trim_unreachable(model: &RealtimeModel) -> RealtimeModel {
    let live = model.live_ports();
    let (kept, dropped): (Vec<_>, Vec<_>) = model
        .nodes
        .iter()
        .cloned()
        .partition(|node| node.outputs.values().any(|p| live.contains(p)));

    if !dropped.is_empty() {
        tracing::debug!(
            dropped = dropped.len(),
            kept = kept.len(),
            "trimmed unreachable realtime nodes"
        );
    }

    RealtimeModel {
        nodes: kept,
        ..model.clone()
    }
}

/// Computes the per-sample evaluation order as indices into `model.nodes`.
///
/// Depth-first, terminate-late: each node is pushed followed by the subtree
/// of its *direct* consumers; the combined sequence is then deduplicated
/// keeping the latest occurrence of every node. A node therefore lands
/// before all direct consumers of its outputs, while buffered consumers
/// float free of their producers.
pub fn schedule(model: &RealtimeModel) -> Result<Vec<usize>, ScheduleError> {
    let consumers = direct_consumers(model);

    let mut visit_order = Vec::new();
    let mut on_path = vec![false; model.nodes.len()];
    for start in 0..model.nodes.len() {
        push_with_consumers(model, &consumers, start, &mut on_path, &mut visit_order)?;
    }

    // Keep the latest occurrence of each node: reverse, dedup on first
    // sighting, reverse back.
    let mut seen = BTreeSet::new();
    let mut order: Vec<usize> = visit_order
        .into_iter()
        .rev()
        .filter(|&idx| seen.insert(idx))
        .collect();
    order.reverse();
    Ok(order)
}

/// For each node index, the indices of direct nodes consuming its outputs.
fn direct_consumers(model: &RealtimeModel) -> Vec<Vec<usize>> {
    model
        .nodes
        .iter()
        .map(|producer| {
            let outputs: BTreeSet<_> = producer.outputs.values().copied().collect();
            model
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, consumer)| {
                    consumer.def.direct
                        && consumer
                            .inputs
                            .values()
                            .any(|sources| sources.iter().any(|src| outputs.contains(src)))
                })
                .map(|(idx, _)| idx)
                .collect()
        })
        .collect()
}

fn push_with_consumers(
    model: &RealtimeModel,
    consumers: &[Vec<usize>],
    idx: usize,
    on_path: &mut [bool],
    out: &mut Vec<usize>,
) -> Result<(), ScheduleError> {
    if on_path[idx] {
        return Err(ScheduleError::DirectCycle {
            node: model.nodes[idx].id,
        });
    }

    on_path[idx] = true;
    out.push(idx);
    for &consumer in &consumers[idx] {
        push_with_consumers(model, consumers, consumer, on_path, out)?;
    }
    on_path[idx] = false;
    Ok(())
}
