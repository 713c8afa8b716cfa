//! Immutable graph IR for the Telar compile pipeline.
//!
//! A [`Graph`] is a persistent value: every transform (`with_node`,
//! `mark_forwards`, [`partition`](Graph::partition), …) returns a new graph
//! and never mutates in place. Partition and scheduling stay pure functions,
//! and intermediate graphs can be kept around for debugging or replay.
//! Structural sharing is not attempted — graphs are small enough that a full
//! copy per transform is cheap.
//!
//! Nodes live in a `BTreeMap` and edges in a `BTreeSet`, so iteration order
//! is fixed by the ids themselves. Every downstream stage (bridge variable
//! numbering, port numbering, code generation) inherits that determinism:
//! compiling the same graph twice produces byte-identical output.
//!
//! # Marks and partitioning
//!
//! Nodes accumulate [`Mark`]s during classification. [`Graph::mark_forwards`]
//! and [`Graph::mark_backwards`] propagate a mark along (reversed) edge
//! direction as a transitive closure; [`Graph::partition`] then splits the
//! graph in two, synthesizing a bridge node pair for every crossing edge.

mod ir;
mod partition;
mod raw;

pub use ir::{Edge, EdgeSource, Endpoint, Graph, GraphError, Mark, Node, NodeId, ParamValue};
pub use partition::{BridgePair, CrossingDirection};
pub use raw::{RawEdge, RawEdgeSource, RawGraph, RawId, RawNode, RawParam};
