//! Core data structures and algorithms for the Telar synth compiler.
//!
//! This crate holds the pure, I/O-free half of the compile pipeline:
//!
//! - [`graph`] — the immutable graph IR the editor/front-end produces, with
//!   marking, partitioning, and subgraph-expansion transforms
//! - [`model`] — the lowered realtime model: flat node list, numbered signal
//!   ports, and the shared variable table exposed to the control plane
//! - [`schedule`] — dead-node elimination and the per-sample evaluation order
//!
//! Everything downstream (node catalog, C code generation, the realtime
//! process bridge) lives in the `telar-nodes`, `telar-compiler`, and
//! `telar-engine` crates.

pub mod graph;
pub mod model;
pub mod schedule;

pub use graph::{Edge, EdgeSource, Endpoint, Graph, GraphError, Mark, Node, NodeId, ParamValue};
pub use model::{ModelNode, PortId, RealtimeModel, RealtimeNodeDef};
pub use schedule::{ScheduleError, schedule, trim_unreachable};
