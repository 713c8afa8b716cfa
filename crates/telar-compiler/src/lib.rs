//! Compile pipeline: graph in, realtime engine binary plus control half out.
//!
//! The pipeline is pure up to the final toolchain step:
//!
//! 1. partition — seed partition marks from the registry, propagate, split
//!    into control and realtime graph halves with `core/var` bridge pairs at
//!    the crossings.
//! 2. build — lower the realtime half into a flat [`RealtimeModel`].
//! 3. trim + schedule — drop unreachable nodes, order the rest.
//! 4. render — generate C source against the embedded JACK shell.
//! 5. toolchain — gcc the source into a temp-dir binary.
//!
//! [`lower`] runs steps 1–4 and is deterministic: the same graph always
//! yields byte-identical source. [`compile`] adds step 5.

mod builder;
mod partition;
mod render;
mod toolchain;

use telar_core::graph::{Edge, Graph, GraphError, NodeId};
use telar_core::model::RealtimeModel;
use telar_core::schedule::{self, ScheduleError};
use telar_nodes::{LowerError, NodeRegistry};

pub use toolchain::Executable;

/// Convenience alias for compile results.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Errors raised along the compile pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// A node references a type name the registry does not know.
    #[error("node '{node}' has unknown type '{type_name}'")]
    UnknownNodeType {
        /// The referencing node.
        node: NodeId,
        /// The unknown type name.
        type_name: String,
    },

    /// The realtime graph has no audio sink.
    #[error("graph has no output node")]
    NoOutput,

    /// The realtime graph has more than one audio sink.
    #[error("graph has more than one output node")]
    MultipleOutputs,

    /// A node without a realtime lowering ended up on the realtime side.
    #[error("node '{node}' of type '{type_name}' cannot run in the realtime process")]
    NotRealtime {
        /// The offending node.
        node: NodeId,
        /// Its type name.
        type_name: String,
    },

    /// An edge references a node or port that does not exist in the model.
    #[error("edge {edge} references an unknown node or port")]
    InvalidReference {
        /// The offending edge.
        edge: Edge,
    },

    /// A crossing spans the partition in an unbridgeable direction.
    #[error("cannot bridge realtime signal back to the control plane on edge {edge}")]
    UnsupportedBridge {
        /// The offending edge.
        edge: Edge,
    },

    /// A graph transform failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// No valid per-sample order exists.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// A node failed to lower through its registered type.
    #[error(transparent)]
    Lower(#[from] LowerError),

    /// The C compiler rejected the generated source.
    #[error("engine source failed to compile:\n{stderr}")]
    Toolchain {
        /// The compiler's stderr, verbatim.
        stderr: String,
    },

    /// Filesystem or process error while driving the toolchain.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The pure output of the pipeline, before the toolchain runs.
#[derive(Debug)]
pub struct CompiledProgram {
    /// The control-plane graph half, fed to the controller at runtime.
    pub control: Graph,
    /// The trimmed realtime model.
    pub model: RealtimeModel,
    /// Scheduled evaluation order, indices into `model.nodes`.
    pub schedule: Vec<usize>,
    /// Generated engine C source.
    pub source: String,
}

/// A fully compiled instrument, ready to run.
#[derive(Debug)]
pub struct CompiledInstrument {
    /// The pipeline output the binary was built from.
    pub program: CompiledProgram,
    /// The engine binary handle.
    pub executable: Executable,
}

/// Runs the pure pipeline: partition, lower, trim, schedule, render.
pub fn lower(registry: &NodeRegistry, graph: &Graph) -> Result<CompiledProgram> {
    tracing::info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "compiling graph"
    );

    let (control, realtime) = partition::partition(registry, graph)?;
    let model = builder::build_model(registry, &realtime)?;
    let model = schedule::trim_unreachable(&model);
    let order = schedule::schedule(&model)?;
    let source = render::render(&model, &order);

    Ok(CompiledProgram {
        control,
        model,
        schedule: order,
        source,
    })
}

/// Runs the full pipeline and builds the engine binary.
///
/// A failed compile has no side effects beyond its own temp dir, so a
/// running session can keep playing the previous instrument.
pub fn compile(registry: &NodeRegistry, graph: &Graph) -> Result<CompiledInstrument> {
    let program = lower(registry, graph)?;
    let executable = toolchain::build(&program.source)?;
    Ok(CompiledInstrument {
        program,
        executable,
    })
}
