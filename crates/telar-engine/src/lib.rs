//! Runtime bridge between the control plane and the realtime process.
//!
//! A compiled instrument runs as two cooperating halves: the generated
//! engine binary doing per-sample work under JACK, and the in-process
//! [`Controller`] evaluating the control graph as discrete jobs. This crate
//! owns everything between them:
//!
//! - [`protocol`] — the newline-framed wire format (JSON events out of the
//!   engine, plain-text commands into it)
//! - [`Session`] — engine process lifecycle, pipe readers, exit semantics
//! - [`Controller`] — the control-plane job VM feeding bridge variables
//! - [`swap`] — stop-then-start replacement, never two engines at once
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use telar_engine::{Controller, Session};
//! use telar_nodes::NodeRegistry;
//!
//! # fn main() -> telar_engine::Result<()> {
//! let registry = NodeRegistry::new();
//! # let graph = telar_core::graph::Graph::new();
//! # let binary = "/tmp/engine";
//! let mut controller = Controller::from_graph(&registry, &graph)?;
//! let mut session = Session::new(binary);
//! session.start()?;
//!
//! while let Some(event) = session.wait_event(Duration::from_millis(100))? {
//!     for command in controller.on_event(&event) {
//!         session.send(&command)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod protocol;

mod controller;
mod session;

use telar_core::graph::NodeId;
use telar_nodes::LowerError;

pub use controller::Controller;
pub use protocol::{Command, EngineEvent, MidiEvent};
pub use session::{Session, swap};

/// Convenience alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the runtime bridge.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A node without a control behavior ended up in the control graph.
    #[error("node '{node}' of type '{type_name}' cannot run on the control plane")]
    NotControllable {
        /// The offending node.
        node: NodeId,
        /// Its type name.
        type_name: String,
    },

    /// A control node failed to construct from its parameters.
    #[error(transparent)]
    Lower(#[from] LowerError),

    /// The engine process exited with a failure code.
    #[error("engine process exited with code {code}")]
    EngineExited {
        /// The exit code.
        code: i32,
    },

    /// An operation was attempted in the wrong session state.
    #[error("session cannot {operation} in its current state")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
    },

    /// Pipe or process I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
