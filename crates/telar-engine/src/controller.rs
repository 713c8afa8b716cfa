//! Control-plane virtual machine.
//!
//! The controller mirrors the control graph half: one [`ControlState`] per
//! node plus the control edges. Engine events become jobs; jobs are drained
//! strictly in FIFO order, and a node emitting on an output port enqueues
//! one follow-up job per outgoing edge, addressed to the downstream port.
//! Everything is synchronous and single-threaded — determinism here is what
//! makes instrument behavior reproducible.
//!
//! After each drain the controller publishes the whole bridge variable
//! table as `set` commands and, after the very first drain, the one-shot
//! `start` command that opens the engine's audio gate.

use std::collections::{BTreeMap, VecDeque};

use telar_core::graph::{EdgeSource, Graph, NodeId};
use telar_nodes::{ControlMsg, ControlState, NodeRegistry};

use crate::protocol::{Command, EngineEvent, MidiEvent};
use crate::{EngineError, Result};

/// One queued unit of control work.
#[derive(Clone, Debug)]
struct Job {
    node: NodeId,
    /// Input port the job is addressed to; `None` for broadcast messages.
    target: Option<String>,
    msg: ControlMsg,
}

/// A control edge: `(from node, from port) -> (to node, to port)`.
type ControlEdge = (NodeId, String, NodeId, String);

/// The control-plane VM for one compiled instrument.
pub struct Controller {
    states: BTreeMap<NodeId, ControlState>,
    edges: Vec<ControlEdge>,
    queue: VecDeque<Job>,
    started: bool,
}

impl Controller {
    /// Builds the VM from the control graph half.
    ///
    /// Every node must have a control behavior in the registry. Literal edge
    /// sources are materialized as constant states that publish their value
    /// on init, just as the realtime builder materializes constant nodes.
    pub fn from_graph(registry: &NodeRegistry, graph: &Graph) -> Result<Self> {
        let mut states = BTreeMap::new();
        for (id, node) in graph.nodes() {
            let ty = registry
                .get(&node.type_name)
                .ok_or_else(|| EngineError::NotControllable {
                    node: id.clone(),
                    type_name: node.type_name.clone(),
                })?;
            let state = ty
                .construct_control(node)
                .ok_or_else(|| EngineError::NotControllable {
                    node: id.clone(),
                    type_name: node.type_name.clone(),
                })??;
            states.insert(id.clone(), state);
        }

        let mut edges: Vec<ControlEdge> = Vec::new();
        let mut literal_count = 0u32;
        for edge in graph.edges() {
            match &edge.from {
                EdgeSource::Port(from) => edges.push((
                    from.node.clone(),
                    from.port.clone(),
                    edge.to.node.clone(),
                    edge.to.port.clone(),
                )),
                EdgeSource::Literal(value) => {
                    let id = NodeId::new(format!("literal{literal_count}"));
                    literal_count += 1;
                    states.insert(id.clone(), ControlState::Constant { value: *value });
                    edges.push((id, "value".into(), edge.to.node.clone(), edge.to.port.clone()));
                }
            }
        }

        Ok(Self {
            states,
            edges,
            queue: VecDeque::new(),
            started: false,
        })
    }

    /// Feeds one engine event through the VM and returns the commands to
    /// send back to the realtime process.
    pub fn on_event(&mut self, event: &EngineEvent) -> Vec<Command> {
        let msg = match event {
            EngineEvent::Start { sample_rate } => {
                tracing::info!(sample_rate, "engine is up, initializing control nodes");
                ControlMsg::Init
            }
            EngineEvent::Midi(MidiEvent::ControlChange {
                controller, value, ..
            }) => ControlMsg::ControlChange {
                controller: *controller,
                value: *value,
            },
            EngineEvent::Midi(MidiEvent::NoteDown { note, velocity, .. }) => {
                ControlMsg::NoteDown {
                    note: *note,
                    velocity: *velocity,
                }
            }
            EngineEvent::Midi(MidiEvent::NoteUp { note, .. }) => {
                ControlMsg::NoteUp { note: *note }
            }
            EngineEvent::Midi(MidiEvent::Unknown) => {
                tracing::debug!("dropping unrecognized MIDI event");
                return Vec::new();
            }
        };

        let kind = msg.kind();
        for (id, state) in &self.states {
            if state.accepts(kind) {
                self.queue.push_back(Job {
                    node: id.clone(),
                    target: None,
                    msg: msg.clone(),
                });
            }
        }

        self.drain()
    }

    /// Runs the queue to exhaustion, then snapshots the bridge table.
    fn drain(&mut self) -> Vec<Command> {
        while let Some(job) = self.queue.pop_front() {
            let mut emitted: Vec<(String, ControlMsg)> = Vec::new();
            if let Some(state) = self.states.get_mut(&job.node) {
                state.handle(job.target.as_deref(), &job.msg, &mut |port, msg| {
                    emitted.push((port.to_string(), msg));
                });
            }

            for (port, msg) in emitted {
                let kind = msg.kind();
                for (from, from_port, to, to_port) in &self.edges {
                    if *from != job.node || *from_port != port {
                        continue;
                    }
                    let accepts = self
                        .states
                        .get(to)
                        .is_some_and(|state| state.accepts(kind));
                    if accepts {
                        self.queue.push_back(Job {
                            node: to.clone(),
                            target: Some(to_port.clone()),
                            msg: msg.clone(),
                        });
                    }
                }
            }
        }

        let mut commands: Vec<Command> = self
            .states
            .values()
            .filter_map(ControlState::bridge_var)
            .map(|(var, value)| Command::Set { var, value })
            .collect();

        if !self.started {
            self.started = true;
            commands.push(Command::Start);
        }
        commands
    }
}
