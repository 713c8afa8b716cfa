//! Lowered realtime model: flat nodes, numbered ports, shared variables.
//!
//! The model is what the scheduler and code generator operate on. Each node
//! carries a [`RealtimeNodeDef`] — the four C fragment templates its type
//! lowered to — plus resolved port wiring:
//!
//! - every **output** port gets a globally unique [`PortId`] (these become
//!   `double pN` locals in the generated process routine)
//! - every **input** port holds a *source set* of output port ids; multiple
//!   writers to one input are legal and sum at that port during codegen
//! - the designated `out` sink is itself a source set
//!
//! The variable table (`vars[N]` in the generated C) is the single mutable
//! cell shared with the control plane; [`RealtimeModel::add_variable`] wires
//! one slot of it into the signal graph.

use std::collections::BTreeMap;

/// Globally unique output port number within one model.
pub type PortId = u32;

/// Lowered form of one realtime node type instance.
///
/// The four fragments are C text with `%%key%%` placeholders. Recognized
/// keys: `id` (unique per-node identifier), each input port name (replaced
/// with the port-sum expression), each output port name (replaced with the
/// output's `pN` local), and each entry of `params`.
///
/// `direct == false` marks a buffered node: its output this sample comes
/// from stored history, not this sample's inputs, so consumers impose no
/// same-sample ordering on its producers. Delay lines use this to make
/// feedback loops schedulable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RealtimeNodeDef {
    /// Input port names, in declaration order.
    pub inputs: Vec<String>,
    /// Output port names, in declaration order.
    pub outputs: Vec<String>,
    /// Extra substitution values (parameter name → rendered text).
    pub params: BTreeMap<String, String>,
    /// Static storage declarations, emitted once per node.
    pub storage: Option<String>,
    /// One-time initialization code.
    pub init: Option<String>,
    /// Per-sample process code.
    pub process: Option<String>,
    /// Per-sample epilogue, run after every node's process step.
    pub process_epilogue: Option<String>,
    /// Whether this sample's output depends on this sample's inputs.
    pub direct: bool,
}

impl RealtimeNodeDef {
    /// Definition of a constant source with the given value.
    fn constant(value: f64) -> Self {
        Self {
            outputs: vec!["out".into()],
            params: [("value".to_string(), format!("{value:?}"))].into(),
            process: Some("double %%out%% = %%value%%;".into()),
            direct: true,
            ..Self::default()
        }
    }

    /// Definition of a shared-variable read.
    ///
    /// This is the only lowering `core/var` ever gets: read the current
    /// value of `vars[k]`, with `k` taken from the node's own parameter.
    fn variable(var: u32, initial: f64) -> Self {
        Self {
            outputs: vec!["out".into()],
            params: [
                ("var".to_string(), var.to_string()),
                ("value".to_string(), format!("{initial:?}")),
            ]
            .into(),
            init: Some("vars[%%var%%] = %%value%%;".into()),
            process: Some("double %%out%% = vars[%%var%%];".into()),
            direct: true,
            ..Self::default()
        }
    }
}

/// A node instance in the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelNode {
    /// Stable per-model node number (survives dead-node trimming).
    pub id: u32,
    /// The lowered definition.
    pub def: RealtimeNodeDef,
    /// Source sets per input port name.
    pub inputs: BTreeMap<String, Vec<PortId>>,
    /// Assigned port id per output port name.
    pub outputs: BTreeMap<String, PortId>,
}

impl ModelNode {
    /// Returns true if any of this node's outputs is in `used`.
    fn feeds(&self, used: &std::collections::BTreeSet<PortId>) -> bool {
        self.outputs.values().any(|p| used.contains(p))
    }
}

/// The complete lowered realtime program, before and after scheduling.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RealtimeModel {
    /// All nodes, in creation order.
    pub nodes: Vec<ModelNode>,
    /// Source set feeding the audio sink; summed for the final return value.
    pub out: Vec<PortId>,
    /// Size of the shared variable table.
    pub var_count: u32,
    pub(crate) next_port: PortId,
    pub(crate) next_id: u32,
}

impl RealtimeModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiates a node from its lowered definition. Returns the node's
    /// index in [`nodes`](Self::nodes).
    pub fn add_node(&mut self, def: RealtimeNodeDef) -> usize {
        let id = self.next_id;
        self.next_id += 1;

        let inputs = def.inputs.iter().map(|name| (name.clone(), Vec::new())).collect();
        let outputs = def
            .outputs
            .iter()
            .map(|name| {
                let port = self.next_port;
                self.next_port += 1;
                (name.clone(), port)
            })
            .collect();

        self.nodes.push(ModelNode {
            id,
            def,
            inputs,
            outputs,
        });
        self.nodes.len() - 1
    }

    /// Materializes an inline literal as a constant node.
    pub fn add_constant(&mut self, value: f64) -> usize {
        self.add_node(RealtimeNodeDef::constant(value))
    }

    /// Adds a shared-variable read node for slot `var`, growing the variable
    /// table as needed.
    pub fn add_variable(&mut self, var: u32, initial: f64) -> usize {
        self.var_count = self.var_count.max(var + 1);
        self.add_node(RealtimeNodeDef::variable(var, initial))
    }

    /// Looks up the output port id `(node index, port name)` resolves to.
    pub fn output_port(&self, node: usize, port: &str) -> Option<PortId> {
        self.nodes.get(node)?.outputs.get(port).copied()
    }

    /// Attaches an output port to a node's input source set.
    ///
    /// Returns false if the input port does not exist on the node.
    #[must_use]
    pub fn connect(&mut self, from: PortId, node: usize, input: &str) -> bool {
        match self.nodes.get_mut(node).and_then(|n| n.inputs.get_mut(input)) {
            Some(sources) => {
                sources.push(from);
                true
            }
            None => false,
        }
    }

    /// Attaches an output port to the audio sink.
    pub fn connect_out(&mut self, from: PortId) {
        self.out.push(from);
    }

    /// Returns all output port ids read by surviving nodes or the sink,
    /// computed transitively backwards from the sink set.
    pub(crate) fn live_ports(&self) -> std::collections::BTreeSet<PortId> {
        let mut used: std::collections::BTreeSet<PortId> = self.out.iter().copied().collect();
        loop {
            let before = used.len();
            for node in &self.nodes {
                if node.feeds(&used) {
                    for sources in node.inputs.values() {
                        used.extend(sources.iter().copied());
                    }
                }
            }
            if used.len() == before {
                return used;
            }
        }
    }
}
