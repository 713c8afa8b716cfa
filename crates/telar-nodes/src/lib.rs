//! Node type registry and catalog for the Telar synth compiler.
//!
//! Every node type a graph may reference is declared here, once, at process
//! start: its port/param shape (exported to editing tooling as the catalog),
//! its realtime lowering (params → C fragment templates, see [`realtime`]),
//! and its control-plane behavior (see [`control`]).
//!
//! The registry is an explicit value threaded through partition, model
//! building, and controller construction — never ambient global state. Types
//! are a fixed set of tagged entries dispatched by name lookup plus `match`;
//! there is no runtime registration.
//!
//! # Example
//!
//! ```rust
//! use telar_nodes::NodeRegistry;
//!
//! let registry = NodeRegistry::new();
//! for ty in registry.types() {
//!     println!("{}", ty.descriptor.name);
//! }
//! assert!(registry.get("wave/sine").is_some());
//! ```

pub mod biquad;
pub mod control;
pub mod realtime;

use serde::Serialize;
use telar_core::graph::Node;
use telar_core::model::RealtimeNodeDef;

pub use control::{ControlMsg, ControlState, MsgKind};
pub use realtime::ENGINE_SAMPLE_RATE;

/// Type name of the designated audio sink node.
pub const OUTPUT_TYPE: &str = "io/mono-output";

/// Type name of the bridge-variable node synthesized at partition crossings.
pub const VAR_TYPE: &str = "core/var";

/// Errors raised while lowering a node through its registered type.
#[derive(Debug, thiserror::Error)]
pub enum LowerError {
    /// A required numeric parameter is absent (or not a number).
    #[error("node type '{type_name}' requires numeric param '{param}'")]
    MissingParam {
        /// The node type.
        type_name: &'static str,
        /// The missing parameter.
        param: &'static str,
    },

    /// A parameter is present but out of range for the type.
    #[error("bad param '{param}' for node type '{type_name}': {reason}")]
    InvalidParam {
        /// The node type.
        type_name: &'static str,
        /// The offending parameter.
        param: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Parses and validates a `core/var` node's bridge variable index.
///
/// The index sizes the engine's shared variable table, so it must be a small
/// non-negative whole number.
pub fn bridge_var_index(node: &Node) -> Result<u32, LowerError> {
    let raw = node.number_param("var").ok_or(LowerError::MissingParam {
        type_name: VAR_TYPE,
        param: "var",
    })?;
    if raw < 0.0 || raw.fract() != 0.0 || raw >= f64::from(u32::MAX) {
        return Err(LowerError::InvalidParam {
            type_name: VAR_TYPE,
            param: "var",
            reason: "must be a non-negative whole number",
        });
    }
    Ok(raw as u32)
}

/// Declared value type of a port or parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    /// Continuous signal / floating point parameter.
    Real,
    /// Integer parameter.
    Int,
}

/// A named, typed port or parameter slot.
#[derive(Clone, Debug, Serialize)]
pub struct PortSpec {
    /// Port name.
    pub name: &'static str,
    /// Value type.
    #[serde(rename = "type")]
    pub ty: PortType,
}

const fn real(name: &'static str) -> PortSpec {
    PortSpec {
        name,
        ty: PortType::Real,
    }
}

const fn int(name: &'static str) -> PortSpec {
    PortSpec {
        name,
        ty: PortType::Int,
    }
}

/// Externally visible shape of a node type, consumed by editing tooling.
#[derive(Clone, Debug, Serialize)]
pub struct NodeDescriptor {
    /// Registered type name.
    pub name: &'static str,
    /// Input ports.
    pub inputs: Vec<PortSpec>,
    /// Output ports.
    pub outputs: Vec<PortSpec>,
    /// Constructor parameters.
    pub params: Vec<PortSpec>,
}

/// Partition constraint a node type imposes on its graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Must run in the realtime process.
    RealtimeOnly,
    /// Must run on the control plane.
    ControlOnly,
    /// May land on either side, decided by propagation.
    Flexible,
}

/// Realtime lowering: node params → C fragment templates.
pub type RealtimeLowering = fn(&Node) -> Result<RealtimeNodeDef, LowerError>;

/// Control-plane constructor: node params → initial [`ControlState`].
pub type ControlConstruct = fn(&Node) -> Result<ControlState, LowerError>;

/// One registered node type.
pub struct NodeType {
    /// Catalog entry.
    pub descriptor: NodeDescriptor,
    realtime: Option<RealtimeLowering>,
    control: Option<ControlConstruct>,
    class: Classification,
}

impl NodeType {
    /// The partition constraint for nodes of this type.
    pub fn classification(&self) -> Classification {
        self.class
    }

    /// Lowers a node of this type to its realtime definition, if the type
    /// supports realtime evaluation.
    pub fn lower_realtime(&self, node: &Node) -> Option<Result<RealtimeNodeDef, LowerError>> {
        self.realtime.map(|lower| lower(node))
    }

    /// Constructs control-plane state for a node of this type, if the type
    /// supports control evaluation.
    pub fn construct_control(&self, node: &Node) -> Option<Result<ControlState, LowerError>> {
        self.control.map(|construct| construct(node))
    }

    /// True if this type has a declared input port with the given name.
    pub fn has_input(&self, port: &str) -> bool {
        self.descriptor.inputs.iter().any(|p| p.name == port)
    }

    /// True if this type has a declared output port with the given name.
    pub fn has_output(&self, port: &str) -> bool {
        self.descriptor.outputs.iter().any(|p| p.name == port)
    }
}

/// Registry of all node types, constructed once and passed explicitly.
pub struct NodeRegistry {
    types: Vec<NodeType>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    /// Creates the registry with the full built-in catalog.
    pub fn new() -> Self {
        let mut registry = Self { types: Vec::new() };
        registry.register_builtin_types();
        registry
    }

    /// Looks up a type by name.
    pub fn get(&self, name: &str) -> Option<&NodeType> {
        self.types.iter().find(|t| t.descriptor.name == name)
    }

    /// Iterates all registered types in registration order.
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.iter()
    }

    /// The catalog as exported to editing tooling.
    pub fn catalog(&self) -> Vec<&NodeDescriptor> {
        self.types.iter().map(|t| &t.descriptor).collect()
    }

    fn register(
        &mut self,
        descriptor: NodeDescriptor,
        realtime: Option<RealtimeLowering>,
        control: Option<ControlConstruct>,
    ) {
        // Sole-lowering types are pinned to their side. Two exceptions: the
        // output sink has no lowering at all but only exists in the realtime
        // process, and `core/var` has no lowering here because the model
        // builder special-cases its realtime form.
        let class = match (realtime.is_some(), control.is_some()) {
            _ if descriptor.name == OUTPUT_TYPE => Classification::RealtimeOnly,
            _ if descriptor.name == VAR_TYPE => Classification::Flexible,
            (true, false) => Classification::RealtimeOnly,
            (false, true) => Classification::ControlOnly,
            _ => Classification::Flexible,
        };
        self.types.push(NodeType {
            descriptor,
            realtime,
            control,
            class,
        });
    }

    fn register_builtin_types(&mut self) {
        self.register(
            NodeDescriptor {
                name: OUTPUT_TYPE,
                inputs: vec![real("value")],
                outputs: vec![],
                params: vec![],
            },
            None,
            None,
        );

        self.register(
            NodeDescriptor {
                name: "core/constant",
                inputs: vec![],
                outputs: vec![real("value")],
                params: vec![real("value")],
            },
            Some(realtime::constant),
            Some(|node| {
                Ok(ControlState::Constant {
                    value: node.number_param("value").ok_or(LowerError::MissingParam {
                        type_name: "core/constant",
                        param: "value",
                    })?,
                })
            }),
        );

        // Both halves of a partition bridge share this type: the control
        // side latches values, the realtime side reads `vars[k]`. The model
        // builder special-cases the realtime form, so no lowering here.
        self.register(
            NodeDescriptor {
                name: VAR_TYPE,
                inputs: vec![real("value")],
                outputs: vec![real("out")],
                params: vec![int("var")],
            },
            None,
            Some(|node| {
                Ok(ControlState::Bridge {
                    var: bridge_var_index(node)?,
                    cell: 0.0,
                })
            }),
        );

        self.register(
            NodeDescriptor {
                name: "io/midi-cc",
                inputs: vec![],
                outputs: vec![real("value")],
                params: vec![int("cc-index")],
            },
            None,
            Some(|node| {
                let index = node.number_param("cc-index").ok_or(LowerError::MissingParam {
                    type_name: "io/midi-cc",
                    param: "cc-index",
                })?;
                Ok(ControlState::MidiCc { index: index as u8 })
            }),
        );

        self.register(
            NodeDescriptor {
                name: "io/midi-note",
                inputs: vec![],
                outputs: vec![real("note"), real("velocity"), real("gate")],
                params: vec![],
            },
            None,
            Some(|_| Ok(ControlState::MidiNote)),
        );

        self.register(
            NodeDescriptor {
                name: "wave/sine",
                inputs: vec![real("period")],
                outputs: vec![real("value")],
                params: vec![],
            },
            Some(realtime::sine),
            None,
        );

        self.register(
            NodeDescriptor {
                name: "wave/noise",
                inputs: vec![],
                outputs: vec![real("value")],
                params: vec![],
            },
            Some(realtime::noise),
            None,
        );

        self.register(
            NodeDescriptor {
                name: "envelope/speed",
                inputs: vec![real("value"), real("speed")],
                outputs: vec![real("out")],
                params: vec![],
            },
            Some(realtime::speed_envelope),
            None,
        );

        self.register(
            NodeDescriptor {
                name: "maths/add",
                inputs: vec![real("a"), real("b")],
                outputs: vec![real("value")],
                params: vec![],
            },
            Some(realtime::add),
            Some(|_| Ok(ControlState::Add { a: 0.0, b: 0.0 })),
        );

        self.register(
            NodeDescriptor {
                name: "maths/mul",
                inputs: vec![real("a"), real("b")],
                outputs: vec![real("value")],
                params: vec![],
            },
            Some(realtime::mul),
            Some(|_| Ok(ControlState::Mul { a: 0.0, b: 0.0 })),
        );

        self.register(
            NodeDescriptor {
                name: "delay/int",
                inputs: vec![real("in")],
                outputs: vec![real("out")],
                params: vec![int("delay")],
            },
            Some(realtime::delay),
            None,
        );

        self.register(
            NodeDescriptor {
                name: "filter/dc",
                inputs: vec![real("in")],
                outputs: vec![real("out")],
                params: vec![],
            },
            Some(realtime::dc_blocker),
            None,
        );

        self.register(
            NodeDescriptor {
                name: "filter/avg-lowpass",
                inputs: vec![real("in")],
                outputs: vec![real("out")],
                params: vec![],
            },
            Some(realtime::avg_lowpass),
            None,
        );

        self.register(
            NodeDescriptor {
                name: "filter/biquad-lowpass",
                inputs: vec![real("in")],
                outputs: vec![real("out")],
                params: vec![real("f"), real("q")],
            },
            Some(realtime::biquad_lowpass),
            None,
        );

        self.register(
            NodeDescriptor {
                name: "filter/biquad-hipass",
                inputs: vec![real("in")],
                outputs: vec![real("out")],
                params: vec![real("f"), real("q")],
            },
            Some(realtime::biquad_hipass),
            None,
        );
    }
}
