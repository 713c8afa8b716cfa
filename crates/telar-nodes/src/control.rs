//! Control-plane node behaviors.
//!
//! Control nodes execute as discrete jobs in the host process, not per
//! sample. Each node owns a [`ControlState`]; [`ControlState::handle`] is the
//! only place with observable side effects — it may emit messages on output
//! ports, which the controller fans out along control edges as new jobs.
//!
//! The behavior set is a closed enum dispatched by `match` (no dynamic
//! registration): the catalog is fixed at start-up, so open-ended dispatch
//! would only obscure the job routing.

/// A control-plane message, either arriving from the realtime process (via
/// the controller's event mapping) or emitted by another node.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlMsg {
    /// Session start; every accepting node gets one before anything else.
    Init,
    /// A plain value propagated along a control edge.
    Value {
        /// The propagated value.
        value: f64,
    },
    /// MIDI note pressed.
    NoteDown {
        /// MIDI note number.
        note: u8,
        /// Key velocity, 0–127.
        velocity: u8,
    },
    /// MIDI note released.
    NoteUp {
        /// MIDI note number.
        note: u8,
    },
    /// MIDI continuous controller change.
    ControlChange {
        /// Controller index.
        controller: u8,
        /// Controller value, 0–127.
        value: u8,
    },
}

impl ControlMsg {
    /// The message's kind, used for subscription filtering.
    pub fn kind(&self) -> MsgKind {
        match self {
            ControlMsg::Init => MsgKind::Init,
            ControlMsg::Value { .. } => MsgKind::Value,
            ControlMsg::NoteDown { .. } => MsgKind::NoteDown,
            ControlMsg::NoteUp { .. } => MsgKind::NoteUp,
            ControlMsg::ControlChange { .. } => MsgKind::ControlChange,
        }
    }
}

/// Message category, for declaring which messages a node type accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MsgKind {
    /// [`ControlMsg::Init`].
    Init,
    /// [`ControlMsg::Value`].
    Value,
    /// [`ControlMsg::NoteDown`].
    NoteDown,
    /// [`ControlMsg::NoteUp`].
    NoteUp,
    /// [`ControlMsg::ControlChange`].
    ControlChange,
}

/// Per-node control-plane state. Created once at controller start, mutated
/// only by [`handle`](Self::handle).
#[derive(Clone, Debug, PartialEq)]
pub enum ControlState {
    /// Emits its configured value on `value` when initialized.
    Constant {
        /// The constant value.
        value: f64,
    },
    /// Bridge sink: latches the last value written to it and exposes it as a
    /// shared realtime variable.
    Bridge {
        /// Bridge variable index shared with the realtime side.
        var: u32,
        /// Latched cell value.
        cell: f64,
    },
    /// Emits `value / 127` whenever its configured CC index changes.
    MidiCc {
        /// Subscribed controller index.
        index: u8,
    },
    /// Emits note number, velocity, and a gate on key events.
    MidiNote,
    /// Two-input sum; re-emits on every input change.
    Add {
        /// Latched `a` input.
        a: f64,
        /// Latched `b` input.
        b: f64,
    },
    /// Two-input product; re-emits on every input change.
    Mul {
        /// Latched `a` input.
        a: f64,
        /// Latched `b` input.
        b: f64,
    },
}

impl ControlState {
    /// Whether this node subscribes to messages of the given kind.
    pub fn accepts(&self, kind: MsgKind) -> bool {
        let kinds: &[MsgKind] = match self {
            ControlState::Constant { .. } => &[MsgKind::Init],
            ControlState::Bridge { .. } => &[MsgKind::Init, MsgKind::Value],
            ControlState::MidiCc { .. } => &[MsgKind::Init, MsgKind::ControlChange],
            ControlState::MidiNote => &[MsgKind::Init, MsgKind::NoteDown, MsgKind::NoteUp],
            ControlState::Add { .. } | ControlState::Mul { .. } => {
                &[MsgKind::Init, MsgKind::Value]
            }
        };
        kinds.contains(&kind)
    }

    /// Processes one job. `target` is the input port the job was addressed
    /// to (absent for broadcast messages like init and MIDI events); `emit`
    /// publishes a message on one of this node's output ports.
    pub fn handle(
        &mut self,
        target: Option<&str>,
        msg: &ControlMsg,
        emit: &mut dyn FnMut(&str, ControlMsg),
    ) {
        match self {
            ControlState::Constant { value } => {
                emit("value", ControlMsg::Value { value: *value });
            }

            ControlState::Bridge { cell, .. } => match msg {
                ControlMsg::Init => *cell = 0.0,
                ControlMsg::Value { value } => *cell = *value,
                _ => {}
            },

            ControlState::MidiCc { index } => {
                if let ControlMsg::ControlChange { controller, value } = msg
                    && controller == index
                {
                    emit(
                        "value",
                        ControlMsg::Value {
                            value: f64::from(*value) / 127.0,
                        },
                    );
                }
            }

            ControlState::MidiNote => match msg {
                ControlMsg::NoteDown { note, velocity } => {
                    emit("note", ControlMsg::Value { value: f64::from(*note) });
                    emit(
                        "velocity",
                        ControlMsg::Value {
                            value: f64::from(*velocity) / 127.0,
                        },
                    );
                    emit("gate", ControlMsg::Value { value: 1.0 });
                }
                ControlMsg::NoteUp { .. } => {
                    emit("gate", ControlMsg::Value { value: 0.0 });
                }
                _ => {}
            },

            ControlState::Add { a, b } => {
                if let ControlMsg::Value { value } = msg {
                    match target {
                        Some("a") => *a = *value,
                        Some("b") => *b = *value,
                        _ => {}
                    }
                }
                emit("value", ControlMsg::Value { value: *a + *b });
            }

            ControlState::Mul { a, b } => {
                if let ControlMsg::Value { value } = msg {
                    match target {
                        Some("a") => *a = *value,
                        Some("b") => *b = *value,
                        _ => {}
                    }
                }
                emit("value", ControlMsg::Value { value: *a * *b });
            }
        }
    }

    /// The bridge variable this node exposes, if any: `(index, value)`.
    pub fn bridge_var(&self) -> Option<(u32, f64)> {
        match self {
            ControlState::Bridge { var, cell } => Some((*var, *cell)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(state: &mut ControlState, target: Option<&str>, msg: &ControlMsg) -> Vec<(String, ControlMsg)> {
        let mut out = Vec::new();
        state.handle(target, msg, &mut |port, msg| out.push((port.to_string(), msg)));
        out
    }

    #[test]
    fn constant_emits_its_value_on_init() {
        let mut state = ControlState::Constant { value: 2.5 };
        let out = collect(&mut state, None, &ControlMsg::Init);
        assert_eq!(out, vec![("value".into(), ControlMsg::Value { value: 2.5 })]);
    }

    #[test]
    fn bridge_latches_values_and_resets_on_init() {
        let mut state = ControlState::Bridge { var: 3, cell: 0.0 };
        collect(&mut state, None, &ControlMsg::Value { value: 0.7 });
        assert_eq!(state.bridge_var(), Some((3, 0.7)));

        collect(&mut state, None, &ControlMsg::Init);
        assert_eq!(state.bridge_var(), Some((3, 0.0)));
    }

    #[test]
    fn bridge_emits_nothing() {
        let mut state = ControlState::Bridge { var: 0, cell: 0.0 };
        assert!(collect(&mut state, None, &ControlMsg::Value { value: 1.0 }).is_empty());
    }

    #[test]
    fn midi_cc_filters_on_controller_index() {
        let mut state = ControlState::MidiCc { index: 7 };

        let hit = collect(
            &mut state,
            None,
            &ControlMsg::ControlChange { controller: 7, value: 127 },
        );
        assert_eq!(hit, vec![("value".into(), ControlMsg::Value { value: 1.0 })]);

        let miss = collect(
            &mut state,
            None,
            &ControlMsg::ControlChange { controller: 8, value: 127 },
        );
        assert!(miss.is_empty());
    }

    #[test]
    fn midi_note_emits_note_velocity_and_gate() {
        let mut state = ControlState::MidiNote;
        let down = collect(&mut state, None, &ControlMsg::NoteDown { note: 60, velocity: 127 });
        assert_eq!(
            down,
            vec![
                ("note".into(), ControlMsg::Value { value: 60.0 }),
                ("velocity".into(), ControlMsg::Value { value: 1.0 }),
                ("gate".into(), ControlMsg::Value { value: 1.0 }),
            ]
        );

        let up = collect(&mut state, None, &ControlMsg::NoteUp { note: 60 });
        assert_eq!(up, vec![("gate".into(), ControlMsg::Value { value: 0.0 })]);
    }

    #[test]
    fn mul_latches_targets_and_emits_product() {
        let mut state = ControlState::Mul { a: 0.0, b: 0.0 };
        collect(&mut state, Some("a"), &ControlMsg::Value { value: 3.0 });
        let out = collect(&mut state, Some("b"), &ControlMsg::Value { value: 4.0 });
        assert_eq!(out, vec![("value".into(), ControlMsg::Value { value: 12.0 })]);
    }

    #[test]
    fn add_emits_current_sum_even_on_init() {
        let mut state = ControlState::Add { a: 1.0, b: 2.0 };
        let out = collect(&mut state, None, &ControlMsg::Init);
        assert_eq!(out, vec![("value".into(), ControlMsg::Value { value: 3.0 })]);
    }

    #[test]
    fn subscriptions_match_behavior() {
        assert!(ControlState::MidiCc { index: 0 }.accepts(MsgKind::ControlChange));
        assert!(!ControlState::MidiCc { index: 0 }.accepts(MsgKind::NoteDown));
        assert!(ControlState::Bridge { var: 0, cell: 0.0 }.accepts(MsgKind::Value));
        assert!(ControlState::MidiNote.accepts(MsgKind::NoteUp));
    }
}
