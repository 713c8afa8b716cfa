//! Wire protocol between the controller and the realtime process.
//!
//! Both directions are newline-framed text. The engine reports events as
//! one JSON object per stdout line; the controller sends plain-text
//! commands on stdin. Unknown or malformed event lines are dropped by the
//! session reader, never fatal — a wedged engine is still killable.

use std::fmt;

use serde::Deserialize;

/// One event line from the engine's stdout.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "msg", rename_all = "lowercase")]
pub enum EngineEvent {
    /// Emitted once, after the engine has connected to JACK.
    Start {
        /// The JACK server's sample rate.
        sample_rate: u32,
    },
    /// An incoming MIDI event forwarded by the engine.
    Midi(MidiEvent),
}

/// MIDI event payload, tagged by `type`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum MidiEvent {
    /// Continuous controller change.
    #[serde(rename = "cc")]
    ControlChange {
        /// MIDI channel.
        channel: u8,
        /// Controller index.
        controller: u8,
        /// Controller value, 0–127.
        value: u8,
    },
    /// Key pressed.
    #[serde(rename = "note-down")]
    NoteDown {
        /// MIDI channel.
        channel: u8,
        /// Note number.
        note: u8,
        /// Key velocity, 0–127.
        velocity: u8,
    },
    /// Key released.
    #[serde(rename = "note-up")]
    NoteUp {
        /// MIDI channel.
        channel: u8,
        /// Note number.
        note: u8,
        /// Release velocity.
        velocity: u8,
    },
    /// Any subtype this controller does not understand (sysex and friends).
    #[serde(other)]
    Unknown,
}

/// One command line on the engine's stdin.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Write one shared variable.
    Set {
        /// Variable table index.
        var: u32,
        /// New value.
        value: f64,
    },
    /// Open the audio gate; sent once the variable table is primed.
    Start,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Set { var, value } => write!(f, "set {var} {value}"),
            Command::Start => f.write_str("start"),
        }
    }
}
