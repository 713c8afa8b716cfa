//! Realtime lowerings: node params → C fragment templates.
//!
//! Each lowering turns one graph node into a [`RealtimeNodeDef`]: up to four
//! C fragments (`storage`, `init`, `process`, `process_epilogue`) with
//! `%%key%%` placeholders left for the code generator to fill in. Parameter
//! values are baked into the text here, at lowering time; only the per-node
//! `%%id%%` and the port names stay symbolic.
//!
//! The fragments assume the engine shell from `telar-compiler`: a `vars[]`
//! table in scope, `<math.h>` available, and the process fragments inlined
//! into a function returning one `double` per call.

use telar_core::graph::Node;
use telar_core::model::RealtimeNodeDef;

use crate::{LowerError, biquad};

/// Effective per-sample rate of the generated engine loop.
///
/// The shell calls the process routine four times per JACK frame at the
/// engine's 14.4 kHz base clock, so time constants are designed against
/// 4 × 14400 = 57600 Hz.
pub const ENGINE_SAMPLE_RATE: f64 = 57600.0;

/// Pre-generated noise table length: four seconds at 44.1 kHz.
const NOISE_BUFFER_LEN: usize = 44100 * 4;

/// Formats an `f64` as a C double literal (shortest round-trip form).
fn c_f64(value: f64) -> String {
    format!("{value:?}")
}

fn require_number(node: &Node, ty: &'static str, param: &'static str) -> Result<f64, LowerError> {
    node.number_param(param).ok_or(LowerError::MissingParam {
        type_name: ty,
        param,
    })
}

pub(crate) fn constant(node: &Node) -> Result<RealtimeNodeDef, LowerError> {
    let value = require_number(node, "core/constant", "value")?;
    Ok(RealtimeNodeDef {
        outputs: vec!["value".into()],
        process: Some(format!("double %%value%% = {};", c_f64(value))),
        direct: true,
        ..RealtimeNodeDef::default()
    })
}

pub(crate) fn sine(_node: &Node) -> Result<RealtimeNodeDef, LowerError> {
    Ok(RealtimeNodeDef {
        inputs: vec!["period".into()],
        outputs: vec!["value".into()],
        storage: Some("static double %%id%%_tick;".into()),
        init: Some("%%id%%_tick = 0;".into()),
        process: Some(format!(
            "%%id%%_tick += (M_PI * %%period%%) / {rate};\n\
             if (%%id%%_tick > M_PI * 2) %%id%%_tick -= M_PI * 2;\n\
             double %%value%% = sin(%%id%%_tick) * 0.04;",
            rate = c_f64(ENGINE_SAMPLE_RATE),
        )),
        direct: true,
        ..RealtimeNodeDef::default()
    })
}

pub(crate) fn noise(_node: &Node) -> Result<RealtimeNodeDef, LowerError> {
    Ok(RealtimeNodeDef {
        outputs: vec!["value".into()],
        storage: Some("static int %%id%%_tick;\nstatic double *%%id%%_buffer;".into()),
        init: Some(format!(
            "%%id%%_tick = 0;\n\
             %%id%%_buffer = (double*) calloc(sizeof(double), {len});\n\
             for (int i = 0; i < {len}; i++) %%id%%_buffer[i] = ((double) rand()) / RAND_MAX * 2.0 - 1.0;",
            len = NOISE_BUFFER_LEN,
        )),
        process: Some(format!(
            "%%id%%_tick = (%%id%%_tick + 1) % {len};\n\
             double %%value%% = %%id%%_buffer[%%id%%_tick];",
            len = NOISE_BUFFER_LEN,
        )),
        direct: true,
        ..RealtimeNodeDef::default()
    })
}

pub(crate) fn speed_envelope(_node: &Node) -> Result<RealtimeNodeDef, LowerError> {
    Ok(RealtimeNodeDef {
        inputs: vec!["value".into(), "speed".into()],
        outputs: vec!["out".into()],
        storage: Some("static double %%id%%_value;".into()),
        init: Some("%%id%%_value = 0;".into()),
        process: Some(format!(
            "double %%id%%_diff = %%value%% - %%id%%_value;\n\
             double %%id%%_speed = %%speed%% / {rate};\n\
             if (fabs(%%id%%_diff) < %%id%%_speed) %%id%%_value = %%value%%;\n\
             else %%id%%_value += copysign(%%id%%_speed, %%id%%_diff);\n\
             double %%out%% = %%id%%_value;",
            rate = c_f64(ENGINE_SAMPLE_RATE),
        )),
        direct: true,
        ..RealtimeNodeDef::default()
    })
}

pub(crate) fn add(_node: &Node) -> Result<RealtimeNodeDef, LowerError> {
    Ok(RealtimeNodeDef {
        inputs: vec!["a".into(), "b".into()],
        outputs: vec!["value".into()],
        process: Some("double %%value%% = %%a%% + %%b%%;".into()),
        direct: true,
        ..RealtimeNodeDef::default()
    })
}

pub(crate) fn mul(_node: &Node) -> Result<RealtimeNodeDef, LowerError> {
    Ok(RealtimeNodeDef {
        inputs: vec!["a".into(), "b".into()],
        outputs: vec!["value".into()],
        process: Some("double %%value%% = %%a%% * %%b%%;".into()),
        direct: true,
        ..RealtimeNodeDef::default()
    })
}

pub(crate) fn delay(node: &Node) -> Result<RealtimeNodeDef, LowerError> {
    let raw = require_number(node, "delay/int", "delay")?;
    if raw < 1.0 || raw.fract() != 0.0 {
        return Err(LowerError::InvalidParam {
            type_name: "delay/int",
            param: "delay",
            reason: "must be a positive whole number of samples",
        });
    }
    let samples = raw as u64;

    // Reads the pre-update buffer slot during process; commits this sample's
    // input in the epilogue, after all direct consumers have read it.
    Ok(RealtimeNodeDef {
        inputs: vec!["in".into()],
        outputs: vec!["out".into()],
        storage: Some(format!(
            "static int %%id%%_tick;\nstatic double %%id%%_buffer[{samples}];"
        )),
        init: Some(format!(
            "%%id%%_tick = 0;\nfor (int i = 0; i < {samples}; i++) %%id%%_buffer[i] = 0;"
        )),
        process: Some("double %%out%% = %%id%%_buffer[%%id%%_tick];".into()),
        process_epilogue: Some(format!(
            "%%id%%_buffer[%%id%%_tick] = %%in%%;\n\
             %%id%%_tick = (%%id%%_tick + 1) % {samples};"
        )),
        direct: false,
        ..RealtimeNodeDef::default()
    })
}

pub(crate) fn dc_blocker(_node: &Node) -> Result<RealtimeNodeDef, LowerError> {
    let alpha = 0.995;
    Ok(RealtimeNodeDef {
        inputs: vec!["in".into()],
        outputs: vec!["out".into()],
        storage: Some("static double %%id%%_prev;".into()),
        init: Some("%%id%%_prev = 0;".into()),
        process: Some(format!(
            "double %%out%% = %%in%% + {a} * %%id%%_prev;\n\
             %%id%%_prev = %%out%% - %%id%%_prev;",
            a = c_f64(alpha),
        )),
        direct: true,
        ..RealtimeNodeDef::default()
    })
}

pub(crate) fn avg_lowpass(_node: &Node) -> Result<RealtimeNodeDef, LowerError> {
    let alpha = 0.9997;
    Ok(RealtimeNodeDef {
        inputs: vec!["in".into()],
        outputs: vec!["out".into()],
        storage: Some("static double %%id%%_prev;".into()),
        init: Some("%%id%%_prev = 0;".into()),
        process: Some(format!(
            "double %%out%% = {one_minus} * %%in%% + {a} * %%id%%_prev;\n\
             %%id%%_prev = %%out%%;",
            one_minus = c_f64(1.0 - alpha),
            a = c_f64(alpha),
        )),
        direct: true,
        ..RealtimeNodeDef::default()
    })
}

pub(crate) fn biquad_lowpass(node: &Node) -> Result<RealtimeNodeDef, LowerError> {
    let f = require_number(node, "filter/biquad-lowpass", "f")?;
    let q = require_number(node, "filter/biquad-lowpass", "q")?;
    Ok(biquad_def(biquad::lowpass(f, q, ENGINE_SAMPLE_RATE)))
}

pub(crate) fn biquad_hipass(node: &Node) -> Result<RealtimeNodeDef, LowerError> {
    let f = require_number(node, "filter/biquad-hipass", "f")?;
    let q = require_number(node, "filter/biquad-hipass", "q")?;
    Ok(biquad_def(biquad::hipass(f, q, ENGINE_SAMPLE_RATE)))
}

/// Shared direct-form-1 template; only the coefficients differ per design.
fn biquad_def(coeffs: biquad::BiquadCoeffs) -> RealtimeNodeDef {
    let [nb0, nb1, nb2, na1, na2] = coeffs.normalized();
    RealtimeNodeDef {
        inputs: vec!["in".into()],
        outputs: vec!["out".into()],
        storage: Some("static double %%id%%_x[2];\nstatic double %%id%%_y[2];".into()),
        process: Some(format!(
            "double %%out%% = {nb0} * %%in%% + {nb1} * %%id%%_x[1] + {nb2} * %%id%%_x[0]\n\
            \x20   - {na1} * %%id%%_y[1] - {na2} * %%id%%_y[0];",
            nb0 = c_f64(nb0),
            nb1 = c_f64(nb1),
            nb2 = c_f64(nb2),
            na1 = c_f64(na1),
            na2 = c_f64(na2),
        )),
        process_epilogue: Some(
            "%%id%%_x[0] = %%id%%_x[1];\n\
             %%id%%_x[1] = %%in%%;\n\
             %%id%%_y[0] = %%id%%_y[1];\n\
             %%id%%_y[1] = %%out%%;"
                .into(),
        ),
        direct: true,
        ..RealtimeNodeDef::default()
    }
}
