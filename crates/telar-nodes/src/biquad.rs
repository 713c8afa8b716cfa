//! RBJ biquad coefficient design.
//!
//! Coefficients are computed at compile (lowering) time from the fixed
//! engine sample rate and the node's cutoff/Q parameters, then embedded in
//! the generated C as constants. Filter behavior is part of the compiler's
//! contract, so the formulas here are the standard Audio EQ Cookbook ones,
//! evaluated in `f64` exactly as written.

use std::f64::consts::PI;

/// Unnormalized biquad coefficient set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiquadCoeffs {
    /// Feed-forward coefficients.
    pub b0: f64,
    /// Feed-forward, one sample back.
    pub b1: f64,
    /// Feed-forward, two samples back.
    pub b2: f64,
    /// Feedback normalizer.
    pub a0: f64,
    /// Feedback, one sample back.
    pub a1: f64,
    /// Feedback, two samples back.
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Returns `[b0/a0, b1/a0, b2/a0, a1/a0, a2/a0]`, the ratios the
    /// generated difference equation multiplies by.
    pub fn normalized(&self) -> [f64; 5] {
        [
            self.b0 / self.a0,
            self.b1 / self.a0,
            self.b2 / self.a0,
            self.a1 / self.a0,
            self.a2 / self.a0,
        ]
    }
}

fn intermediates(f0: f64, q: f64, fs: f64) -> (f64, f64) {
    let w0 = 2.0 * PI * f0 / fs;
    let alpha = w0.sin() / (2.0 * q);
    (w0, alpha)
}

/// Lowpass design for cutoff `f0` and quality `q` at sample rate `fs`.
pub fn lowpass(f0: f64, q: f64, fs: f64) -> BiquadCoeffs {
    let (w0, alpha) = intermediates(f0, q, fs);
    BiquadCoeffs {
        b0: (1.0 - w0.cos()) / 2.0,
        b1: 1.0 - w0.cos(),
        b2: (1.0 - w0.cos()) / 2.0,
        a0: 1.0 + alpha,
        a1: -2.0 * w0.cos(),
        a2: 1.0 - alpha,
    }
}

/// Hipass design for cutoff `f0` and quality `q` at sample rate `fs`.
pub fn hipass(f0: f64, q: f64, fs: f64) -> BiquadCoeffs {
    let (w0, alpha) = intermediates(f0, q, fs);
    BiquadCoeffs {
        b0: (1.0 + w0.cos()) / 2.0,
        b1: -(1.0 + w0.cos()),
        b2: (1.0 + w0.cos()) / 2.0,
        a0: 1.0 + alpha,
        a1: -2.0 * w0.cos(),
        a2: 1.0 - alpha,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::ENGINE_SAMPLE_RATE;

    #[test]
    fn lowpass_matches_cookbook_formulas() {
        let fs = ENGINE_SAMPLE_RATE;
        let (f0, q) = (1000.0, 0.707);
        let c = lowpass(f0, q, fs);

        let w0 = 2.0 * PI * f0 / fs;
        let alpha = w0.sin() / (2.0 * q);
        assert_eq!(c.b0, (1.0 - w0.cos()) / 2.0);
        assert_eq!(c.b1, 1.0 - w0.cos());
        assert_eq!(c.b2, c.b0);
        assert_eq!(c.a0, 1.0 + alpha);
        assert_eq!(c.a1, -2.0 * w0.cos());
        assert_eq!(c.a2, 1.0 - alpha);
    }

    #[test]
    fn hipass_matches_cookbook_formulas() {
        let fs = ENGINE_SAMPLE_RATE;
        let (f0, q) = (250.0, 1.2);
        let c = hipass(f0, q, fs);

        let w0 = 2.0 * PI * f0 / fs;
        let alpha = w0.sin() / (2.0 * q);
        assert_eq!(c.b0, (1.0 + w0.cos()) / 2.0);
        assert_eq!(c.b1, -(1.0 + w0.cos()));
        assert_eq!(c.a0, 1.0 + alpha);
        assert_eq!(c.a2, 1.0 - alpha);
    }

    #[test]
    fn normalized_divides_through_by_a0() {
        let c = lowpass(500.0, 0.9, ENGINE_SAMPLE_RATE);
        let [nb0, nb1, nb2, na1, na2] = c.normalized();
        assert_eq!(nb0, c.b0 / c.a0);
        assert_eq!(nb1, c.b1 / c.a0);
        assert_eq!(nb2, c.b2 / c.a0);
        assert_eq!(na1, c.a1 / c.a0);
        assert_eq!(na2, c.a2 / c.a0);
    }

    #[test]
    fn same_inputs_reproduce_bit_identical_coefficients() {
        let a = lowpass(1234.5, 0.66, ENGINE_SAMPLE_RATE);
        let b = lowpass(1234.5, 0.66, ENGINE_SAMPLE_RATE);
        assert_eq!(a, b);
    }
}
