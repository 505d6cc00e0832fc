/// Butterworth second-order section design
///
/// Pure functions mapping (center frequency, bandwidth, sample rate) to the
/// coefficients of one biquad section. The formulas are the bilinear-transformed
/// second-order Butterworth band-reject and band-pass prototypes:
///
/// ```text
/// Band-reject:                          Band-pass:
///   c  = tan(π·bw/fs)                     c  = 1 / tan(π·bw/fs)
///   d  = 2·cos(2π·f/fs)                   d  = 2·cos(2π·f/fs)
///   b0 = 1/(1+c)                          b0 = 1/(1+c)
///   b1 = -d·b0                            b1 = 0
///   b2 = b0                               b2 = -b0
///   a1 = -d·b0                            a1 = -c·d·b0
///   a2 = (1-c)·b0                         a2 = (c-1)·b0
/// ```
///
/// Both denominators have their poles strictly inside the unit circle whenever
/// `0 < f < fs/2` and `0 < bw < fs/2`; the designer clamps the bandwidth so the
/// second condition always holds.
use crate::error::{Error, Result};
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Lowest quality factor (f / bw) a section is designed with. Reached exactly
/// when the bandwidth is twice the center frequency.
pub const MIN_Q: f64 = 0.5;

/// Upper bound on the effective bandwidth as a fraction of the sample rate
pub const MAX_BANDWIDTH_RATIO: f64 = 0.49;

/// Normalized second-order section (a0 = 1)
///
/// `y[n] = b0·x[n] + b1·x[n-1] + b2·x[n-2] - a1·y[n-1] - a2·y[n-2]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSet {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl CoefficientSet {
    /// Pass-through section (H(z) = 1)
    pub const IDENTITY: CoefficientSet = CoefficientSet {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Roots of `z² + a1·z + a2`
    pub fn poles(&self) -> [Complex<f64>; 2] {
        let half = -self.a1 / 2.0;
        let disc = self.a1 * self.a1 - 4.0 * self.a2;
        if disc < 0.0 {
            let im = (-disc).sqrt() / 2.0;
            [Complex::new(half, im), Complex::new(half, -im)]
        } else {
            let re = disc.sqrt() / 2.0;
            [Complex::new(half + re, 0.0), Complex::new(half - re, 0.0)]
        }
    }

    /// Largest pole radius
    pub fn pole_radius(&self) -> f64 {
        let [p1, p2] = self.poles();
        p1.norm().max(p2.norm())
    }

    /// All poles strictly inside the unit circle
    pub fn is_stable(&self) -> bool {
        self.pole_radius() < 1.0
    }

    /// |H(e^jω)| at `frequency` Hz
    pub fn magnitude_at(&self, frequency: f64, sample_rate: f64) -> f64 {
        let omega = 2.0 * PI * frequency / sample_rate;
        let z1 = Complex::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        let num = self.b0 + z1 * self.b1 + z2 * self.b2;
        let den = 1.0 + z1 * self.a1 + z2 * self.a2;
        (num / den).norm()
    }

    /// Magnitude in dB at `frequency` Hz
    pub fn gain_db_at(&self, frequency: f64, sample_rate: f64) -> f64 {
        20.0 * self.magnitude_at(frequency, sample_rate).max(1e-12).log10()
    }
}

impl Default for CoefficientSet {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<CoefficientSet> for biquad::Coefficients<f64> {
    fn from(set: CoefficientSet) -> Self {
        biquad::Coefficients {
            a1: set.a1,
            a2: set.a2,
            b0: set.b0,
            b1: set.b1,
            b2: set.b2,
        }
    }
}

fn validate(center_frequency: f64, bandwidth: f64, sample_rate: f64) -> Result<()> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(Error::invalid_parameter(
            "sample_rate",
            sample_rate,
            "must be a positive finite number",
        ));
    }
    if !center_frequency.is_finite() || center_frequency <= 0.0 {
        return Err(Error::invalid_parameter(
            "center_frequency",
            center_frequency,
            "must be a positive finite number",
        ));
    }
    if center_frequency >= sample_rate / 2.0 {
        return Err(Error::invalid_parameter(
            "center_frequency",
            center_frequency,
            "must be below the Nyquist frequency",
        ));
    }
    if !bandwidth.is_finite() || bandwidth <= 0.0 {
        return Err(Error::invalid_parameter(
            "bandwidth",
            bandwidth,
            "must be a positive finite number",
        ));
    }
    Ok(())
}

/// Bandwidth actually designed with: Q = f/bw clamped to [`MIN_Q`], then the
/// result limited to [`MAX_BANDWIDTH_RATIO`] of the sample rate.
pub fn effective_bandwidth(center_frequency: f64, bandwidth: f64, sample_rate: f64) -> f64 {
    let q = (center_frequency / bandwidth).max(MIN_Q);
    (center_frequency / q).min(MAX_BANDWIDTH_RATIO * sample_rate)
}

/// Design a Butterworth band-reject (notch) section
///
/// # Errors
/// `InvalidParameter` if the sample rate or bandwidth is not positive, or the
/// center frequency is not in `(0, sample_rate / 2)`.
pub fn design_band_reject(
    center_frequency: f64,
    bandwidth: f64,
    sample_rate: f64,
) -> Result<CoefficientSet> {
    validate(center_frequency, bandwidth, sample_rate)?;

    let bw = effective_bandwidth(center_frequency, bandwidth, sample_rate);
    let c = (PI * bw / sample_rate).tan();
    let d = 2.0 * (2.0 * PI * center_frequency / sample_rate).cos();
    let norm = 1.0 / (1.0 + c);

    Ok(CoefficientSet {
        b0: norm,
        b1: -d * norm,
        b2: norm,
        a1: -d * norm,
        a2: (1.0 - c) * norm,
    })
}

/// Design a Butterworth band-pass section (unity gain at the center frequency)
///
/// Validation and bandwidth clamping are identical to [`design_band_reject`].
pub fn design_band_pass(
    center_frequency: f64,
    bandwidth: f64,
    sample_rate: f64,
) -> Result<CoefficientSet> {
    validate(center_frequency, bandwidth, sample_rate)?;

    let bw = effective_bandwidth(center_frequency, bandwidth, sample_rate);
    let c = 1.0 / (PI * bw / sample_rate).tan();
    let d = 2.0 * (2.0 * PI * center_frequency / sample_rate).cos();
    let norm = 1.0 / (1.0 + c);

    Ok(CoefficientSet {
        b0: norm,
        b1: 0.0,
        b2: -norm,
        a1: -c * d * norm,
        a2: (c - 1.0) * norm,
    })
}
