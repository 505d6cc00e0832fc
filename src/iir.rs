/// IIR execution kernel - direct form I biquad step
///
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
/// ```
///
/// The kernel never clamps: bounded output relies on the designer only ever
/// producing stable coefficient sets.
use crate::filter_design::CoefficientSet;

/// Filter history (history buffers for IIR)
///
/// Owned by exactly one operation; never shared.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterState {
    pub x1: f64, // Input delayed by 1 sample
    pub x2: f64, // Input delayed by 2 samples
    pub y1: f64, // Output delayed by 1 sample
    pub y2: f64, // Output delayed by 2 samples
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_silent(&self) -> bool {
        self.x1 == 0.0 && self.x2 == 0.0 && self.y1 == 0.0 && self.y2 == 0.0
    }
}

/// Advance `state` by one sample and return the filtered output
#[inline]
pub fn step(coefficients: &CoefficientSet, state: &mut FilterState, input: f32) -> f32 {
    let x = input as f64;
    let mut y = coefficients.b0 * x + coefficients.b1 * state.x1 + coefficients.b2 * state.x2
        - coefficients.a1 * state.y1
        - coefficients.a2 * state.y2;

    // Flush subnormals so a decaying tail doesn't hit the slow path
    if y.abs() < f64::MIN_POSITIVE {
        y = 0.0;
    }

    state.x2 = state.x1;
    state.x1 = x;
    state.y2 = state.y1;
    state.y1 = y;

    y as f32
}

/// Run `step` over a whole buffer in place
pub fn process(coefficients: &CoefficientSet, state: &mut FilterState, buffer: &mut [f32]) {
    for sample in buffer.iter_mut() {
        *sample = step(coefficients, state, *sample);
    }
}
