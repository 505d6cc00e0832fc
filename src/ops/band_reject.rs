/// Band-reject (notch) Butterworth filter operation
///
/// A second-order Butterworth band-reject section. Frequencies within roughly
/// `center_frequency ± bandwidth/2` are attenuated; the response is maximally
/// flat on either side of the stop band.
///
/// # Inputs
/// - `input`: signal to filter (audio-rate reference, required)
/// - `center_frequency`: Hz, control-rate, default 3000
/// - `bandwidth`: Hz, control-rate, default 2000
///
/// Coefficients are redesigned only on control ticks, and only when the
/// center frequency or bandwidth actually changed. While the held values are
/// out of range every tick returns `InvalidParameter`.
use crate::config::{EngineConfig, FilterDefaults};
use crate::error::Result;
use crate::filter_design::{design_band_reject, CoefficientSet};
use crate::iir::{self, FilterState};
use crate::operation::{InputFrame, Operation, OperationId, TickContext};
use crate::ops::Patch;
use crate::parameter::{Bindings, InputSpec, IntoParameter, Parameter};
use std::any::Any;

pub const INPUT: &str = "input";
pub const CENTER_FREQUENCY: &str = "center_frequency";
pub const BANDWIDTH: &str = "bandwidth";

/// Band-reject Butterworth filter with control-rate center frequency and bandwidth
///
/// # Example
/// ```ignore
/// let osc = graph.add(Oscillator::sine(3000.0))?;
/// let notch = graph.add(BandRejectButterworth::patch(osc).bandwidth(500.0))?;
/// graph.set_output(notch)?;
/// ```
pub struct BandRejectButterworth {
    specs: [InputSpec; 3],
    coefficients: CoefficientSet,
    state: FilterState,
    /// (center, bandwidth, sample rate) of the cached coefficients
    designed_for: Option<(f32, f32, f32)>,
    /// Held values failed their last design; every tick errors until fixed
    rejected: bool,
    coefficient_updates: u64,
}

impl BandRejectButterworth {
    /// Filter using the documented defaults (3000 Hz, 2000 Hz)
    pub fn new() -> Self {
        Self::with_defaults(FilterDefaults::default())
    }

    /// Filter whose unbound inputs fall back to `defaults`
    pub fn with_defaults(defaults: FilterDefaults) -> Self {
        Self {
            specs: [
                InputSpec::audio(INPUT),
                InputSpec::control(CENTER_FREQUENCY, defaults.center_frequency),
                InputSpec::control(BANDWIDTH, defaults.bandwidth),
            ],
            coefficients: CoefficientSet::IDENTITY,
            state: FilterState::new(),
            designed_for: None,
            rejected: false,
            coefficient_updates: 0,
        }
    }

    /// Start describing a filter reading `input`
    pub fn patch(input: OperationId) -> BandRejectPatch {
        BandRejectPatch {
            input,
            center_frequency: None,
            bandwidth: None,
        }
    }

    /// Currently cached coefficient set
    pub fn coefficients(&self) -> &CoefficientSet {
        &self.coefficients
    }

    /// Number of times the coefficient set has been redesigned
    pub fn coefficient_updates(&self) -> u64 {
        self.coefficient_updates
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    fn refresh(&mut self, center: f32, bandwidth: f32, sample_rate: f32) -> Result<()> {
        let key = (center, bandwidth, sample_rate);
        if self.designed_for == Some(key) {
            return Ok(());
        }
        // On error the previous coefficients stay in place and `designed_for`
        // still differs, so the next tick validates again
        match design_band_reject(center as f64, bandwidth as f64, sample_rate as f64) {
            Ok(coefficients) => {
                self.coefficients = coefficients;
                self.designed_for = Some(key);
                self.rejected = false;
                self.coefficient_updates += 1;
                Ok(())
            }
            Err(e) => {
                self.rejected = true;
                Err(e)
            }
        }
    }
}

impl Default for BandRejectButterworth {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for BandRejectButterworth {
    fn name(&self) -> &str {
        "BandRejectButterworth"
    }

    fn inputs(&self) -> &[InputSpec] {
        &self.specs
    }

    fn process(&mut self, frame: &InputFrame<'_>, ctx: &TickContext<'_>) -> Result<f32> {
        if frame.control_tick || self.rejected {
            self.refresh(frame.value(1), frame.value(2), ctx.sample_rate)?;
        }
        Ok(iir::step(&self.coefficients, &mut self.state, frame.value(0)))
    }

    fn reset(&mut self) {
        self.state.reset();
    }

    fn clone_operation(&self) -> Box<dyn Operation> {
        Box::new(Self {
            specs: self.specs,
            ..Self::new()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Band-reject filter description: explicit input, optional overrides
#[derive(Debug, Clone)]
pub struct BandRejectPatch {
    input: OperationId,
    center_frequency: Option<Parameter>,
    bandwidth: Option<Parameter>,
}

impl BandRejectPatch {
    pub fn center_frequency(mut self, value: impl IntoParameter) -> Self {
        self.center_frequency = Some(value.into_parameter());
        self
    }

    pub fn bandwidth(mut self, value: impl IntoParameter) -> Self {
        self.bandwidth = Some(value.into_parameter());
        self
    }
}

impl Patch for BandRejectPatch {
    fn build(self, config: &EngineConfig) -> (Box<dyn Operation>, Bindings) {
        let mut bindings = Bindings::new().bind(INPUT, self.input);
        if let Some(p) = self.center_frequency {
            bindings = bindings.bind(CENTER_FREQUENCY, p);
        }
        if let Some(p) = self.bandwidth {
            bindings = bindings.bind(BANDWIDTH, p);
        }
        (
            Box::new(BandRejectButterworth::with_defaults(config.band_reject)),
            bindings,
        )
    }
}
