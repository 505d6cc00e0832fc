/// Band-pass Butterworth filter operation
///
/// Passes frequencies around `center_frequency` with unity gain at the center
/// and attenuates both sides. Same inputs and control-rate behaviour as
/// [`super::BandRejectButterworth`].
use crate::config::{EngineConfig, FilterDefaults};
use crate::error::Result;
use crate::filter_design::{design_band_pass, CoefficientSet};
use crate::iir::{self, FilterState};
use crate::operation::{InputFrame, Operation, OperationId, TickContext};
use crate::ops::Patch;
use crate::parameter::{Bindings, InputSpec, IntoParameter, Parameter};
use std::any::Any;

pub const INPUT: &str = "input";
pub const CENTER_FREQUENCY: &str = "center_frequency";
pub const BANDWIDTH: &str = "bandwidth";

pub struct BandPassButterworth {
    specs: [InputSpec; 3],
    coefficients: CoefficientSet,
    state: FilterState,
    designed_for: Option<(f32, f32, f32)>,
    rejected: bool,
    coefficient_updates: u64,
}

impl BandPassButterworth {
    pub fn new() -> Self {
        Self::with_defaults(FilterDefaults::default())
    }

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

    pub fn patch(input: OperationId) -> BandPassPatch {
        BandPassPatch {
            input,
            center_frequency: None,
            bandwidth: None,
        }
    }

    pub fn coefficients(&self) -> &CoefficientSet {
        &self.coefficients
    }

    pub fn coefficient_updates(&self) -> u64 {
        self.coefficient_updates
    }
}

impl Default for BandPassButterworth {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for BandPassButterworth {
    fn name(&self) -> &str {
        "BandPassButterworth"
    }

    fn inputs(&self) -> &[InputSpec] {
        &self.specs
    }

    fn process(&mut self, frame: &InputFrame<'_>, ctx: &TickContext<'_>) -> Result<f32> {
        if frame.control_tick || self.rejected {
            let key = (frame.value(1), frame.value(2), ctx.sample_rate);
            if self.designed_for != Some(key) {
                // Stays rejected until a design succeeds
                self.rejected = true;
                self.coefficients =
                    design_band_pass(key.0 as f64, key.1 as f64, key.2 as f64)?;
                self.designed_for = Some(key);
                self.rejected = false;
                self.coefficient_updates += 1;
            }
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

#[derive(Debug, Clone)]
pub struct BandPassPatch {
    input: OperationId,
    center_frequency: Option<Parameter>,
    bandwidth: Option<Parameter>,
}

impl BandPassPatch {
    pub fn center_frequency(mut self, value: impl IntoParameter) -> Self {
        self.center_frequency = Some(value.into_parameter());
        self
    }

    pub fn bandwidth(mut self, value: impl IntoParameter) -> Self {
        self.bandwidth = Some(value.into_parameter());
        self
    }
}

impl Patch for BandPassPatch {
    fn build(self, config: &EngineConfig) -> (Box<dyn Operation>, Bindings) {
        let mut bindings = Bindings::new().bind(INPUT, self.input);
        if let Some(p) = self.center_frequency {
            bindings = bindings.bind(CENTER_FREQUENCY, p);
        }
        if let Some(p) = self.bandwidth {
            bindings = bindings.bind(BANDWIDTH, p);
        }
        (
            Box::new(BandPassButterworth::with_defaults(config.band_pass)),
            bindings,
        )
    }
}
