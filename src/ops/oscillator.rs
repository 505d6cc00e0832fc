/// Oscillator operation - generates waveforms (sine, saw, square, triangle)
///
/// A source with no signal inputs. Frequency and amplitude are control-rate,
/// so a modulating operation bound to either is sampled and held at the
/// oscillator's control ticks.
use crate::config::EngineConfig;
use crate::error::Result;
use crate::operation::{InputFrame, Operation, TickContext};
use crate::ops::Patch;
use crate::parameter::{Bindings, InputSpec, IntoParameter, Parameter};
use std::any::Any;
use std::f64::consts::TAU;

pub const FREQUENCY: &str = "frequency";
pub const AMPLITUDE: &str = "amplitude";

/// Waveform types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Saw,
    Square,
    Triangle,
}

/// Oscillator with control-rate frequency and amplitude
///
/// # Example
/// ```ignore
/// let osc = graph.add(Oscillator::sine(3000.0))?;
/// ```
pub struct Oscillator {
    specs: [InputSpec; 2],
    waveform: Waveform,
    phase: f64, // Internal state (0.0 to 1.0)
}

impl Oscillator {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            specs: [
                InputSpec::control(FREQUENCY, 440.0),
                InputSpec::control(AMPLITUDE, 1.0),
            ],
            waveform,
            phase: 0.0,
        }
    }

    /// Sine oscillator patch at `frequency` Hz
    pub fn sine(frequency: impl IntoParameter) -> OscillatorPatch {
        Self::patch(Waveform::Sine).frequency(frequency)
    }

    pub fn patch(waveform: Waveform) -> OscillatorPatch {
        OscillatorPatch {
            waveform,
            frequency: None,
            amplitude: None,
        }
    }

    /// Get current phase (0.0 to 1.0)
    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    fn shape(&self) -> f64 {
        match self.waveform {
            Waveform::Sine => (self.phase * TAU).sin(),
            Waveform::Saw => 2.0 * self.phase - 1.0,
            Waveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    -4.0 * self.phase + 3.0
                }
            }
        }
    }
}

impl Operation for Oscillator {
    fn name(&self) -> &str {
        "Oscillator"
    }

    fn inputs(&self) -> &[InputSpec] {
        &self.specs
    }

    fn process(&mut self, frame: &InputFrame<'_>, ctx: &TickContext<'_>) -> Result<f32> {
        let frequency = frame.value(0) as f64;
        let amplitude = frame.value(1) as f64;
        let sample = amplitude * self.shape();

        self.phase += frequency / ctx.sample_rate as f64;
        // Wrap phase to [0.0, 1.0)
        self.phase -= self.phase.floor();

        Ok(sample as f32)
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }

    fn clone_operation(&self) -> Box<dyn Operation> {
        Box::new(Self::new(self.waveform))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone)]
pub struct OscillatorPatch {
    waveform: Waveform,
    frequency: Option<Parameter>,
    amplitude: Option<Parameter>,
}

impl OscillatorPatch {
    pub fn frequency(mut self, value: impl IntoParameter) -> Self {
        self.frequency = Some(value.into_parameter());
        self
    }

    pub fn amplitude(mut self, value: impl IntoParameter) -> Self {
        self.amplitude = Some(value.into_parameter());
        self
    }
}

impl Patch for OscillatorPatch {
    fn build(self, _config: &EngineConfig) -> (Box<dyn Operation>, Bindings) {
        let mut bindings = Bindings::new();
        if let Some(p) = self.frequency {
            bindings = bindings.bind(FREQUENCY, p);
        }
        if let Some(p) = self.amplitude {
            bindings = bindings.bind(AMPLITUDE, p);
        }
        (Box::new(Oscillator::new(self.waveform)), bindings)
    }
}
