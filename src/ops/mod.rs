/// Operation families composed by the signal graph
///
/// Each family implements [`crate::operation::Operation`] on its own; the
/// graph never needs to know which family it is evaluating.
///
/// # Families
///
/// ## Sources (no signal inputs)
/// - [`oscillator::Oscillator`] - Sine/saw/square/triangle generator
/// - [`external_input::ExternalInput`] - One channel of the externally supplied input frame
///
/// ## Filters (second-order Butterworth)
/// - [`band_reject::BandRejectButterworth`] - Band-reject (notch)
/// - [`band_pass::BandPassButterworth`] - Band-pass
use crate::config::EngineConfig;
use crate::operation::Operation;
use crate::parameter::Bindings;

pub mod band_pass;
pub mod band_reject;
pub mod external_input;
pub mod oscillator;

pub use band_pass::{BandPassButterworth, BandPassPatch};
pub use band_reject::{BandRejectButterworth, BandRejectPatch};
pub use external_input::ExternalInput;
pub use oscillator::{Oscillator, OscillatorPatch, Waveform};

/// Description of an operation plus the bindings it should be added with
///
/// Lets families pick their configured defaults; see
/// [`crate::SignalGraph::add`].
pub trait Patch {
    fn build(self, config: &EngineConfig) -> (Box<dyn Operation>, Bindings);
}
