//! # opgraph - Sample-by-sample operation graph with Butterworth filters
//!
//! opgraph composes parametrized operations into a directed signal graph and
//! evaluates it one sample at a time. Operations read each other's outputs
//! through audio-rate references; scalar parameters are refreshed on each
//! operation's own control-rate clock.
//!
//! ## Core Features
//!
//! - **Operation Graph**: references are checked on every mutation; cycles,
//!   unknown operations and dangling references are errors, never silence
//! - **Control-Rate Parameters**: values change only on control tick boundaries
//! - **Butterworth Filters**: second-order band-reject and band-pass sections,
//!   coefficients redesigned only when center frequency or bandwidth change
//! - **Live Mode**: control thread / audio thread split over lock-free queues,
//!   with filter state carried across every graph edit
//!
//! ## Quick Start
//!
//! ```rust
//! use opgraph::ops::{BandRejectButterworth, Oscillator};
//! use opgraph::{EngineConfig, SignalGraph};
//!
//! # fn main() -> opgraph::Result<()> {
//! let mut graph = SignalGraph::new(EngineConfig::default());
//!
//! // 3 kHz sine into a notch at the default 3 kHz / 2 kHz bandwidth
//! let osc = graph.add(Oscillator::sine(3000.0))?;
//! let notch = graph.add(BandRejectButterworth::patch(osc))?;
//! graph.set_output(notch)?;
//!
//! let buffer = graph.render(44100)?; // 1 second
//! let tail_peak = buffer[4410..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
//! assert!(tail_peak < 0.05);
//!
//! // Retune; takes effect on the filter's next control tick
//! graph.set_parameter(notch, "center_frequency", 1000.0)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Live Mode
//!
//! ```rust
//! use opgraph::live::live_graph;
//! use opgraph::ops::Oscillator;
//! use opgraph::EngineConfig;
//!
//! # fn main() -> opgraph::Result<()> {
//! let (mut controller, mut processor) = live_graph(EngineConfig::default());
//! let osc = controller.add(Oscillator::sine(440.0))?;
//! controller.set_output(osc)?;
//!
//! // Audio callback
//! let mut block = [0.0f32; 256];
//! processor.process(&[], &mut block)?;
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod dependency_graph;
pub mod error;
pub mod filter_design;
pub mod graph_model;
pub mod iir;
pub mod live;
pub mod operation;
pub mod ops;
pub mod parameter;
pub mod program;
pub mod render;
pub mod signal_graph;

pub use config::{EngineConfig, FilterDefaults};
pub use error::{Error, Result};
pub use filter_design::{design_band_pass, design_band_reject, CoefficientSet};
pub use operation::{Lifecycle, Operation, OperationId};
pub use parameter::{Bindings, ControlValue, InputSpec, IntoParameter, Parameter, Rate};
pub use program::GraphSnapshot;
pub use signal_graph::SignalGraph;
