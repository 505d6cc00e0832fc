//! SignalGraph - single-threaded operation graph
//!
//! Owns the control-path [`GraphModel`] and the running [`Program`]. Every
//! mutation compiles a replacement program that takes over the running
//! operation state, so filters keep ringing across edits. For a graph driven
//! from a real-time audio thread see [`crate::live`].

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::graph_model::{Change, GraphModel};
use crate::operation::{Lifecycle, Operation, OperationId};
use crate::ops::Patch;
use crate::parameter::{Bindings, IntoParameter, Parameter};
use crate::program::{GraphSnapshot, Program};

/// Sample-by-sample operation graph
///
/// # Example
/// ```ignore
/// let mut graph = SignalGraph::new(EngineConfig::default());
///
/// let osc = graph.add(Oscillator::sine(3000.0))?;
/// let notch = graph.add(BandRejectButterworth::patch(osc))?;
/// graph.set_output(notch)?;
///
/// let samples = graph.render(44100)?;
/// ```
pub struct SignalGraph {
    model: GraphModel,
    program: Program,
}

impl SignalGraph {
    pub fn new(config: EngineConfig) -> Self {
        let program = Program::empty(config.sample_rate);
        Self {
            model: GraphModel::new(config),
            program,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.model.config()
    }

    pub fn sample_rate(&self) -> f32 {
        self.model.config().sample_rate
    }

    /// Add an operation, binding its inputs by name
    ///
    /// Inputs left out of `bindings` take their declared default; inputs
    /// without a default must be bound.
    ///
    /// # Errors
    /// `InvalidGraph`, `CyclicGraph`, `UnknownOperation`; the graph is
    /// unchanged on error.
    pub fn add_operation(
        &mut self,
        operation: Box<dyn Operation>,
        bindings: Bindings,
    ) -> Result<OperationId> {
        let (id, change) = self.model.add_operation(operation, &bindings)?;
        self.apply(change)?;
        Ok(id)
    }

    /// Add an operation under a caller-chosen id
    ///
    /// # Errors
    /// As [`SignalGraph::add_operation`], plus `DuplicateOperation`
    pub fn add_operation_with_id(
        &mut self,
        id: OperationId,
        operation: Box<dyn Operation>,
        bindings: Bindings,
    ) -> Result<()> {
        let change = self.model.add_operation_with_id(id, operation, &bindings)?;
        self.apply(change)
    }

    /// Add an operation described by a patch, using the configured defaults
    pub fn add(&mut self, patch: impl Patch) -> Result<OperationId> {
        let (operation, bindings) = patch.build(self.model.config());
        self.add_operation(operation, bindings)
    }

    /// Remove an operation
    ///
    /// # Errors
    /// - `DanglingReference` if another operation or the graph output still
    ///   references it; both stay untouched
    /// - `UnknownOperation` if absent
    pub fn remove_operation(&mut self, id: OperationId) -> Result<()> {
        let change = self.model.remove_operation(id)?;
        self.apply(change)
    }

    /// Replace the parameter bound to input `name` of `id`
    ///
    /// Value changes take effect at the operation's next control tick.
    /// Binding or unbinding a reference rewires the graph immediately.
    pub fn set_parameter(
        &mut self,
        id: OperationId,
        name: &str,
        parameter: impl IntoParameter,
    ) -> Result<()> {
        let change = self
            .model
            .set_parameter(id, name, parameter.into_parameter())?;
        self.apply(change)
    }

    /// Currently bound parameter (the latest target, even if still pending)
    pub fn parameter(&self, id: OperationId, name: &str) -> Result<Parameter> {
        self.model.parameter(id, name)
    }

    pub fn set_output(&mut self, id: OperationId) -> Result<()> {
        let change = self.model.set_output(id)?;
        self.apply(change)
    }

    pub fn output(&self) -> Option<OperationId> {
        self.model.output()
    }

    fn apply(&mut self, change: Change) -> Result<()> {
        match change {
            Change::Value {
                id,
                index,
                parameter,
            } => self.program.set_pending(id, index, parameter),
            Change::Rebuild(mut program) => {
                program.adopt_from(&mut self.program);
                self.program = *program;
                Ok(())
            }
        }
    }

    /// Advance one sample period with an empty input frame
    pub fn tick(&mut self) -> Result<f32> {
        self.program.tick(&[])
    }

    /// Advance one sample period; `input` is read by `ExternalInput` operations
    pub fn tick_with_input(&mut self, input: &[f32]) -> Result<f32> {
        self.program.tick(input)
    }

    /// Last sample produced by `id`
    pub fn output_of(&self, id: OperationId) -> Result<f32> {
        self.program
            .output_of(id)
            .ok_or(Error::UnknownOperation(id))
    }

    /// Render `num_samples` of output with no external input
    pub fn render(&mut self, num_samples: usize) -> Result<Vec<f32>> {
        let mut buffer = vec![0.0; num_samples];
        self.program.process(&[], &mut buffer)?;
        Ok(buffer)
    }

    /// Process a mono block; `input[i]` is delivered as channel 0 of tick `i`
    pub fn process_input(&mut self, input: &[f32], output: &mut [f32]) -> Result<()> {
        self.program.process(input, output)
    }

    /// Reset operation state and control clocks; topology is kept
    pub fn reset(&mut self) {
        self.program.reset();
    }

    pub fn state_of(&self, id: OperationId) -> Option<Lifecycle> {
        self.model.state_of(id)
    }

    /// Borrow the live operation `id` as its concrete type
    pub fn operation_as<T: Operation + 'static>(&self, id: OperationId) -> Option<&T> {
        self.program
            .node(id)?
            .operation()
            .as_any()
            .downcast_ref::<T>()
    }

    pub fn node_count(&self) -> usize {
        self.model.len()
    }

    pub fn execution_order(&self) -> &[OperationId] {
        self.program.execution_order()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.program.snapshot()
    }
}

impl Default for SignalGraph {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
