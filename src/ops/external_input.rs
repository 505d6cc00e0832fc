/// External input operation - the boundary to platform audio I/O
///
/// Delivers one channel of the frame handed to
/// [`crate::SignalGraph::tick_with_input`] (or the live processor) for the
/// current tick.
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::operation::{InputFrame, Lifecycle, Operation, TickContext};
use crate::ops::Patch;
use crate::parameter::{Bindings, InputSpec};
use std::any::Any;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalInput {
    channel: usize,
}

impl ExternalInput {
    pub fn new(channel: usize) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> usize {
        self.channel
    }
}

impl Operation for ExternalInput {
    fn name(&self) -> &str {
        "ExternalInput"
    }

    fn inputs(&self) -> &[InputSpec] {
        &[]
    }

    fn process(&mut self, frame: &InputFrame<'_>, ctx: &TickContext<'_>) -> Result<f32> {
        ctx.external
            .get(self.channel)
            .copied()
            .ok_or(Error::InvalidState {
                operation: frame.operation,
                state: Lifecycle::Bound,
                reason: "external input channel not supplied for this tick",
            })
    }

    fn reset(&mut self) {}

    fn clone_operation(&self) -> Box<dyn Operation> {
        Box::new(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Patch for ExternalInput {
    fn build(self, _config: &EngineConfig) -> (Box<dyn Operation>, Bindings) {
        (Box::new(self), Bindings::new())
    }
}
