/// Sample-by-sample operation processing - core abstraction of the graph
///
/// This module defines the [`Operation`] trait implemented by every filter
/// family and source, and [`OperationNode`], which binds one operation to its
/// parameters, its own control clock and its lifecycle state.
use crate::error::{Error, Result};
use crate::parameter::{InputSpec, Parameter, Rate};
use std::any::Any;
use std::fmt;

/// Identity of an operation, unique within a graph and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub u32);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node lifecycle: `Unbound → Bound → Removed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Created, inputs not yet resolved
    Unbound,
    /// In a compiled program, evaluable
    Bound,
    /// Taken out of the graph (terminal)
    Removed,
}

/// Context passed to all operations for one tick
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// Sample rate (usually 44100.0 Hz)
    pub sample_rate: f32,

    /// Ticks elapsed since the program started
    pub tick: u64,

    /// Samples delivered by the external audio I/O layer for this tick
    pub external: &'a [f32],
}

impl<'a> TickContext<'a> {
    pub fn new(sample_rate: f32, tick: u64, external: &'a [f32]) -> Self {
        Self {
            sample_rate,
            tick,
            external,
        }
    }
}

/// Resolved input values for one evaluation, in declaration order
///
/// Control-rate values only change on control ticks; in between they hold the
/// value resolved at the last control tick.
#[derive(Debug)]
pub struct InputFrame<'a> {
    pub operation: OperationId,
    pub values: &'a [f32],
    pub control_tick: bool,
}

impl InputFrame<'_> {
    #[inline]
    pub fn value(&self, index: usize) -> f32 {
        self.values[index]
    }
}

/// Core trait for graph operations
///
/// Operation families (band-reject, band-pass, sources, ...) implement this
/// independently; the graph composes them. Implementations must not allocate,
/// lock or perform I/O inside [`Operation::process`].
pub trait Operation: Send {
    /// Get a human-readable name for this operation (for debugging)
    fn name(&self) -> &str;

    /// Declared inputs in the order their values appear in [`InputFrame::values`]
    fn inputs(&self) -> &[InputSpec];

    /// Produce one output sample
    ///
    /// `frame.control_tick` is true when control-rate values were re-resolved
    /// for this tick.
    fn process(&mut self, frame: &InputFrame<'_>, ctx: &TickContext<'_>) -> Result<f32>;

    /// Clear internal state (filter history, phase, caches)
    fn reset(&mut self);

    /// Fresh instance with the same configuration and zeroed state
    ///
    /// Used to build new programs on the control path; the live instance is
    /// migrated into the new program afterwards.
    fn clone_operation(&self) -> Box<dyn Operation>;

    fn as_any(&self) -> &dyn Any;
}

/// Per-node control-rate schedule
///
/// Each node counts its own ticks; cadences are independent across nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlClock {
    period: u32,
    countdown: u32,
}

impl ControlClock {
    pub fn new(period: u32) -> Self {
        Self {
            period: period.max(1),
            countdown: 0,
        }
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    /// Change cadence; the current countdown is kept
    pub fn set_period(&mut self, period: u32) {
        self.period = period.max(1);
        self.countdown = self.countdown.min(self.period - 1);
    }

    /// Advance one tick; returns true on control ticks (the first tick is one)
    #[inline]
    pub fn advance(&mut self) -> bool {
        if self.countdown == 0 {
            self.countdown = self.period - 1;
            true
        } else {
            self.countdown -= 1;
            false
        }
    }
}

/// Where an input reads its value from
#[derive(Debug, Clone, Copy, PartialEq)]
enum Source {
    Scalar(f32),
    /// Output slot `index` of the program, expected to hold `id`
    Signal { id: OperationId, index: usize },
}

/// One operation bound into a program
pub struct OperationNode {
    id: OperationId,
    operation: Box<dyn Operation>,
    rates: Vec<Rate>,
    active: Vec<Parameter>,
    pending: Vec<Option<Parameter>>,
    sources: Vec<Source>,
    values: Vec<f32>,
    default_period: u32,
    clock: ControlClock,
    lifecycle: Lifecycle,
    last_output: f32,
}

impl OperationNode {
    /// Create an unbound node
    pub fn new(id: OperationId, operation: Box<dyn Operation>) -> Self {
        let rates: Vec<Rate> = operation.inputs().iter().map(|spec| spec.rate).collect();
        let count = rates.len();
        Self {
            id,
            operation,
            rates,
            active: Vec::with_capacity(count),
            pending: vec![None; count],
            sources: Vec::with_capacity(count),
            values: vec![0.0; count],
            default_period: 1,
            clock: ControlClock::new(1),
            lifecycle: Lifecycle::Unbound,
            last_output: 0.0,
        }
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn operation(&self) -> &dyn Operation {
        self.operation.as_ref()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.active
    }

    pub fn control_period(&self) -> u32 {
        self.clock.period()
    }

    /// Last sample produced by this node
    pub fn last_output(&self) -> f32 {
        self.last_output
    }

    /// Bind parameters (one per declared input, in order) and resolve signal
    /// references to program slots
    ///
    /// # Errors
    /// - `InvalidState` if the node is not `Unbound`
    /// - `InvalidGraph` if the parameter count or kinds don't match the inputs
    /// - `UnknownOperation` if `resolve` can't place a referenced operation
    pub fn bind(
        &mut self,
        parameters: &[Parameter],
        default_period: u32,
        resolve: impl Fn(OperationId) -> Option<usize>,
    ) -> Result<()> {
        if self.lifecycle != Lifecycle::Unbound {
            return Err(Error::InvalidState {
                operation: self.id,
                state: self.lifecycle,
                reason: "only unbound nodes can be bound",
            });
        }
        if parameters.len() != self.rates.len() {
            return Err(Error::InvalidGraph(format!(
                "{} {} expects {} inputs, got {}",
                self.operation.name(),
                self.id,
                self.rates.len(),
                parameters.len()
            )));
        }

        let mut sources = Vec::with_capacity(parameters.len());
        for (i, (param, rate)) in parameters.iter().zip(&self.rates).enumerate() {
            let source = match (param, rate) {
                (Parameter::AudioRateRef(id), _) => Source::Signal {
                    id: *id,
                    index: resolve(*id).ok_or(Error::UnknownOperation(*id))?,
                },
                (_, Rate::Audio) => {
                    return Err(Error::InvalidGraph(format!(
                        "audio input `{}` of {} must reference an operation",
                        self.operation.inputs()[i].name,
                        self.id
                    )))
                }
                (Parameter::Constant(v), Rate::Control) => Source::Scalar(*v),
                (Parameter::Control(c), Rate::Control) => Source::Scalar(c.value),
            };
            sources.push(source);
        }

        self.active = parameters.to_vec();
        self.sources = sources;
        self.default_period = default_period.max(1);
        self.clock = ControlClock::new(self.derive_period());
        self.lifecycle = Lifecycle::Bound;
        Ok(())
    }

    /// Shortest requested cadence among control inputs
    fn derive_period(&self) -> u32 {
        self.active
            .iter()
            .zip(&self.rates)
            .filter(|(_, rate)| **rate == Rate::Control)
            .map(|(param, _)| param.control_period())
            .filter(|&p| p > 0)
            .min()
            .unwrap_or(self.default_period)
    }

    /// Queue a scalar replacement for input `index`, applied at the next
    /// control tick boundary
    pub fn set_pending(&mut self, index: usize, parameter: Parameter) -> Result<()> {
        match (self.rates.get(index), parameter) {
            (None, _) => Err(Error::InvalidGraph(format!(
                "{} has no input #{index}",
                self.id
            ))),
            (Some(_), Parameter::AudioRateRef(_)) | (Some(Rate::Audio), _) => {
                Err(Error::InvalidGraph(format!(
                    "input #{index} of {} needs a rewire, not a value change",
                    self.id
                )))
            }
            (Some(Rate::Control), _) => {
                self.pending[index] = Some(parameter);
                Ok(())
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.iter().any(Option::is_some)
    }

    /// Move the live operation and its running state out of `previous` (the
    /// same id in the program being replaced)
    ///
    /// Bindings of this node win, but scalar changes are queued so they still
    /// land on a control tick boundary. `previous` is left `Removed`.
    pub fn adopt(&mut self, previous: &mut OperationNode) {
        debug_assert_eq!(self.id, previous.id);

        std::mem::swap(&mut self.operation, &mut previous.operation);
        self.last_output = previous.last_output;
        self.clock = ControlClock {
            period: self.clock.period,
            countdown: previous.clock.countdown.min(self.clock.period - 1),
        };

        if self.values.len() == previous.values.len() {
            self.values.copy_from_slice(&previous.values);
        }

        if self.active.len() == previous.active.len() {
            for i in 0..self.active.len() {
                if self.rates[i] != Rate::Control {
                    continue;
                }
                let target = self.active[i];
                let running = previous.active[i];
                let both_scalar = target.scalar().is_some() && running.scalar().is_some();
                if both_scalar && target != running {
                    self.pending[i] = Some(target);
                    self.active[i] = running;
                    self.sources[i] = previous.sources[i];
                } else if both_scalar {
                    self.pending[i] = previous.pending[i];
                }
            }
        }

        previous.lifecycle = Lifecycle::Removed;
    }

    /// Mark the node as taken out of the graph
    pub fn retire(&mut self) {
        self.lifecycle = Lifecycle::Removed;
    }

    /// Reset the operation and control clock
    pub fn reset(&mut self) {
        self.operation.reset();
        self.clock = ControlClock::new(self.clock.period);
        self.last_output = 0.0;
    }

    #[inline]
    fn read(&self, source: Source, outputs: &[f32], ids: &[OperationId]) -> Result<f32> {
        match source {
            Source::Scalar(v) => Ok(v),
            Source::Signal { id, index } => match ids.get(index) {
                Some(found) if *found == id => Ok(outputs[index]),
                _ => Err(Error::DanglingReference {
                    target: id,
                    referrer: self.id,
                }),
            },
        }
    }

    /// Evaluate one sample
    ///
    /// `outputs`/`ids` are the program's output slots and the id expected in
    /// each; upstream slots already hold this tick's samples.
    ///
    /// # Errors
    /// - `InvalidState` unless the node is `Bound`
    /// - `DanglingReference` if a referenced slot no longer holds its operation
    /// - anything the operation itself reports (e.g. `InvalidParameter`)
    pub fn tick(
        &mut self,
        outputs: &[f32],
        ids: &[OperationId],
        ctx: &TickContext<'_>,
    ) -> Result<f32> {
        if self.lifecycle != Lifecycle::Bound {
            return Err(Error::InvalidState {
                operation: self.id,
                state: self.lifecycle,
                reason: "only bound nodes can be ticked",
            });
        }

        let control_tick = self.clock.advance();
        if control_tick && self.has_pending() {
            self.apply_pending();
        }

        for i in 0..self.sources.len() {
            if self.rates[i] == Rate::Audio || control_tick {
                self.values[i] = self.read(self.sources[i], outputs, ids)?;
            }
        }

        let frame = InputFrame {
            operation: self.id,
            values: &self.values,
            control_tick,
        };
        let sample = self.operation.process(&frame, ctx)?;
        self.last_output = sample;
        Ok(sample)
    }

    fn apply_pending(&mut self) {
        for i in 0..self.pending.len() {
            if let Some(param) = self.pending[i].take() {
                if let Some(v) = param.scalar() {
                    self.active[i] = param;
                    self.sources[i] = Source::Scalar(v);
                }
            }
        }
        let period = self.derive_period();
        if period != self.clock.period() {
            self.clock.set_period(period);
        }
    }
}

impl fmt::Debug for OperationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationNode")
            .field("id", &self.id)
            .field("operation", &self.operation.name())
            .field("lifecycle", &self.lifecycle)
            .field("active", &self.active)
            .field("period", &self.clock.period())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::ControlValue;

    /// Outputs its single control input; counts control ticks
    struct Recorder {
        specs: [InputSpec; 1],
        control_ticks: usize,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                specs: [InputSpec::control("level", 1.0)],
                control_ticks: 0,
            }
        }
    }

    impl Operation for Recorder {
        fn name(&self) -> &str {
            "Recorder"
        }

        fn inputs(&self) -> &[InputSpec] {
            &self.specs
        }

        fn process(&mut self, frame: &InputFrame<'_>, _ctx: &TickContext<'_>) -> Result<f32> {
            if frame.control_tick {
                self.control_ticks += 1;
            }
            Ok(frame.value(0))
        }

        fn reset(&mut self) {
            self.control_ticks = 0;
        }

        fn clone_operation(&self) -> Box<dyn Operation> {
            Box::new(Recorder::new())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn ctx() -> TickContext<'static> {
        TickContext::new(44100.0, 0, &[])
    }

    #[test]
    fn test_control_clock_first_tick_is_control_tick() {
        let mut clock = ControlClock::new(4);
        let ticks: Vec<bool> = (0..9).map(|_| clock.advance()).collect();
        assert_eq!(
            ticks,
            vec![true, false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn test_unbound_node_cannot_tick() {
        let mut node = OperationNode::new(OperationId(0), Box::new(Recorder::new()));
        let result = node.tick(&[], &[], &ctx());
        assert!(matches!(
            result,
            Err(Error::InvalidState {
                state: Lifecycle::Unbound,
                ..
            })
        ));
    }

    #[test]
    fn test_removed_node_cannot_tick() {
        let mut node = OperationNode::new(OperationId(0), Box::new(Recorder::new()));
        node.bind(&[Parameter::control(0.5)], 4, |_| None).unwrap();
        assert_eq!(node.tick(&[], &[], &ctx()).unwrap(), 0.5);

        node.retire();
        assert!(matches!(
            node.tick(&[], &[], &ctx()),
            Err(Error::InvalidState {
                state: Lifecycle::Removed,
                ..
            })
        ));
    }

    #[test]
    fn test_pending_value_waits_for_control_tick() {
        let mut node = OperationNode::new(OperationId(0), Box::new(Recorder::new()));
        node.bind(&[Parameter::control(1.0)], 4, |_| None).unwrap();

        assert_eq!(node.tick(&[], &[], &ctx()).unwrap(), 1.0); // control tick
        node.set_pending(0, Parameter::control(2.0)).unwrap();

        for _ in 0..3 {
            assert_eq!(node.tick(&[], &[], &ctx()).unwrap(), 1.0);
        }
        assert_eq!(node.tick(&[], &[], &ctx()).unwrap(), 2.0); // next boundary
        assert!(!node.has_pending());
    }

    #[test]
    fn test_explicit_cadence_overrides_default() {
        let mut node = OperationNode::new(OperationId(0), Box::new(Recorder::new()));
        let param = Parameter::Control(ControlValue::with_period(1.0, 2));
        node.bind(&[param], 64, |_| None).unwrap();
        assert_eq!(node.control_period(), 2);

        for _ in 0..8 {
            node.tick(&[], &[], &ctx()).unwrap();
        }
        let recorder = node.operation().as_any().downcast_ref::<Recorder>().unwrap();
        assert_eq!(recorder.control_ticks, 4);
    }

    #[test]
    fn test_stale_reference_is_error_not_zero() {
        let mut node = OperationNode::new(OperationId(5), Box::new(Recorder::new()));
        node.bind(&[Parameter::reference(OperationId(1))], 1, |_| Some(0))
            .unwrap();

        // Slot 0 now holds a different operation
        let result = node.tick(&[0.25], &[OperationId(2)], &ctx());
        assert!(matches!(
            result,
            Err(Error::DanglingReference {
                target: OperationId(1),
                referrer: OperationId(5)
            })
        ));

        assert_eq!(node.tick(&[0.25], &[OperationId(1)], &ctx()).unwrap(), 0.25);
    }

    #[test]
    fn test_bind_rejects_wrong_arity() {
        let mut node = OperationNode::new(OperationId(0), Box::new(Recorder::new()));
        let result = node.bind(&[], 1, |_| None);
        assert!(matches!(result, Err(Error::InvalidGraph(_))));
        assert_eq!(node.lifecycle(), Lifecycle::Unbound);
    }

    #[test]
    fn test_adopt_keeps_running_value_until_boundary() {
        let mut old = OperationNode::new(OperationId(0), Box::new(Recorder::new()));
        old.bind(&[Parameter::control(1.0)], 4, |_| None).unwrap();
        old.tick(&[], &[], &ctx()).unwrap();
        old.tick(&[], &[], &ctx()).unwrap();

        let mut new = OperationNode::new(OperationId(0), Box::new(Recorder::new()));
        new.bind(&[Parameter::control(3.0)], 4, |_| None).unwrap();
        new.adopt(&mut old);

        assert_eq!(old.lifecycle(), Lifecycle::Removed);
        // Two ticks remain before the boundary
        assert_eq!(new.tick(&[], &[], &ctx()).unwrap(), 1.0);
        assert_eq!(new.tick(&[], &[], &ctx()).unwrap(), 1.0);
        assert_eq!(new.tick(&[], &[], &ctx()).unwrap(), 3.0);

        let recorder = new.operation().as_any().downcast_ref::<Recorder>().unwrap();
        assert_eq!(recorder.control_ticks, 2);
    }
}
