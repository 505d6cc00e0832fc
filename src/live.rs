//! Live graph: control thread and real-time audio thread
//!
//! [`live_graph`] splits a graph into a [`GraphController`], which owns the
//! model and compiles programs, and an [`AudioProcessor`], which runs them.
//! The two sides talk over lock-free `ringbuf` queues:
//!
//! - commands (new programs, parameter values) flow to the audio thread and
//!   are applied only between blocks;
//! - replaced programs flow back so they are dropped on the control thread.
//!
//! Observers read the current [`GraphSnapshot`] through `arc-swap` without
//! touching either side.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::graph_model::{Change, GraphModel};
use crate::operation::{Lifecycle, Operation, OperationId};
use crate::ops::Patch;
use crate::parameter::{Bindings, IntoParameter, Parameter};
use crate::program::{GraphSnapshot, Program};
use arc_swap::ArcSwap;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::Arc;
use tracing::debug;

/// Message from the control thread to the audio thread
pub enum Command {
    /// Replace the running program, migrating operation state by id
    Install(Box<Program>),
    /// Queue a scalar parameter value on a running operation
    SetParameter {
        id: OperationId,
        index: usize,
        parameter: Parameter,
    },
}

/// Create a connected controller/processor pair
///
/// Move the [`AudioProcessor`] into the audio callback; keep the
/// [`GraphController`] on a non-real-time thread.
pub fn live_graph(config: EngineConfig) -> (GraphController, AudioProcessor) {
    let capacity = config.queue_capacity.max(1);
    let (command_tx, command_rx) = HeapRb::<Command>::new(capacity).split();
    let (garbage_tx, garbage_rx) = HeapRb::<Box<Program>>::new(capacity).split();

    let processor = AudioProcessor {
        program: Box::new(Program::empty(config.sample_rate)),
        commands: command_rx,
        garbage: garbage_tx,
    };
    let controller = GraphController {
        model: GraphModel::new(config),
        commands: command_tx,
        garbage: garbage_rx,
        snapshot: Arc::new(ArcSwap::from_pointee(GraphSnapshot::default())),
        installs_in_flight: 0,
        capacity,
    };
    (controller, processor)
}

/// Control-thread half of a live graph
///
/// Mutations have the same semantics and errors as on
/// [`crate::SignalGraph`], plus `QueueFull` when the audio thread has not yet
/// drained earlier commands. A `QueueFull` mutation is not applied.
pub struct GraphController {
    model: GraphModel,
    commands: HeapProd<Command>,
    garbage: HeapCons<Box<Program>>,
    snapshot: Arc<ArcSwap<GraphSnapshot>>,
    /// Installs whose replaced program has not come back yet
    installs_in_flight: usize,
    capacity: usize,
}

impl GraphController {
    pub fn config(&self) -> &EngineConfig {
        self.model.config()
    }

    pub fn add_operation(
        &mut self,
        operation: Box<dyn Operation>,
        bindings: Bindings,
    ) -> Result<OperationId> {
        self.ensure_capacity()?;
        let (id, change) = self.model.add_operation(operation, &bindings)?;
        self.send(change)?;
        Ok(id)
    }

    pub fn add_operation_with_id(
        &mut self,
        id: OperationId,
        operation: Box<dyn Operation>,
        bindings: Bindings,
    ) -> Result<()> {
        self.ensure_capacity()?;
        let change = self.model.add_operation_with_id(id, operation, &bindings)?;
        self.send(change)
    }

    pub fn add(&mut self, patch: impl Patch) -> Result<OperationId> {
        let (operation, bindings) = patch.build(self.model.config());
        self.add_operation(operation, bindings)
    }

    pub fn remove_operation(&mut self, id: OperationId) -> Result<()> {
        self.ensure_capacity()?;
        let change = self.model.remove_operation(id)?;
        self.send(change)
    }

    pub fn set_parameter(
        &mut self,
        id: OperationId,
        name: &str,
        parameter: impl IntoParameter,
    ) -> Result<()> {
        self.ensure_capacity()?;
        let change = self
            .model
            .set_parameter(id, name, parameter.into_parameter())?;
        self.send(change)
    }

    pub fn set_output(&mut self, id: OperationId) -> Result<()> {
        self.ensure_capacity()?;
        let change = self.model.set_output(id)?;
        self.send(change)
    }

    pub fn parameter(&self, id: OperationId, name: &str) -> Result<Parameter> {
        self.model.parameter(id, name)
    }

    pub fn state_of(&self, id: OperationId) -> Option<Lifecycle> {
        self.model.state_of(id)
    }

    /// Snapshot of the most recently committed program
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.snapshot.load_full()
    }

    /// Shared handle for observers on other threads
    pub fn snapshot_handle(&self) -> Arc<ArcSwap<GraphSnapshot>> {
        Arc::clone(&self.snapshot)
    }

    /// Drop programs the audio thread has finished with; returns how many
    pub fn collect_garbage(&mut self) -> usize {
        let mut collected = 0;
        while let Some(program) = self.garbage.try_pop() {
            drop(program);
            collected += 1;
        }
        self.installs_in_flight = self.installs_in_flight.saturating_sub(collected);
        if collected > 0 {
            debug!("Collected {} retired programs", collected);
        }
        collected
    }

    /// Commands queued but not yet picked up by the audio thread
    pub fn pending_commands(&self) -> usize {
        self.commands.occupied_len()
    }

    /// Both queues must have room before the model is touched, so a full
    /// queue never leaves the model ahead of the audio thread
    fn ensure_capacity(&mut self) -> Result<()> {
        self.collect_garbage();
        if self.commands.is_full() || self.installs_in_flight >= self.capacity {
            return Err(Error::QueueFull);
        }
        Ok(())
    }

    fn send(&mut self, change: Change) -> Result<()> {
        let command = match change {
            Change::Value {
                id,
                index,
                parameter,
            } => Command::SetParameter {
                id,
                index,
                parameter,
            },
            Change::Rebuild(program) => {
                self.snapshot.store(Arc::new(program.snapshot()));
                self.installs_in_flight += 1;
                debug!("Sending program with {} operations", program.len());
                Command::Install(program)
            }
        };
        // Only this side pushes, and ensure_capacity saw a free slot
        self.commands.try_push(command).map_err(|_| Error::QueueFull)
    }
}

/// Audio-thread half of a live graph
///
/// [`AudioProcessor::process`] never allocates, locks or blocks.
pub struct AudioProcessor {
    program: Box<Program>,
    commands: HeapCons<Command>,
    garbage: HeapProd<Box<Program>>,
}

impl AudioProcessor {
    /// Apply queued commands, then process one mono block
    ///
    /// `input[i]` is channel 0 of tick `i`. Commands are only applied here,
    /// before the first tick of the block.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<()> {
        self.apply_commands()?;
        self.program.process(input, output)
    }

    /// Apply queued commands, then advance a single tick
    pub fn tick(&mut self, external: &[f32]) -> Result<f32> {
        self.apply_commands()?;
        self.program.tick(external)
    }

    fn apply_commands(&mut self) -> Result<()> {
        while let Some(command) = self.commands.try_pop() {
            match command {
                Command::Install(mut program) => {
                    program.adopt_from(&mut self.program);
                    let retired = std::mem::replace(&mut self.program, program);
                    // Cannot be full: the controller caps installs in flight
                    // at the garbage queue's capacity
                    let pushed = self.garbage.try_push(retired);
                    debug_assert!(pushed.is_ok(), "retired program dropped on the audio thread");
                }
                Command::SetParameter {
                    id,
                    index,
                    parameter,
                } => self.program.set_pending(id, index, parameter)?,
            }
        }
        Ok(())
    }

    pub fn output_of(&self, id: OperationId) -> Option<f32> {
        self.program.output_of(id)
    }

    pub fn ticks(&self) -> u64 {
        self.program.ticks()
    }

    /// Borrow a running operation as its concrete type
    pub fn operation_as<T: Operation + 'static>(&self, id: OperationId) -> Option<&T> {
        self.program
            .node(id)?
            .operation()
            .as_any()
            .downcast_ref::<T>()
    }
}
