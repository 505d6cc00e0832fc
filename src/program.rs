/// Compiled, executable form of a signal graph
///
/// A [`Program`] holds bound [`OperationNode`]s in topological order and one
/// preallocated output slot per node. It is built on the control path by
/// [`crate::graph_model::GraphModel::compile`] and then only ticked, so every
/// method used on the audio thread works on storage allocated up front.
use crate::error::{Error, Result};
use crate::operation::{OperationId, OperationNode, TickContext};
use crate::parameter::Parameter;
use std::collections::HashMap;

/// Read-only description of a program for observers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSnapshot {
    /// (id, operation name) in execution order
    pub operations: Vec<(OperationId, String)>,
    pub output: Option<OperationId>,
}

impl GraphSnapshot {
    pub fn execution_order(&self) -> Vec<OperationId> {
        self.operations.iter().map(|(id, _)| *id).collect()
    }

    pub fn contains(&self, id: OperationId) -> bool {
        self.operations.iter().any(|(op, _)| *op == id)
    }
}

/// Executable graph: nodes in topological order with their output slots
///
/// # Example
/// ```ignore
/// let mut program = model.compile()?;
/// program.adopt_from(&mut running);   // keep filter state across the swap
/// let sample = program.tick(&[])?;
/// ```
pub struct Program {
    nodes: Vec<OperationNode>,
    /// Last sample of each node, same order as `nodes`
    outputs: Vec<f32>,
    /// Id each output slot belongs to
    ids: Vec<OperationId>,
    index: HashMap<OperationId, usize>,
    output: Option<usize>,
    sample_rate: f32,
    ticks: u64,
}

impl Program {
    /// Create a program from nodes that are already bound, in execution order
    ///
    /// # Errors
    /// - `UnknownOperation` if `output` is not one of the nodes
    pub fn new(
        nodes: Vec<OperationNode>,
        output: Option<OperationId>,
        sample_rate: f32,
    ) -> Result<Self> {
        let ids: Vec<OperationId> = nodes.iter().map(OperationNode::id).collect();
        let index: HashMap<OperationId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let output = match output {
            Some(id) => Some(*index.get(&id).ok_or(Error::UnknownOperation(id))?),
            None => None,
        };

        Ok(Self {
            outputs: vec![0.0; nodes.len()],
            nodes,
            ids,
            index,
            output,
            sample_rate,
            ticks: 0,
        })
    }

    /// Program with no operations; ticks produce silence
    pub fn empty(sample_rate: f32) -> Self {
        Self {
            nodes: Vec::new(),
            outputs: Vec::new(),
            ids: Vec::new(),
            index: HashMap::new(),
            output: None,
            sample_rate,
            ticks: 0,
        }
    }

    /// Advance exactly one sample period
    ///
    /// Returns the output operation's sample, or 0.0 when no output is
    /// selected. `external` is the input frame read by `ExternalInput`
    /// operations. An error aborts the tick; nodes later in the order are not
    /// evaluated, but the tick is still counted.
    pub fn tick(&mut self, external: &[f32]) -> Result<f32> {
        let ctx = TickContext::new(self.sample_rate, self.ticks, external);
        let Program {
            nodes, outputs, ids, ..
        } = self;

        let result: Result<()> = nodes.iter_mut().enumerate().try_for_each(|(i, node)| {
            let sample = node.tick(outputs, ids, &ctx)?;
            outputs[i] = sample;
            Ok(())
        });

        // A failed tick still uses up its sample period; nodes after the
        // failing one skip it
        self.ticks += 1;
        result?;
        Ok(self.output.map_or(0.0, |i| self.outputs[i]))
    }

    /// Process a mono block: `input[i]` is channel 0 of tick `i`
    ///
    /// Ticks past the end of `input` receive an empty input frame.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<()> {
        for (i, sample) in output.iter_mut().enumerate() {
            let external = input.get(i).map(std::slice::from_ref).unwrap_or(&[]);
            *sample = self.tick(external)?;
        }
        Ok(())
    }

    /// Take over running state from the program this one replaces
    ///
    /// Nodes present in both programs swap their live operation (filter state,
    /// coefficient cache), control clock position and last output into `self`.
    /// Every node of `previous` ends up `Removed`. Performs no allocation.
    pub fn adopt_from(&mut self, previous: &mut Program) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            if let Some(&j) = previous.index.get(&node.id()) {
                node.adopt(&mut previous.nodes[j]);
                self.outputs[i] = previous.outputs[j];
            }
        }
        self.ticks = previous.ticks;
        previous.retire_all();
    }

    /// Queue a scalar parameter replacement on node `id`
    pub fn set_pending(&mut self, id: OperationId, index: usize, parameter: Parameter) -> Result<()> {
        let &i = self.index.get(&id).ok_or(Error::UnknownOperation(id))?;
        self.nodes[i].set_pending(index, parameter)
    }

    /// Mark every node `Removed`
    pub fn retire_all(&mut self) {
        for node in &mut self.nodes {
            node.retire();
        }
    }

    /// Reset all operation state and control clocks
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.reset();
        }
        self.outputs.fill(0.0);
        self.ticks = 0;
    }

    pub fn node(&self, id: OperationId) -> Option<&OperationNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Last sample produced by `id`
    pub fn output_of(&self, id: OperationId) -> Option<f32> {
        self.index.get(&id).map(|&i| self.outputs[i])
    }

    pub fn output(&self) -> Option<OperationId> {
        self.output.map(|i| self.ids[i])
    }

    pub fn execution_order(&self) -> &[OperationId] {
        &self.ids
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Ticks completed since the first program of this graph started
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            operations: self
                .nodes
                .iter()
                .map(|node| (node.id(), node.operation().name().to_string()))
                .collect(),
            output: self.output(),
        }
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("nodes", &self.nodes)
            .field("output", &self.output())
            .field("ticks", &self.ticks)
            .finish()
    }
}
