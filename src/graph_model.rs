//! Control-path description of a signal graph
//!
//! [`GraphModel`] owns one prototype per operation together with its bound
//! parameters and the output selection. Every mutation is validated against a
//! freshly compiled [`Program`]; if anything fails the model is restored and
//! the error returned, so callers never observe a half-applied change.

use crate::config::EngineConfig;
use crate::dependency_graph::DependencyGraph;
use crate::error::{Error, Result};
use crate::operation::{Lifecycle, Operation, OperationId, OperationNode};
use crate::parameter::{Bindings, ControlValue, Parameter, Rate};
use crate::program::Program;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

struct Entry {
    prototype: Box<dyn Operation>,
    /// One parameter per declared input, in declaration order
    parameters: Vec<Parameter>,
}

/// Result of a committed mutation
#[derive(Debug)]
pub enum Change {
    /// A scalar value was replaced; queue it on the running program
    Value {
        id: OperationId,
        index: usize,
        parameter: Parameter,
    },
    /// Topology or wiring changed; install this program in place of the running one
    Rebuild(Box<Program>),
}

pub struct GraphModel {
    config: EngineConfig,
    next_id: u32,
    entries: BTreeMap<OperationId, Entry>,
    removed: BTreeSet<OperationId>,
    output: Option<OperationId>,
}

impl GraphModel {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            next_id: 0,
            entries: BTreeMap::new(),
            removed: BTreeSet::new(),
            output: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: OperationId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn output(&self) -> Option<OperationId> {
        self.output
    }

    /// Lifecycle of `id` as seen from the control path
    pub fn state_of(&self, id: OperationId) -> Option<Lifecycle> {
        if self.entries.contains_key(&id) {
            Some(Lifecycle::Bound)
        } else if self.removed.contains(&id) {
            Some(Lifecycle::Removed)
        } else {
            None
        }
    }

    /// Bound parameter of input `name` on `id`
    pub fn parameter(&self, id: OperationId, name: &str) -> Result<Parameter> {
        let entry = self.entries.get(&id).ok_or(Error::UnknownOperation(id))?;
        let index = input_index(entry.prototype.as_ref(), id, name)?;
        Ok(entry.parameters[index])
    }

    /// Add an operation under the next free id
    pub fn add_operation(
        &mut self,
        operation: Box<dyn Operation>,
        bindings: &Bindings,
    ) -> Result<(OperationId, Change)> {
        let id = OperationId(self.next_id);
        let change = self.add_operation_with_id(id, operation, bindings)?;
        Ok((id, change))
    }

    /// Add an operation under a caller-chosen id
    ///
    /// # Errors
    /// - `DuplicateOperation` if `id` is in use or was used before
    /// - `InvalidGraph` for unknown input names, missing required inputs or
    ///   audio inputs not bound to a reference
    /// - `CyclicGraph` if the operation references itself
    /// - `UnknownOperation` if a reference names an absent operation
    /// - `InvalidGraph` for `u32::MAX`, which would exhaust the id counter
    pub fn add_operation_with_id(
        &mut self,
        id: OperationId,
        operation: Box<dyn Operation>,
        bindings: &Bindings,
    ) -> Result<Change> {
        if self.entries.contains_key(&id) || self.removed.contains(&id) {
            return Err(Error::DuplicateOperation(id));
        }
        // The counter must stay able to name an id past this one
        let next_id = id.0.checked_add(1).ok_or_else(|| {
            Error::InvalidGraph(format!("operation id space exhausted at {}", id))
        })?;
        let parameters = resolve_bindings(operation.as_ref(), id, bindings)?;
        if parameters.iter().any(|p| p.source() == Some(id)) {
            return Err(Error::CyclicGraph { operation: id });
        }

        let name = operation.name().to_string();
        self.entries.insert(
            id,
            Entry {
                prototype: operation,
                parameters,
            },
        );

        match self.compile() {
            Ok(program) => {
                self.next_id = self.next_id.max(next_id);
                info!("Added {} {}", name, id);
                Ok(Change::Rebuild(Box::new(program)))
            }
            Err(e) => {
                self.entries.remove(&id);
                Err(e)
            }
        }
    }

    /// Remove an operation nothing else reads
    ///
    /// # Errors
    /// - `UnknownOperation` if `id` is not in the graph
    /// - `DanglingReference` if another operation references `id`, or `id` is
    ///   the graph output (reported with itself as referrer)
    pub fn remove_operation(&mut self, id: OperationId) -> Result<Change> {
        if !self.entries.contains_key(&id) {
            return Err(Error::UnknownOperation(id));
        }
        if let Some(&referrer) = self.referrers(id)?.first() {
            return Err(Error::DanglingReference {
                target: id,
                referrer,
            });
        }
        if self.output == Some(id) {
            return Err(Error::DanglingReference {
                target: id,
                referrer: id,
            });
        }

        let Some(entry) = self.entries.remove(&id) else {
            return Err(Error::UnknownOperation(id));
        };
        match self.compile() {
            Ok(program) => {
                self.removed.insert(id);
                info!("Removed {} {}", entry.prototype.name(), id);
                Ok(Change::Rebuild(Box::new(program)))
            }
            Err(e) => {
                self.entries.insert(id, entry);
                Err(e)
            }
        }
    }

    /// Replace the parameter bound to input `name`
    ///
    /// Scalar-for-scalar replacements come back as [`Change::Value`]; anything
    /// involving a reference rewires the graph and is validated like an add.
    pub fn set_parameter(
        &mut self,
        id: OperationId,
        name: &str,
        parameter: Parameter,
    ) -> Result<Change> {
        let entry = self.entries.get_mut(&id).ok_or(Error::UnknownOperation(id))?;
        let index = input_index(entry.prototype.as_ref(), id, name)?;
        let spec = entry.prototype.inputs()[index];
        if spec.rate == Rate::Audio && parameter.source().is_none() {
            return Err(Error::InvalidGraph(format!(
                "audio input `{}` of {} must reference an operation",
                spec.name, id
            )));
        }

        let previous = entry.parameters[index];
        if previous.source().is_none() && parameter.source().is_none() {
            entry.parameters[index] = parameter;
            debug!("Set {}.{} to {:?}", id, spec.name, parameter);
            return Ok(Change::Value {
                id,
                index,
                parameter,
            });
        }

        if parameter.source() == Some(id) {
            return Err(Error::CyclicGraph { operation: id });
        }
        entry.parameters[index] = parameter;
        match self.compile() {
            Ok(program) => {
                info!("Rewired {}.{} to {:?}", id, spec.name, parameter);
                Ok(Change::Rebuild(Box::new(program)))
            }
            Err(e) => {
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.parameters[index] = previous;
                }
                Err(e)
            }
        }
    }

    /// Select the operation whose samples `tick` returns
    pub fn set_output(&mut self, id: OperationId) -> Result<Change> {
        if !self.entries.contains_key(&id) {
            return Err(Error::UnknownOperation(id));
        }
        let previous = self.output.replace(id);
        match self.compile() {
            Ok(program) => {
                info!("Output set to {}", id);
                Ok(Change::Rebuild(Box::new(program)))
            }
            Err(e) => {
                self.output = previous;
                Err(e)
            }
        }
    }

    /// Operations whose parameters reference `id`
    pub fn referrers(&self, id: OperationId) -> Result<Vec<OperationId>> {
        Ok(self.dependency_graph()?.dependents(id))
    }

    fn dependency_graph(&self) -> Result<DependencyGraph> {
        DependencyGraph::build(
            self.entries
                .iter()
                .map(|(id, entry)| (*id, entry.parameters.as_slice())),
        )
    }

    /// Build a fresh program from the prototypes
    ///
    /// Operations are cloned fresh; install the result with
    /// [`Program::adopt_from`] to keep running state.
    pub fn compile(&self) -> Result<Program> {
        let graph = self.dependency_graph()?;
        let order = graph.execution_order()?;
        let slots: HashMap<OperationId, usize> =
            order.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut nodes = Vec::with_capacity(order.len());
        for id in &order {
            let entry = &self.entries[id];
            let mut node = OperationNode::new(*id, entry.prototype.clone_operation());
            node.bind(&entry.parameters, self.config.control_period, |r| {
                slots.get(&r).copied()
            })?;
            nodes.push(node);
        }

        debug!(
            "Compiled program: {} operations, {} references",
            graph.node_count(),
            graph.edge_count()
        );
        Program::new(nodes, self.output, self.config.sample_rate)
    }
}

fn input_index(operation: &dyn Operation, id: OperationId, name: &str) -> Result<usize> {
    operation
        .inputs()
        .iter()
        .position(|spec| spec.name == name)
        .ok_or_else(|| {
            Error::InvalidGraph(format!(
                "{} {} has no input `{}`",
                operation.name(),
                id,
                name
            ))
        })
}

/// Turn named bindings into one parameter per declared input
fn resolve_bindings(
    operation: &dyn Operation,
    id: OperationId,
    bindings: &Bindings,
) -> Result<Vec<Parameter>> {
    for (name, _) in bindings.iter() {
        input_index(operation, id, name)?;
    }

    operation
        .inputs()
        .iter()
        .map(|spec| {
            let parameter = match (bindings.get(spec.name), spec.default) {
                (Some(p), _) => p,
                (None, Some(default)) => Parameter::Control(ControlValue::new(default)),
                (None, None) => {
                    return Err(Error::InvalidGraph(format!(
                        "required input `{}` of {} {} is unbound",
                        spec.name,
                        operation.name(),
                        id
                    )))
                }
            };
            if spec.rate == Rate::Audio && parameter.source().is_none() {
                return Err(Error::InvalidGraph(format!(
                    "audio input `{}` of {} must reference an operation",
                    spec.name, id
                )));
            }
            Ok(parameter)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{BandRejectButterworth, Oscillator, Waveform};

    fn osc() -> Box<dyn Operation> {
        Box::new(Oscillator::new(Waveform::Sine))
    }

    fn notch() -> Box<dyn Operation> {
        Box::new(BandRejectButterworth::new())
    }

    fn model_with_chain() -> (GraphModel, OperationId, OperationId) {
        let mut model = GraphModel::new(EngineConfig::default());
        let (a, _) = model.add_operation(osc(), &Bindings::new()).unwrap();
        let (b, _) = model
            .add_operation(notch(), &Bindings::new().bind("input", a))
            .unwrap();
        (model, a, b)
    }

    #[test]
    fn test_ids_are_monotonic_and_never_reused() {
        let (mut model, a, b) = model_with_chain();
        assert_eq!((a, b), (OperationId(0), OperationId(1)));

        model.remove_operation(b).unwrap();
        let (c, _) = model.add_operation(osc(), &Bindings::new()).unwrap();
        assert_eq!(c, OperationId(2));
        assert!(matches!(
            model.add_operation_with_id(b, osc(), &Bindings::new()),
            Err(Error::DuplicateOperation(id)) if id == b
        ));
        assert_eq!(model.state_of(b), Some(Lifecycle::Removed));
    }

    #[test]
    fn test_last_id_is_refused_without_panicking() {
        let mut model = GraphModel::new(EngineConfig::default());
        let result = model.add_operation_with_id(OperationId(u32::MAX), osc(), &Bindings::new());
        assert!(matches!(result, Err(Error::InvalidGraph(_))));
        assert!(model.is_empty());

        // The highest usable id leaves the automatic counter exhausted
        let top = OperationId(u32::MAX - 1);
        model
            .add_operation_with_id(top, osc(), &Bindings::new())
            .unwrap();
        assert!(matches!(
            model.add_operation(osc(), &Bindings::new()),
            Err(Error::InvalidGraph(_))
        ));
        assert_eq!(model.len(), 1);
        assert!(model.contains(top));
    }

    #[test]
    fn test_defaults_fill_unbound_control_inputs() {
        let (model, _, b) = model_with_chain();
        assert_eq!(
            model.parameter(b, "center_frequency").unwrap(),
            Parameter::control(3000.0)
        );
        assert_eq!(
            model.parameter(b, "bandwidth").unwrap(),
            Parameter::control(2000.0)
        );
    }

    #[test]
    fn test_missing_required_input() {
        let mut model = GraphModel::new(EngineConfig::default());
        let result = model.add_operation(notch(), &Bindings::new().bind("bandwidth", 10.0));
        assert!(matches!(result, Err(Error::InvalidGraph(_))));
        assert!(model.is_empty());
    }

    #[test]
    fn test_unknown_input_name() {
        let (mut model, a, _) = model_with_chain();
        let bindings = Bindings::new().bind("input", a).bind("resonance", 2.0);
        assert!(matches!(
            model.add_operation(notch(), &bindings),
            Err(Error::InvalidGraph(_))
        ));
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn test_audio_input_needs_reference() {
        let mut model = GraphModel::new(EngineConfig::default());
        let result = model.add_operation(notch(), &Bindings::new().bind("input", 0.5));
        assert!(matches!(result, Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn test_self_reference_is_cyclic() {
        let mut model = GraphModel::new(EngineConfig::default());
        let result = model.add_operation_with_id(
            OperationId(7),
            notch(),
            &Bindings::new().bind("input", OperationId(7)),
        );
        assert!(matches!(
            result,
            Err(Error::CyclicGraph {
                operation: OperationId(7)
            })
        ));
        assert_eq!(model.state_of(OperationId(7)), None);
    }

    #[test]
    fn test_rewire_into_cycle_is_rolled_back() {
        // a -> b -> c, then make a's frequency read c
        let (mut model, a, b) = model_with_chain();
        let (c, _) = model
            .add_operation(notch(), &Bindings::new().bind("input", b))
            .unwrap();

        let result = model.set_parameter(a, "frequency", Parameter::reference(c));
        assert!(matches!(result, Err(Error::CyclicGraph { .. })));
        assert_eq!(model.parameter(a, "frequency").unwrap(), Parameter::control(440.0));
        assert!(model.compile().is_ok());
    }

    #[test]
    fn test_unknown_reference() {
        let mut model = GraphModel::new(EngineConfig::default());
        let result = model.add_operation(notch(), &Bindings::new().bind("input", OperationId(42)));
        assert!(matches!(result, Err(Error::UnknownOperation(OperationId(42)))));
        assert!(model.is_empty());

        // The failed add did not consume an id
        let (id, _) = model.add_operation(osc(), &Bindings::new()).unwrap();
        assert_eq!(id, OperationId(0));
    }

    #[test]
    fn test_remove_referenced_operation() {
        let (mut model, a, b) = model_with_chain();
        assert!(matches!(
            model.remove_operation(a),
            Err(Error::DanglingReference { target, referrer }) if target == a && referrer == b
        ));
        assert_eq!(model.len(), 2);
        assert_eq!(model.referrers(a).unwrap(), vec![b]);
    }

    #[test]
    fn test_remove_output_operation() {
        let (mut model, _, b) = model_with_chain();
        model.set_output(b).unwrap();
        assert!(matches!(
            model.remove_operation(b),
            Err(Error::DanglingReference { .. })
        ));
    }

    #[test]
    fn test_scalar_change_is_value_change() {
        let (mut model, _, b) = model_with_chain();
        let change = model
            .set_parameter(b, "bandwidth", Parameter::control(500.0))
            .unwrap();
        assert!(matches!(
            change,
            Change::Value { index: 2, .. }
        ));
        assert_eq!(model.parameter(b, "bandwidth").unwrap(), Parameter::control(500.0));
    }

    #[test]
    fn test_compile_orders_by_reference() {
        let mut model = GraphModel::new(EngineConfig::default());
        model
            .add_operation_with_id(OperationId(9), osc(), &Bindings::new())
            .unwrap();
        model
            .add_operation_with_id(
                OperationId(3),
                notch(),
                &Bindings::new().bind("input", OperationId(9)),
            )
            .unwrap();

        let program = model.compile().unwrap();
        assert_eq!(program.execution_order(), &[OperationId(9), OperationId(3)]);

        // Next automatic id follows the largest one used
        let (id, _) = model.add_operation(osc(), &Bindings::new()).unwrap();
        assert_eq!(id, OperationId(10));
    }
}
