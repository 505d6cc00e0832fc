/// Dependency graph analysis for operation execution
///
/// This module analyzes the operation graph to determine:
/// - Execution order (topological sort)
/// - Cycle detection (invalid graphs)
/// - Who still reads a given operation (for safe removal)
use crate::error::{Error, Result};
use crate::operation::OperationId;
use crate::parameter::Parameter;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

/// Represents the operation dependency graph
///
/// # Graph Structure
/// - Nodes: Operations (sources, filters, ...)
/// - Edges: Signal references (data flow from referenced → referrer)
///
/// # Usage
/// ```ignore
/// let graph = DependencyGraph::build(model.iter())?;
/// let order = graph.execution_order()?;  // Topological sort
/// ```
pub struct DependencyGraph {
    /// Directed graph of operation dependencies
    graph: DiGraph<OperationId, ()>,

    /// Map OperationId → NodeIndex for graph operations
    node_map: HashMap<OperationId, NodeIndex>,
}

impl DependencyGraph {
    /// Build dependency graph from operations and their bound parameters
    ///
    /// # Errors
    /// - `UnknownOperation` if a parameter references an operation not in `operations`
    pub fn build<'a, I>(operations: I) -> Result<Self>
    where
        I: IntoIterator<Item = (OperationId, &'a [Parameter])>,
    {
        let operations: Vec<(OperationId, &'a [Parameter])> = operations.into_iter().collect();
        let mut graph = DiGraph::with_capacity(operations.len(), operations.len());
        let mut node_map = HashMap::with_capacity(operations.len());

        for (id, _) in &operations {
            let idx = graph.add_node(*id);
            node_map.insert(*id, idx);
        }

        for (id, parameters) in &operations {
            let dependent_idx = node_map[id];

            for source in parameters.iter().filter_map(Parameter::source) {
                let input_idx = *node_map
                    .get(&source)
                    .ok_or(Error::UnknownOperation(source))?;
                // Edge: input → dependent (data flows this direction)
                graph.add_edge(input_idx, dependent_idx, ());
            }
        }

        Ok(Self { graph, node_map })
    }

    /// Get topologically sorted execution order
    ///
    /// Every operation appears after all operations it references.
    ///
    /// # Errors
    /// `CyclicGraph` naming an operation on the cycle
    pub fn execution_order(&self) -> Result<Vec<OperationId>> {
        toposort(&self.graph, None)
            .map(|order| order.iter().map(|&idx| self.graph[idx]).collect())
            .map_err(|cycle| Error::CyclicGraph {
                operation: self.graph[cycle.node_id()],
            })
    }

    /// Operations that read this operation's output, sorted and deduplicated
    pub fn dependents(&self, id: OperationId) -> Vec<OperationId> {
        let Some(&idx) = self.node_map.get(&id) else {
            return vec![];
        };
        let mut ids: Vec<OperationId> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n])
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get number of edges (references) in graph
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
