//! Model dependency graph.
//!
//! Derived models declare which models they read from; this module turns
//! those declarations into a DAG and answers the two questions a
//! materialization run needs: what order, and which subset.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::error::{SemanticError, SemanticResult};
use crate::model::ModelDefinition;
use crate::registry::ModelRegistry;

/// The dependency DAG over a catalog's models.
///
/// Edges point from parent to child: an edge `a -> b` means `b` reads
/// from `a`, so `a` must materialize first.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_indices: BTreeMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Build the graph from a registry, rejecting cycles and unknown
    /// parent references.
    pub fn from_registry(registry: &ModelRegistry) -> SemanticResult<Self> {
        Self::from_models(registry.models())
    }

    pub fn from_models<'a>(
        models: impl IntoIterator<Item = &'a ModelDefinition>,
    ) -> SemanticResult<Self> {
        let mut graph = DiGraph::new();
        let mut node_indices = BTreeMap::new();

        // Nodes first, in sorted name order for determinism.
        let models: Vec<&ModelDefinition> = {
            let mut v: Vec<&ModelDefinition> = models.into_iter().collect();
            v.sort_by(|a, b| a.name.cmp(&b.name));
            v
        };
        for model in &models {
            let idx = graph.add_node(model.name.clone());
            node_indices.insert(model.name.clone(), idx);
        }

        for model in &models {
            let child = node_indices[&model.name];
            for parent_name in model.parents() {
                let parent = *node_indices.get(parent_name).ok_or_else(|| {
                    SemanticError::UnknownJoinTarget {
                        model: model.name.clone(),
                        target: parent_name.clone(),
                    }
                })?;
                graph.add_edge(parent, child, ());
            }
        }

        let built = DependencyGraph {
            graph,
            node_indices,
        };
        built.check_acyclic()?;
        Ok(built)
    }

    /// DFS three-color cycle check; reports the offending node sequence.
    fn check_acyclic(&self) -> SemanticResult<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut colors: BTreeMap<NodeIndex, Color> = self
            .node_indices
            .values()
            .map(|idx| (*idx, Color::White))
            .collect();

        fn visit(
            graph: &DiGraph<String, ()>,
            colors: &mut BTreeMap<NodeIndex, Color>,
            stack: &mut Vec<NodeIndex>,
            node: NodeIndex,
        ) -> Result<(), Vec<String>> {
            colors.insert(node, Color::Gray);
            stack.push(node);
            for next in graph.neighbors_directed(node, Direction::Outgoing) {
                match colors[&next] {
                    Color::White => visit(graph, colors, stack, next)?,
                    Color::Gray => {
                        // Found a back edge; slice the stack from the
                        // repeated node to close the cycle.
                        let start = stack.iter().position(|n| *n == next).unwrap_or(0);
                        let mut cycle: Vec<String> =
                            stack[start..].iter().map(|n| graph[*n].clone()).collect();
                        cycle.push(graph[next].clone());
                        return Err(cycle);
                    }
                    Color::Black => {}
                }
            }
            stack.pop();
            colors.insert(node, Color::Black);
            Ok(())
        }

        for idx in self.node_indices.values() {
            if colors[idx] == Color::White {
                let mut stack = Vec::new();
                visit(&self.graph, &mut colors, &mut stack, *idx)
                    .map_err(SemanticError::CyclicDependency)?;
            }
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node_indices.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.node_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_indices.is_empty()
    }

    /// Direct parents of a model, sorted.
    pub fn parents(&self, name: &str) -> Vec<String> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Direct children of a model, sorted.
    pub fn children(&self, name: &str) -> Vec<String> {
        self.neighbors(name, Direction::Outgoing)
    }

    fn neighbors(&self, name: &str, dir: Direction) -> Vec<String> {
        let Some(idx) = self.node_indices.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(*idx, dir)
            .map(|n| self.graph[n].clone())
            .collect();
        names.sort();
        names
    }

    /// The targets plus all their transitive ancestors.
    pub fn ancestors_of(&self, targets: &[&str]) -> SemanticResult<BTreeSet<String>> {
        let mut result = BTreeSet::new();
        let mut stack = Vec::new();
        for target in targets {
            let idx = self
                .node_indices
                .get(*target)
                .ok_or_else(|| SemanticError::UnresolvedReference((*target).into()))?;
            stack.push(*idx);
        }
        while let Some(idx) = stack.pop() {
            if result.insert(self.graph[idx].clone()) {
                stack.extend(self.graph.neighbors_directed(idx, Direction::Incoming));
            }
        }
        Ok(result)
    }

    /// Topological order over a subset of nodes (Kahn's algorithm).
    ///
    /// Ties break by name, so the order is stable across runs.
    pub fn topo_order(&self, subset: &BTreeSet<String>) -> SemanticResult<Vec<String>> {
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        for name in subset {
            if !self.contains(name) {
                return Err(SemanticError::UnresolvedReference(name.clone()));
            }
            let degree = self
                .parents(name)
                .iter()
                .filter(|p| subset.contains(*p))
                .count();
            in_degree.insert(name.as_str(), degree);
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();

        let mut order = Vec::with_capacity(subset.len());
        while let Some(name) = ready.pop_first() {
            order.push(name.to_string());
            for child in self.children(name) {
                if let Some(degree) = in_degree.get_mut(child.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        if let Some(child_ref) = subset.get(&child) {
                            ready.insert(child_ref.as_str());
                        }
                    }
                }
            }
        }

        // Construction already rejected cycles, so this always drains.
        debug_assert_eq!(order.len(), subset.len());
        Ok(order)
    }

    /// Topological order over the whole graph.
    pub fn full_order(&self) -> SemanticResult<Vec<String>> {
        let all: BTreeSet<String> = self.node_indices.keys().cloned().collect();
        self.topo_order(&all)
    }

    /// All descendant models of a node (children, transitively).
    pub fn descendants_of(&self, name: &str) -> BTreeSet<String> {
        let Some(start) = self.node_indices.get(name) else {
            return BTreeSet::new();
        };
        let mut result = BTreeSet::new();
        let mut stack: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(*start, Direction::Outgoing)
            .collect();
        while let Some(idx) = stack.pop() {
            if result.insert(self.graph[idx].clone()) {
                stack.extend(self.graph.neighbors_directed(idx, Direction::Outgoing));
            }
        }
        result
    }
}
