//! Join path resolution over the registry's join graph.
//!
//! Paths are resolved by breadth-first search, so the shortest join chain
//! always wins. While searching we also count how many distinct shortest
//! paths reach each node; more than one at the target means the catalog is
//! ambiguous and the query is rejected rather than silently picking a side.

use std::collections::{BTreeMap, VecDeque};

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;

use super::{JoinEdge, ModelRegistry};
use crate::error::{SemanticError, SemanticResult};

/// A resolved chain of joins from one model to another.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinPath {
    pub from: String,
    pub to: String,
    /// Edges in traversal order; empty when `from == to`.
    pub steps: Vec<JoinEdge>,
}

impl JoinPath {
    pub fn hops(&self) -> usize {
        self.steps.len()
    }

    /// Whether any step can multiply rows on the base side.
    pub fn causes_fanout(&self) -> bool {
        self.steps.iter().any(|e| e.cardinality.causes_fanout())
    }
}

struct BfsState {
    dist: BTreeMap<NodeIndex, usize>,
    /// Number of distinct shortest paths reaching each node.
    sigma: BTreeMap<NodeIndex, usize>,
    parent: BTreeMap<NodeIndex, (NodeIndex, JoinEdge)>,
}

fn bfs(registry: &ModelRegistry, start: NodeIndex) -> BfsState {
    let graph = registry.graph();
    let mut state = BfsState {
        dist: BTreeMap::new(),
        sigma: BTreeMap::new(),
        parent: BTreeMap::new(),
    };
    state.dist.insert(start, 0);
    state.sigma.insert(start, 1);

    let mut queue = VecDeque::new();
    queue.push_back(start);

    while let Some(node) = queue.pop_front() {
        let node_dist = state.dist[&node];
        let node_sigma = state.sigma[&node];
        for edge in graph.edges(node) {
            let next = edge.target();
            match state.dist.get(&next) {
                None => {
                    state.dist.insert(next, node_dist + 1);
                    state.sigma.insert(next, node_sigma);
                    state.parent.insert(next, (node, edge.weight().clone()));
                    queue.push_back(next);
                }
                Some(&d) if d == node_dist + 1 => {
                    // Another shortest path arrives here.
                    *state.sigma.entry(next).or_insert(0) += node_sigma;
                }
                Some(_) => {}
            }
        }
    }

    state
}

/// Resolve the unique shortest join path between two models.
pub fn resolve_join_path(
    registry: &ModelRegistry,
    from: &str,
    to: &str,
) -> SemanticResult<JoinPath> {
    let from_idx = registry
        .node_index(from)
        .ok_or_else(|| SemanticError::UnresolvedReference(from.into()))?;
    let to_idx = registry
        .node_index(to)
        .ok_or_else(|| SemanticError::UnresolvedReference(to.into()))?;

    if from_idx == to_idx {
        return Ok(JoinPath {
            from: from.into(),
            to: to.into(),
            steps: Vec::new(),
        });
    }

    let state = bfs(registry, from_idx);

    let hops = *state
        .dist
        .get(&to_idx)
        .ok_or_else(|| SemanticError::NoJoinPath {
            from: from.into(),
            to: to.into(),
        })?;

    let count = state.sigma[&to_idx];
    if count > 1 {
        return Err(SemanticError::AmbiguousJoinPath {
            from: from.into(),
            to: to.into(),
            count,
            hops,
        });
    }

    // Walk parent pointers back from the target.
    let mut steps = Vec::with_capacity(hops);
    let mut cursor = to_idx;
    while cursor != from_idx {
        let (prev, edge) = state.parent[&cursor].clone();
        steps.push(edge);
        cursor = prev;
    }
    steps.reverse();

    Ok(JoinPath {
        from: from.into(),
        to: to.into(),
        steps,
    })
}

/// Resolve paths from a base model to several targets and merge them into
/// one ordered edge list, deduplicating shared prefixes.
pub fn join_tree(
    registry: &ModelRegistry,
    base: &str,
    targets: &[&str],
) -> SemanticResult<Vec<JoinEdge>> {
    let mut edges = Vec::new();
    let mut seen: Vec<(String, String)> = Vec::new();

    for target in targets {
        let path = resolve_join_path(registry, base, target)?;
        for edge in path.steps {
            let key = (edge.from_model.clone(), edge.to_model.clone());
            if !seen.contains(&key) {
                seen.push(key);
                edges.push(edge);
            }
        }
    }

    Ok(edges)
}

/// Whether any join chain connects the two models.
pub fn has_path(registry: &ModelRegistry, from: &str, to: &str) -> bool {
    match (registry.node_index(from), registry.node_index(to)) {
        (Some(f), Some(t)) => f == t || bfs(registry, f).dist.contains_key(&t),
        _ => false,
    }
}

/// All models reachable from the given one, in sorted order.
pub fn reachable_models(registry: &ModelRegistry, from: &str) -> Vec<String> {
    let Some(start) = registry.node_index(from) else {
        return Vec::new();
    };
    let state = bfs(registry, start);
    let graph = registry.graph();
    let mut names: Vec<String> = state
        .dist
        .keys()
        .map(|idx| graph[*idx].clone())
        .collect();
    names.sort();
    names
}
