//! Model registry and join graph.
//!
//! The registry owns every [`ModelDefinition`] in the catalog and a
//! petgraph [`DiGraph`] of declared joins. Each declared join contributes
//! two edges, one per direction, with the reverse edge carrying the
//! reversed cardinality; path finding then works regardless of which model
//! declared the join.

pub mod path;

use std::collections::BTreeMap;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{SemanticError, SemanticResult};
use crate::model::{Cardinality, ModelDefinition};

pub use path::JoinPath;

/// A directed join edge between two models.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinEdge {
    pub from_model: String,
    pub to_model: String,
    /// Equi-join pairs: (column on `from_model`, column on `to_model`).
    pub on: Vec<(String, String)>,
    /// Cardinality read in the edge's direction.
    pub cardinality: Cardinality,
}

/// The semantic catalog: models plus their join graph.
#[derive(Debug)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelDefinition>,
    graph: DiGraph<String, JoinEdge>,
    node_indices: BTreeMap<String, NodeIndex>,
}

impl ModelRegistry {
    /// Build a registry from a set of model definitions.
    ///
    /// Validates each definition, rejects duplicate names, and requires
    /// every join target to name a registered model.
    pub fn from_models(models: Vec<ModelDefinition>) -> SemanticResult<Self> {
        let mut registry = ModelRegistry {
            models: BTreeMap::new(),
            graph: DiGraph::new(),
            node_indices: BTreeMap::new(),
        };

        // First pass: register nodes.
        for model in models {
            model.validate()?;
            if registry.models.contains_key(&model.name) {
                return Err(SemanticError::DuplicateModel(model.name));
            }
            let idx = registry.graph.add_node(model.name.clone());
            registry.node_indices.insert(model.name.clone(), idx);
            registry.models.insert(model.name.clone(), model);
        }

        // Second pass: wire join edges, both directions.
        let mut edges = Vec::new();
        for model in registry.models.values() {
            let from_idx = registry.node_indices[&model.name];
            for join in &model.joins {
                let to_idx = *registry.node_indices.get(&join.model).ok_or_else(|| {
                    SemanticError::UnknownJoinTarget {
                        model: model.name.clone(),
                        target: join.model.clone(),
                    }
                })?;

                let forward = JoinEdge {
                    from_model: model.name.clone(),
                    to_model: join.model.clone(),
                    on: join.on.clone(),
                    cardinality: join.cardinality,
                };
                let reverse = JoinEdge {
                    from_model: join.model.clone(),
                    to_model: model.name.clone(),
                    on: join.on.iter().map(|(l, r)| (r.clone(), l.clone())).collect(),
                    cardinality: join.cardinality.reverse(),
                };
                edges.push((from_idx, to_idx, forward));
                edges.push((to_idx, from_idx, reverse));
            }
        }
        for (from, to, edge) in edges {
            registry.graph.add_edge(from, to, edge);
        }

        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&ModelDefinition> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Model names in sorted order.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelDefinition> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub(crate) fn graph(&self) -> &DiGraph<String, JoinEdge> {
        &self.graph
    }

    pub(crate) fn node_index(&self, name: &str) -> Option<NodeIndex> {
        self.node_indices.get(name).copied()
    }

    /// The unique model declaring a metric with this name.
    ///
    /// Metric names are resolved across the whole catalog; a name declared
    /// by more than one model is ambiguous and must be qualified upstream.
    pub fn owner_of_metric(&self, name: &str) -> SemanticResult<&ModelDefinition> {
        let owners: Vec<&ModelDefinition> = self
            .models
            .values()
            .filter(|m| m.metrics.contains_key(name))
            .collect();
        match owners.as_slice() {
            [] => Err(SemanticError::UnresolvedReference(name.into())),
            [one] => Ok(one),
            many => Err(SemanticError::AmbiguousReference {
                name: name.into(),
                models: many.iter().map(|m| m.name.clone()).collect(),
            }),
        }
    }

    /// The unique model declaring a dimension with this name.
    pub fn owner_of_dimension(&self, name: &str) -> SemanticResult<&ModelDefinition> {
        let owners: Vec<&ModelDefinition> = self
            .models
            .values()
            .filter(|m| m.dimensions.contains_key(name))
            .collect();
        match owners.as_slice() {
            [] => Err(SemanticError::UnresolvedReference(name.into())),
            [one] => Ok(one),
            many => Err(SemanticError::AmbiguousReference {
                name: name.into(),
                models: many.iter().map(|m| m.name.clone()).collect(),
            }),
        }
    }
}
