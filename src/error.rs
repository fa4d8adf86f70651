//! Unified error types for the semantic layer.
//!
//! Registry, compiler, and graph operations all share one error enum so
//! callers can match on a single taxonomy. Validation errors are raised at
//! load/build time and are fatal to that call; they are never swallowed.
//! Node execution errors during a run are a different beast - those are
//! captured per node in the [`RunReport`](crate::executor::RunReport).

use thiserror::Error;

/// Result type for semantic operations.
pub type SemanticResult<T> = Result<T, SemanticError>;

/// Unified error type for the semantic layer.
///
/// Covers model registration, join path resolution, query compilation,
/// and dependency graph construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticError {
    /// A model with this name is already registered.
    #[error("duplicate model: '{0}'")]
    DuplicateModel(String),

    /// A declared join references a model that is not registered.
    #[error("join on model '{model}' references unknown target '{target}'")]
    UnknownJoinTarget { model: String, target: String },

    /// No chain of declared joins connects the two models.
    #[error("no join path from '{from}' to '{to}'")]
    NoJoinPath { from: String, to: String },

    /// Multiple shortest join paths exist between two models.
    ///
    /// The registry refuses to pick one silently; the catalog author must
    /// restructure the joins (or query via an unambiguous intermediate).
    #[error("ambiguous join path from '{from}' to '{to}': {count} paths of {hops} hop(s)")]
    AmbiguousJoinPath {
        from: String,
        to: String,
        count: usize,
        hops: usize,
    },

    /// A requested name does not exist on any registered model.
    #[error("unresolved reference: '{0}'")]
    UnresolvedReference(String),

    /// A requested name exists on more than one registered model.
    #[error("ambiguous reference '{name}', defined on: {}", .models.join(", "))]
    AmbiguousReference { name: String, models: Vec<String> },

    /// Requested metrics are owned by different models.
    ///
    /// A single request must aggregate at one model's grain; ask for the
    /// metrics in separate requests instead.
    #[error("requested metrics span multiple models: {}", .models.join(", "))]
    MetricsSpanModels { models: Vec<String> },

    /// The model catalog contains a dependency cycle.
    #[error("cyclic dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    /// A request named no metrics and no dimensions.
    #[error("query request names no metrics or dimensions")]
    EmptyRequest,

    /// Invalid model configuration.
    #[error("invalid model: {0}")]
    InvalidModel(String),
}
