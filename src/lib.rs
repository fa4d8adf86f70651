//! # Strata
//!
//! A semantic metrics layer that compiles to SQL and materializes model
//! DAGs.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Catalog (model definitions, TOML)               │
//! │  (relations, dimensions, metrics, joins, derived SQL)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [registry]
//! ┌─────────────────────────────────────────────────────────┐
//! │        ModelRegistry + join graph (petgraph)             │
//! └─────────────────────────────────────────────────────────┘
//!              │                          │
//!              ▼ [compiler]               ▼ [graph]
//! ┌──────────────────────────┐ ┌──────────────────────────┐
//! │  QueryRequest -> SQL     │ │  Dependency DAG          │
//! │  (joins planned for you) │ │  (topological order)     │
//! └──────────────────────────┘ └──────────────────────────┘
//!              │                          │
//!              ▼ [sql]                    ▼ [executor]
//! ┌──────────────────────────┐ ┌──────────────────────────┐
//! │  Token stream -> dialect │ │  Materialization run     │
//! │  (sqlite/duckdb/postgres)│ │  (concurrent, skippable) │
//! └──────────────────────────┘ └──────────────────────────┘
//! ```

pub mod client;
pub mod compiler;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod model;
pub mod registry;
pub mod sql;

pub use error::{SemanticError, SemanticResult};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::client::{ClientError, Row, SqlClient};
    pub use crate::compiler::{
        CompiledQuery, Filter, FilterOp, FilterValue, QueryCompiler, QueryRequest,
    };
    pub use crate::config::Settings;
    pub use crate::error::{SemanticError, SemanticResult};
    pub use crate::executor::{
        CancelToken, ExecutionContext, Executor, NodeState, RunReport,
    };
    pub use crate::graph::DependencyGraph;
    pub use crate::model::{
        Aggregation, Cardinality, DataType, Dimension, JoinSpec, Materialization, Metric,
        ModelDefinition, ModelSource,
    };
    pub use crate::registry::{JoinPath, ModelRegistry};
    pub use crate::sql::{Dialect, SqlDialect};
}
