//! Semantic model definitions.
//!
//! A [`ModelDefinition`] describes one logical table: where its rows come
//! from (a physical relation or a derived query), the dimensions and
//! metrics it exposes, and how it joins to other models. Definitions are
//! declarative data; resolution and SQL generation live in
//! [`crate::registry`] and [`crate::compiler`].

pub mod loader;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SemanticError;

// =============================================================================
// Enumerations
// =============================================================================

/// Join cardinality between two models.
///
/// Written in catalogs as `"1:1"`, `"1:N"`, `"N:1"`, or `"N:M"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// Cardinality of the same relationship read in the other direction.
    pub fn reverse(&self) -> Cardinality {
        match self {
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
            Cardinality::ManyToMany => Cardinality::ManyToMany,
        }
    }

    /// Whether following this edge can multiply rows on the left side.
    pub fn causes_fanout(&self) -> bool {
        matches!(self, Cardinality::OneToMany | Cardinality::ManyToMany)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::OneToOne => "1:1",
            Cardinality::OneToMany => "1:N",
            Cardinality::ManyToOne => "N:1",
            Cardinality::ManyToMany => "N:M",
        }
    }
}

impl FromStr for Cardinality {
    type Err = SemanticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1:1" | "one_to_one" => Ok(Cardinality::OneToOne),
            "1:N" | "1:n" | "one_to_many" => Ok(Cardinality::OneToMany),
            "N:1" | "n:1" | "many_to_one" => Ok(Cardinality::ManyToOne),
            "N:M" | "n:m" | "many_to_many" => Ok(Cardinality::ManyToMany),
            _ => Err(SemanticError::InvalidModel(format!(
                "unknown cardinality '{s}' (expected 1:1, 1:N, N:1 or N:M)"
            ))),
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregation function applied to a metric expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Avg,
    Count,
    CountDistinct,
    Min,
    Max,
}

impl FromStr for Aggregation {
    type Err = SemanticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "avg" | "average" | "mean" => Ok(Aggregation::Avg),
            "count" => Ok(Aggregation::Count),
            "count_distinct" => Ok(Aggregation::CountDistinct),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            _ => Err(SemanticError::InvalidModel(format!(
                "unknown aggregation '{s}'"
            ))),
        }
    }
}

/// Column data types as declared in catalogs.
///
/// Informational for now; the compiler does not type-check expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Number,
    #[default]
    String,
    Bool,
    Timestamp,
}

/// How a derived model is persisted in the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Materialization {
    Table,
    #[default]
    View,
}

// =============================================================================
// Model components
// =============================================================================

/// A dimension: a column (or expression) queries can group and filter by.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    /// Column name or SQL expression over this model's columns.
    pub expr: String,
    pub data_type: DataType,
    /// Marks the model's unique key; used to validate join targets.
    pub primary_key: bool,
}

impl Dimension {
    pub fn new(name: &str, expr: &str) -> Self {
        Dimension {
            name: name.into(),
            expr: expr.into(),
            data_type: DataType::default(),
            primary_key: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }
}

/// A metric: an aggregation over a model's rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub aggregation: Aggregation,
    /// Column name or SQL expression aggregated over.
    pub expr: String,
    /// Optional row predicate folded into the aggregate via CASE WHEN.
    pub filter: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
}

impl Metric {
    pub fn new(name: &str, aggregation: Aggregation, expr: &str) -> Self {
        Metric {
            name: name.into(),
            aggregation,
            expr: expr.into(),
            filter: None,
            label: None,
            description: None,
        }
    }

    pub fn filter(mut self, predicate: &str) -> Self {
        self.filter = Some(predicate.into());
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A declared join from this model to another.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    /// Target model name.
    pub model: String,
    /// Equi-join column pairs: (column on this model, column on the target).
    pub on: Vec<(String, String)>,
    pub cardinality: Cardinality,
}

impl JoinSpec {
    pub fn new(model: &str, on: Vec<(&str, &str)>, cardinality: Cardinality) -> Self {
        JoinSpec {
            model: model.into(),
            on: on
                .into_iter()
                .map(|(l, r)| (l.to_string(), r.to_string()))
                .collect(),
            cardinality,
        }
    }
}

/// Where a model's rows come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// A physical table or view already present in the warehouse.
    Relation {
        schema: Option<String>,
        table: String,
    },
    /// A derived model: arbitrary SQL over other models.
    Query {
        sql: String,
        /// Names of the models this query reads from. Declared explicitly;
        /// the SQL is not parsed for references.
        depends_on: Vec<String>,
    },
}

// =============================================================================
// ModelDefinition
// =============================================================================

/// One logical table in the semantic catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    pub name: String,
    pub source: ModelSource,
    /// Keyed by dimension name; BTreeMap keeps iteration deterministic.
    pub dimensions: BTreeMap<String, Dimension>,
    /// Keyed by metric name.
    pub metrics: BTreeMap<String, Metric>,
    pub joins: Vec<JoinSpec>,
    pub materialized: Materialization,
    pub description: Option<String>,
}

impl ModelDefinition {
    /// A model backed by a physical relation.
    pub fn relation(name: &str, schema: Option<&str>, table: &str) -> Self {
        ModelDefinition {
            name: name.into(),
            source: ModelSource::Relation {
                schema: schema.map(Into::into),
                table: table.into(),
            },
            dimensions: BTreeMap::new(),
            metrics: BTreeMap::new(),
            joins: Vec::new(),
            materialized: Materialization::default(),
            description: None,
        }
    }

    /// A derived model defined by SQL over other models.
    pub fn derived(name: &str, sql: &str, depends_on: Vec<&str>) -> Self {
        ModelDefinition {
            name: name.into(),
            source: ModelSource::Query {
                sql: sql.into(),
                depends_on: depends_on.into_iter().map(Into::into).collect(),
            },
            dimensions: BTreeMap::new(),
            metrics: BTreeMap::new(),
            joins: Vec::new(),
            materialized: Materialization::default(),
            description: None,
        }
    }

    pub fn with_dimension(mut self, dim: Dimension) -> Self {
        self.dimensions.insert(dim.name.clone(), dim);
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.insert(metric.name.clone(), metric);
        self
    }

    pub fn with_join(mut self, join: JoinSpec) -> Self {
        self.joins.push(join);
        self
    }

    pub fn materialized_as(mut self, materialization: Materialization) -> Self {
        self.materialized = materialization;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The physical relation queried for this model's rows.
    ///
    /// Derived models are read back under their own name once materialized.
    pub fn relation_name(&self) -> &str {
        match &self.source {
            ModelSource::Relation { table, .. } => table,
            ModelSource::Query { .. } => &self.name,
        }
    }

    /// Schema of the backing relation, if declared.
    pub fn relation_schema(&self) -> Option<&str> {
        match &self.source {
            ModelSource::Relation { schema, .. } => schema.as_deref(),
            ModelSource::Query { .. } => None,
        }
    }

    /// Names of upstream models this model reads from.
    ///
    /// Relation-backed models have no parents.
    pub fn parents(&self) -> &[String] {
        match &self.source {
            ModelSource::Relation { .. } => &[],
            ModelSource::Query { depends_on, .. } => depends_on,
        }
    }

    /// Whether this model is produced by a materialization run.
    pub fn is_derived(&self) -> bool {
        matches!(self.source, ModelSource::Query { .. })
    }

    /// The primary-key dimension, if one is declared.
    pub fn primary_key(&self) -> Option<&Dimension> {
        self.dimensions.values().find(|d| d.primary_key)
    }

    /// Structural validation of a single definition.
    ///
    /// Cross-model checks (join targets, dependency cycles) happen when the
    /// registry or graph is built.
    pub fn validate(&self) -> Result<(), SemanticError> {
        if self.name.is_empty() {
            return Err(SemanticError::InvalidModel(
                "model name must not be empty".into(),
            ));
        }

        match &self.source {
            ModelSource::Relation { table, .. } if table.is_empty() => {
                return Err(SemanticError::InvalidModel(format!(
                    "model '{}' has an empty table name",
                    self.name
                )));
            }
            ModelSource::Query { sql, .. } if sql.trim().is_empty() => {
                return Err(SemanticError::InvalidModel(format!(
                    "derived model '{}' has an empty query",
                    self.name
                )));
            }
            _ => {}
        }

        let pk_count = self.dimensions.values().filter(|d| d.primary_key).count();
        if pk_count > 1 {
            return Err(SemanticError::InvalidModel(format!(
                "model '{}' declares {} primary keys; at most one is allowed",
                self.name, pk_count
            )));
        }

        for dim in self.dimensions.values() {
            if dim.expr.is_empty() {
                return Err(SemanticError::InvalidModel(format!(
                    "dimension '{}.{}' has an empty expression",
                    self.name, dim.name
                )));
            }
        }

        for metric in self.metrics.values() {
            if metric.expr.is_empty() {
                return Err(SemanticError::InvalidModel(format!(
                    "metric '{}.{}' has an empty expression",
                    self.name, metric.name
                )));
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        for join in &self.joins {
            if join.on.is_empty() {
                return Err(SemanticError::InvalidModel(format!(
                    "join from '{}' to '{}' has no column pairs",
                    self.name, join.model
                )));
            }
            if !seen.insert(join.model.as_str()) {
                return Err(SemanticError::InvalidModel(format!(
                    "model '{}' declares multiple joins to '{}'",
                    self.name, join.model
                )));
            }
        }

        Ok(())
    }
}
