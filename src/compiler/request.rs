//! Query requests.
//!
//! A request names metrics and dimensions from the catalog; it never
//! mentions tables or joins. The compiler resolves names to owning models
//! and derives the join plan.

use serde::{Deserialize, Serialize};

/// Comparison operator in a request filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
    NotIn,
}

/// A filter comparison value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
    List(Vec<FilterValue>),
}

/// A predicate over a metric or dimension.
///
/// Metric filters land in HAVING, dimension filters in WHERE; the compiler
/// decides based on what `target` resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Metric or dimension name.
    pub target: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(target: &str, op: FilterOp, value: FilterValue) -> Self {
        Filter {
            target: target.into(),
            op,
            value,
        }
    }
}

/// A metrics query in catalog vocabulary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
    pub filters: Vec<Filter>,
}

impl QueryRequest {
    pub fn new() -> Self {
        QueryRequest::default()
    }

    pub fn metric(mut self, name: &str) -> Self {
        self.metrics.push(name.into());
        self
    }

    pub fn dimension(mut self, name: &str) -> Self {
        self.dimensions.push(name.into());
        self
    }

    pub fn filter(mut self, target: &str, op: FilterOp, value: FilterValue) -> Self {
        self.filters.push(Filter::new(target, op, value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.dimensions.is_empty()
    }
}
