//! TOML catalog loader.
//!
//! Models are declared in TOML catalogs as `[[model]]` tables:
//!
//! ```toml
//! [[model]]
//! name = "orders"
//! table = "orders"
//!
//! [[model.dimension]]
//! name = "id"
//! primary_key = true
//!
//! [[model.metric]]
//! name = "revenue"
//! aggregation = "sum"
//! expr = "price"
//!
//! [[model.join]]
//! model = "customers"
//! on = [["customer_id", "id"]]
//! cardinality = "N:1"
//! ```
//!
//! Derived models declare `sql` and `depends_on` instead of `table`.

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::error::SemanticError;
use crate::model::{
    Aggregation, Cardinality, DataType, Dimension, JoinSpec, Materialization, Metric,
    ModelDefinition, ModelSource,
};

/// Errors that can occur when loading a catalog.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// IO error reading the catalog file
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or shape error
    #[error("catalog parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Structurally invalid declaration
    #[error("invalid model '{model}': {message}")]
    Invalid { model: String, message: String },

    /// Model-level validation failed
    #[error(transparent)]
    Model(#[from] SemanticError),
}

/// Result type for catalog loading.
pub type LoaderResult<T> = Result<T, LoaderError>;

// Raw serde shapes. Kept private; `load_str` converts them into the
// builder-validated `ModelDefinition`.

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default, rename = "model")]
    models: Vec<RawModel>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModel {
    name: String,
    table: Option<String>,
    schema: Option<String>,
    sql: Option<String>,
    #[serde(default)]
    depends_on: Vec<String>,
    materialized: Option<String>,
    description: Option<String>,
    #[serde(default, rename = "dimension")]
    dimensions: Vec<RawDimension>,
    #[serde(default, rename = "metric")]
    metrics: Vec<RawMetric>,
    #[serde(default, rename = "join")]
    joins: Vec<RawJoin>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDimension {
    name: String,
    /// Defaults to the dimension name.
    expr: Option<String>,
    #[serde(rename = "type")]
    data_type: Option<DataType>,
    #[serde(default)]
    primary_key: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMetric {
    name: String,
    aggregation: String,
    /// Defaults to the metric name.
    expr: Option<String>,
    filter: Option<String>,
    label: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawJoin {
    model: String,
    on: Vec<[String; 2]>,
    cardinality: String,
}

fn invalid(model: &str, message: impl Into<String>) -> LoaderError {
    LoaderError::Invalid {
        model: model.into(),
        message: message.into(),
    }
}

impl RawModel {
    fn into_definition(self) -> LoaderResult<ModelDefinition> {
        let source = match (&self.table, &self.sql) {
            (Some(table), None) => ModelSource::Relation {
                schema: self.schema.clone(),
                table: table.clone(),
            },
            (None, Some(sql)) => ModelSource::Query {
                sql: sql.clone(),
                depends_on: self.depends_on.clone(),
            },
            (Some(_), Some(_)) => {
                return Err(invalid(&self.name, "declare either 'table' or 'sql', not both"));
            }
            (None, None) => {
                return Err(invalid(&self.name, "missing 'table' or 'sql'"));
            }
        };

        if self.table.is_some() && !self.depends_on.is_empty() {
            return Err(invalid(
                &self.name,
                "'depends_on' is only valid on derived models",
            ));
        }

        let materialized = match self.materialized.as_deref() {
            None => Materialization::default(),
            Some("table") => Materialization::Table,
            Some("view") => Materialization::View,
            Some(other) => {
                return Err(invalid(
                    &self.name,
                    format!("unknown materialization '{other}' (expected 'table' or 'view')"),
                ));
            }
        };

        let mut def = ModelDefinition {
            name: self.name.clone(),
            source,
            dimensions: Default::default(),
            metrics: Default::default(),
            joins: Vec::new(),
            materialized,
            description: self.description,
        };

        for raw in self.dimensions {
            let expr = raw.expr.unwrap_or_else(|| raw.name.clone());
            let mut dim = Dimension::new(&raw.name, &expr);
            if let Some(data_type) = raw.data_type {
                dim = dim.data_type(data_type);
            }
            if raw.primary_key {
                dim = dim.primary_key();
            }
            if def.dimensions.insert(dim.name.clone(), dim).is_some() {
                return Err(invalid(
                    &self.name,
                    format!("duplicate dimension '{}'", raw.name),
                ));
            }
        }

        for raw in self.metrics {
            let aggregation = Aggregation::from_str(&raw.aggregation)
                .map_err(|e| invalid(&self.name, e.to_string()))?;
            let expr = raw.expr.unwrap_or_else(|| raw.name.clone());
            let mut metric = Metric::new(&raw.name, aggregation, &expr);
            metric.filter = raw.filter;
            metric.label = raw.label;
            metric.description = raw.description;
            if def.metrics.insert(metric.name.clone(), metric).is_some() {
                return Err(invalid(
                    &self.name,
                    format!("duplicate metric '{}'", raw.name),
                ));
            }
        }

        for raw in self.joins {
            let cardinality = Cardinality::from_str(&raw.cardinality)
                .map_err(|e| invalid(&self.name, e.to_string()))?;
            def.joins.push(JoinSpec {
                model: raw.model,
                on: raw
                    .on
                    .into_iter()
                    .map(|[left, right]| (left, right))
                    .collect(),
                cardinality,
            });
        }

        def.validate()?;
        Ok(def)
    }
}

/// Parse a catalog from a TOML string.
pub fn load_str(content: &str) -> LoaderResult<Vec<ModelDefinition>> {
    let raw: RawCatalog = toml::from_str(content)?;
    raw.models
        .into_iter()
        .map(RawModel::into_definition)
        .collect()
}

/// Load a catalog from a file path.
pub fn load_file(path: &Path) -> LoaderResult<Vec<ModelDefinition>> {
    let content = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_str(&content)
}
