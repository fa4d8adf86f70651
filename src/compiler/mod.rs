//! Query compiler: catalog vocabulary in, SQL out.
//!
//! The compiler resolves metric and dimension names to their owning models,
//! plans the join chain through the registry's graph, and lowers the result
//! to a [`Query`] AST. Callers never write JOINs; the catalog's declared
//! relationships are the only source of join conditions.

pub mod request;

use tracing::{debug, warn};

use crate::error::{SemanticError, SemanticResult};
use crate::model::{Aggregation, Metric, ModelDefinition, ModelSource};
use crate::registry::path::join_tree;
use crate::registry::{JoinEdge, ModelRegistry};
use crate::sql::{
    count_distinct, func, lit_bool, lit_float, lit_int, lit_null, lit_str, star, table_col,
    BinaryOperator, Dialect, Expr, ExprExt, Query, TableRef,
};

pub use request::{Filter, FilterOp, FilterValue, QueryRequest};

/// A compiled request: SQL plus provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    /// Models referenced, base model first, joins in traversal order.
    pub tables: Vec<String>,
    /// Join edges actually emitted, in traversal order.
    pub joins: Vec<JoinEdge>,
    /// True when some join step can multiply base rows and skew aggregates.
    pub fanout_risk: bool,
}

/// Compiles [`QueryRequest`]s against a [`ModelRegistry`].
#[derive(Debug)]
pub struct QueryCompiler<'a> {
    registry: &'a ModelRegistry,
    dialect: Dialect,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        QueryCompiler {
            registry,
            dialect: Dialect::default(),
        }
    }

    pub fn with_dialect(registry: &'a ModelRegistry, dialect: Dialect) -> Self {
        QueryCompiler { registry, dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Compile a request into SQL.
    pub fn compile(&self, request: &QueryRequest) -> SemanticResult<CompiledQuery> {
        if request.is_empty() {
            return Err(SemanticError::EmptyRequest);
        }

        // Resolve metrics; all must live on one model, which becomes the
        // aggregation grain.
        let mut metric_refs: Vec<(&ModelDefinition, &Metric)> = Vec::new();
        for name in &request.metrics {
            let owner = self.registry.owner_of_metric(name)?;
            metric_refs.push((owner, &owner.metrics[name]));
        }
        {
            let mut owners: Vec<&str> =
                metric_refs.iter().map(|(m, _)| m.name.as_str()).collect();
            owners.sort_unstable();
            owners.dedup();
            if owners.len() > 1 {
                return Err(SemanticError::MetricsSpanModels {
                    models: owners.into_iter().map(String::from).collect(),
                });
            }
        }

        let dimension_refs: Vec<(&ModelDefinition, &crate::model::Dimension)> = request
            .dimensions
            .iter()
            .map(|name| {
                let owner = self.registry.owner_of_dimension(name)?;
                Ok((owner, &owner.dimensions[name]))
            })
            .collect::<SemanticResult<_>>()?;

        // Base model: the metrics' model, else the first dimension's.
        let base = match metric_refs.first() {
            Some((model, _)) => *model,
            None => dimension_refs[0].0,
        };

        // Classify filters up front; their owners join too.
        let filter_refs = self.resolve_filters(request)?;
        let has_metric_filter = filter_refs
            .iter()
            .any(|f| matches!(f, FilterRef::Metric { .. }));

        // Every non-base model referenced anywhere must be joined in.
        let mut targets: Vec<&str> = Vec::new();
        for (model, _) in &dimension_refs {
            if model.name != base.name {
                targets.push(model.name.as_str());
            }
        }
        for filter_ref in &filter_refs {
            let owner = filter_ref.owner_name();
            if owner != base.name {
                targets.push(owner);
            }
        }

        let edges = join_tree(self.registry, &base.name, &targets)?;
        let fanout_risk = edges.iter().any(|e| e.cardinality.causes_fanout());
        if fanout_risk {
            warn!(
                base = %base.name,
                "join plan crosses a to-many relationship; aggregates may overcount"
            );
        }

        // Lower to the query AST.
        let mut query = Query::new().from(table_ref_for(base));
        let mut tables = vec![base.name.clone()];

        for edge in &edges {
            let target = self
                .registry
                .get(&edge.to_model)
                .ok_or_else(|| SemanticError::UnresolvedReference(edge.to_model.clone()))?;
            let on = edge
                .on
                .iter()
                .map(|(left, right)| {
                    table_col(&edge.from_model, left).eq(table_col(&edge.to_model, right))
                })
                .reduce(|a, b| a.and(b))
                .ok_or_else(|| {
                    SemanticError::InvalidModel(format!(
                        "join from '{}' to '{}' has no column pairs",
                        edge.from_model, edge.to_model
                    ))
                })?;
            query = query.inner_join(table_ref_for(target), on);
            tables.push(edge.to_model.clone());
        }

        // Dimensions first, then metrics, each in request order.
        for (model, dim) in &dimension_refs {
            let expr = column_expr(&model.name, &dim.expr);
            query = query.select(expr.alias(&dim.name));
        }
        for (model, metric) in &metric_refs {
            query = query.select(aggregate_expr(&model.name, metric).alias(&metric.name));
        }

        // A HAVING predicate needs an aggregated query even when no metric
        // is selected, so metric filters force the GROUP BY too.
        if !metric_refs.is_empty() || has_metric_filter {
            for (model, dim) in &dimension_refs {
                query = query.group_by(column_expr(&model.name, &dim.expr));
            }
        }

        for filter_ref in filter_refs {
            match filter_ref {
                FilterRef::Metric {
                    model,
                    metric,
                    filter,
                } => {
                    let predicate =
                        comparison(aggregate_expr(&model.name, metric), filter)?;
                    query = query.having(predicate);
                }
                FilterRef::Dimension {
                    model,
                    dim,
                    filter,
                } => {
                    let predicate = comparison(column_expr(&model.name, &dim.expr), filter)?;
                    query = query.filter(predicate);
                }
            }
        }

        let sql = query.to_sql(self.dialect);
        debug!(
            base = %base.name,
            joins = edges.len(),
            dialect = %self.dialect,
            "compiled request"
        );

        Ok(CompiledQuery {
            sql,
            tables,
            joins: edges,
            fanout_risk,
        })
    }

    /// The materialization query for one model.
    ///
    /// Derived models yield their declared SQL (placeholders untouched;
    /// the executor expands them). Relation-backed models yield a plain
    /// `SELECT *` over the backing relation.
    pub fn compile_model(&self, name: &str) -> SemanticResult<CompiledQuery> {
        let model = self
            .registry
            .get(name)
            .ok_or_else(|| SemanticError::UnresolvedReference(name.into()))?;
        match &model.source {
            ModelSource::Query { sql, depends_on } => Ok(CompiledQuery {
                sql: sql.trim().to_string(),
                tables: depends_on.clone(),
                joins: Vec::new(),
                fanout_risk: false,
            }),
            ModelSource::Relation { .. } => {
                let query = Query::new()
                    .select(crate::sql::SelectExpr::new(star()))
                    .from(table_ref_for(model));
                Ok(CompiledQuery {
                    sql: query.to_sql(self.dialect),
                    tables: vec![model.name.clone()],
                    joins: Vec::new(),
                    fanout_risk: false,
                })
            }
        }
    }

    fn resolve_filters<'b>(&'b self, request: &'b QueryRequest) -> SemanticResult<Vec<FilterRef<'b>>> {
        request
            .filters
            .iter()
            .map(|filter| {
                // Metric names shadow dimension names for filter targets.
                // Only a target unknown as a metric falls through; an
                // ambiguous metric name is an error, not a dimension.
                match self.registry.owner_of_metric(&filter.target) {
                    Ok(model) => {
                        return Ok(FilterRef::Metric {
                            model,
                            metric: &model.metrics[&filter.target],
                            filter,
                        });
                    }
                    Err(SemanticError::UnresolvedReference(_)) => {}
                    Err(other) => return Err(other),
                }
                let model = self.registry.owner_of_dimension(&filter.target)?;
                Ok(FilterRef::Dimension {
                    model,
                    dim: &model.dimensions[&filter.target],
                    filter,
                })
            })
            .collect()
    }
}

enum FilterRef<'a> {
    Metric {
        model: &'a ModelDefinition,
        metric: &'a Metric,
        filter: &'a Filter,
    },
    Dimension {
        model: &'a ModelDefinition,
        dim: &'a crate::model::Dimension,
        filter: &'a Filter,
    },
}

impl<'a> FilterRef<'a> {
    fn owner_name(&self) -> &'a str {
        match self {
            FilterRef::Metric { model, .. } => &model.name,
            FilterRef::Dimension { model, .. } => &model.name,
        }
    }
}

fn table_ref_for(model: &ModelDefinition) -> TableRef {
    let table = TableRef {
        schema: model.relation_schema().map(Into::into),
        table: model.relation_name().into(),
        alias: None,
    };
    // Alias so column qualifiers always use the model name.
    if table.schema.is_some() || table.table != model.name {
        table.alias(&model.name)
    } else {
        table
    }
}

/// Treat a declared expression as a plain column when it looks like an
/// identifier; anything else passes through as raw SQL.
fn column_expr(model: &str, expr: &str) -> Expr {
    let mut chars = expr.chars();
    let simple = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        table_col(model, expr)
    } else {
        Expr::Raw(expr.to_string())
    }
}

fn aggregate_expr(model: &str, metric: &Metric) -> Expr {
    let inner = if metric.expr == "*" {
        star()
    } else {
        column_expr(model, &metric.expr)
    };

    // A metric-level filter becomes CASE WHEN inside the aggregate, so it
    // applies per row without constraining the rest of the query.
    let inner = match &metric.filter {
        Some(predicate) => Expr::Case {
            operand: None,
            when_clauses: vec![(Expr::Raw(predicate.clone()), inner)],
            else_clause: None,
        },
        None => inner,
    };

    match metric.aggregation {
        Aggregation::Sum => func("SUM", vec![inner]),
        Aggregation::Avg => func("AVG", vec![inner]),
        Aggregation::Count => func("COUNT", vec![inner]),
        Aggregation::CountDistinct => count_distinct(inner),
        Aggregation::Min => func("MIN", vec![inner]),
        Aggregation::Max => func("MAX", vec![inner]),
    }
}

fn value_expr(value: &FilterValue) -> Expr {
    match value {
        FilterValue::Int(n) => lit_int(*n),
        FilterValue::Float(f) => lit_float(*f),
        FilterValue::String(s) => lit_str(s),
        FilterValue::Bool(b) => lit_bool(*b),
        FilterValue::Null => lit_null(),
        // Lists only appear under In/NotIn; comparison() unpacks them
        // before reaching here. A nested list degrades to NULL.
        FilterValue::List(_) => lit_null(),
    }
}

fn comparison(lhs: Expr, filter: &Filter) -> SemanticResult<Expr> {
    let op = match filter.op {
        FilterOp::Eq => BinaryOperator::Eq,
        FilterOp::Ne => BinaryOperator::Ne,
        FilterOp::Gt => BinaryOperator::Gt,
        FilterOp::Gte => BinaryOperator::Gte,
        FilterOp::Lt => BinaryOperator::Lt,
        FilterOp::Lte => BinaryOperator::Lte,
        FilterOp::Like => BinaryOperator::Like,
        FilterOp::In | FilterOp::NotIn => {
            let FilterValue::List(items) = &filter.value else {
                return Err(SemanticError::InvalidModel(format!(
                    "filter on '{}' uses IN without a list value",
                    filter.target
                )));
            };
            let values = items.iter().map(value_expr).collect();
            return Ok(if filter.op == FilterOp::In {
                lhs.in_list(values)
            } else {
                lhs.not_in_list(values)
            });
        }
    };

    // NULL comparisons lower to IS [NOT] NULL.
    if filter.value == FilterValue::Null {
        return match filter.op {
            FilterOp::Eq => Ok(lhs.is_null()),
            FilterOp::Ne => Ok(lhs.is_not_null()),
            _ => Err(SemanticError::InvalidModel(format!(
                "filter on '{}' compares against NULL with an ordering operator",
                filter.target
            ))),
        };
    }

    Ok(Expr::BinaryOp {
        left: Box::new(lhs),
        op,
        right: Box::new(value_expr(&filter.value)),
    })
}
