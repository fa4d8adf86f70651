//! Materialization runner.
//!
//! Takes the dependency graph, narrows it to the requested targets and
//! their ancestors, and executes each derived model's DDL in topological
//! order. Independent models can run concurrently up to a configured
//! limit; a failure skips the failed model's descendants while unrelated
//! branches keep going.

pub mod context;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::client::{ClientError, SqlClient};
use crate::error::SemanticResult;
use crate::graph::DependencyGraph;
use crate::model::Materialization;
use crate::registry::ModelRegistry;
use crate::sql::{CreateTableAs, CreateViewAs, Dialect, DropTable, DropView, SqlDialect};

pub use context::ExecutionContext;

// =============================================================================
// Run state
// =============================================================================

/// Lifecycle of one model in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Waiting on upstream models.
    Pending,
    /// All parents done; eligible to start.
    Ready,
    Running,
    Succeeded,
    Failed,
    /// Not run because an ancestor failed.
    Skipped,
    /// Not run because the run was cancelled.
    Cancelled,
}

/// What happened to one model.
#[derive(Debug, Clone)]
pub struct NodeOutcome {
    pub state: NodeState,
    /// Client error message for failed nodes.
    pub error: Option<String>,
    /// Statements sent to the client, after placeholder expansion. Nodes
    /// that never ran carry the planned statements with placeholders
    /// intact.
    pub sql: Vec<String>,
    pub duration: Option<Duration>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Per-model outcomes, keyed by model name.
    pub outcomes: BTreeMap<String, NodeOutcome>,
    /// Order in which models were started.
    pub started_order: Vec<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcomes
            .values()
            .all(|o| o.state == NodeState::Succeeded)
    }

    pub fn in_state(&self, state: NodeState) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.state == state)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.in_state(NodeState::Succeeded)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.in_state(NodeState::Failed)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.in_state(NodeState::Skipped)
    }
}

/// Cooperative cancellation handle.
///
/// Cancelling stops new models from starting; in-flight statements run to
/// completion so the warehouse is not left mid-DDL.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Runs materializations against a warehouse client.
pub struct Executor {
    client: Arc<dyn SqlClient>,
    dialect: Dialect,
    concurrency: usize,
}

impl Executor {
    pub fn new(client: Arc<dyn SqlClient>) -> Self {
        Executor {
            client,
            dialect: Dialect::default(),
            concurrency: 1,
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Maximum models materializing at once. Clamped to at least 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Materialize the targets and everything upstream of them.
    ///
    /// `targets = None` runs every derived model in the catalog.
    pub async fn run(
        &self,
        registry: &ModelRegistry,
        targets: Option<&[&str]>,
        ctx: &ExecutionContext,
    ) -> SemanticResult<RunReport> {
        self.run_with_cancel(registry, targets, ctx, &CancelToken::new())
            .await
    }

    /// Like [`Executor::run`] with a cancellation handle.
    pub async fn run_with_cancel(
        &self,
        registry: &ModelRegistry,
        targets: Option<&[&str]>,
        ctx: &ExecutionContext,
        cancel: &CancelToken,
    ) -> SemanticResult<RunReport> {
        let graph = DependencyGraph::from_registry(registry)?;

        // Narrow to targets plus ancestors; default is the whole catalog.
        let subset: BTreeSet<String> = match targets {
            Some(names) => graph.ancestors_of(names)?,
            None => registry.models().map(|m| m.name.clone()).collect(),
        };
        let order = graph.topo_order(&subset)?;

        // Only derived models execute; relation-backed ancestors are
        // already present in the warehouse.
        let mut plan: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in &order {
            let model = registry
                .get(name)
                .ok_or_else(|| crate::error::SemanticError::UnresolvedReference(name.clone()))?;
            if model.is_derived() {
                plan.insert(name.clone(), self.statements_for(registry, name, ctx)?);
            }
        }

        let mut report = RunReport::default();
        for (name, sql) in &plan {
            report.outcomes.insert(
                name.clone(),
                NodeOutcome {
                    state: NodeState::Pending,
                    error: None,
                    sql: sql.clone(),
                    duration: None,
                },
            );
        }

        // In-degrees count only derived parents inside the subset.
        let mut in_degree: BTreeMap<String, usize> = BTreeMap::new();
        for name in plan.keys() {
            let degree = graph
                .parents(name)
                .iter()
                .filter(|p| plan.contains_key(*p))
                .count();
            in_degree.insert(name.clone(), degree);
        }

        let mut ready: BTreeSet<String> = BTreeSet::new();
        for name in &order {
            if in_degree.get(name) == Some(&0) {
                ready.insert(name.clone());
                if let Some(outcome) = report.outcomes.get_mut(name) {
                    outcome.state = NodeState::Ready;
                }
            }
        }

        info!(
            models = plan.len(),
            concurrency = self.concurrency,
            dialect = %self.dialect,
            "starting materialization run"
        );

        let mut in_flight: JoinSet<(String, Result<(), ClientError>, Vec<String>, Duration)> =
            JoinSet::new();

        loop {
            // Launch as much ready work as the limit allows.
            while in_flight.len() < self.concurrency && !cancel.is_cancelled() {
                let Some(name) = ready.pop_first() else { break };
                let sql = plan[&name].clone();
                let client = Arc::clone(&self.client);
                let ctx = ctx.clone();
                if let Some(outcome) = report.outcomes.get_mut(&name) {
                    outcome.state = NodeState::Running;
                }
                report.started_order.push(name.clone());
                info!(model = %name, statements = sql.len(), "materializing");
                in_flight.spawn(async move {
                    let started = Instant::now();
                    // Placeholders expand per statement at execution time,
                    // so context values written by upstream nodes are
                    // visible here.
                    let mut executed = Vec::with_capacity(sql.len());
                    let mut result = Ok(());
                    for stmt in &sql {
                        let stmt = ctx.expand(stmt);
                        let run = client.execute(&stmt).await;
                        executed.push(stmt);
                        if let Err(e) = run {
                            result = Err(e);
                            break;
                        }
                    }
                    (name, result, executed, started.elapsed())
                });
            }

            let Some(joined) = in_flight.join_next().await else {
                // Nothing running; either done or cancelled/blocked.
                break;
            };
            let (name, result, executed, duration) = match joined {
                Ok(done) => done,
                Err(join_err) => {
                    // A panicking task counts as a failure of the run
                    // itself, not of a model we can name.
                    warn!(error = %join_err, "materialization task panicked");
                    continue;
                }
            };

            if let Some(outcome) = report.outcomes.get_mut(&name) {
                outcome.sql = executed;
            }

            match result {
                Ok(()) => {
                    if let Some(outcome) = report.outcomes.get_mut(&name) {
                        outcome.state = NodeState::Succeeded;
                        outcome.duration = Some(duration);
                    }
                    info!(model = %name, elapsed_ms = duration.as_millis() as u64, "materialized");
                    // Unblock children.
                    for child in graph.children(&name) {
                        if let Some(degree) = in_degree.get_mut(&child) {
                            *degree -= 1;
                            if *degree == 0
                                && report.outcomes[&child].state == NodeState::Pending
                            {
                                ready.insert(child.clone());
                                if let Some(outcome) = report.outcomes.get_mut(&child) {
                                    outcome.state = NodeState::Ready;
                                }
                            }
                        }
                    }
                }
                Err(error) => {
                    warn!(model = %name, error = %error, "materialization failed");
                    if let Some(outcome) = report.outcomes.get_mut(&name) {
                        outcome.state = NodeState::Failed;
                        outcome.error = Some(error.to_string());
                        outcome.duration = Some(duration);
                    }
                    // Everything downstream of a failure is skipped.
                    for descendant in graph.descendants_of(&name) {
                        if let Some(outcome) = report.outcomes.get_mut(&descendant) {
                            if matches!(outcome.state, NodeState::Pending | NodeState::Ready) {
                                outcome.state = NodeState::Skipped;
                                ready.remove(&descendant);
                            }
                        }
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            for outcome in report.outcomes.values_mut() {
                if matches!(outcome.state, NodeState::Pending | NodeState::Ready) {
                    outcome.state = NodeState::Cancelled;
                }
            }
            warn!("run cancelled");
        }

        info!(
            succeeded = report.succeeded().len(),
            failed = report.failed().len(),
            skipped = report.skipped().len(),
            "run finished"
        );
        Ok(report)
    }

    /// The DDL statements that materialize one derived model.
    ///
    /// `${key}` placeholders are left in place here; they expand when the
    /// node actually runs.
    fn statements_for(
        &self,
        registry: &ModelRegistry,
        name: &str,
        ctx: &ExecutionContext,
    ) -> SemanticResult<Vec<String>> {
        let model = registry
            .get(name)
            .ok_or_else(|| crate::error::SemanticError::UnresolvedReference(name.into()))?;
        let compiler = crate::compiler::QueryCompiler::with_dialect(registry, self.dialect);
        let select = compiler.compile_model(name)?.sql;
        let schema = ctx.get_str("target_schema");
        let schema = schema.as_deref();

        let statements = match model.materialized {
            Materialization::Table => vec![
                DropTable::new(schema, name).if_exists().to_sql(self.dialect),
                CreateTableAs::new(schema, name, &select).to_sql(self.dialect),
            ],
            Materialization::View => {
                if self.dialect.supports_create_or_replace_view() {
                    vec![CreateViewAs::new(schema, name, &select)
                        .or_replace()
                        .to_sql(self.dialect)]
                } else {
                    vec![
                        DropView::new(schema, name).if_exists().to_sql(self.dialect),
                        CreateViewAs::new(schema, name, &select).to_sql(self.dialect),
                    ]
                }
            }
        };
        Ok(statements)
    }
}
