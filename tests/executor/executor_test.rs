//! Materialization runs against a recording in-memory client.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use strata::client::{ClientError, Row, SqlClient};
use strata::executor::{CancelToken, ExecutionContext, Executor, NodeState};
use strata::model::{Materialization, ModelDefinition};
use strata::registry::ModelRegistry;
use strata::sql::Dialect;

/// Records every statement; optionally fails, sleeps, or cancels a run.
#[derive(Default)]
struct MockClient {
    log: Mutex<Vec<String>>,
    fail_on: BTreeSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    cancel_on_first: Mutex<Option<CancelToken>>,
    ctx_write_on_first: Mutex<Option<(ExecutionContext, String, String)>>,
}

impl MockClient {
    fn new() -> Self {
        MockClient::default()
    }

    fn failing_on(mut self, fragment: &str) -> Self {
        self.fail_on.insert(fragment.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn cancelling(self, token: CancelToken) -> Self {
        *self.cancel_on_first.lock().unwrap() = Some(token);
        self
    }

    fn writing_on_first(self, ctx: &ExecutionContext, key: &str, value: &str) -> Self {
        *self.ctx_write_on_first.lock().unwrap() =
            Some((ctx.clone(), key.to_string(), value.to_string()));
        self
    }

    fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlClient for MockClient {
    async fn execute(&self, sql: &str) -> Result<(), ClientError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(token) = self.cancel_on_first.lock().unwrap().take() {
            token.cancel();
        }
        if let Some((ctx, key, value)) = self.ctx_write_on_first.lock().unwrap().take() {
            ctx.set_str(&key, &value);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.log.lock().unwrap().push(sql.to_string());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on.iter().any(|f| sql.contains(f.as_str())) {
            return Err(ClientError::Execution(format!("rejected: {sql}")));
        }
        Ok(())
    }

    async fn execute_returning_rows(&self, sql: &str) -> Result<Vec<Row>, ClientError> {
        self.execute(sql).await?;
        Ok(Vec::new())
    }
}

fn pipeline() -> ModelRegistry {
    ModelRegistry::from_models(vec![
        ModelDefinition::relation("orders", None, "orders"),
        ModelDefinition::derived(
            "daily_orders",
            "SELECT order_date, COUNT(*) AS n FROM orders GROUP BY order_date",
            vec!["orders"],
        )
        .materialized_as(Materialization::Table),
        ModelDefinition::derived(
            "weekly_orders",
            "SELECT 1 FROM daily_orders",
            vec!["daily_orders"],
        )
        .materialized_as(Materialization::Table),
    ])
    .unwrap()
}

#[tokio::test]
async fn runs_models_in_dependency_order() {
    let client = Arc::new(MockClient::new());
    let executor = Executor::new(client.clone());
    let report = executor
        .run(&pipeline(), None, &ExecutionContext::new())
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.started_order, vec!["daily_orders", "weekly_orders"]);

    // Table materialization drops then recreates.
    let stmts = client.statements();
    assert_eq!(stmts.len(), 4);
    assert_eq!(stmts[0], "DROP TABLE IF EXISTS \"daily_orders\"");
    assert!(stmts[1].starts_with("CREATE TABLE \"daily_orders\" AS"));
}

#[tokio::test]
async fn relation_models_never_execute() {
    let client = Arc::new(MockClient::new());
    let executor = Executor::new(client.clone());
    let report = executor
        .run(&pipeline(), None, &ExecutionContext::new())
        .await
        .unwrap();
    assert!(!report.outcomes.contains_key("orders"));
    assert!(client.statements().iter().all(|s| !s.contains("\"orders\"")));
}

#[tokio::test]
async fn targets_narrow_the_run_to_ancestors() {
    let client = Arc::new(MockClient::new());
    let executor = Executor::new(client.clone());
    let report = executor
        .run(
            &pipeline(),
            Some(&["daily_orders"]),
            &ExecutionContext::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.started_order, vec!["daily_orders"]);
    assert!(!report.outcomes.contains_key("weekly_orders"));
}

#[tokio::test]
async fn failure_skips_descendants_but_not_siblings() {
    let registry = ModelRegistry::from_models(vec![
        ModelDefinition::relation("orders", None, "orders"),
        ModelDefinition::derived("broken", "SELECT boom", vec!["orders"])
            .materialized_as(Materialization::Table),
        ModelDefinition::derived("downstream", "SELECT 1 FROM broken", vec!["broken"])
            .materialized_as(Materialization::Table),
        ModelDefinition::derived("sibling", "SELECT 1 FROM orders", vec!["orders"])
            .materialized_as(Materialization::Table),
    ])
    .unwrap();

    let client = Arc::new(MockClient::new().failing_on("SELECT boom"));
    let executor = Executor::new(client);
    let report = executor
        .run(&registry, None, &ExecutionContext::new())
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed(), vec!["broken"]);
    assert_eq!(report.skipped(), vec!["downstream"]);
    assert_eq!(report.succeeded(), vec!["sibling"]);

    let broken = &report.outcomes["broken"];
    assert!(broken.error.as_deref().unwrap().contains("rejected"));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrency_limit_is_respected() {
    let registry = ModelRegistry::from_models(vec![
        ModelDefinition::relation("orders", None, "orders"),
        ModelDefinition::derived("a", "SELECT 1", vec!["orders"]),
        ModelDefinition::derived("b", "SELECT 2", vec!["orders"]),
        ModelDefinition::derived("c", "SELECT 3", vec!["orders"]),
        ModelDefinition::derived("d", "SELECT 4", vec!["orders"]),
    ])
    .unwrap();

    let client = Arc::new(MockClient::new().with_delay(Duration::from_millis(20)));
    let executor = Executor::new(client.clone())
        .with_dialect(Dialect::Postgres)
        .with_concurrency(2);
    let report = executor
        .run(&registry, None, &ExecutionContext::new())
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(client.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn independent_models_run_in_parallel() {
    let registry = ModelRegistry::from_models(vec![
        ModelDefinition::relation("orders", None, "orders"),
        ModelDefinition::derived("a", "SELECT 1", vec!["orders"]),
        ModelDefinition::derived("b", "SELECT 2", vec!["orders"]),
        ModelDefinition::derived("c", "SELECT 3", vec!["orders"]),
    ])
    .unwrap();

    let client = Arc::new(MockClient::new().with_delay(Duration::from_millis(50)));
    let executor = Executor::new(client.clone())
        .with_dialect(Dialect::Postgres)
        .with_concurrency(3);
    executor
        .run(&registry, None, &ExecutionContext::new())
        .await
        .unwrap();

    assert!(client.max_in_flight.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn cancellation_stops_unstarted_models() {
    let cancel = CancelToken::new();
    let client = Arc::new(MockClient::new().cancelling(cancel.clone()));
    let executor = Executor::new(client.clone());
    let report = executor
        .run_with_cancel(&pipeline(), None, &ExecutionContext::new(), &cancel)
        .await
        .unwrap();

    // The in-flight model finishes; the rest never start.
    assert_eq!(report.outcomes["daily_orders"].state, NodeState::Succeeded);
    assert_eq!(report.outcomes["weekly_orders"].state, NodeState::Cancelled);
    assert!(client.statements().iter().all(|s| !s.contains("weekly")));
}

#[tokio::test]
async fn context_expands_placeholders_and_target_schema() {
    let registry = ModelRegistry::from_models(vec![
        ModelDefinition::relation("orders", None, "orders"),
        ModelDefinition::derived(
            "recent_orders",
            "SELECT * FROM orders WHERE order_date > '${cutoff}'",
            vec!["orders"],
        )
        .materialized_as(Materialization::Table),
    ])
    .unwrap();

    let ctx = ExecutionContext::new();
    ctx.set("cutoff", json!("2026-01-01"));
    ctx.set_str("target_schema", "marts");

    let client = Arc::new(MockClient::new());
    let executor = Executor::new(client.clone());
    executor.run(&registry, None, &ctx).await.unwrap();

    let stmts = client.statements();
    assert_eq!(stmts[0], "DROP TABLE IF EXISTS \"marts\".\"recent_orders\"");
    assert!(stmts[1].starts_with("CREATE TABLE \"marts\".\"recent_orders\" AS"));
    assert!(stmts[1].contains("order_date > '2026-01-01'"));
}

#[tokio::test]
async fn context_writes_are_visible_to_downstream_models() {
    let registry = ModelRegistry::from_models(vec![
        ModelDefinition::relation("orders", None, "orders"),
        ModelDefinition::derived("staged", "SELECT 1 FROM orders", vec!["orders"])
            .materialized_as(Materialization::Table),
        ModelDefinition::derived(
            "batched",
            "SELECT * FROM staged WHERE batch = '${batch}'",
            vec!["staged"],
        )
        .materialized_as(Materialization::Table),
    ])
    .unwrap();

    // The key only appears in the context once `staged` starts running.
    let ctx = ExecutionContext::new();
    let client = Arc::new(MockClient::new().writing_on_first(&ctx, "batch", "b42"));
    let executor = Executor::new(client.clone());
    let report = executor.run(&registry, None, &ctx).await.unwrap();

    assert!(report.is_success());
    let stmts = client.statements();
    assert!(stmts.last().unwrap().contains("batch = 'b42'"));
    assert!(report.outcomes["batched"]
        .sql
        .iter()
        .any(|s| s.contains("batch = 'b42'")));
}

#[tokio::test]
async fn view_materialization_follows_the_dialect() {
    let registry = ModelRegistry::from_models(vec![
        ModelDefinition::relation("orders", None, "orders"),
        ModelDefinition::derived("order_view", "SELECT * FROM orders", vec!["orders"]),
    ])
    .unwrap();

    // SQLite cannot replace views: drop then create.
    let client = Arc::new(MockClient::new());
    Executor::new(client.clone())
        .run(&registry, None, &ExecutionContext::new())
        .await
        .unwrap();
    let stmts = client.statements();
    assert_eq!(stmts[0], "DROP VIEW IF EXISTS \"order_view\"");
    assert!(stmts[1].starts_with("CREATE VIEW \"order_view\" AS"));

    // Postgres replaces in place.
    let client = Arc::new(MockClient::new());
    Executor::new(client.clone())
        .with_dialect(Dialect::Postgres)
        .run(&registry, None, &ExecutionContext::new())
        .await
        .unwrap();
    let stmts = client.statements();
    assert_eq!(stmts.len(), 1);
    assert!(stmts[0].starts_with("CREATE OR REPLACE VIEW \"order_view\" AS"));
}
