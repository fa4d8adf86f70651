//! Dependency graph: ordering, subsets, cycle reporting.

use std::collections::BTreeSet;

use strata::graph::DependencyGraph;
use strata::model::ModelDefinition;
use strata::SemanticError;

fn pipeline() -> Vec<ModelDefinition> {
    vec![
        ModelDefinition::relation("orders", None, "orders"),
        ModelDefinition::relation("customers", None, "customers"),
        ModelDefinition::derived("daily_orders", "SELECT 1", vec!["orders"]),
        ModelDefinition::derived(
            "customer_orders",
            "SELECT 1",
            vec!["orders", "customers"],
        ),
        ModelDefinition::derived("weekly_orders", "SELECT 1", vec!["daily_orders"]),
    ]
}

#[test]
fn topological_order_respects_every_edge() {
    let models = pipeline();
    let graph = DependencyGraph::from_models(&models).unwrap();
    let order = graph.full_order().unwrap();
    let pos = |name: &str| order.iter().position(|n| n == name).unwrap();

    for model in &models {
        for parent in model.parents() {
            assert!(
                pos(parent) < pos(&model.name),
                "{parent} must come before {}",
                model.name
            );
        }
    }
}

#[test]
fn order_is_deterministic_across_builds() {
    let models = pipeline();
    let first = DependencyGraph::from_models(&models).unwrap().full_order().unwrap();
    for _ in 0..5 {
        let again = DependencyGraph::from_models(&models).unwrap().full_order().unwrap();
        assert_eq!(first, again);
    }
}

#[test]
fn ancestors_narrow_a_run_to_what_the_target_needs() {
    let models = pipeline();
    let graph = DependencyGraph::from_models(&models).unwrap();
    let subset = graph.ancestors_of(&["weekly_orders"]).unwrap();
    let expected: BTreeSet<String> = ["daily_orders", "orders", "weekly_orders"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(subset, expected);

    // customer_orders and customers are untouched.
    assert!(!subset.contains("customer_orders"));
}

#[test]
fn subset_order_only_contains_the_subset() {
    let models = pipeline();
    let graph = DependencyGraph::from_models(&models).unwrap();
    let subset = graph.ancestors_of(&["daily_orders"]).unwrap();
    let order = graph.topo_order(&subset).unwrap();
    assert_eq!(order, vec!["orders", "daily_orders"]);
}

#[test]
fn cycles_are_reported_with_their_members() {
    let models = vec![
        ModelDefinition::derived("a", "SELECT 1", vec!["c"]),
        ModelDefinition::derived("b", "SELECT 1", vec!["a"]),
        ModelDefinition::derived("c", "SELECT 1", vec!["b"]),
    ];
    match DependencyGraph::from_models(&models).unwrap_err() {
        SemanticError::CyclicDependency(cycle) => {
            assert_eq!(cycle.first(), cycle.last());
            for name in ["a", "b", "c"] {
                assert!(cycle.contains(&name.to_string()), "cycle missing {name}");
            }
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn self_dependency_is_a_cycle() {
    let models = vec![ModelDefinition::derived("a", "SELECT 1", vec!["a"])];
    assert!(matches!(
        DependencyGraph::from_models(&models).unwrap_err(),
        SemanticError::CyclicDependency(_)
    ));
}

#[test]
fn unknown_parent_is_rejected_at_build_time() {
    let models = vec![ModelDefinition::derived("a", "SELECT 1", vec!["ghost"])];
    match DependencyGraph::from_models(&models).unwrap_err() {
        SemanticError::UnknownJoinTarget { model, target } => {
            assert_eq!((model.as_str(), target.as_str()), ("a", "ghost"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_target_in_ancestors_is_rejected() {
    let models = pipeline();
    let graph = DependencyGraph::from_models(&models).unwrap();
    assert!(graph.ancestors_of(&["ghost"]).is_err());
}

#[test]
fn parents_and_children_are_sorted() {
    let models = pipeline();
    let graph = DependencyGraph::from_models(&models).unwrap();
    assert_eq!(
        graph.parents("customer_orders"),
        vec!["customers", "orders"]
    );
    assert_eq!(
        graph.children("orders"),
        vec!["customer_orders", "daily_orders"]
    );
}
