//! Join path resolution: shortest chains, symmetry, ambiguity.

use strata::model::{Cardinality, Dimension, JoinSpec, ModelDefinition};
use strata::registry::path::{has_path, join_tree, resolve_join_path};
use strata::registry::ModelRegistry;
use strata::SemanticError;

fn model(name: &str) -> ModelDefinition {
    ModelDefinition::relation(name, None, name)
        .with_dimension(Dimension::new("id", "id").primary_key())
}

fn star_schema() -> ModelRegistry {
    // order_items -> orders -> customers
    //                orders -> stores
    ModelRegistry::from_models(vec![
        model("order_items").with_join(JoinSpec::new(
            "orders",
            vec![("order_id", "id")],
            Cardinality::ManyToOne,
        )),
        model("orders")
            .with_join(JoinSpec::new(
                "customers",
                vec![("customer_id", "id")],
                Cardinality::ManyToOne,
            ))
            .with_join(JoinSpec::new(
                "stores",
                vec![("store_id", "id")],
                Cardinality::ManyToOne,
            )),
        model("customers"),
        model("stores"),
    ])
    .unwrap()
}

#[test]
fn one_hop_path() {
    let registry = star_schema();
    let path = resolve_join_path(&registry, "orders", "customers").unwrap();
    assert_eq!(path.hops(), 1);
    assert_eq!(path.steps[0].from_model, "orders");
    assert_eq!(path.steps[0].to_model, "customers");
    assert!(!path.causes_fanout());
}

#[test]
fn two_hop_path_goes_through_the_hub() {
    let registry = star_schema();
    let path = resolve_join_path(&registry, "order_items", "customers").unwrap();
    assert_eq!(path.hops(), 2);
    assert_eq!(path.steps[0].to_model, "orders");
    assert_eq!(path.steps[1].to_model, "customers");
}

#[test]
fn paths_work_against_the_declared_direction() {
    let registry = star_schema();
    let path = resolve_join_path(&registry, "customers", "order_items").unwrap();
    assert_eq!(path.hops(), 2);
    // Reversed edges carry reversed cardinality, so this walk fans out.
    assert!(path.causes_fanout());
    assert_eq!(path.steps[0].on, vec![("id".into(), "customer_id".into())]);
}

#[test]
fn disconnected_models_report_no_path() {
    let registry = ModelRegistry::from_models(vec![model("a"), model("b")]).unwrap();
    let err = resolve_join_path(&registry, "a", "b").unwrap_err();
    assert!(matches!(err, SemanticError::NoJoinPath { .. }));
    assert!(!has_path(&registry, "a", "b"));
}

#[test]
fn diamond_schemas_are_rejected_as_ambiguous() {
    let registry = ModelRegistry::from_models(vec![
        model("facts")
            .with_join(JoinSpec::new("left", vec![("l_id", "id")], Cardinality::ManyToOne))
            .with_join(JoinSpec::new("right", vec![("r_id", "id")], Cardinality::ManyToOne)),
        model("left").with_join(JoinSpec::new(
            "dates",
            vec![("date_id", "id")],
            Cardinality::ManyToOne,
        )),
        model("right").with_join(JoinSpec::new(
            "dates",
            vec![("date_id", "id")],
            Cardinality::ManyToOne,
        )),
        model("dates"),
    ])
    .unwrap();

    match resolve_join_path(&registry, "facts", "dates").unwrap_err() {
        SemanticError::AmbiguousJoinPath {
            from,
            to,
            count,
            hops,
        } => {
            assert_eq!((from.as_str(), to.as_str()), ("facts", "dates"));
            assert_eq!(count, 2);
            assert_eq!(hops, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn a_unique_shorter_path_beats_longer_alternatives() {
    // facts joins dates directly and also via left; 1 hop wins.
    let registry = ModelRegistry::from_models(vec![
        model("facts")
            .with_join(JoinSpec::new("dates", vec![("date_id", "id")], Cardinality::ManyToOne))
            .with_join(JoinSpec::new("left", vec![("l_id", "id")], Cardinality::ManyToOne)),
        model("left").with_join(JoinSpec::new(
            "dates",
            vec![("date_id", "id")],
            Cardinality::ManyToOne,
        )),
        model("dates"),
    ])
    .unwrap();

    let path = resolve_join_path(&registry, "facts", "dates").unwrap();
    assert_eq!(path.hops(), 1);
}

#[test]
fn join_tree_merges_shared_prefixes() {
    let registry = star_schema();
    let edges = join_tree(&registry, "order_items", &["customers", "stores"]).unwrap();
    // orders appears once even though both targets route through it.
    assert_eq!(edges.len(), 3);
    assert_eq!(edges[0].to_model, "orders");
    let tails: Vec<&str> = edges[1..].iter().map(|e| e.to_model.as_str()).collect();
    assert_eq!(tails, vec!["customers", "stores"]);
}

#[test]
fn path_to_self_is_empty() {
    let registry = star_schema();
    let path = resolve_join_path(&registry, "orders", "orders").unwrap();
    assert_eq!(path.hops(), 0);
}
