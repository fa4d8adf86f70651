//! Registry construction and reference resolution.

use strata::model::{
    Aggregation, Cardinality, Dimension, JoinSpec, Metric, ModelDefinition,
};
use strata::registry::ModelRegistry;
use strata::SemanticError;

fn ecommerce_catalog() -> Vec<ModelDefinition> {
    vec![
        ModelDefinition::relation("orders", None, "orders")
            .with_dimension(Dimension::new("id", "id").primary_key())
            .with_dimension(Dimension::new("status", "status"))
            .with_metric(Metric::new("order_count", Aggregation::Count, "*"))
            .with_metric(Metric::new("revenue", Aggregation::Sum, "price"))
            .with_join(JoinSpec::new(
                "customers",
                vec![("customer_id", "id")],
                Cardinality::ManyToOne,
            )),
        ModelDefinition::relation("customers", None, "customers")
            .with_dimension(Dimension::new("customer_id", "id").primary_key())
            .with_dimension(Dimension::new("country", "country")),
    ]
}

#[test]
fn builds_from_valid_catalog() {
    let registry = ModelRegistry::from_models(ecommerce_catalog()).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(
        registry.model_names().collect::<Vec<_>>(),
        vec!["customers", "orders"]
    );
}

#[test]
fn rejects_duplicate_model_names() {
    let mut models = ecommerce_catalog();
    models.push(ModelDefinition::relation("orders", Some("raw"), "orders"));
    let err = ModelRegistry::from_models(models).unwrap_err();
    assert_eq!(err.to_string(), "duplicate model: 'orders'");
}

#[test]
fn rejects_join_to_unregistered_model() {
    let models = vec![ModelDefinition::relation("orders", None, "orders").with_join(
        JoinSpec::new("warehouses", vec![("wh_id", "id")], Cardinality::ManyToOne),
    )];
    let err = ModelRegistry::from_models(models).unwrap_err();
    assert!(matches!(
        err,
        SemanticError::UnknownJoinTarget { model, target }
            if model == "orders" && target == "warehouses"
    ));
}

#[test]
fn resolves_metric_and_dimension_owners() {
    let registry = ModelRegistry::from_models(ecommerce_catalog()).unwrap();
    assert_eq!(registry.owner_of_metric("revenue").unwrap().name, "orders");
    assert_eq!(
        registry.owner_of_dimension("country").unwrap().name,
        "customers"
    );
}

#[test]
fn unresolved_reference_names_the_missing_field() {
    let registry = ModelRegistry::from_models(ecommerce_catalog()).unwrap();
    let err = registry.owner_of_metric("churn_rate").unwrap_err();
    assert_eq!(err.to_string(), "unresolved reference: 'churn_rate'");
}

#[test]
fn ambiguous_reference_lists_all_owners() {
    let mut models = ecommerce_catalog();
    models.push(
        ModelDefinition::relation("suppliers", None, "suppliers")
            .with_dimension(Dimension::new("country", "country")),
    );
    let registry = ModelRegistry::from_models(models).unwrap();
    match registry.owner_of_dimension("country").unwrap_err() {
        SemanticError::AmbiguousReference { name, models } => {
            assert_eq!(name, "country");
            assert_eq!(models, vec!["customers", "suppliers"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn definition_validation_runs_at_build_time() {
    let models = vec![
        ModelDefinition::relation("orders", None, "orders")
            .with_dimension(Dimension::new("a", "a").primary_key())
            .with_dimension(Dimension::new("b", "b").primary_key()),
    ];
    let err = ModelRegistry::from_models(models).unwrap_err();
    assert!(matches!(err, SemanticError::InvalidModel(_)));
}
