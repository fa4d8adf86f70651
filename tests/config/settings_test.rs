//! Project configuration parsing and context seeding.

use strata::config::{expand_env_vars, Settings, SettingsError};
use strata::sql::Dialect;

#[test]
fn empty_config_uses_defaults() {
    let settings = Settings::from_toml_str("").unwrap();
    assert_eq!(settings.dialect().unwrap(), Dialect::Sqlite);
    assert_eq!(settings.run.concurrency, 1);
    assert!(settings.run.target_schema.is_none());
    assert!(settings.vars.is_empty());
}

#[test]
fn full_config_round_trip() {
    let settings = Settings::from_toml_str(
        r#"
        [connection]
        dialect = "postgres"
        schema = "raw"

        [run]
        concurrency = 8
        target_schema = "marts"

        [vars]
        lookback_days = 30
        include_tests = false
        region = "emea"
        "#,
    )
    .unwrap();

    assert_eq!(settings.dialect().unwrap(), Dialect::Postgres);
    assert_eq!(settings.connection.schema.as_deref(), Some("raw"));
    assert_eq!(settings.run.concurrency, 8);

    let ctx = settings.initial_context().unwrap();
    assert_eq!(ctx.get_str("target_schema").as_deref(), Some("marts"));
    assert_eq!(ctx.get_str("lookback_days").as_deref(), Some("30"));
    assert_eq!(ctx.get_str("region").as_deref(), Some("emea"));
    assert_eq!(ctx.get_str("include_tests").as_deref(), Some("false"));
}

#[test]
fn vars_expand_environment_variables() {
    std::env::set_var("STRATA_TEST_SCHEMA", "staging");
    let settings = Settings::from_toml_str(
        r#"
        [run]
        target_schema = "${STRATA_TEST_SCHEMA}"
        "#,
    )
    .unwrap();
    let ctx = settings.initial_context().unwrap();
    assert_eq!(ctx.get_str("target_schema").as_deref(), Some("staging"));
}

#[test]
fn missing_env_var_is_an_error() {
    let settings = Settings::from_toml_str(
        r#"
        [vars]
        token = "${STRATA_TEST_NO_SUCH_VAR}"
        "#,
    )
    .unwrap();
    assert!(matches!(
        settings.initial_context().unwrap_err(),
        SettingsError::MissingEnvVar(name) if name == "STRATA_TEST_NO_SUCH_VAR"
    ));
}

#[test]
fn unsupported_dialect_is_rejected() {
    let settings = Settings::from_toml_str("[connection]\ndialect = \"bigquery\"").unwrap();
    assert!(matches!(
        settings.dialect().unwrap_err(),
        SettingsError::UnsupportedDialect(d) if d == "bigquery"
    ));
}

#[test]
fn zero_concurrency_is_rejected() {
    assert!(matches!(
        Settings::from_toml_str("[run]\nconcurrency = 0").unwrap_err(),
        SettingsError::InvalidConfig(_)
    ));
}

#[test]
fn dialect_names_are_case_insensitive() {
    let settings = Settings::from_toml_str("[connection]\ndialect = \"DuckDB\"").unwrap();
    assert_eq!(settings.dialect().unwrap(), Dialect::DuckDb);
}

#[test]
fn expand_env_vars_handles_both_forms() {
    std::env::set_var("STRATA_TEST_ENV", "prod");
    assert_eq!(expand_env_vars("${STRATA_TEST_ENV}").unwrap(), "prod");
    assert_eq!(expand_env_vars("db-$STRATA_TEST_ENV.local").unwrap(), "db-prod.local");
}

#[test]
fn missing_config_file() {
    let err = Settings::load(std::path::Path::new("/nonexistent/strata.toml")).unwrap_err();
    assert!(matches!(err, SettingsError::FileNotFound(_)));
}
