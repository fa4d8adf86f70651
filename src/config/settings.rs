//! TOML-based project configuration.
//!
//! Supports a config file (strata.toml) with environment variable
//! expansion in string values.
//!
//! Example configuration:
//! ```toml
//! [connection]
//! dialect = "duckdb"
//! schema = "raw"
//!
//! [run]
//! concurrency = 4
//! target_schema = "marts"
//!
//! [vars]
//! lookback_days = 30
//! region = "${REGION}"
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::executor::ExecutionContext;
use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("unsupported dialect: {0}")]
    UnsupportedDialect(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Warehouse connection settings.
    pub connection: ConnectionSettings,

    /// Materialization run settings.
    pub run: RunSettings,

    /// Free-form variables exposed to model SQL as `${key}`.
    pub vars: BTreeMap<String, toml::Value>,
}

/// Warehouse connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// SQL dialect (sqlite, duckdb, postgres).
    pub dialect: String,

    /// Schema the source relations live in, when not declared per model.
    pub schema: Option<String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            dialect: Dialect::default().to_string(),
            schema: None,
        }
    }
}

/// Materialization run settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunSettings {
    /// Maximum models materializing at once.
    pub concurrency: usize,

    /// Schema derived models are written to.
    pub target_schema: Option<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            target_schema: None,
        }
    }
}

impl Settings {
    /// Load settings from a file path.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse settings from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        if settings.run.concurrency == 0 {
            return Err(SettingsError::InvalidConfig(
                "run.concurrency must be at least 1".into(),
            ));
        }
        Ok(settings)
    }

    /// The configured dialect.
    pub fn dialect(&self) -> Result<Dialect, SettingsError> {
        Dialect::parse(&self.connection.dialect)
            .ok_or_else(|| SettingsError::UnsupportedDialect(self.connection.dialect.clone()))
    }

    /// Seed an execution context from `vars` and the run settings.
    ///
    /// String values get environment variables expanded; other TOML values
    /// carry over as JSON.
    pub fn initial_context(&self) -> Result<ExecutionContext, SettingsError> {
        let ctx = ExecutionContext::new();
        for (key, value) in &self.vars {
            ctx.set(key, toml_to_json(value.clone(), true)?);
        }
        if let Some(schema) = &self.run.target_schema {
            ctx.set_str("target_schema", &expand_env_vars(schema)?);
        }
        Ok(ctx)
    }
}

fn toml_to_json(value: toml::Value, expand: bool) -> Result<serde_json::Value, SettingsError> {
    Ok(match value {
        toml::Value::String(s) => {
            let s = if expand { expand_env_vars(&s)? } else { s };
            serde_json::Value::String(s)
        }
        toml::Value::Integer(n) => serde_json::Value::from(n),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(items) => serde_json::Value::Array(
            items
                .into_iter()
                .map(|v| toml_to_json(v, expand))
                .collect::<Result<_, _>>()?,
        ),
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| Ok((k, toml_to_json(v, expand)?)))
                .collect::<Result<_, SettingsError>>()?,
        ),
    })
}

/// Expand `${VAR}` and `$VAR` environment variable references.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            // Check for ${VAR} or $VAR
            if chars.peek() == Some(&'{') {
                chars.next(); // consume '{'
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == '}' {
                        chars.next(); // consume '}'
                        break;
                    }
                    var_name.push(ch);
                    chars.next();
                }
                let value = env::var(&var_name)
                    .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                result.push_str(&value);
            } else {
                // $VAR (ends at non-alphanumeric/underscore)
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        var_name.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    // Just a lone $, keep it
                    result.push('$');
                } else {
                    let value = env::var(&var_name)
                        .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                    result.push_str(&value);
                }
            }
        } else {
            result.push(c);
        }
    }

    Ok(result)
}
