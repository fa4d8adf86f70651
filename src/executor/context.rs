//! Shared run context.
//!
//! A concurrent key/value map visible to every task in a run. Values come
//! from configuration (`vars`) plus run-level settings such as the target
//! schema, and `${key}` placeholders in model SQL are expanded from it
//! before execution.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

/// Key/value state shared across a materialization run.
///
/// Cloning is cheap; all clones see the same map.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    values: Arc<DashMap<String, Value>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        ExecutionContext::default()
    }

    pub fn set(&self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    pub fn set_str(&self, key: &str, value: &str) {
        self.set(key, Value::String(value.to_string()));
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).map(|v| v.value().clone())
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    /// Expand `${key}` placeholders from the context.
    ///
    /// Unknown keys are left in place so the failure surfaces in the
    /// warehouse error rather than silently emitting an empty string.
    pub fn expand(&self, input: &str) -> String {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // consume '{'
                let mut key = String::new();
                let mut closed = false;
                for k in chars.by_ref() {
                    if k == '}' {
                        closed = true;
                        break;
                    }
                    key.push(k);
                }
                match (closed, self.get_str(&key)) {
                    (true, Some(value)) => result.push_str(&value),
                    (true, None) => {
                        result.push_str("${");
                        result.push_str(&key);
                        result.push('}');
                    }
                    (false, _) => {
                        // Unterminated placeholder; emit what we consumed.
                        result.push_str("${");
                        result.push_str(&key);
                    }
                }
            } else {
                result.push(c);
            }
        }

        result
    }
}
