//! Environment lookup and named platform constants.

use std::collections::HashMap;
use std::str::FromStr;

use serde_json::Value;
use tracing::debug;

/// Environment variable `name`; unset, empty or non-unicode values are `None`.
pub fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

pub fn env_or(name: &str, default: impl Into<String>) -> String {
    env(name).unwrap_or_else(|| default.into())
}

/// Parsed environment variable. Values that fail to parse are treated as unset.
pub fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!(name, value = %raw, "environment value does not parse");
            None
        }
    }
}

/// Named constants, defined once.
#[derive(Clone, Debug, Default)]
pub struct Constants {
    values: HashMap<String, Value>,
}

impl Constants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `name`. Returns false and keeps the old value if it is already defined.
    pub fn define(&mut self, name: &str, value: Value) -> bool {
        if self.values.contains_key(name) {
            return false;
        }
        self.values.insert(name.to_string(), value);
        true
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn defined(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The constant's value, or `default` when it is undefined or null.
    pub fn def(&self, name: &str, default: Value) -> Value {
        match self.values.get(name) {
            Some(value) if !value.is_null() => value.clone(),
            _ => default,
        }
    }
}
