//! Configuration: a JSON document addressed with dot notation, layered from a file and the environment.

use std::path::Path;

use ::config::builder::DefaultState;
use ::config::{ConfigBuilder, Environment, File, FileFormat, Source};
use ezra_core::util::{array_dot, array_get};
use ezra_core::{Args, Injectable, ResolveError, Resolver};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Environment variables named `EZRA__SECTION__KEY` override `section.key`.
pub const ENV_PREFIX: &str = "EZRA";
/// Separates the prefix and the nesting levels in override variable names.
pub const ENV_SEPARATOR: &str = "__";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] ::config::ConfigError),
    #[error("configuration root must be an object")]
    NotAnObject,
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    data: Value,
}

fn json_file(path: &Path, required: bool) -> impl Source + Send + Sync + 'static {
    File::from(path).format(FileFormat::Json).required(required)
}

/// `EZRA__*` variables, read from `vars` or, when `None`, the process environment.
fn environment(vars: Option<::config::Map<String, String>>) -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
        .source(vars)
}

impl Config {
    pub fn new() -> Self {
        Self {
            data: Value::Object(Map::new()),
        }
    }

    pub fn from_value(data: Value) -> Result<Self, ConfigError> {
        if !data.is_object() {
            return Err(ConfigError::NotAnObject);
        }
        Ok(Self { data })
    }

    /// Load a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = Self::build(::config::Config::builder().add_source(json_file(path, true)))?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Load a JSON file if it exists, then apply `EZRA__SECTION__KEY` variables from the environment.
    pub fn load_with_env(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = Self::build(
            ::config::Config::builder()
                .add_source(json_file(path, false))
                .add_source(environment(None)),
        )?;
        debug!(path = %path.display(), "configuration loaded with environment overrides");
        Ok(config)
    }

    /// Apply `EZRA__SECTION__KEY` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.layered(environment(None))
    }

    /// Apply overrides from `(name, value)` pairs named like environment variables; names
    /// without the `EZRA__` prefix are ignored. Numbers and booleans are parsed, anything
    /// else stays a string.
    pub fn with_overrides(self, vars: impl IntoIterator<Item = (String, String)>) -> Result<Self, ConfigError> {
        self.layered(environment(Some(vars.into_iter().collect())))
    }

    /// Deep-merge `other` into this configuration; `other` wins on conflicts.
    pub fn merge(&mut self, other: Config) -> Result<(), ConfigError> {
        let overlay = ::config::Config::try_from(&other.data)?;
        *self = self.clone().layered(overlay)?;
        Ok(())
    }

    fn layered(self, overlay: impl Source + Send + Sync + 'static) -> Result<Self, ConfigError> {
        let base = ::config::Config::try_from(&self.data)?;
        Self::build(::config::Config::builder().add_source(base).add_source(overlay))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let data: Value = builder.build()?.try_deserialize()?;
        Self::from_value(data)
    }

    /// Value at a dot-notation key; missing and null values are `None`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let found = array_get(key, &self.data, &Value::Null);
        (!found.is_null()).then_some(found)
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).cloned().unwrap_or(default)
    }

    /// Deserialize the value at `key`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|e| ConfigError::Invalid {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    /// Set a dot-notation key, creating (or replacing non-object) parents as needed.
    pub fn set(&mut self, key: &str, value: Value) {
        let segments: Vec<&str> = key.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        let mut current = &mut self.data;
        for segment in parents {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            let Value::Object(map) = current else {
                return;
            };
            current = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        if let Value::Object(map) = current {
            map.insert(last.to_string(), value);
        }
    }

    /// Every leaf as `("section.key", value)`.
    pub fn dot(&self) -> Vec<(String, Value)> {
        array_dot(&self.data)
    }

    pub fn as_value(&self) -> &Value {
        &self.data
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Without a registered `Config`, dependents get an empty one.
impl Injectable for Config {
    fn construct(_resolver: &Resolver, _args: &mut Args) -> Result<Self, ResolveError> {
        Ok(Self::new())
    }
}

/// `logging` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(config.get_as("logging")?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_and_set_with_dots() {
        let mut config = Config::from_value(json!({ "app": { "name": "ezra", "debug": null } })).unwrap();
        assert_eq!(config.get("app.name"), Some(&json!("ezra")));
        assert_eq!(config.get("app.debug"), None);
        assert_eq!(config.get_or("app.port", json!(8000)), json!(8000));

        config.set("app.port", json!(9000));
        config.set("app.name.short", json!("ez"));
        config.set("cache.redis.host", json!("localhost"));
        assert_eq!(config.get("app.port"), Some(&json!(9000)));
        assert_eq!(config.get("app.name.short"), Some(&json!("ez")));
        assert_eq!(config.get("cache.redis.host"), Some(&json!("localhost")));
    }

    #[test]
    fn rejects_non_object_root() {
        assert!(matches!(Config::from_value(json!([1])), Err(ConfigError::NotAnObject)));
    }

    #[test]
    fn overrides_parse_scalars_or_keep_strings() {
        let config = Config::from_value(json!({ "app": { "name": "ezra", "port": 1 } }))
            .unwrap()
            .with_overrides(vec![
                ("EZRA__LOGGING__LEVEL".to_string(), "debug".to_string()),
                ("EZRA__APP__PORT".to_string(), "8080".to_string()),
                ("EZRA__APP__SECURE".to_string(), "true".to_string()),
                ("EZRA_SINGLE".to_string(), "ignored".to_string()),
                ("HOME".to_string(), "/root".to_string()),
            ])
            .unwrap();
        assert_eq!(config.get("logging.level"), Some(&json!("debug")));
        assert_eq!(config.get("app.port"), Some(&json!(8080)));
        assert_eq!(config.get("app.secure"), Some(&json!(true)));
        assert_eq!(config.get("app.name"), Some(&json!("ezra")));
        assert_eq!(config.get("home"), None);
        assert_eq!(config.get("single"), None);
    }

    #[test]
    fn loads_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "app": { "name": "demo", "tags": ["a", "b"], "debug": false } }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.get("app.name"), Some(&json!("demo")));
        assert_eq!(config.get("app.tags.1"), Some(&json!("b")));
        assert_eq!(config.get("app.debug"), Some(&json!(false)));

        assert!(matches!(
            Config::load(dir.path().join("missing.json")),
            Err(ConfigError::Source(_))
        ));
        assert_eq!(Config::load_with_env(dir.path().join("missing.json")).unwrap().get("app.name"), None);
    }

    #[test]
    fn merge_is_deep() {
        let mut base = Config::from_value(json!({ "app": { "name": "ezra", "port": 1 } })).unwrap();
        base.merge(Config::from_value(json!({ "app": { "port": 2 }, "extra": true })).unwrap())
            .unwrap();
        assert_eq!(
            base.dot(),
            vec![
                ("app.name".to_string(), json!("ezra")),
                ("app.port".to_string(), json!(2)),
                ("extra".to_string(), json!(true)),
            ]
        );
    }

    #[test]
    fn logging_section() {
        let config = Config::from_value(json!({ "logging": { "format": "json" } })).unwrap();
        let logging = LoggingConfig::from_config(&config).unwrap();
        assert_eq!(logging.format, "json");
        assert_eq!(logging.level, "info");
        assert_eq!(LoggingConfig::from_config(&Config::new()).unwrap(), LoggingConfig::default());

        let bad = Config::from_value(json!({ "logging": { "level": 3 } })).unwrap();
        assert!(matches!(LoggingConfig::from_config(&bad), Err(ConfigError::Invalid { .. })));
    }
}
