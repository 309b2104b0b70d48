//! Configuration environment.
//!
//! An [`Environment`] aggregates [`PropertySource`]s (in-memory maps, process
//! environment variables, TOML files) behind one lookup interface. Sources are
//! consulted in descending priority; values come back as [`BeanValue`], so
//! configuration entries can feed bean property values without an extra
//! conversion layer.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::Context;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::ContainerResult;
use crate::value::BeanValue;

/// A named provider of configuration values.
pub trait PropertySource: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<BeanValue>;

    fn keys(&self) -> Vec<String>;

    /// Higher priority sources are consulted first.
    fn priority(&self) -> i32 {
        0
    }
}

/// Unified configuration access over a prioritized list of sources.
pub struct Environment {
    sources: RwLock<Vec<Box<dyn PropertySource>>>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("sources_count", &self.sources.read().len())
            .finish()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
        }
    }

    pub fn add_property_source(&self, source: Box<dyn PropertySource>) {
        let mut sources = self.sources.write();
        sources.push(source);
        sources.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    pub fn get(&self, key: &str) -> Option<BeanValue> {
        let sources = self.sources.read();
        for source in sources.iter() {
            if let Some(value) = source.get(key) {
                debug!("config '{}' found in source '{}'", key, source.name());
                return Some(value);
            }
        }
        debug!("config '{}' not found in any source", key);
        None
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(String::from))
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_i64(key).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_f64_or(&self, key: &str, default: f64) -> f64 {
        self.get_f64(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// String-array lookup. Accepts both native arrays and comma-separated
    /// strings (`key = "a, b, c"`).
    pub fn get_string_array(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key)? {
            BeanValue::List(items) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect(),
            ),
            BeanValue::Str(s) => Some(
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Property Sources ==========

/// Process environment variables under a prefix, e.g. `APP_`.
/// `APP_DATABASE_URL` serves the key `database.url`.
pub struct EnvPropertySource {
    prefix: String,
    priority: i32,
}

impl EnvPropertySource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            priority: 100,
        }
    }

    fn env_to_key(&self, env_key: &str) -> String {
        let stripped = env_key.strip_prefix(&self.prefix).unwrap_or(env_key);
        stripped.to_lowercase().replace('_', ".")
    }

    fn key_to_env(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.replace('.', "_").to_uppercase())
    }
}

impl PropertySource for EnvPropertySource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<BeanValue> {
        std::env::var(self.key_to_env(key)).ok().map(BeanValue::Str)
    }

    fn keys(&self) -> Vec<String> {
        std::env::vars()
            .filter(|(k, _)| k.starts_with(&self.prefix))
            .map(|(k, _)| self.env_to_key(&k))
            .collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// TOML file source. Nested tables flatten to dotted keys:
/// `{ database: { url } }` becomes `database.url`.
pub struct TomlPropertySource {
    name: String,
    properties: HashMap<String, BeanValue>,
    priority: i32,
}

impl TomlPropertySource {
    pub fn from_file(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;
        Self::parse(&content, path.to_string_lossy().to_string())
    }

    pub fn parse(content: &str, name: String) -> ContainerResult<Self> {
        let value: toml::Value = toml::from_str(content)
            .with_context(|| format!("failed to parse TOML source '{name}'"))?;

        let mut properties = HashMap::new();
        flatten_toml(&value, String::new(), &mut properties);

        Ok(Self {
            name,
            properties,
            priority: 0,
        })
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

fn flatten_toml(value: &toml::Value, prefix: String, result: &mut HashMap<String, BeanValue>) {
    match value {
        toml::Value::Table(table) => {
            for (key, val) in table {
                let new_prefix = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_toml(val, new_prefix, result);
            }
        }
        other => {
            result.insert(prefix, toml_to_value(other));
        }
    }
}

fn toml_to_value(value: &toml::Value) -> BeanValue {
    match value {
        toml::Value::String(s) => BeanValue::Str(s.clone()),
        toml::Value::Integer(i) => BeanValue::Int(*i),
        toml::Value::Float(f) => BeanValue::Float(*f),
        toml::Value::Boolean(b) => BeanValue::Bool(*b),
        toml::Value::Array(arr) => BeanValue::List(arr.iter().map(toml_to_value).collect()),
        toml::Value::Table(table) => {
            let entries: BTreeMap<String, BeanValue> = table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_value(v)))
                .collect();
            BeanValue::Map(entries)
        }
        toml::Value::Datetime(dt) => BeanValue::Str(dt.to_string()),
    }
}

impl PropertySource for TomlPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<BeanValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// In-memory source, mostly for tests and programmatic overrides.
pub struct MapPropertySource {
    name: String,
    properties: HashMap<String, BeanValue>,
    priority: i32,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
            priority: 50,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<BeanValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<BeanValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        let env = Environment::new();
        env.add_property_source(Box::new(
            MapPropertySource::new("low")
                .with_property("app.name", "low")
                .with_priority(1),
        ));
        env.add_property_source(Box::new(
            MapPropertySource::new("high")
                .with_property("app.name", "high")
                .with_priority(10),
        ));

        assert_eq!(env.get_string("app.name").as_deref(), Some("high"));
    }

    #[test]
    fn test_toml_flattening() {
        let source = TomlPropertySource::parse(
            r#"
            [database]
            url = "postgres://localhost"
            pool-size = 8
            read-only = false
            "#,
            "test".to_string(),
        )
        .unwrap();

        assert_eq!(
            source.get("database.url").and_then(|v| v.as_str().map(String::from)),
            Some("postgres://localhost".to_string())
        );
        assert_eq!(source.get("database.pool-size").and_then(|v| v.as_i64()), Some(8));
        assert_eq!(
            source.get("database.read-only").and_then(|v| v.as_bool()),
            Some(false)
        );
    }

    #[test]
    fn test_string_array_accepts_both_shapes() {
        let env = Environment::new();
        env.add_property_source(Box::new(
            MapPropertySource::new("test")
                .with_property("as.string", "a, b, c")
                .with_property(
                    "as.list",
                    BeanValue::List(vec![BeanValue::Str("x".into()), BeanValue::Str("y".into())]),
                ),
        ));

        assert_eq!(
            env.get_string_array("as.string").unwrap(),
            vec!["a", "b", "c"]
        );
        assert_eq!(env.get_string_array("as.list").unwrap(), vec!["x", "y"]);
    }

    #[test]
    fn test_typed_defaults() {
        let env = Environment::new();
        env.add_property_source(Box::new(
            MapPropertySource::new("test").with_property("port", 8080i64),
        ));

        assert_eq!(env.get_i64_or("port", 1), 8080);
        assert_eq!(env.get_i64_or("missing", 1), 1);
        assert!(env.get_bool("missing").is_none());
    }
}
