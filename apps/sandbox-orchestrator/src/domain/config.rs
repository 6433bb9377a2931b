//! Strategy `config.json` resolution.
//!
//! Resolution is total: any missing, mistyped or empty field degrades to its
//! default independently of the others.

use std::collections::BTreeMap;

use serde_json::Value;

use super::sandbox::ResourceLimits;

/// Optional per-strategy config file.
pub const CONFIG_FILE: &str = "config.json";

/// Fully populated strategy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyConfig {
    /// Attributed user; defaults to the directory name.
    pub user_id: String,
    /// Display name; defaults to the directory name.
    pub name: String,
    /// Free text.
    pub description: Option<String>,
    /// Custom environment variables.
    pub env: BTreeMap<String, String>,
    /// Declared CPU ceiling.
    pub cpus: Option<String>,
    /// Declared memory ceiling.
    pub memory: Option<String>,
}

impl StrategyConfig {
    /// Configuration when no file is present.
    #[must_use]
    pub fn defaults_for(dir_name: &str) -> Self {
        Self {
            user_id: dir_name.to_string(),
            name: dir_name.to_string(),
            description: None,
            env: BTreeMap::new(),
            cpus: None,
            memory: None,
        }
    }

    /// Resolves a parsed `config.json` document over the defaults.
    ///
    /// `env` values that are not strings are rendered as JSON (`20`, `true`);
    /// nulls, arrays and objects are skipped.
    #[must_use]
    pub fn resolve(dir_name: &str, document: Option<&Value>) -> Self {
        let mut config = Self::defaults_for(dir_name);
        let Some(Value::Object(doc)) = document else {
            return config;
        };

        if let Some(user_id) = non_empty_str(doc.get("user_id")) {
            config.user_id = user_id;
        }
        if let Some(name) = non_empty_str(doc.get("name")) {
            config.name = name;
        }
        config.description = non_empty_str(doc.get("description"));

        if let Some(Value::Object(env)) = doc.get("env") {
            config.env = env
                .iter()
                .filter(|(key, _)| !key.trim().is_empty())
                .filter_map(|(key, value)| {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        _ => return None,
                    };
                    Some((key.clone(), value))
                })
                .collect();
        }

        if let Some(Value::Object(resources)) = doc.get("resources") {
            config.cpus = match resources.get("cpus") {
                Some(Value::Number(n)) => ResourceLimits::parse_cpus(&n.to_string()),
                Some(Value::String(s)) => ResourceLimits::parse_cpus(s),
                _ => None,
            };
            config.memory = match resources.get("memory") {
                Some(Value::String(s)) => ResourceLimits::parse_memory(s),
                _ => None,
            };
        }

        config
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn no_document_uses_directory_name() {
        let config = StrategyConfig::resolve("bob_momentum", None);
        assert_eq!(config.user_id, "bob_momentum");
        assert_eq!(config.name, "bob_momentum");
        assert!(config.env.is_empty());
        assert!(config.cpus.is_none() && config.memory.is_none());
    }

    #[test]
    fn full_document() {
        let doc = json!({
            "user_id": "bob",
            "name": "Momentum",
            "description": "20-day breakout",
            "env": { "LOOKBACK": 20, "SYMBOL": "AAPL", "VERBOSE": true },
            "resources": { "cpus": 1.5, "memory": "512m" }
        });
        let config = StrategyConfig::resolve("bob_momentum", Some(&doc));

        assert_eq!(config.user_id, "bob");
        assert_eq!(config.name, "Momentum");
        assert_eq!(config.description.as_deref(), Some("20-day breakout"));
        assert_eq!(config.env["LOOKBACK"], "20");
        assert_eq!(config.env["SYMBOL"], "AAPL");
        assert_eq!(config.env["VERBOSE"], "true");
        assert_eq!(config.cpus.as_deref(), Some("1.5"));
        assert_eq!(config.memory.as_deref(), Some("512m"));
    }

    #[test]
    fn bad_fields_degrade_individually() {
        let doc = json!({
            "user_id": 42,
            "name": "   ",
            "env": ["not", "a", "map"],
            "resources": { "cpus": "-2", "memory": "lots" }
        });
        let config = StrategyConfig::resolve("alice", Some(&doc));
        assert_eq!(config, StrategyConfig::defaults_for("alice"));
    }

    #[test]
    fn non_object_document_is_ignored() {
        let doc = json!("just a string");
        assert_eq!(
            StrategyConfig::resolve("alice", Some(&doc)),
            StrategyConfig::defaults_for("alice")
        );
    }

    #[test]
    fn null_env_values_are_skipped() {
        let doc = json!({ "env": { "A": null, "B": "b" } });
        let config = StrategyConfig::resolve("alice", Some(&doc));
        assert_eq!(config.env.len(), 1);
        assert_eq!(config.env["B"], "b");
    }
}
