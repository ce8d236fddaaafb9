use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered tuple identifying a cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<Value>);

impl QueryKey {
    /// `["name"]` for procedures without input, `["name", input]` otherwise.
    pub fn procedure(name: &str, input: &Value) -> Self {
        let mut parts = vec![Value::String(name.to_string())];
        if !is_empty_input(input) {
            parts.push(input.clone());
        }
        Self(parts)
    }

    pub fn parts(&self) -> &[Value] {
        &self.0
    }

    /// Stable string form used as the map key. Object keys serialize sorted.
    pub fn hash(&self) -> String {
        Value::Array(self.0.clone()).to_string()
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

pub(crate) fn is_empty_input(input: &Value) -> bool {
    match input {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
