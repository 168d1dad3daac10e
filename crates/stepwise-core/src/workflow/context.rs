//! Per-execution context store.
//!
//! `ContextStore` is the mutable state that flows through one workflow run.
//! It starts as a copy of the caller's parameters and grows as each step
//! stores its output under the step's declared key. Keys are added or
//! overwritten, never removed mid-run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// ContextStore
// ---------------------------------------------------------------------------

/// Ordered key/value state owned by exactly one execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextStore {
    values: Map<String, Value>,
}

impl ContextStore {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context seeded from the caller's parameters.
    ///
    /// The map is copied so later mutation never reaches the caller's data.
    pub fn from_params(params: &Map<String, Value>) -> Self {
        Self {
            values: params.clone(),
        }
    }

    /// Store a step output, overwriting any earlier value under `key`.
    pub fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    /// Get a top-level value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Look up a dotted path such as `candidates.0.email`.
    ///
    /// Objects are traversed by key, arrays by numeric index. Returns `None`
    /// when any segment is missing or resolves to `null`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.values.get(first)?;

        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    /// Build the JSON object expression-mode steps evaluate against.
    ///
    /// Every context key becomes a same-named top-level variable.
    pub fn to_expression_context(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
