//! Component state records and the shallow-merge rule.
//!
//! This is part of the Functional Core - all functions are pure with no side effects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The state of a single component: a flat JSON record.
///
/// Serializes transparently as a JSON object, so a payload entry is exactly
/// the record a loader produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(Map<String, Value>);

impl State {
    /// Creates an empty state (`{}`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from a JSON value.
    ///
    /// Returns `None` when the value is not an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Sets a single field, returning `self` for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Gets a field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the number of top-level fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks if the state has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow-merges `other` into this state.
    ///
    /// Top-level keys from `other` replace same-named keys here; nested
    /// objects are replaced wholesale, never merged recursively. Keys present
    /// on only one side are kept.
    pub fn merge(&mut self, other: State) {
        self.0.extend(other.0);
    }

    /// Consuming variant of [`State::merge`].
    pub fn merged(mut self, other: State) -> Self {
        self.merge(other);
        self
    }

    /// Returns the underlying JSON map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Converts the state into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for State {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
