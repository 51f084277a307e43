//! Open extension bag carried by nodes and edges.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Well-known attribute keys shared across the narrative layers.
pub mod keys {
    /// Node a fork was cloned from.
    pub const FORKED_FROM: &str = "forkedFrom";
    /// Marks the causal edge of the user's final choice.
    pub const SELECTED: &str = "selected";
    /// How a binding edge came to exist (direct, deferred, premonition...).
    pub const BINDING_TYPE: &str = "bindingType";
    /// Dominant emotion recorded on reaction, echo and memory nodes.
    pub const EMOTION: &str = "emotion";
    /// Stimulus a reaction names as its trigger.
    pub const STIMULUS_ID: &str = "stimulusId";
    /// Origin tag of a stimulus (user, system...).
    pub const SOURCE: &str = "source";
    /// Event label on memory nodes.
    pub const EVENT: &str = "event";
    /// Marks a reaction waiting for its stimulus.
    pub const DEFERRED: &str = "deferred";
}

/// Key/value metadata attached to nodes and edges.
///
/// Backed by an ordered map so iteration and serialization are stable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder form of [`Attributes::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Merge another bag into this one. Incoming keys win.
    pub fn merge(&mut self, other: Attributes) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
