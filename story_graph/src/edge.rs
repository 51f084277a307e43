//! Edge definitions - typed, weighted links between nodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::{Attributes, NodeId};

/// Types of relations between narrative nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// One event brought about another.
    Causal,
    /// Emotional carry-over between events.
    Affective,
    /// A fork: the target branched off the source.
    Divergence,
    /// The two events cannot both hold.
    Contradiction,
    /// A reaction that retroactively produced its own prompt.
    ReverseBinding,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Causal => "causal",
            EdgeKind::Affective => "affective",
            EdgeKind::Divergence => "divergence",
            EdgeKind::Contradiction => "contradiction",
            EdgeKind::ReverseBinding => "reverse_binding",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an edge. Inserting the same key twice overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
}

/// A directed, weighted relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    /// Strength from 0.0 to 1.0.
    pub weight: f64,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Edge {
    /// Create a new edge. The weight is clamped to [0, 1].
    pub fn new(source: NodeId, target: NodeId, kind: EdgeKind, weight: f64) -> Self {
        let weight = if weight.is_finite() {
            weight.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            source,
            target,
            kind,
            weight,
            attributes: Attributes::new(),
        }
    }

    pub fn causal(source: NodeId, target: NodeId, weight: f64) -> Self {
        Self::new(source, target, EdgeKind::Causal, weight)
    }

    /// Attach one attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key, value);
        self
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source,
            target: self.target,
            kind: self.kind,
        }
    }
}
