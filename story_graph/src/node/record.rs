//! The node record stored in the graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ActorId, Attributes, NodeId, NodeKind};

/// A single narrative event.
///
/// Everything except `attributes` is fixed once the node is in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,

    /// Human-readable text of the event.
    pub content: String,

    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,

    /// Insertion order assigned by the store; breaks timestamp ties.
    pub sequence: u64,

    /// Actor that produced or owns this node, if any.
    pub actor_id: Option<ActorId>,

    /// Provenance and metadata extension.
    #[serde(default)]
    pub attributes: Attributes,
}

impl Node {
    /// Create a new node of the given kind.
    pub fn new(kind: NodeKind, content: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            content: content.into(),
            created_at: Utc::now(),
            sequence: 0,
            actor_id: None,
            attributes: Attributes::new(),
        }
    }

    pub fn stimulus(content: impl Into<String>) -> Self {
        Self::new(NodeKind::Stimulus, content)
    }

    pub fn reaction(content: impl Into<String>) -> Self {
        Self::new(NodeKind::Reaction, content)
    }

    pub fn echo(content: impl Into<String>) -> Self {
        Self::new(NodeKind::Echo, content)
    }

    pub fn memory(content: impl Into<String>) -> Self {
        Self::new(NodeKind::Memory, content)
    }

    /// Set a specific node ID.
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Attribute the node to an actor.
    pub fn with_actor(mut self, actor_id: ActorId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Set the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Attach one attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key, value);
        self
    }

    pub fn is_kind(&self, kind: NodeKind) -> bool {
        self.kind == kind
    }

    /// Age of the node relative to `now`, in hours. Never negative.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.created_at).num_milliseconds().max(0);
        millis as f64 / 3_600_000.0
    }
}
