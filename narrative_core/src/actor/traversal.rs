//! Biased best-first traversal of an actor's memory.
//!
//! Priority of a successor reached through an edge:
//!
//! ```text
//! combined = emotional_weight * emotional + recency_weight * recency + causality_weight * causal
//! priority = combined * parent_priority * hop_decay
//! ```
//!
//! - `emotional`: edge weight, boosted when the successor carries the actor's
//!   current dominant emotion
//! - `recency`: 1 for a brand-new node, falling linearly to 0 at the horizon
//! - `causal`: edge weight on causal edges, 0 otherwise
//!
//! Contradiction edges heavier than the configured tolerance are never followed.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use story_graph::{keys, ActorId, Edge, EdgeKind, Node, NodeId, StoryGraph};

use super::{ActorKernel, Emotion};
use crate::config::TraversalConfig;
use crate::error::{EntityKind, NarrativeError, NarrativeResult};

/// A pending node in the frontier. Higher priority first, then earlier push.
#[derive(Debug, Clone, Copy)]
struct FrontierEntry {
    priority: f64,
    seq: u64,
    node: NodeId,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl ActorKernel {
    /// Walk an actor's memory from `start` (default: the actor's anchor).
    ///
    /// Returns visited node IDs in visitation order, at most `max_nodes` of them.
    pub fn traverse_memory(
        &self,
        graph: &StoryGraph,
        actor_id: ActorId,
        start: Option<NodeId>,
        max_nodes: usize,
    ) -> NarrativeResult<Vec<NodeId>> {
        self.traverse_memory_at(graph, actor_id, start, max_nodes, Utc::now())
    }

    /// [`ActorKernel::traverse_memory`] with an explicit clock for recency.
    pub fn traverse_memory_at(
        &self,
        graph: &StoryGraph,
        actor_id: ActorId,
        start: Option<NodeId>,
        max_nodes: usize,
        now: DateTime<Utc>,
    ) -> NarrativeResult<Vec<NodeId>> {
        let profile = self
            .actor(actor_id)
            .ok_or_else(|| NarrativeError::unknown(EntityKind::Actor, actor_id))?;
        let start = start.unwrap_or(profile.memory_anchor);
        if !graph.contains(start) {
            return Err(NarrativeError::unknown(EntityKind::Node, start));
        }
        let dominant = self.dominant_emotion(actor_id);

        let mut visited = Vec::new();
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut frontier = BinaryHeap::new();
        let mut seq = 0u64;
        frontier.push(FrontierEntry {
            priority: 1.0,
            seq,
            node: start,
        });

        while visited.len() < max_nodes {
            let Some(entry) = frontier.pop() else {
                break;
            };
            if !seen.insert(entry.node) {
                continue;
            }
            visited.push(entry.node);

            for edge in graph.outgoing_edges(entry.node) {
                if edge.kind == EdgeKind::Contradiction
                    && edge.weight > self.traversal.contradiction_tolerance
                {
                    continue;
                }
                if seen.contains(&edge.target) {
                    continue;
                }
                let Some(successor) = graph.node(edge.target) else {
                    continue;
                };

                let combined = edge_priority(&self.traversal, edge, successor, dominant, now);
                seq += 1;
                frontier.push(FrontierEntry {
                    priority: combined * entry.priority * self.traversal.hop_decay,
                    seq,
                    node: edge.target,
                });
            }
        }

        tracing::debug!(actor = %actor_id, visited = visited.len(), "memory traversed");
        Ok(visited)
    }
}

/// Weighted blend of emotional, recency and causal priority for one edge.
fn edge_priority(
    config: &TraversalConfig,
    edge: &Edge,
    successor: &Node,
    dominant: Option<Emotion>,
    now: DateTime<Utc>,
) -> f64 {
    let successor_emotion = successor
        .attributes
        .get_str(keys::EMOTION)
        .and_then(|raw| raw.parse::<Emotion>().ok());
    let emotional = if dominant.is_some() && successor_emotion == dominant {
        edge.weight * config.emotion_match_boost
    } else {
        edge.weight
    };

    let recency = (1.0 - successor.age_hours(now) / config.recency_horizon_hours).max(0.0);

    let causal = if edge.kind == EdgeKind::Causal {
        edge.weight
    } else {
        0.0
    };

    config.emotional_weight * emotional
        + config.recency_weight * recency
        + config.causality_weight * causal
}
