//! Binding Resolver - the many-to-many ledger between stimuli and reactions.
//!
//! A reaction is bound to a stimulus in one of four ways:
//! - **direct**: the reaction names its stimulus when it arrives
//! - **deferred**: the reaction arrives first and is folded into the first
//!   later stimulus whose wording is close enough
//! - **premonition**: an echo matched the stimulus
//! - **reverse**: the reaction manufactured its own stimulus
//!
//! A reaction is owned by the first stimulus it was bound to. Selecting a
//! reaction resolves its owner's record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use story_graph::{keys, Attributes, Edge, EdgeKind, Node, NodeId, NodeKind, StoryGraph};

use crate::config::BindingConfig;
use crate::echo::EchoBinding;
use crate::error::{EntityKind, NarrativeError, NarrativeResult};
use crate::events::{EventBus, InteractionKind, Listener, ListenerId, NarrativeEvent};
use crate::similarity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingStatus {
    Pending,
    Resolved,
}

/// Every reaction and echo bound to one stimulus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingRecord {
    pub stimulus_id: NodeId,
    /// Bound reactions and echoes in binding order.
    pub bound_reaction_ids: Vec<NodeId>,
    pub selected_reaction_id: Option<NodeId>,
    pub status: BindingStatus,
}

impl BindingRecord {
    fn new(stimulus_id: NodeId) -> Self {
        Self {
            stimulus_id,
            bound_reaction_ids: Vec::new(),
            selected_reaction_id: None,
            status: BindingStatus::Pending,
        }
    }

    fn push(&mut self, id: NodeId) -> bool {
        if self.bound_reaction_ids.contains(&id) {
            return false;
        }
        self.bound_reaction_ids.push(id);
        true
    }
}

/// Result of [`BindingResolver::process_reaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionBinding {
    /// Bound to this stimulus.
    Bound(NodeId),
    /// Waiting for a matching stimulus.
    Deferred,
}

#[derive(Debug)]
pub struct BindingResolver {
    config: BindingConfig,
    records: HashMap<NodeId, BindingRecord>,
    /// Stimulus IDs in registration order.
    order: Vec<NodeId>,
    /// Reaction or echo -> the stimulus that owns it.
    owners: HashMap<NodeId, NodeId>,
    /// Reactions waiting for a stimulus, in arrival order.
    deferred: Vec<NodeId>,
    events: EventBus,
}

impl BindingResolver {
    pub fn new(config: BindingConfig) -> Self {
        Self {
            config,
            records: HashMap::new(),
            order: Vec::new(),
            owners: HashMap::new(),
            deferred: Vec::new(),
            events: EventBus::new(),
        }
    }

    /// Open the stimulus's record and fold in every unbound reaction that
    /// resembles it. Returns the folded reaction IDs.
    pub fn process_stimulus(
        &mut self,
        graph: &mut StoryGraph,
        stimulus_id: NodeId,
    ) -> NarrativeResult<Vec<NodeId>> {
        let content = stimulus_content(graph, stimulus_id)?;
        self.open(stimulus_id);

        let candidates: Vec<(NodeId, f64)> = graph
            .nodes_by_kind(NodeKind::Reaction)
            .into_iter()
            .filter(|node| self.is_unbound(node))
            .map(|node| (node.id, similarity::jaccard(&node.content, &content)))
            .filter(|(_, score)| *score > self.config.deferred_similarity_threshold)
            .collect();

        let mut folded = Vec::with_capacity(candidates.len());
        for (reaction_id, score) in candidates {
            graph.add_edge(
                Edge::causal(stimulus_id, reaction_id, score)
                    .with_attribute(keys::BINDING_TYPE, "deferred"),
            )?;
            graph.merge_node_attributes(
                reaction_id,
                Attributes::new()
                    .with(keys::STIMULUS_ID, stimulus_id.to_string())
                    .with(keys::DEFERRED, false),
            )?;
            self.attach(stimulus_id, reaction_id);

            tracing::info!(
                stimulus = %stimulus_id,
                reaction = %reaction_id,
                score,
                "deferred reaction folded"
            );
            self.events.emit(&NarrativeEvent::InteractionRecorded {
                kind: InteractionKind::DeferredFold,
                stimulus_id,
                reaction_id: Some(reaction_id),
            });
            folded.push(reaction_id);
        }
        Ok(folded)
    }

    /// Bind a reaction to its stimulus, or defer it until one shows up.
    ///
    /// The stimulus is `stimulus_id` if given, otherwise the one the reaction
    /// node names in its `stimulusId` attribute.
    pub fn process_reaction(
        &mut self,
        graph: &mut StoryGraph,
        reaction_id: NodeId,
        stimulus_id: Option<NodeId>,
    ) -> NarrativeResult<ReactionBinding> {
        let named = match graph.node(reaction_id) {
            Some(node) if node.kind == NodeKind::Reaction => node
                .attributes
                .get_str(keys::STIMULUS_ID)
                .and_then(NodeId::parse),
            _ => return Err(NarrativeError::unknown(EntityKind::Reaction, reaction_id)),
        };

        let Some(stimulus_id) = stimulus_id.or(named) else {
            graph.merge_node_attributes(reaction_id, Attributes::new().with(keys::DEFERRED, true))?;
            if !self.deferred.contains(&reaction_id) {
                self.deferred.push(reaction_id);
            }
            tracing::debug!(reaction = %reaction_id, "reaction deferred");
            return Ok(ReactionBinding::Deferred);
        };

        stimulus_content(graph, stimulus_id)?;
        if graph.edge(stimulus_id, reaction_id, EdgeKind::Causal).is_none() {
            graph.add_edge(
                Edge::causal(stimulus_id, reaction_id, 1.0)
                    .with_attribute(keys::BINDING_TYPE, "direct"),
            )?;
        }
        if named.is_none() {
            graph.merge_node_attributes(
                reaction_id,
                Attributes::new().with(keys::STIMULUS_ID, stimulus_id.to_string()),
            )?;
        }
        self.open(stimulus_id);
        self.attach(stimulus_id, reaction_id);

        tracing::debug!(stimulus = %stimulus_id, reaction = %reaction_id, "reaction bound");
        self.events.emit(&NarrativeEvent::InteractionRecorded {
            kind: InteractionKind::FoldBinding,
            stimulus_id,
            reaction_id: Some(reaction_id),
        });
        Ok(ReactionBinding::Bound(stimulus_id))
    }

    /// Record an echo the matcher bound to a stimulus.
    pub fn process_bound_interaction(
        &mut self,
        graph: &StoryGraph,
        binding: &EchoBinding,
    ) -> NarrativeResult<()> {
        stimulus_content(graph, binding.stimulus_id)?;
        if !graph.contains(binding.echo_id) {
            return Err(NarrativeError::unknown(EntityKind::Echo, binding.echo_id));
        }
        self.open(binding.stimulus_id);
        self.attach(binding.stimulus_id, binding.echo_id);

        self.events.emit(&NarrativeEvent::InteractionRecorded {
            kind: InteractionKind::PremonitionBinding,
            stimulus_id: binding.stimulus_id,
            reaction_id: Some(binding.echo_id),
        });
        Ok(())
    }

    /// Make `reaction_id` the canonical answer to the stimulus that owns it.
    ///
    /// Resolves the owner's record and marks the stimulus -> reaction causal
    /// edge `selected: true` with weight 1.0. A previous selection in the same
    /// record loses its marker. Returns the owning stimulus.
    pub fn select_response(
        &mut self,
        graph: &mut StoryGraph,
        reaction_id: NodeId,
    ) -> NarrativeResult<NodeId> {
        if !graph
            .node(reaction_id)
            .is_some_and(|n| n.kind == NodeKind::Reaction)
        {
            return Err(NarrativeError::unknown(EntityKind::Reaction, reaction_id));
        }
        let stimulus_id = *self
            .owners
            .get(&reaction_id)
            .ok_or_else(|| NarrativeError::unknown(EntityKind::Binding, reaction_id))?;
        let record = self
            .records
            .get_mut(&stimulus_id)
            .ok_or_else(|| NarrativeError::unknown(EntityKind::Binding, stimulus_id))?;

        let mut edge = Edge::causal(stimulus_id, reaction_id, 1.0);
        if let Some(existing) = graph.edge(stimulus_id, reaction_id, EdgeKind::Causal) {
            edge.attributes = existing.attributes.clone();
        }
        edge.attributes.insert(keys::SELECTED, true);
        graph.add_edge(edge)?;

        if let Some(previous) = record.selected_reaction_id.filter(|p| *p != reaction_id) {
            graph.merge_edge_attributes(
                stimulus_id,
                previous,
                EdgeKind::Causal,
                Attributes::new().with(keys::SELECTED, false),
            );
        }
        record.selected_reaction_id = Some(reaction_id);
        record.status = BindingStatus::Resolved;

        tracing::info!(stimulus = %stimulus_id, reaction = %reaction_id, "response selected");
        self.events.emit(&NarrativeEvent::InteractionRecorded {
            kind: InteractionKind::ResponseSelection,
            stimulus_id,
            reaction_id: Some(reaction_id),
        });
        Ok(stimulus_id)
    }

    /// Fork a stimulus into a divergent branch with its own, empty record.
    pub fn fork_stimulus(
        &mut self,
        graph: &mut StoryGraph,
        stimulus_id: NodeId,
    ) -> NarrativeResult<NodeId> {
        stimulus_content(graph, stimulus_id)?;
        let fork_id = graph.fork(stimulus_id)?;
        self.open(fork_id);

        tracing::info!(stimulus = %stimulus_id, fork = %fork_id, "stimulus forked");
        self.events.emit(&NarrativeEvent::InteractionRecorded {
            kind: InteractionKind::FractureFork,
            stimulus_id: fork_id,
            reaction_id: None,
        });
        Ok(fork_id)
    }

    /// Manufacture a system stimulus that `reaction_id` answers.
    ///
    /// Adds a reverse-binding edge reaction -> new stimulus and binds the
    /// reaction into the new stimulus's record.
    pub fn create_reverse_binding(
        &mut self,
        graph: &mut StoryGraph,
        reaction_id: NodeId,
        content: impl Into<String>,
    ) -> NarrativeResult<NodeId> {
        if !graph.node(reaction_id).is_some_and(|n| n.kind == NodeKind::Reaction) {
            return Err(NarrativeError::unknown(EntityKind::Reaction, reaction_id));
        }

        let stimulus_id =
            graph.add_node(Node::stimulus(content).with_attribute(keys::SOURCE, "system"));
        graph.add_edge(Edge::new(reaction_id, stimulus_id, EdgeKind::ReverseBinding, 1.0))?;
        if self.is_deferred(reaction_id) {
            graph.merge_node_attributes(
                reaction_id,
                Attributes::new()
                    .with(keys::STIMULUS_ID, stimulus_id.to_string())
                    .with(keys::DEFERRED, false),
            )?;
        }
        self.open(stimulus_id);
        self.attach(stimulus_id, reaction_id);

        tracing::info!(reaction = %reaction_id, stimulus = %stimulus_id, "reverse binding created");
        self.events.emit(&NarrativeEvent::InteractionRecorded {
            kind: InteractionKind::ReverseBinding,
            stimulus_id,
            reaction_id: Some(reaction_id),
        });
        Ok(stimulus_id)
    }

    pub fn record(&self, stimulus_id: NodeId) -> Option<&BindingRecord> {
        self.records.get(&stimulus_id)
    }

    /// All records in registration order.
    pub fn records(&self) -> Vec<&BindingRecord> {
        self.order.iter().filter_map(|id| self.records.get(id)).collect()
    }

    /// Records still waiting for a selection.
    pub fn pending_records(&self) -> Vec<&BindingRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.status == BindingStatus::Pending)
            .collect()
    }

    /// Reactions and echoes bound to a stimulus. Empty for unknown stimuli.
    pub fn reactions_for_stimulus(&self, stimulus_id: NodeId) -> Vec<NodeId> {
        self.records
            .get(&stimulus_id)
            .map(|r| r.bound_reaction_ids.clone())
            .unwrap_or_default()
    }

    pub fn owner_of(&self, reaction_id: NodeId) -> Option<NodeId> {
        self.owners.get(&reaction_id).copied()
    }

    pub fn deferred_reactions(&self) -> &[NodeId] {
        &self.deferred
    }

    pub fn subscribe(&mut self, listener: Listener) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    fn open(&mut self, stimulus_id: NodeId) {
        if !self.records.contains_key(&stimulus_id) {
            self.records.insert(stimulus_id, BindingRecord::new(stimulus_id));
            self.order.push(stimulus_id);
        }
    }

    fn attach(&mut self, stimulus_id: NodeId, reaction_id: NodeId) {
        if let Some(record) = self.records.get_mut(&stimulus_id) {
            record.push(reaction_id);
        }
        self.owners.entry(reaction_id).or_insert(stimulus_id);
        self.deferred.retain(|id| *id != reaction_id);
    }

    fn is_deferred(&self, reaction_id: NodeId) -> bool {
        !self.owners.contains_key(&reaction_id)
    }

    /// A reaction with no owner and no stimulus named on the node.
    fn is_unbound(&self, node: &Node) -> bool {
        self.is_deferred(node.id) && !node.attributes.contains(keys::STIMULUS_ID)
    }
}

impl Default for BindingResolver {
    fn default() -> Self {
        Self::new(BindingConfig::default())
    }
}

fn stimulus_content(graph: &StoryGraph, stimulus_id: NodeId) -> NarrativeResult<String> {
    match graph.node(stimulus_id) {
        Some(node) if node.kind == NodeKind::Stimulus => Ok(node.content.clone()),
        _ => Err(NarrativeError::unknown(EntityKind::Stimulus, stimulus_id)),
    }
}
