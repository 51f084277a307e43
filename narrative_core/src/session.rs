//! Narrative session - the single entry point transports and UIs talk to.
//!
//! A session owns the story graph and the four narrative components and
//! drives them through one turn per submitted stimulus:
//!
//! 1. the stimulus node is stored
//! 2. the binding resolver opens its record and folds in deferred reactions
//! 3. the echo matcher advances the turn, binding or expiring echoes left on
//!    earlier turns; bound echoes become reactions
//! 4. the stimulus engine lets every actor react, and leaves new echoes with
//!    the matcher for later turns
//!
//! All calls run to completion; there is no internal concurrency.

use std::collections::HashMap;
use story_graph::{keys, ActorId, Edge, EdgeKind, Node, NodeId, NodeKind, StoryGraph};

use crate::actor::{ActorKernel, ActorProfile, EmotionalState, NewActor};
use crate::binding::{BindingRecord, BindingResolver, ReactionBinding};
use crate::config::NarrativeConfig;
use crate::echo::{Echo, EchoBinding, EchoMatcher, PendingEcho};
use crate::engine::{Reaction, ResponseStrategy, SeededStrategy, StimulusEngine};
use crate::error::{EntityKind, NarrativeError, NarrativeResult};
use crate::events::{Listener, ListenerId};

/// Everything that happened during one submitted stimulus.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub stimulus_id: NodeId,
    pub turn: u64,
    /// Deferred reactions folded into this stimulus.
    pub folded: Vec<NodeId>,
    pub bound_echoes: Vec<EchoBinding>,
    pub expired_echoes: Vec<NodeId>,
    /// Reactions realized from bound echoes, then fresh actor reactions.
    pub reactions: Vec<Reaction>,
    /// Echoes left behind for later turns.
    pub echoes: Vec<NodeId>,
}

/// Handle returned by [`NarrativeSession::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug)]
pub struct NarrativeSession {
    config: NarrativeConfig,
    graph: StoryGraph,
    kernel: ActorKernel,
    engine: StimulusEngine,
    matcher: EchoMatcher,
    resolver: BindingResolver,
    subscriptions: HashMap<SubscriptionId, [ListenerId; 3]>,
    next_subscription: u64,
}

impl NarrativeSession {
    /// Session with the seeded default strategy.
    pub fn new(config: NarrativeConfig) -> NarrativeResult<Self> {
        let strategy = Box::new(SeededStrategy::new(config.seed));
        Self::with_strategy(config, strategy)
    }

    /// Session with a caller-supplied response strategy.
    pub fn with_strategy(
        config: NarrativeConfig,
        strategy: Box<dyn ResponseStrategy>,
    ) -> NarrativeResult<Self> {
        config.validate()?;
        Ok(Self::assemble(config, strategy))
    }

    fn assemble(config: NarrativeConfig, strategy: Box<dyn ResponseStrategy>) -> Self {
        Self {
            graph: StoryGraph::new(),
            kernel: ActorKernel::new(config.traversal.clone(), config.actors.clone()),
            engine: StimulusEngine::new(strategy),
            matcher: EchoMatcher::new(config.echo.clone()),
            resolver: BindingResolver::new(config.binding.clone()),
            subscriptions: HashMap::new(),
            next_subscription: 0,
            config,
        }
    }

    /// Run one turn and return the new stimulus's ID.
    pub fn submit_stimulus(
        &mut self,
        content: impl Into<String>,
        source: &str,
    ) -> NarrativeResult<NodeId> {
        self.play_turn(content, source).map(|report| report.stimulus_id)
    }

    /// Run one turn and report everything it produced.
    pub fn play_turn(
        &mut self,
        content: impl Into<String>,
        source: &str,
    ) -> NarrativeResult<TurnReport> {
        let stimulus_id = self
            .graph
            .add_node(Node::stimulus(content).with_attribute(keys::SOURCE, source));
        tracing::info!(stimulus = %stimulus_id, source, "stimulus submitted");

        let folded = self.resolver.process_stimulus(&mut self.graph, stimulus_id)?;
        let matched = self.matcher.process_stimulus(&mut self.graph, stimulus_id)?;

        let mut reactions = Vec::new();
        for binding in &matched.bound {
            self.resolver.process_bound_interaction(&self.graph, binding)?;
            if self.engine.pending_echo(binding.echo_id).is_none() {
                continue;
            }
            reactions.push(self.realize(binding.echo_id, stimulus_id)?);
        }
        for echo_id in &matched.expired {
            self.engine.discard_echo(*echo_id);
        }

        let outcome = self
            .engine
            .process_stimulus(&mut self.graph, &mut self.kernel, stimulus_id)?;
        for reaction in &outcome.reactions {
            self.resolver
                .process_reaction(&mut self.graph, reaction.id, Some(stimulus_id))?;
        }
        let mut echoes = Vec::with_capacity(outcome.echoes.len());
        for echo in outcome.echoes {
            echoes.push(echo.id);
            self.matcher.register_echo(&self.graph, echo)?;
        }
        reactions.extend(outcome.reactions);

        Ok(TurnReport {
            stimulus_id,
            turn: matched.turn,
            folded,
            bound_echoes: matched.bound,
            expired_echoes: matched.expired,
            reactions,
            echoes,
        })
    }

    /// Realize a pending echo as a reaction to `stimulus_id` without waiting
    /// for the matcher.
    ///
    /// Returns false when either id is unknown or the echo is no longer
    /// pending.
    pub fn bind_echo_to_stimulus(&mut self, echo_id: NodeId, stimulus_id: NodeId) -> bool {
        match self.realize(echo_id, stimulus_id) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(
                    echo = %echo_id,
                    stimulus = %stimulus_id,
                    error = %err,
                    "echo not bound"
                );
                false
            }
        }
    }

    /// Turn a pending echo into a reaction, mutate its actor and bind it.
    fn realize(&mut self, echo_id: NodeId, stimulus_id: NodeId) -> NarrativeResult<Reaction> {
        let reaction = self
            .engine
            .realize_echo(&mut self.graph, echo_id, stimulus_id)?;
        self.matcher.withdraw(echo_id);
        if let (Some(actor_id), Some(emotion)) = (reaction.actor_id, &reaction.emotion) {
            self.kernel.apply_mutation(actor_id, emotion)?;
        }
        self.resolver
            .process_reaction(&mut self.graph, reaction.id, Some(stimulus_id))?;
        Ok(reaction)
    }

    /// Add a reaction from outside the engine.
    ///
    /// Without a stimulus the reaction is deferred until a similar stimulus
    /// arrives. A known actor with an emotion is mutated like any reacting actor.
    pub fn submit_reaction(
        &mut self,
        content: impl Into<String>,
        actor_id: Option<ActorId>,
        stimulus_id: Option<NodeId>,
        emotion: Option<EmotionalState>,
    ) -> NarrativeResult<(NodeId, ReactionBinding)> {
        if let Some(actor_id) = actor_id {
            self.require_actor(actor_id)?;
        }
        let reaction = self.engine.record_reaction(
            &mut self.graph,
            content,
            actor_id,
            stimulus_id,
            emotion,
        )?;
        if let (Some(actor_id), Some(emotion)) = (actor_id, &reaction.emotion) {
            self.kernel.apply_mutation(actor_id, emotion)?;
        }
        let binding = self
            .resolver
            .process_reaction(&mut self.graph, reaction.id, stimulus_id)?;
        Ok((reaction.id, binding))
    }

    /// Register an echo from outside the engine, eligible from the next turn.
    pub fn register_echo(&mut self, echo: Echo) -> NarrativeResult<NodeId> {
        if let Some(actor_id) = echo.actor_id {
            self.require_actor(actor_id)?;
        }
        let id = self.engine.record_echo(&mut self.graph, echo.clone())?;
        let anchor = echo
            .actor_id
            .and_then(|a| self.kernel.actor(a))
            .map(|p| p.memory_anchor);
        if let Some(anchor) = anchor {
            let weight = echo.emotion.as_ref().map_or(0.5, |e| e.intensity);
            self.graph
                .add_edge(Edge::new(anchor, id, EdgeKind::Affective, weight))?;
        }
        self.matcher.register_echo(&self.graph, echo)?;
        Ok(id)
    }

    /// Choose the canonical reaction for its stimulus.
    pub fn select_reaction(&mut self, reaction_id: NodeId) -> NarrativeResult<NodeId> {
        self.resolver.select_response(&mut self.graph, reaction_id)
    }

    pub fn fork_stimulus(&mut self, stimulus_id: NodeId) -> NarrativeResult<NodeId> {
        self.resolver.fork_stimulus(&mut self.graph, stimulus_id)
    }

    pub fn create_reverse_binding(
        &mut self,
        reaction_id: NodeId,
        content: impl Into<String>,
    ) -> NarrativeResult<NodeId> {
        self.resolver
            .create_reverse_binding(&mut self.graph, reaction_id, content)
    }

    pub fn create_actor(&mut self, seed: NewActor) -> ActorId {
        self.kernel.create_actor(&mut self.graph, seed)
    }

    pub fn fork_actor(&mut self, actor_id: ActorId, label: &str) -> NarrativeResult<ActorId> {
        self.kernel.fork_actor(&mut self.graph, actor_id, label)
    }

    pub fn reconfigure_actor(
        &mut self,
        actor_id: ActorId,
        state: EmotionalState,
        threshold_delta: f64,
    ) -> NarrativeResult<()> {
        self.kernel.reconfigure(actor_id, state, threshold_delta)
    }

    pub fn apply_mutation(
        &mut self,
        actor_id: ActorId,
        reaction: &EmotionalState,
    ) -> NarrativeResult<()> {
        self.kernel.apply_mutation(actor_id, reaction)
    }

    pub fn traverse_memory(
        &self,
        actor_id: ActorId,
        start: Option<NodeId>,
        max_nodes: usize,
    ) -> NarrativeResult<Vec<NodeId>> {
        self.kernel
            .traverse_memory(&self.graph, actor_id, start, max_nodes)
    }

    fn require_actor(&self, actor_id: ActorId) -> NarrativeResult<&ActorProfile> {
        self.kernel
            .actor(actor_id)
            .ok_or_else(|| NarrativeError::unknown(EntityKind::Actor, actor_id))
    }

    pub fn graph(&self) -> &StoryGraph {
        &self.graph
    }

    pub fn config(&self) -> &NarrativeConfig {
        &self.config
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node(id)
    }

    pub fn nodes_by_kind(&self, kind: NodeKind) -> Vec<&Node> {
        self.graph.nodes_by_kind(kind)
    }

    pub fn nodes_by_actor(&self, actor_id: ActorId) -> Vec<&Node> {
        self.graph.nodes_by_actor(actor_id)
    }

    pub fn edges_between(&self, source: NodeId, target: NodeId) -> Option<&Edge> {
        self.graph.edges_between(source, target)
    }

    pub fn canonical_path(&self) -> Vec<NodeId> {
        self.graph.canonical_path()
    }

    pub fn active_echoes(&self) -> &[PendingEcho] {
        self.matcher.active_echoes()
    }

    pub fn bound_echoes(&self) -> &[EchoBinding] {
        self.matcher.bound_echoes()
    }

    pub fn expired_echoes(&self) -> &[NodeId] {
        self.matcher.expired_echoes()
    }

    pub fn current_turn(&self) -> u64 {
        self.matcher.current_turn()
    }

    pub fn reactions_for_stimulus(&self, stimulus_id: NodeId) -> Vec<NodeId> {
        self.resolver.reactions_for_stimulus(stimulus_id)
    }

    pub fn binding_record(&self, stimulus_id: NodeId) -> Option<&BindingRecord> {
        self.resolver.record(stimulus_id)
    }

    pub fn actors(&self) -> Vec<&ActorProfile> {
        self.kernel.actors()
    }

    pub fn actor(&self, actor_id: ActorId) -> Option<&ActorProfile> {
        self.kernel.actor(actor_id)
    }

    pub fn emotional_state(&self, actor_id: ActorId) -> Option<&EmotionalState> {
        self.kernel.emotional_state(actor_id)
    }

    /// Deliver every engine, matcher and resolver event to `listener`.
    pub fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        let handles = [
            self.engine.subscribe(listener.clone()),
            self.matcher.subscribe(listener.clone()),
            self.resolver.subscribe(listener),
        ];
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscriptions.insert(id, handles);
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some([engine, matcher, resolver]) = self.subscriptions.remove(&id) else {
            return false;
        };
        self.engine.unsubscribe(engine);
        self.matcher.unsubscribe(matcher);
        self.resolver.unsubscribe(resolver);
        true
    }
}

impl Default for NarrativeSession {
    fn default() -> Self {
        let config = NarrativeConfig::default();
        let strategy = Box::new(SeededStrategy::new(config.seed));
        Self::assemble(config, strategy)
    }
}
