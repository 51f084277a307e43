//! Stimulus Engine - turns a stimulus into actor reactions and echoes.
//!
//! Each stimulus moves through a fixed lifecycle:
//!
//! ```text
//! Received -> Evaluated -> ReactionsEmitted -> EchoesEmitted
//! ```
//!
//! Every actor is evaluated in creation order. An actor reacts when the
//! strategy's tension reaches its reaction threshold, and independently may
//! leave an echo behind. Each reaction is folded back into the actor through
//! [`ActorKernel::apply_mutation`].

mod strategy;

pub use strategy::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use story_graph::{keys, ActorId, Edge, EdgeKind, Node, NodeId, NodeKind, StoryGraph};

use crate::actor::{ActorKernel, EmotionalState};
use crate::echo::Echo;
use crate::error::{EntityKind, NarrativeError, NarrativeResult};
use crate::events::{EventBus, Listener, ListenerId, NarrativeEvent};

/// A reaction node as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: NodeId,
    pub actor_id: Option<ActorId>,
    /// The stimulus the reaction answers, if known at creation.
    pub stimulus_id: Option<NodeId>,
    pub content: String,
    pub emotion: Option<EmotionalState>,
}

/// Lifecycle position of a processed stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulusPhase {
    Received,
    Evaluated,
    ReactionsEmitted,
    EchoesEmitted,
}

/// Everything one stimulus produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StimulusOutcome {
    pub reactions: Vec<Reaction>,
    pub echoes: Vec<Echo>,
}

/// Per-actor decision taken during evaluation.
struct Verdict {
    actor_id: ActorId,
    tension: f64,
    reacts: bool,
    echoes: bool,
}

pub struct StimulusEngine {
    strategy: Box<dyn ResponseStrategy>,
    /// Echoes emitted but not yet realized or discarded.
    pending_echoes: HashMap<NodeId, Echo>,
    /// Lifecycle of the most recent stimulus only.
    phase: Option<(NodeId, StimulusPhase)>,
    events: EventBus,
}

impl StimulusEngine {
    pub fn new(strategy: Box<dyn ResponseStrategy>) -> Self {
        Self {
            strategy,
            pending_echoes: HashMap::new(),
            phase: None,
            events: EventBus::new(),
        }
    }

    /// Engine backed by [`SeededStrategy`].
    pub fn seeded(seed: u64) -> Self {
        Self::new(Box::new(SeededStrategy::new(seed)))
    }

    /// Evaluate every actor against a stimulus already in the graph.
    pub fn process_stimulus(
        &mut self,
        graph: &mut StoryGraph,
        kernel: &mut ActorKernel,
        stimulus_id: NodeId,
    ) -> NarrativeResult<StimulusOutcome> {
        let stimulus = match graph.node(stimulus_id) {
            Some(node) if node.kind == NodeKind::Stimulus => node.clone(),
            _ => return Err(NarrativeError::unknown(EntityKind::Stimulus, stimulus_id)),
        };
        self.phase = Some((stimulus_id, StimulusPhase::Received));
        tracing::debug!(
            stimulus = %stimulus_id,
            actors = kernel.actor_count(),
            "stimulus received"
        );

        let mut verdicts = Vec::new();
        for actor_id in kernel.actor_ids() {
            let (Some(profile), Some(state)) =
                (kernel.actor(actor_id), kernel.emotional_state(actor_id))
            else {
                continue;
            };
            let tension = self.strategy.tension(profile, state, &stimulus);
            let echoes = self.strategy.should_echo(profile, &stimulus);
            verdicts.push(Verdict {
                actor_id,
                tension,
                reacts: tension >= profile.reaction_threshold,
                echoes,
            });
        }
        self.phase = Some((stimulus_id, StimulusPhase::Evaluated));

        let mut outcome = StimulusOutcome::default();
        for verdict in verdicts.iter().filter(|v| v.reacts) {
            let reaction = self.emit_reaction(graph, kernel, &stimulus, verdict)?;
            outcome.reactions.push(reaction);
        }
        self.phase = Some((stimulus_id, StimulusPhase::ReactionsEmitted));

        for verdict in verdicts.iter().filter(|v| v.echoes) {
            let echo = self.emit_echo(graph, kernel, &stimulus, verdict.actor_id)?;
            outcome.echoes.push(echo);
        }
        self.phase = Some((stimulus_id, StimulusPhase::EchoesEmitted));

        tracing::info!(
            stimulus = %stimulus_id,
            reactions = outcome.reactions.len(),
            echoes = outcome.echoes.len(),
            "stimulus processed"
        );
        Ok(outcome)
    }

    fn emit_reaction(
        &mut self,
        graph: &mut StoryGraph,
        kernel: &mut ActorKernel,
        stimulus: &Node,
        verdict: &Verdict,
    ) -> NarrativeResult<Reaction> {
        let actor_id = verdict.actor_id;
        let (Some(profile), Some(state)) =
            (kernel.actor(actor_id), kernel.emotional_state(actor_id))
        else {
            return Err(NarrativeError::unknown(EntityKind::Actor, actor_id));
        };
        let anchor = profile.memory_anchor;
        let draft = self
            .strategy
            .compose_reaction(profile, state, stimulus, verdict.tension);

        let reaction_id = graph.add_node(
            Node::reaction(draft.content.clone())
                .with_actor(actor_id)
                .with_attribute(keys::EMOTION, draft.emotion.dominant.as_str())
                .with_attribute(keys::STIMULUS_ID, stimulus.id.to_string()),
        );
        graph.add_edge(
            Edge::causal(stimulus.id, reaction_id, verdict.tension)
                .with_attribute(keys::BINDING_TYPE, "direct"),
        )?;
        graph.add_edge(Edge::new(
            anchor,
            reaction_id,
            EdgeKind::Affective,
            draft.emotion.intensity,
        ))?;
        kernel.apply_mutation(actor_id, &draft.emotion)?;

        tracing::debug!(
            reaction = %reaction_id,
            actor = %actor_id,
            tension = verdict.tension,
            "reaction emitted"
        );
        self.events.emit(&NarrativeEvent::ReactionCreated {
            reaction_id,
            actor_id: Some(actor_id),
            stimulus_id: Some(stimulus.id),
        });

        Ok(Reaction {
            id: reaction_id,
            actor_id: Some(actor_id),
            stimulus_id: Some(stimulus.id),
            content: draft.content,
            emotion: Some(draft.emotion),
        })
    }

    fn emit_echo(
        &mut self,
        graph: &mut StoryGraph,
        kernel: &ActorKernel,
        stimulus: &Node,
        actor_id: ActorId,
    ) -> NarrativeResult<Echo> {
        let (Some(profile), Some(state)) =
            (kernel.actor(actor_id), kernel.emotional_state(actor_id))
        else {
            return Err(NarrativeError::unknown(EntityKind::Actor, actor_id));
        };
        let anchor = profile.memory_anchor;
        let window = profile.echo_window;
        let draft = self.strategy.compose_echo(profile, state, stimulus);

        let echo = Echo::new(draft.content, draft.criteria, window)
            .with_actor(actor_id)
            .with_emotion(draft.emotion);
        echo.validate()?;

        graph.add_node(echo_node(&echo));
        graph.add_edge(Edge::new(
            anchor,
            echo.id,
            EdgeKind::Affective,
            echo.emotion.as_ref().map_or(0.5, |e| e.intensity),
        ))?;
        self.track_echo(echo.clone());
        Ok(echo)
    }

    fn track_echo(&mut self, echo: Echo) {
        tracing::debug!(echo = %echo.id, window = echo.validity_window, "echo emitted");
        self.events.emit(&NarrativeEvent::EchoCreated {
            echo_id: echo.id,
            actor_id: echo.actor_id,
            validity_window: echo.validity_window,
        });
        self.pending_echoes.insert(echo.id, echo);
    }

    /// Turn a pending echo into a reaction bound to `stimulus_id`.
    ///
    /// The reaction gets a new node with the echo's content and emotion, a
    /// causal edge from the stimulus and a causal edge from the echo it
    /// realizes. The echo leaves the pending set.
    pub fn realize_echo(
        &mut self,
        graph: &mut StoryGraph,
        echo_id: NodeId,
        stimulus_id: NodeId,
    ) -> NarrativeResult<Reaction> {
        if !self.pending_echoes.contains_key(&echo_id) {
            return Err(NarrativeError::unknown(EntityKind::Echo, echo_id));
        }
        if !graph.node(stimulus_id).is_some_and(|n| n.kind == NodeKind::Stimulus) {
            return Err(NarrativeError::unknown(EntityKind::Stimulus, stimulus_id));
        }
        if !graph.contains(echo_id) {
            return Err(NarrativeError::unknown(EntityKind::Node, echo_id));
        }
        let Some(echo) = self.pending_echoes.remove(&echo_id) else {
            return Err(NarrativeError::unknown(EntityKind::Echo, echo_id));
        };

        let mut node = Node::reaction(echo.content.clone())
            .with_attribute(keys::STIMULUS_ID, stimulus_id.to_string())
            .with_attribute(keys::SOURCE, "echo");
        if let Some(actor_id) = echo.actor_id {
            node = node.with_actor(actor_id);
        }
        if let Some(emotion) = &echo.emotion {
            node = node.with_attribute(keys::EMOTION, emotion.dominant.as_str());
        }
        let reaction_id = graph.add_node(node);
        graph.add_edge(
            Edge::causal(stimulus_id, reaction_id, 1.0)
                .with_attribute(keys::BINDING_TYPE, "premonition"),
        )?;
        graph.add_edge(Edge::causal(echo_id, reaction_id, 1.0))?;

        tracing::info!(
            echo = %echo_id,
            reaction = %reaction_id,
            stimulus = %stimulus_id,
            "echo realized"
        );
        self.events.emit(&NarrativeEvent::ReactionCreated {
            reaction_id,
            actor_id: echo.actor_id,
            stimulus_id: Some(stimulus_id),
        });

        Ok(Reaction {
            id: reaction_id,
            actor_id: echo.actor_id,
            stimulus_id: Some(stimulus_id),
            content: echo.content,
            emotion: echo.emotion,
        })
    }

    /// [`StimulusEngine::realize_echo`] reporting only success.
    pub fn bind_echo_to_stimulus(
        &mut self,
        graph: &mut StoryGraph,
        echo_id: NodeId,
        stimulus_id: NodeId,
    ) -> bool {
        match self.realize_echo(graph, echo_id, stimulus_id) {
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

    /// Drop a pending echo without realizing it.
    pub fn discard_echo(&mut self, echo_id: NodeId) -> bool {
        self.pending_echoes.remove(&echo_id).is_some()
    }

    /// Add a reaction produced outside the engine.
    ///
    /// A named stimulus must exist. No edges are created; binding them is up
    /// to the resolver.
    pub fn record_reaction(
        &mut self,
        graph: &mut StoryGraph,
        content: impl Into<String>,
        actor_id: Option<ActorId>,
        stimulus_id: Option<NodeId>,
        emotion: Option<EmotionalState>,
    ) -> NarrativeResult<Reaction> {
        if let Some(stimulus_id) = stimulus_id {
            if !graph.node(stimulus_id).is_some_and(|n| n.kind == NodeKind::Stimulus) {
                return Err(NarrativeError::unknown(EntityKind::Stimulus, stimulus_id));
            }
        }

        let content = content.into();
        let mut node = Node::reaction(content.clone());
        if let Some(actor_id) = actor_id {
            node = node.with_actor(actor_id);
        }
        if let Some(stimulus_id) = stimulus_id {
            node = node.with_attribute(keys::STIMULUS_ID, stimulus_id.to_string());
        }
        if let Some(emotion) = &emotion {
            node = node.with_attribute(keys::EMOTION, emotion.dominant.as_str());
        }
        let reaction_id = graph.add_node(node);

        tracing::debug!(
            reaction = %reaction_id,
            bound = stimulus_id.is_some(),
            "reaction recorded"
        );
        self.events.emit(&NarrativeEvent::ReactionCreated {
            reaction_id,
            actor_id,
            stimulus_id,
        });

        Ok(Reaction {
            id: reaction_id,
            actor_id,
            stimulus_id,
            content,
            emotion,
        })
    }

    /// Add an echo produced outside the engine and keep it pending.
    pub fn record_echo(&mut self, graph: &mut StoryGraph, echo: Echo) -> NarrativeResult<NodeId> {
        echo.validate()?;
        if graph.contains(echo.id) {
            return Err(NarrativeError::InvalidBindingCriteria(format!(
                "echo id {} is already in use",
                echo.id
            )));
        }
        let id = graph.add_node(echo_node(&echo));
        self.track_echo(echo);
        Ok(id)
    }

    pub fn pending_echo(&self, echo_id: NodeId) -> Option<&Echo> {
        self.pending_echoes.get(&echo_id)
    }

    pub fn pending_echo_count(&self) -> usize {
        self.pending_echoes.len()
    }

    /// Phase reached by `stimulus_id` if it is the latest stimulus processed.
    pub fn phase(&self, stimulus_id: NodeId) -> Option<StimulusPhase> {
        self.phase
            .filter(|(id, _)| *id == stimulus_id)
            .map(|(_, phase)| phase)
    }

    pub fn subscribe(&mut self, listener: Listener) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }
}

impl std::fmt::Debug for StimulusEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StimulusEngine")
            .field("pending_echoes", &self.pending_echoes.len())
            .field("phase", &self.phase)
            .field("events", &self.events)
            .finish()
    }
}

fn echo_node(echo: &Echo) -> Node {
    let mut node = Node::echo(echo.content.clone()).with_id(echo.id);
    if let Some(actor_id) = echo.actor_id {
        node = node.with_actor(actor_id);
    }
    if let Some(emotion) = &echo.emotion {
        node = node.with_attribute(keys::EMOTION, emotion.dominant.as_str());
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{ActorProfile, Emotion, NewActor};
    use crate::echo::BindingCriteria;
    use crate::events::listener;
    use std::sync::{Arc, Mutex};

    /// Fixed tension per call; echoes from actors whose name is listed.
    struct Scripted {
        tension: f64,
        echoers: Vec<&'static str>,
    }

    impl ResponseStrategy for Scripted {
        fn tension(
            &mut self,
            _actor: &ActorProfile,
            _state: &EmotionalState,
            _stimulus: &Node,
        ) -> f64 {
            self.tension
        }

        fn should_echo(&mut self, actor: &ActorProfile, _stimulus: &Node) -> bool {
            self.echoers.contains(&actor.name.as_str())
        }

        fn compose_reaction(
            &mut self,
            actor: &ActorProfile,
            _state: &EmotionalState,
            stimulus: &Node,
            tension: f64,
        ) -> ReactionDraft {
            ReactionDraft {
                content: format!("{}: {}", actor.name, stimulus.content),
                emotion: EmotionalState::new(Emotion::Fear, tension, 0.9),
            }
        }

        fn compose_echo(
            &mut self,
            actor: &ActorProfile,
            state: &EmotionalState,
            _stimulus: &Node,
        ) -> EchoDraft {
            EchoDraft {
                content: format!("{} waits", actor.name),
                emotion: state.clone(),
                criteria: BindingCriteria::default(),
            }
        }
    }

    fn engine(tension: f64, echoers: Vec<&'static str>) -> StimulusEngine {
        StimulusEngine::new(Box::new(Scripted { tension, echoers }))
    }

    struct World {
        graph: StoryGraph,
        kernel: ActorKernel,
        mira: ActorId,
        ives: ActorId,
    }

    fn world() -> World {
        let mut graph = StoryGraph::new();
        let mut kernel = ActorKernel::default();
        let mira = kernel.create_actor(&mut graph, NewActor::named("Mira").with_threshold(0.4));
        let ives = kernel.create_actor(&mut graph, NewActor::named("Ives").with_threshold(0.8));
        World {
            graph,
            kernel,
            mira,
            ives,
        }
    }

    #[test]
    fn test_only_actors_over_threshold_react() {
        let mut w = world();
        let mut engine = engine(0.6, vec![]);
        let s = w.graph.add_node(Node::stimulus("a bell rings"));

        let outcome = engine.process_stimulus(&mut w.graph, &mut w.kernel, s).unwrap();
        assert_eq!(outcome.reactions.len(), 1);
        let reaction = &outcome.reactions[0];
        assert_eq!(reaction.actor_id, Some(w.mira));
        assert_eq!(reaction.stimulus_id, Some(s));

        let edge = w.graph.edge(s, reaction.id, EdgeKind::Causal).unwrap();
        assert!((edge.weight - 0.6).abs() < 1e-9);
        assert_eq!(edge.attributes.get_str(keys::BINDING_TYPE), Some("direct"));

        let anchor = w.kernel.actor(w.mira).unwrap().memory_anchor;
        assert!(w.graph.edge(anchor, reaction.id, EdgeKind::Affective).is_some());
        assert_eq!(engine.phase(s), Some(StimulusPhase::EchoesEmitted));
    }

    #[test]
    fn test_reaction_mutates_its_actor() {
        let mut w = world();
        let mut engine = engine(0.6, vec![]);
        let s = w.graph.add_node(Node::stimulus("a bell rings"));
        engine.process_stimulus(&mut w.graph, &mut w.kernel, s).unwrap();

        assert_eq!(w.kernel.emotional_state(w.mira).unwrap().dominant, Emotion::Fear);
        assert_eq!(w.kernel.actor(w.mira).unwrap().baseline_tone, Emotion::Fear);
        assert_eq!(w.kernel.emotional_state(w.ives).unwrap().dominant, Emotion::Neutral);
    }

    #[test]
    fn test_only_latest_stimulus_phase_is_kept() {
        let mut w = world();
        let mut engine = engine(0.6, vec![]);
        let first = w.graph.add_node(Node::stimulus("a bell rings"));
        let later = w.graph.add_node(Node::stimulus("the bell stops"));

        engine.process_stimulus(&mut w.graph, &mut w.kernel, first).unwrap();
        assert_eq!(engine.phase(first), Some(StimulusPhase::EchoesEmitted));
        engine.process_stimulus(&mut w.graph, &mut w.kernel, later).unwrap();
        assert_eq!(engine.phase(first), None);
        assert_eq!(engine.phase(later), Some(StimulusPhase::EchoesEmitted));
    }

    #[test]
    fn test_echo_is_independent_of_reaction() {
        let mut w = world();
        let mut engine = engine(0.6, vec!["Ives"]);
        let s = w.graph.add_node(Node::stimulus("footsteps upstairs"));

        let outcome = engine.process_stimulus(&mut w.graph, &mut w.kernel, s).unwrap();
        assert_eq!(outcome.echoes.len(), 1);
        let echo = &outcome.echoes[0];
        assert_eq!(echo.actor_id, Some(w.ives));
        assert_eq!(echo.validity_window, 3);
        assert_eq!(w.graph.node(echo.id).unwrap().kind, NodeKind::Echo);
        assert!(engine.pending_echo(echo.id).is_some());
    }

    #[test]
    fn test_events_follow_emission_order() {
        let mut w = world();
        let mut engine = engine(0.9, vec!["Mira"]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            engine.subscribe(listener(move |event| {
                let tag = match event {
                    NarrativeEvent::ReactionCreated { .. } => "reaction",
                    NarrativeEvent::EchoCreated { .. } => "echo",
                    _ => "other",
                };
                seen.lock().unwrap().push(tag);
                Ok(())
            }));
        }
        let s = w.graph.add_node(Node::stimulus("thunder"));
        engine.process_stimulus(&mut w.graph, &mut w.kernel, s).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["reaction", "reaction", "echo"]);
    }

    #[test]
    fn test_unknown_stimulus_is_rejected() {
        let mut w = world();
        let mut engine = engine(0.9, vec![]);
        let memory = w.kernel.actor(w.mira).unwrap().memory_anchor;

        assert!(engine.process_stimulus(&mut w.graph, &mut w.kernel, NodeId::new()).is_err());
        assert!(engine.process_stimulus(&mut w.graph, &mut w.kernel, memory).is_err());
        assert_eq!(engine.phase(memory), None);
    }

    #[test]
    fn test_bind_echo_to_stimulus() {
        let mut w = world();
        let mut engine = engine(0.0, vec!["Mira"]);
        let first = w.graph.add_node(Node::stimulus("the door creaks"));
        let echo = engine
            .process_stimulus(&mut w.graph, &mut w.kernel, first)
            .unwrap()
            .echoes
            .remove(0);
        let second = w.graph.add_node(Node::stimulus("someone enters"));

        assert!(!engine.bind_echo_to_stimulus(&mut w.graph, NodeId::new(), second));
        assert!(!engine.bind_echo_to_stimulus(&mut w.graph, echo.id, NodeId::new()));
        assert!(engine.pending_echo(echo.id).is_some());

        let reaction = engine.realize_echo(&mut w.graph, echo.id, second).unwrap();
        assert_ne!(reaction.id, echo.id);
        assert_eq!(reaction.content, echo.content);
        assert_eq!(reaction.emotion, echo.emotion);
        assert!(w.graph.edge(second, reaction.id, EdgeKind::Causal).is_some());
        assert!(w.graph.edge(echo.id, reaction.id, EdgeKind::Causal).is_some());
        assert_eq!(engine.pending_echo_count(), 0);

        assert!(!engine.bind_echo_to_stimulus(&mut w.graph, echo.id, second));
    }

    #[test]
    fn test_record_external_reaction_and_echo() {
        let mut w = world();
        let mut engine = engine(0.0, vec![]);

        let loose = engine
            .record_reaction(&mut w.graph, "I knew it", Some(w.mira), None, None)
            .unwrap();
        assert_eq!(loose.stimulus_id, None);
        assert_eq!(w.graph.node(loose.id).unwrap().kind, NodeKind::Reaction);
        assert!(engine
            .record_reaction(&mut w.graph, "to nobody", None, Some(NodeId::new()), None)
            .is_err());

        let echo = Echo::new("it will rain", BindingCriteria::default(), 2);
        let id = engine.record_echo(&mut w.graph, echo.clone()).unwrap();
        assert_eq!(id, echo.id);
        assert!(engine.record_echo(&mut w.graph, echo).is_err());
        assert!(engine.discard_echo(id));
        assert!(!engine.discard_echo(id));
    }
}
