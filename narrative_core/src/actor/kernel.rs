//! Actor Kernel - owns actor profiles and emotional state.

use std::collections::HashMap;
use story_graph::{keys, ActorId, Edge, EdgeKind, Node, StoryGraph};

use super::{ActorProfile, Emotion, EmotionalState, MutationRules, ToneDistribution};
use crate::config::{ActorDefaults, TraversalConfig};
use crate::error::{EntityKind, NarrativeError, NarrativeResult};

const MIN_THRESHOLD: f64 = 0.1;
const MAX_THRESHOLD: f64 = 0.9;

/// Optional seed values for a new actor. Anything unset uses the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct NewActor {
    pub name: String,
    pub tone: Option<ToneDistribution>,
    pub mutation_rules: Option<MutationRules>,
    pub reaction_threshold: Option<f64>,
    pub echo_probability: Option<f64>,
    pub echo_window: Option<u64>,
}

impl NewActor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_tone(mut self, tone: ToneDistribution) -> Self {
        self.tone = Some(tone);
        self
    }

    pub fn with_mutation_rules(mut self, rules: MutationRules) -> Self {
        self.mutation_rules = Some(rules);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.reaction_threshold = Some(threshold);
        self
    }

    pub fn with_echo_probability(mut self, probability: f64) -> Self {
        self.echo_probability = Some(probability);
        self
    }

    pub fn with_echo_window(mut self, turns: u64) -> Self {
        self.echo_window = Some(turns);
        self
    }
}

/// Per-actor mutable state plus biased memory traversal.
#[derive(Debug, Clone)]
pub struct ActorKernel {
    pub(super) traversal: TraversalConfig,
    defaults: ActorDefaults,
    profiles: HashMap<ActorId, ActorProfile>,
    pub(super) states: HashMap<ActorId, EmotionalState>,
    /// Actor IDs in creation order.
    order: Vec<ActorId>,
}

impl ActorKernel {
    pub fn new(traversal: TraversalConfig, defaults: ActorDefaults) -> Self {
        Self {
            traversal,
            defaults,
            profiles: HashMap::new(),
            states: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Create an actor and its memory anchor node.
    ///
    /// The actor starts at its baseline tone with intensity 0.5 and stability 0.7.
    pub fn create_actor(&mut self, graph: &mut StoryGraph, seed: NewActor) -> ActorId {
        let id = ActorId::new();
        let tone = seed.tone.unwrap_or_default();
        let baseline = tone.dominant();
        let threshold = seed
            .reaction_threshold
            .unwrap_or(self.defaults.default_threshold)
            .clamp(MIN_THRESHOLD, MAX_THRESHOLD);

        let anchor = graph.add_node(
            Node::memory(format!("{} enters the story", seed.name))
                .with_actor(id)
                .with_attribute(keys::EVENT, "actor_created")
                .with_attribute(keys::EMOTION, baseline.as_str()),
        );

        let profile = ActorProfile {
            id,
            name: seed.name,
            tone,
            baseline_tone: baseline,
            mutation_rules: seed.mutation_rules.unwrap_or_else(|| {
                MutationRules::with_drift_rate(self.defaults.default_drift_rate)
            }),
            memory_anchor: anchor,
            reaction_threshold: threshold,
            base_threshold: threshold,
            adaptability: 0.3,
            echo_probability: seed
                .echo_probability
                .unwrap_or(self.defaults.default_echo_probability)
                .clamp(0.0, 1.0),
            echo_window: seed
                .echo_window
                .unwrap_or(self.defaults.default_echo_window)
                .max(1),
        };

        tracing::info!(actor = %id, name = %profile.name, "actor created");
        self.states
            .insert(id, EmotionalState::new(baseline, 0.5, 0.7));
        self.profiles.insert(id, profile);
        self.order.push(id);
        id
    }

    /// Fold a reaction's emotion back into the actor that produced it.
    pub fn apply_mutation(
        &mut self,
        actor_id: ActorId,
        reaction: &EmotionalState,
    ) -> NarrativeResult<()> {
        let (profile, state) = self.entry_mut(actor_id)?;

        let stability = (state.stability + 0.1).min(1.0);
        *state = EmotionalState {
            stability,
            ..reaction.clone()
        };

        let drift = profile.mutation_rules.drift_rate * reaction.intensity;
        profile.tone.drift_toward(reaction.dominant, drift);

        if reaction.stability > 0.7 {
            profile.baseline_tone = reaction.dominant;
        }

        profile.reaction_threshold =
            (profile.base_threshold - 0.2 * reaction.intensity).clamp(MIN_THRESHOLD, MAX_THRESHOLD);

        tracing::debug!(
            actor = %actor_id,
            emotion = %reaction.dominant,
            threshold = profile.reaction_threshold,
            "mutation applied"
        );
        Ok(())
    }

    /// Branch an actor into an independent variant.
    ///
    /// The variant gets a fresh anchor linked from the original's anchor by an
    /// affective (0.8) and a divergence (0.5) edge.
    pub fn fork_actor(
        &mut self,
        graph: &mut StoryGraph,
        actor_id: ActorId,
        label: &str,
    ) -> NarrativeResult<ActorId> {
        let original = self
            .profiles
            .get(&actor_id)
            .ok_or_else(|| NarrativeError::unknown(EntityKind::Actor, actor_id))?;
        let state = self
            .states
            .get(&actor_id)
            .cloned()
            .ok_or_else(|| NarrativeError::unknown(EntityKind::Actor, actor_id))?;

        let fork_id = ActorId::new();
        let name = format!("{} ({})", original.name, label);
        let anchor = graph.add_node(
            Node::memory(format!("{} splits from {}", name, original.name))
                .with_actor(fork_id)
                .with_attribute(keys::EVENT, "actor_forked")
                .with_attribute(keys::FORKED_FROM, actor_id.to_string())
                .with_attribute(keys::EMOTION, state.dominant.as_str()),
        );
        graph.add_edge(Edge::new(original.memory_anchor, anchor, EdgeKind::Affective, 0.8))?;
        graph.add_edge(Edge::new(original.memory_anchor, anchor, EdgeKind::Divergence, 0.5))?;

        let fork = ActorProfile {
            id: fork_id,
            name,
            memory_anchor: anchor,
            ..original.clone()
        };

        tracing::info!(actor = %actor_id, fork = %fork_id, label, "actor forked");
        self.profiles.insert(fork_id, fork);
        self.states.insert(fork_id, state);
        self.order.push(fork_id);
        Ok(fork_id)
    }

    /// Force an actor into a new emotional configuration.
    pub fn reconfigure(
        &mut self,
        actor_id: ActorId,
        emotional_state: EmotionalState,
        threshold_delta: f64,
    ) -> NarrativeResult<()> {
        let (profile, state) = self.entry_mut(actor_id)?;

        let focus = (0.3 + 0.2 * emotional_state.intensity).min(0.5);
        profile.baseline_tone = emotional_state.dominant;
        profile.tone = ToneDistribution::focused(emotional_state.dominant, focus);
        profile.adaptability = 1.0 - emotional_state.stability;
        profile.reaction_threshold =
            (profile.reaction_threshold + threshold_delta).clamp(MIN_THRESHOLD, MAX_THRESHOLD);
        *state = emotional_state;

        tracing::debug!(
            actor = %actor_id,
            threshold = profile.reaction_threshold,
            "actor reconfigured"
        );
        Ok(())
    }

    pub fn actor(&self, actor_id: ActorId) -> Option<&ActorProfile> {
        self.profiles.get(&actor_id)
    }

    /// All actors in creation order.
    pub fn actors(&self) -> Vec<&ActorProfile> {
        self.order
            .iter()
            .filter_map(|id| self.profiles.get(id))
            .collect()
    }

    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.order.clone()
    }

    pub fn emotional_state(&self, actor_id: ActorId) -> Option<&EmotionalState> {
        self.states.get(&actor_id)
    }

    pub fn actor_count(&self) -> usize {
        self.profiles.len()
    }

    /// Current dominant emotion, falling back to the baseline tone.
    pub fn dominant_emotion(&self, actor_id: ActorId) -> Option<Emotion> {
        self.states
            .get(&actor_id)
            .map(|s| s.dominant)
            .or_else(|| self.profiles.get(&actor_id).map(|p| p.baseline_tone))
    }

    fn entry_mut(
        &mut self,
        actor_id: ActorId,
    ) -> NarrativeResult<(&mut ActorProfile, &mut EmotionalState)> {
        match (self.profiles.get_mut(&actor_id), self.states.get_mut(&actor_id)) {
            (Some(profile), Some(state)) => Ok((profile, state)),
            _ => Err(NarrativeError::unknown(EntityKind::Actor, actor_id)),
        }
    }
}

impl Default for ActorKernel {
    fn default() -> Self {
        Self::new(TraversalConfig::default(), ActorDefaults::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use story_graph::NodeKind;

    fn setup() -> (StoryGraph, ActorKernel, ActorId) {
        let mut graph = StoryGraph::new();
        let mut kernel = ActorKernel::default();
        let id = kernel.create_actor(&mut graph, NewActor::named("Mira"));
        (graph, kernel, id)
    }

    #[test]
    fn test_create_actor_seeds_defaults_and_anchor() {
        let (graph, kernel, id) = setup();
        let profile = kernel.actor(id).unwrap();

        assert_eq!(profile.name, "Mira");
        assert_eq!(profile.baseline_tone, Emotion::Neutral);
        assert_eq!(profile.reaction_threshold, 0.5);

        let anchor = graph.node(profile.memory_anchor).unwrap();
        assert_eq!(anchor.kind, NodeKind::Memory);
        assert_eq!(anchor.actor_id, Some(id));
        assert_eq!(anchor.attributes.get_str(keys::EVENT), Some("actor_created"));

        let state = kernel.emotional_state(id).unwrap();
        assert_eq!(state.dominant, Emotion::Neutral);
        assert_eq!(state.intensity, 0.5);
        assert_eq!(state.stability, 0.7);
    }

    #[test]
    fn test_apply_mutation() {
        let (_graph, mut kernel, id) = setup();

        let reaction = EmotionalState::new(Emotion::Fear, 0.8, 0.9);
        kernel.apply_mutation(id, &reaction).unwrap();

        let state = kernel.emotional_state(id).unwrap();
        assert_eq!(state.dominant, Emotion::Fear);
        assert!((state.stability - 0.8).abs() < 1e-9);

        let profile = kernel.actor(id).unwrap();
        // 0.075 + 0.1 * 0.8
        assert!((profile.tone.weight(Emotion::Fear) - 0.155).abs() < 1e-9);
        assert!((profile.tone.total() - 1.0).abs() < 1e-9);
        assert_eq!(profile.baseline_tone, Emotion::Fear);
        // 0.5 - 0.2 * 0.8
        assert!((profile.reaction_threshold - 0.34).abs() < 1e-9);
    }

    #[test]
    fn test_low_stability_reaction_keeps_baseline() {
        let (_graph, mut kernel, id) = setup();

        kernel
            .apply_mutation(id, &EmotionalState::new(Emotion::Anger, 0.4, 0.5))
            .unwrap();
        assert_eq!(kernel.actor(id).unwrap().baseline_tone, Emotion::Neutral);
    }

    #[test]
    fn test_stability_caps_at_one() {
        let (_graph, mut kernel, id) = setup();
        for _ in 0..5 {
            kernel
                .apply_mutation(id, &EmotionalState::new(Emotion::Joy, 0.5, 0.5))
                .unwrap();
        }
        assert_eq!(kernel.emotional_state(id).unwrap().stability, 1.0);
    }

    #[test]
    fn test_unknown_actor_is_reported_without_side_effects() {
        let (_graph, mut kernel, _id) = setup();
        let ghost = ActorId::new();

        let err = kernel
            .apply_mutation(ghost, &EmotionalState::new(Emotion::Joy, 0.5, 0.5))
            .unwrap_err();
        assert!(matches!(err, NarrativeError::UnknownEntity { kind: EntityKind::Actor, .. }));
        assert_eq!(kernel.actor_count(), 1);
    }

    #[test]
    fn test_fork_actor_is_independent() {
        let (mut graph, mut kernel, id) = setup();
        let fork = kernel.fork_actor(&mut graph, id, "grieving").unwrap();

        let original = kernel.actor(id).unwrap().clone();
        let variant = kernel.actor(fork).unwrap().clone();
        assert_eq!(variant.name, "Mira (grieving)");
        assert_ne!(variant.memory_anchor, original.memory_anchor);
        assert_eq!(variant.tone, original.tone);

        let affective = graph
            .edge(original.memory_anchor, variant.memory_anchor, EdgeKind::Affective)
            .unwrap();
        let divergence = graph
            .edge(original.memory_anchor, variant.memory_anchor, EdgeKind::Divergence)
            .unwrap();
        assert!((affective.weight - 0.8).abs() < 1e-9);
        assert!((divergence.weight - 0.5).abs() < 1e-9);

        kernel
            .apply_mutation(fork, &EmotionalState::new(Emotion::Sadness, 1.0, 0.9))
            .unwrap();
        assert_eq!(kernel.actor(id).unwrap().tone, original.tone);
        assert_eq!(kernel.actor(id).unwrap().baseline_tone, Emotion::Neutral);
        assert_eq!(kernel.actor(fork).unwrap().baseline_tone, Emotion::Sadness);
        assert_eq!(kernel.actors().len(), 2);
    }

    #[test]
    fn test_reconfigure() {
        let (_graph, mut kernel, id) = setup();

        kernel
            .reconfigure(id, EmotionalState::new(Emotion::Trust, 0.5, 0.6), 0.6)
            .unwrap();

        let profile = kernel.actor(id).unwrap();
        assert_eq!(profile.baseline_tone, Emotion::Trust);
        assert!((profile.tone.weight(Emotion::Trust) - 0.4).abs() < 1e-9);
        assert!((profile.tone.weight(Emotion::Joy) - 0.075).abs() < 1e-9);
        assert!((profile.tone.total() - 1.0).abs() < 1e-9);
        assert!((profile.adaptability - 0.4).abs() < 1e-9);
        // 0.5 + 0.6 clamps to 0.9
        assert_eq!(profile.reaction_threshold, 0.9);
    }

    #[test]
    fn test_reconfigure_focus_caps_at_half() {
        let (_graph, mut kernel, id) = setup();
        kernel
            .reconfigure(id, EmotionalState::new(Emotion::Anger, 1.0, 0.2), -1.0)
            .unwrap();

        let profile = kernel.actor(id).unwrap();
        assert!((profile.tone.weight(Emotion::Anger) - 0.5).abs() < 1e-9);
        assert_eq!(profile.reaction_threshold, 0.1);
    }
}
