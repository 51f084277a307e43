//! Response strategies decide how strongly actors respond and what they say.

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use story_graph::Node;

use crate::actor::{ActorProfile, Emotion, EmotionalState};
use crate::echo::BindingCriteria;
use crate::similarity;

/// Content and emotion for a reaction about to be emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionDraft {
    pub content: String,
    pub emotion: EmotionalState,
}

/// Content, emotion and binding criteria for an echo about to be emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct EchoDraft {
    pub content: String,
    pub emotion: EmotionalState,
    pub criteria: BindingCriteria,
}

/// Pluggable relevance and sampling behaviour of the stimulus engine.
pub trait ResponseStrategy: Send {
    /// How much a stimulus stirs an actor. Compared against the actor's threshold.
    fn tension(&mut self, actor: &ActorProfile, state: &EmotionalState, stimulus: &Node) -> f64;

    /// Whether the actor anticipates what comes next on this stimulus.
    fn should_echo(&mut self, actor: &ActorProfile, stimulus: &Node) -> bool;

    fn compose_reaction(
        &mut self,
        actor: &ActorProfile,
        state: &EmotionalState,
        stimulus: &Node,
        tension: f64,
    ) -> ReactionDraft;

    fn compose_echo(
        &mut self,
        actor: &ActorProfile,
        state: &EmotionalState,
        stimulus: &Node,
    ) -> EchoDraft;
}

/// Default strategy: fixed base, tone alignment and name resonance terms plus
/// seeded jitter. Identical seeds replay identical stories.
#[derive(Debug, Clone)]
pub struct SeededStrategy {
    rng: StdRng,
}

impl SeededStrategy {
    const BASE: f64 = 0.3;

    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn sample_emotion(&mut self, actor: &ActorProfile) -> Emotion {
        let (emotions, weights): (Vec<Emotion>, Vec<f64>) = actor.tone.iter().unzip();
        match WeightedIndex::new(&weights) {
            Ok(dist) => emotions[dist.sample(&mut self.rng)],
            Err(_) => actor.baseline_tone,
        }
    }
}

impl ResponseStrategy for SeededStrategy {
    fn tension(&mut self, actor: &ActorProfile, _state: &EmotionalState, stimulus: &Node) -> f64 {
        let alignment = 0.2 * actor.tone.weight(actor.baseline_tone);
        let named = stimulus
            .content
            .to_lowercase()
            .contains(&actor.name.to_lowercase());
        let resonance = if named { 0.2 } else { 0.0 };
        let jitter = self.rng.gen_range(0.0..0.3);
        (Self::BASE + alignment + resonance + jitter).clamp(0.0, 1.0)
    }

    fn should_echo(&mut self, actor: &ActorProfile, _stimulus: &Node) -> bool {
        self.rng.gen_bool(actor.echo_probability.clamp(0.0, 1.0))
    }

    fn compose_reaction(
        &mut self,
        actor: &ActorProfile,
        state: &EmotionalState,
        stimulus: &Node,
        tension: f64,
    ) -> ReactionDraft {
        let emotion = self.sample_emotion(actor);
        ReactionDraft {
            content: format!(
                "{} responds with {} to \"{}\"",
                actor.name, emotion, stimulus.content
            ),
            emotion: EmotionalState::new(emotion, tension, state.stability),
        }
    }

    fn compose_echo(
        &mut self,
        actor: &ActorProfile,
        state: &EmotionalState,
        stimulus: &Node,
    ) -> EchoDraft {
        let mut keywords: Vec<String> = similarity::tokenize(&stimulus.content)
            .into_iter()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|t| t.len() > 3)
            .collect();
        keywords.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        keywords.truncate(3);

        EchoDraft {
            content: format!("{} senses what follows \"{}\"", actor.name, stimulus.content),
            emotion: state.clone(),
            criteria: BindingCriteria::default().with_keywords(keywords),
        }
    }
}
