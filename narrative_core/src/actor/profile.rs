//! Actor profile definitions - tone, mutation rules, emotional state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use story_graph::{ActorId, NodeId};

/// Emotions an actor can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Neutral,
    Joy,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Trust,
    Anticipation,
    Disgust,
}

impl Emotion {
    pub const ALL: [Emotion; 9] = [
        Emotion::Neutral,
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Surprise,
        Emotion::Trust,
        Emotion::Anticipation,
        Emotion::Disgust,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Trust => "trust",
            Emotion::Anticipation => "anticipation",
            Emotion::Disgust => "disgust",
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown emotion: {}", s))
    }
}

/// Probability of each emotion colouring an actor's reactions.
///
/// Always covers every [`Emotion`] and sums to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneDistribution {
    weights: BTreeMap<Emotion, f64>,
}

impl Default for ToneDistribution {
    /// Mostly neutral, with the remaining mass spread evenly.
    fn default() -> Self {
        Self::focused(Emotion::Neutral, 0.4)
    }
}

impl ToneDistribution {
    /// Build from arbitrary non-negative weights, normalized to sum to 1.
    ///
    /// Missing emotions get 0. Falls back to the default if nothing is positive.
    pub fn from_weights(weights: impl IntoIterator<Item = (Emotion, f64)>) -> Self {
        let mut map: BTreeMap<Emotion, f64> = Emotion::ALL.iter().map(|e| (*e, 0.0)).collect();
        for (emotion, weight) in weights {
            if weight.is_finite() && weight > 0.0 {
                *map.entry(emotion).or_default() += weight;
            }
        }

        let total: f64 = map.values().sum();
        if total <= 0.0 {
            return Self::default();
        }
        for weight in map.values_mut() {
            *weight /= total;
        }
        Self { weights: map }
    }

    /// `emotion` gets `weight`; the rest is split evenly across all other emotions.
    pub fn focused(emotion: Emotion, weight: f64) -> Self {
        let weight = weight.clamp(0.0, 1.0);
        let share = (1.0 - weight) / (Emotion::ALL.len() - 1) as f64;
        let weights = Emotion::ALL
            .iter()
            .map(|e| (*e, if *e == emotion { weight } else { share }))
            .collect();
        Self { weights }
    }

    pub fn weight(&self, emotion: Emotion) -> f64 {
        self.weights.get(&emotion).copied().unwrap_or(0.0)
    }

    /// Sum of all weights (1 up to floating-point error).
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// The heaviest emotion. Ties go to the earlier emotion in [`Emotion::ALL`].
    pub fn dominant(&self) -> Emotion {
        let mut best = Emotion::Neutral;
        let mut best_weight = f64::MIN;
        for (emotion, weight) in &self.weights {
            if *weight > best_weight {
                best = *emotion;
                best_weight = *weight;
            }
        }
        best
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        self.weights.iter().map(|(e, w)| (*e, *w))
    }

    /// Raise `emotion` by `amount` (capped at 1) and rescale every other
    /// emotion proportionally so the distribution still sums to 1.
    pub fn drift_toward(&mut self, emotion: Emotion, amount: f64) {
        let current = self.weight(emotion);
        let raised = (current + amount.max(0.0)).min(1.0);
        let others: f64 = self
            .weights
            .iter()
            .filter(|(e, _)| **e != emotion)
            .map(|(_, w)| *w)
            .sum();

        if others <= f64::EPSILON {
            for (e, w) in self.weights.iter_mut() {
                *w = if *e == emotion { 1.0 } else { 0.0 };
            }
            return;
        }

        let scale = (1.0 - raised) / others;
        for (e, w) in self.weights.iter_mut() {
            if *e == emotion {
                *w = raised;
            } else {
                *w *= scale;
            }
        }
    }
}

/// How an actor's tone evolves as it reacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRules {
    /// Fraction of a reaction's intensity that shifts the tone distribution.
    pub drift_rate: f64,
    /// Trait -> weight hints for where the actor tends to drift.
    #[serde(default)]
    pub drift_directions: BTreeMap<String, f64>,
    /// Labels of traits that resist change.
    #[serde(default)]
    pub stability_factors: BTreeSet<String>,
}

impl MutationRules {
    pub fn with_drift_rate(drift_rate: f64) -> Self {
        Self {
            drift_rate: drift_rate.clamp(0.0, 1.0),
            drift_directions: BTreeMap::new(),
            stability_factors: BTreeSet::new(),
        }
    }

    pub fn with_direction(mut self, trait_name: impl Into<String>, weight: f64) -> Self {
        self.drift_directions.insert(trait_name.into(), weight);
        self
    }

    pub fn with_stability_factor(mut self, label: impl Into<String>) -> Self {
        self.stability_factors.insert(label.into());
        self
    }
}

/// An actor's current mood, also carried by every reaction it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalState {
    pub dominant: Emotion,
    pub secondary: Option<Emotion>,
    /// 0.0 - 1.0.
    pub intensity: f64,
    /// 0.0 - 1.0.
    pub stability: f64,
}

impl EmotionalState {
    /// Create a state; intensity and stability are clamped to [0, 1].
    pub fn new(dominant: Emotion, intensity: f64, stability: f64) -> Self {
        Self {
            dominant,
            secondary: None,
            intensity: intensity.clamp(0.0, 1.0),
            stability: stability.clamp(0.0, 1.0),
        }
    }

    pub fn with_secondary(mut self, secondary: Emotion) -> Self {
        self.secondary = Some(secondary);
        self
    }
}

/// A narrative actor. One per actor, mutated after every reaction it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorProfile {
    pub id: ActorId,
    pub name: String,
    pub tone: ToneDistribution,
    /// Emotion the actor falls back to; its creation-time dominant tone.
    pub baseline_tone: Emotion,
    pub mutation_rules: MutationRules,
    /// Memory node marking the actor's creation.
    pub memory_anchor: NodeId,
    /// Tension a stimulus must reach to draw a reaction.
    pub reaction_threshold: f64,
    /// Threshold the actor was created with; mutation recomputes from it.
    pub base_threshold: f64,
    /// How readily the actor changes; `1 - stability` after reconfiguration.
    pub adaptability: f64,
    /// Chance per stimulus of producing an anticipatory echo.
    pub echo_probability: f64,
    /// Validity window, in turns, of echoes this actor produces.
    pub echo_window: u64,
}
