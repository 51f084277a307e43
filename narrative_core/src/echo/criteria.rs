//! Echo records, binding criteria and the scoring rules that match echoes to stimuli.

use serde::{Deserialize, Serialize};
use story_graph::{ActorId, NodeId};

use crate::actor::EmotionalState;
use crate::config::EchoConfig;
use crate::error::{NarrativeError, NarrativeResult};
use crate::similarity;

/// What a stimulus must look like for an echo to bind to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingCriteria {
    /// Weight of lexical overlap, 0.0 - 1.0.
    pub content_similarity: f64,
    /// Weight of emotional alignment, 0.0 - 1.0.
    pub emotional_alignment: f64,
    /// Lower-cased words whose presence in the stimulus supports a match.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Default for BindingCriteria {
    fn default() -> Self {
        Self {
            content_similarity: 0.7,
            emotional_alignment: 0.6,
            keywords: Vec::new(),
        }
    }
}

impl BindingCriteria {
    pub fn new(content_similarity: f64, emotional_alignment: f64) -> Self {
        Self {
            content_similarity,
            emotional_alignment,
            keywords: Vec::new(),
        }
    }

    /// Set the keyword list. Keywords are trimmed and lower-cased.
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .collect();
        self
    }

    /// Reject weights outside [0, 1] and blank keywords.
    pub fn validate(&self) -> NarrativeResult<()> {
        for (name, value) in [
            ("content_similarity", self.content_similarity),
            ("emotional_alignment", self.emotional_alignment),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(NarrativeError::InvalidBindingCriteria(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if self.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(NarrativeError::InvalidBindingCriteria(
                "keywords must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// An anticipatory reaction waiting for the stimulus it predicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    /// ID of the echo node in the story graph.
    pub id: NodeId,
    pub actor_id: Option<ActorId>,
    pub content: String,
    pub emotion: Option<EmotionalState>,
    /// Number of turns the echo stays eligible.
    pub validity_window: u64,
    pub criteria: BindingCriteria,
}

impl Echo {
    pub fn new(
        content: impl Into<String>,
        criteria: BindingCriteria,
        validity_window: u64,
    ) -> Self {
        Self {
            id: NodeId::new(),
            actor_id: None,
            content: content.into(),
            emotion: None,
            validity_window,
            criteria,
        }
    }

    pub fn with_actor(mut self, actor_id: ActorId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_emotion(mut self, emotion: EmotionalState) -> Self {
        self.emotion = Some(emotion);
        self
    }

    /// Criteria plus a non-zero window.
    pub fn validate(&self) -> NarrativeResult<()> {
        if self.validity_window == 0 {
            return Err(NarrativeError::InvalidBindingCriteria(
                "validity window must be at least one turn".to_string(),
            ));
        }
        self.criteria.validate()
    }
}

/// Matcher bookkeeping for one registered echo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEcho {
    pub echo: Echo,
    pub created_at_turn: u64,
    pub expires_at_turn: u64,
    pub binding_attempts: u32,
    pub is_bound: bool,
}

/// A successful echo -> stimulus match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoBinding {
    pub echo_id: NodeId,
    pub stimulus_id: NodeId,
    pub score: f64,
    pub turn: u64,
}

/// Static ordering key: which echoes get first pick of a stimulus.
pub fn binding_strength(criteria: &BindingCriteria) -> f64 {
    let keyword_bonus = 0.3 * (criteria.keywords.len() as f64 / 5.0).min(1.0);
    criteria.content_similarity * 0.4 + criteria.emotional_alignment * 0.3 + keyword_bonus
}

/// How well `stimulus` fulfils an echo.
pub fn match_score(echo: &Echo, stimulus: &str) -> f64 {
    let criteria = &echo.criteria;
    similarity::jaccard(&echo.content, stimulus) * criteria.content_similarity
        + 0.5 * criteria.emotional_alignment
        + similarity::keyword_match_ratio(&criteria.keywords, stimulus) * 0.3
}

/// Score an echo must reach to bind.
///
/// Starts at the base threshold and relaxes with failed attempts (up to 0.2)
/// and with elapsed share of the validity window (up to 0.2), never dropping
/// below the configured floor.
pub fn binding_threshold(
    config: &EchoConfig,
    attempts: u32,
    remaining_turns: u64,
    validity_window: u64,
) -> f64 {
    let attempt_decay = (attempts as f64 * 0.05).min(0.2);
    let elapsed = if validity_window == 0 {
        1.0
    } else {
        1.0 - remaining_turns.min(validity_window) as f64 / validity_window as f64
    };
    let time_decay = (elapsed * 0.2).min(0.2);
    (config.base_threshold - attempt_decay - time_decay).max(config.min_threshold)
}
