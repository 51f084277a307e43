//! Echo Matcher - binds anticipatory echoes to the stimuli they predicted.
//!
//! Each processed stimulus advances the global turn by one, then:
//! 1. **Order**: live echoes are ranked by static binding strength
//! 2. **Match**: each is scored against the stimulus and compared with its
//!    decaying threshold; a match records a causal echo -> stimulus edge
//! 3. **Expire**: echoes whose window has passed are dropped

mod criteria;

pub use criteria::*;

use std::cmp::Ordering;
use story_graph::{keys, Edge, NodeId, NodeKind, StoryGraph};

use crate::config::EchoConfig;
use crate::error::{EntityKind, NarrativeError, NarrativeResult};
use crate::events::{EventBus, Listener, ListenerId, NarrativeEvent};

/// What one turn of matching produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub turn: u64,
    pub bound: Vec<EchoBinding>,
    pub expired: Vec<NodeId>,
}

/// Tracks live echoes and the global turn counter.
#[derive(Debug)]
pub struct EchoMatcher {
    config: EchoConfig,
    turn: u64,
    /// Live echoes in registration order.
    pending: Vec<PendingEcho>,
    bound: Vec<EchoBinding>,
    expired: Vec<NodeId>,
    events: EventBus,
}

impl EchoMatcher {
    pub fn new(config: EchoConfig) -> Self {
        Self {
            config,
            turn: 0,
            pending: Vec::new(),
            bound: Vec::new(),
            expired: Vec::new(),
            events: EventBus::new(),
        }
    }

    /// Start tracking an echo at the current turn.
    ///
    /// The echo node must already be in the graph.
    pub fn register_echo(&mut self, graph: &StoryGraph, echo: Echo) -> NarrativeResult<()> {
        echo.validate()?;
        match graph.node(echo.id) {
            Some(node) if node.kind == NodeKind::Echo => {}
            _ => return Err(NarrativeError::unknown(EntityKind::Echo, echo.id)),
        }
        if self.pending.iter().any(|p| p.echo.id == echo.id) {
            tracing::debug!(echo = %echo.id, "echo already registered");
            return Ok(());
        }

        let expires_at_turn = self.turn + echo.validity_window;
        tracing::debug!(echo = %echo.id, turn = self.turn, expires_at_turn, "echo registered");
        self.pending.push(PendingEcho {
            echo,
            created_at_turn: self.turn,
            expires_at_turn,
            binding_attempts: 0,
            is_bound: false,
        });
        Ok(())
    }

    /// Advance the turn and try every live echo against `stimulus_id`.
    pub fn process_stimulus(
        &mut self,
        graph: &mut StoryGraph,
        stimulus_id: NodeId,
    ) -> NarrativeResult<MatchOutcome> {
        let content = match graph.node(stimulus_id) {
            Some(node) if node.kind == NodeKind::Stimulus => node.content.clone(),
            _ => return Err(NarrativeError::unknown(EntityKind::Stimulus, stimulus_id)),
        };

        self.turn += 1;
        let turn = self.turn;
        let mut outcome = MatchOutcome {
            turn,
            ..Default::default()
        };

        let mut order: Vec<usize> = (0..self.pending.len())
            .filter(|i| {
                let p = &self.pending[*i];
                !p.is_bound && turn <= p.expires_at_turn
            })
            .collect();
        order.sort_by(|a, b| {
            let sa = binding_strength(&self.pending[*a].echo.criteria);
            let sb = binding_strength(&self.pending[*b].echo.criteria);
            sb.partial_cmp(&sa).unwrap_or(Ordering::Equal)
        });

        for idx in order {
            let (echo_id, score, matched) = {
                let pending = &mut self.pending[idx];
                let score = match_score(&pending.echo, &content);
                let remaining = pending.expires_at_turn - turn;
                let threshold = binding_threshold(
                    &self.config,
                    pending.binding_attempts,
                    remaining,
                    pending.echo.validity_window,
                );
                pending.binding_attempts += 1;
                (pending.echo.id, score, score >= threshold)
            };
            if !matched {
                continue;
            }

            graph.add_edge(
                Edge::causal(echo_id, stimulus_id, score)
                    .with_attribute(keys::BINDING_TYPE, "premonition"),
            )?;
            self.pending[idx].is_bound = true;

            let binding = EchoBinding {
                echo_id,
                stimulus_id,
                score,
                turn,
            };
            tracing::info!(echo = %echo_id, stimulus = %stimulus_id, score, turn, "echo bound");
            self.events.emit(&NarrativeEvent::EchoBound {
                echo_id,
                stimulus_id,
                score,
                turn,
            });
            self.bound.push(binding.clone());
            outcome.bound.push(binding);
        }

        self.pending.retain(|p| !p.is_bound);

        let (expired, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| turn > p.expires_at_turn);
        self.pending = live;
        for p in expired {
            tracing::debug!(echo = %p.echo.id, turn, "echo expired");
            self.events.emit(&NarrativeEvent::EchoExpired {
                echo_id: p.echo.id,
                turn,
            });
            self.expired.push(p.echo.id);
            outcome.expired.push(p.echo.id);
        }

        Ok(outcome)
    }

    /// Stop tracking a live echo that was realized outside the matcher.
    ///
    /// The echo is neither bound nor expired; it simply leaves the pending
    /// set and no later turn considers it.
    pub fn withdraw(&mut self, echo_id: NodeId) -> Option<PendingEcho> {
        let idx = self.pending.iter().position(|p| p.echo.id == echo_id)?;
        tracing::debug!(echo = %echo_id, turn = self.turn, "echo withdrawn");
        Some(self.pending.remove(idx))
    }

    /// Echoes still waiting for a stimulus, in registration order.
    pub fn active_echoes(&self) -> &[PendingEcho] {
        &self.pending
    }

    pub fn bound_echoes(&self) -> &[EchoBinding] {
        &self.bound
    }

    pub fn expired_echoes(&self) -> &[NodeId] {
        &self.expired
    }

    pub fn pending_echo(&self, echo_id: NodeId) -> Option<&PendingEcho> {
        self.pending.iter().find(|p| p.echo.id == echo_id)
    }

    pub fn current_turn(&self) -> u64 {
        self.turn
    }

    pub fn subscribe(&mut self, listener: Listener) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }
}

impl Default for EchoMatcher {
    fn default() -> Self {
        Self::new(EchoConfig::default())
    }
}
