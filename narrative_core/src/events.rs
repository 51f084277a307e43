//! Narrative events and the listener registry that fans them out.
//!
//! Each component owns its own [`EventBus`]. Dispatch is synchronous and
//! happens at the point of occurrence. A listener that errors or panics is
//! logged and counted; it never interrupts the component or the remaining
//! listeners.

use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use story_graph::{ActorId, NodeId};

/// Kinds of stimulus/reaction interactions recorded by the binding resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// A reaction bound directly to the stimulus it names.
    FoldBinding,
    /// A reaction that arrived first and was folded into a later stimulus.
    DeferredFold,
    /// An echo that matched a stimulus.
    PremonitionBinding,
    /// The user's final choice among candidate reactions.
    ResponseSelection,
    /// A stimulus was forked into a divergent branch.
    FractureFork,
    /// A reaction manufactured its own prompt.
    ReverseBinding,
}

/// Everything the core reports to its subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NarrativeEvent {
    ReactionCreated {
        reaction_id: NodeId,
        actor_id: Option<ActorId>,
        stimulus_id: Option<NodeId>,
    },
    EchoCreated {
        echo_id: NodeId,
        actor_id: Option<ActorId>,
        validity_window: u64,
    },
    EchoBound {
        echo_id: NodeId,
        stimulus_id: NodeId,
        score: f64,
        turn: u64,
    },
    EchoExpired {
        echo_id: NodeId,
        turn: u64,
    },
    InteractionRecorded {
        kind: InteractionKind,
        stimulus_id: NodeId,
        reaction_id: Option<NodeId>,
    },
}

/// Error type listeners may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// A registered callback.
pub type Listener = Arc<dyn Fn(&NarrativeEvent) -> Result<(), ListenerError> + Send + Sync>;

/// Wrap a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&NarrativeEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Per-component list of listeners.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
    failures: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn subscribe(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener. Returns false if the handle is unknown.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Deliver an event to every listener, in registration order.
    pub fn emit(&mut self, event: &NarrativeEvent) {
        for (id, listener) in &self.listeners {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.failures += 1;
                    tracing::warn!(listener = id.0, error = %err, "listener failed");
                }
                Err(_) => {
                    self.failures += 1;
                    tracing::warn!(listener = id.0, "listener panicked");
                }
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of listener invocations that errored or panicked.
    pub fn failure_count(&self) -> u64 {
        self.failures
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("failures", &self.failures)
            .finish()
    }
}
