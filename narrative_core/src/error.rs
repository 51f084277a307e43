//! Errors surfaced by the narrative core.

use story_graph::GraphError;
use thiserror::Error;

use crate::config::ConfigError;

/// What kind of thing an unknown ID was supposed to name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Actor,
    Node,
    Stimulus,
    Reaction,
    Echo,
    Binding,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Actor => "actor",
            EntityKind::Node => "node",
            EntityKind::Stimulus => "stimulus",
            EntityKind::Reaction => "reaction",
            EntityKind::Echo => "echo",
            EntityKind::Binding => "binding",
        };
        f.write_str(name)
    }
}

/// Failures of narrative operations.
///
/// None of these leave partially applied state behind.
#[derive(Debug, Error)]
pub enum NarrativeError {
    /// Edge creation referenced a node the store does not hold. This is a
    /// bookkeeping bug in the caller, not a user-facing fault.
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("unknown {kind} {id}")]
    UnknownEntity { kind: EntityKind, id: String },

    #[error("invalid binding criteria: {0}")]
    InvalidBindingCriteria(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl NarrativeError {
    pub fn unknown(kind: EntityKind, id: impl std::fmt::Display) -> Self {
        NarrativeError::UnknownEntity {
            kind,
            id: id.to_string(),
        }
    }
}

pub type NarrativeResult<T> = Result<T, NarrativeError>;
