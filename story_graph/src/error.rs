//! Errors raised by the story graph.

use thiserror::Error;

use crate::node::NodeId;

/// Failures of structural graph operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// An edge referenced a node that is not in the store.
    #[error("edge {from} -> {to} references a node that does not exist")]
    MissingEndpoint { from: NodeId, to: NodeId },

    /// An operation referenced a node that is not in the store.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
}

pub type GraphResult<T> = Result<T, GraphError>;
