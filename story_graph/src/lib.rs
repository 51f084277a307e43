//! # Story Graph (The Loom)
//!
//! The single source of truth for everything that happens in a nonlinear
//! narrative. Stimuli, reactions, anticipatory echoes and actor memories are
//! nodes; causal, affective, divergence and contradiction links are edges.
//!
//! This crate knows nothing about actors' moods or how reactions are chosen.
//! It stores typed nodes and edges and answers structural questions about
//! them (adjacency, paths, forks, the canonical storyline).

pub mod edge;
pub mod error;
pub mod graph;
pub mod node;

pub use edge::*;
pub use error::*;
pub use graph::*;
pub use node::*;
