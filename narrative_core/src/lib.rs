//! # Narrative Core (The Loom)
//!
//! The runtime that keeps a nonlinear story moving. It sits on top of
//! `story_graph` and decides who reacts to what, remembers anticipations that
//! have not yet come true, and tracks which reactions answer which stimuli.
//!
//! ## Core Components
//!
//! - **actor**: Actor Kernel - tone, emotional state, mutation, forks and memory traversal
//! - **engine**: Stimulus Engine - per-stimulus actor evaluation behind a pluggable strategy
//! - **echo**: Echo Matcher - turn-scoped anticipatory echoes and their binding
//! - **binding**: Binding Resolver - direct, deferred, premonition and reverse bindings
//! - **session**: one-call-per-turn facade over all of the above
//! - **events**: observer hooks fired at the point of occurrence
//!
//! ## Design Philosophy
//!
//! - **Graph-Owned**: Every stimulus, reaction, echo and memory lives in the story graph;
//!   components hold IDs
//! - **Deterministic**: Sampling goes through a seeded strategy, and every tie has a fixed
//!   resolution
//! - **Synchronous**: Each call runs to completion; the turn counter advances once per stimulus

pub mod actor;
pub mod binding;
pub mod config;
pub mod echo;
pub mod engine;
pub mod error;
pub mod events;
pub mod session;
pub mod similarity;

pub use actor::*;
pub use binding::*;
pub use config::*;
pub use echo::*;
pub use engine::*;
pub use error::*;
pub use events::*;
pub use session::*;
