//! Actor Kernel module - per-actor profiles, mutation and memory traversal.
//!
//! - **profile**: tone distribution, mutation rules, emotional state
//! - **kernel**: creation, mutation, forking and reconfiguration
//! - **traversal**: best-first memory walk biased by emotion, recency and causality

mod kernel;
mod profile;
mod traversal;

pub use kernel::*;
pub use profile::*;
