//! First-order Markov chain text generation library.
//!
//! This crate provides the pure core of the murmur system:
//! - Character-level transition counting from a training text
//! - Normalization into per-source probability distributions
//! - Weighted random walk generation with an injectable random source
//!
//! Only the high-level API is exposed publicly. Low-level components
//! are kept internal to ensure consistency and prevent misuse.

/// Core transition model and generation logic.
///
/// This module exposes the transition and probability tables while keeping
/// the internal per-source state representation private.
pub mod model;

/// I/O utilities (file loading, path helpers).
///
/// Not exposed
pub(crate) mod io;
