//! Top-level module for the Markov generation system.
//!
//! This crate provides a first-order character transition model, including:
//! - Raw transition counting (`TransitionTable`)
//! - Normalized per-source distributions (`ProbabilityTable`)
//! - Internal state management (`State`)
//! - Weighted random walk generation with an injectable random source

/// Raw transition-count model built from a training text.
///
/// Supports adjacent-pair counting, merging, parallel construction from
/// a corpus file, and compact binary persistence.
pub mod transition;

/// Normalized probability model derived from a `TransitionTable`.
///
/// Holds one distribution per source character and drives sequence
/// generation by weighted random walk.
pub mod probability;

/// Internal representation of a single source character's transitions.
///
/// Tracks outgoing occurrence counts and derives its normalized
/// distribution. This module is not exposed publicly.
mod state;
