use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::probability::Distribution;


/// Represents a single source character in the transition model.
///
/// A `State` corresponds to one observed character (`key`) and stores
/// all observed transitions from this character to the next one.
///
/// Conceptually, this is a node in a Markov chain where outgoing edges
/// are weighted by their number of observations.
///
/// ## Responsibilities:
/// - Accumulate transition occurrences during training
/// - Derive the normalized outgoing distribution
/// - Merge with another state having the same key (ex. parallel training support)
///
/// ## Invariants
/// - All transitions belong to the same `key`
/// - Each transition occurrence count is strictly positive
/// - A recorded state always has at least one transition
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct State {
	/// Identifier of the state (the source character).
	key: char,
	/// Outgoing transitions indexed by the next character.
	/// The value represents how many times this transition was observed.
	/// Example: { 'e' => 42, 'a' => 3 }
	transitions: HashMap<char, usize>,
}

impl State {
	/// Creates a new empty state for the given source character.
	pub(crate) fn new(key: char) -> Self {
		Self {
			key,
			transitions: HashMap::new(),
		}
	}

	/// Records an occurrence of a transition toward `next_char`.
	///
	/// - If the transition already exists, its occurrence count is increased.
	/// - Otherwise, a new transition is created with an initial count of 1.
	pub(crate) fn add_transition(&mut self, next_char: char) {
		*self.transitions.entry(next_char).or_insert(0) += 1;
	}

	/// Returns the occurrence count recorded toward `next_char`.
	pub(crate) fn count(&self, next_char: char) -> usize {
		self.transitions.get(&next_char).copied().unwrap_or(0)
	}

	/// Derives the normalized outgoing distribution of this state.
	///
	/// Each probability is the occurrence count divided by the total number
	/// of occurrences, so the distribution sums to 1. Outcomes are sorted by
	/// character so that sampling under a fixed seed does not depend on hash
	/// map iteration order.
	///
	/// # Panics
	/// Panics if the state has zero total occurrences. A recorded state
	/// always carries at least one transition; zero mass means the builder
	/// itself is broken and must not be recovered from.
	pub(crate) fn distribution(&self) -> Distribution {
		let total: usize = self.transitions.values().sum();
		assert!(total > 0, "state '{}' recorded with zero transition mass", self.key);

		let mut outcomes: Vec<(char, f64)> = self
			.transitions
			.iter()
			.map(|(next_char, occurrence)| (*next_char, *occurrence as f64 / total as f64))
			.collect();
		outcomes.sort_by(|a, b| a.0.cmp(&b.0));

		Distribution::new(self.key, outcomes)
	}

	/// Merges another state into this one.
	///
	/// Both states must represent the same source character (`key`).
	/// Transition occurrence counts are summed.
	///
	/// This method is intended for parallel training (or merging saved
	/// models), where multiple partial models are combined into a single one.
	///
	/// # Errors
	/// Returns an error if the state keys do not match.
	pub(crate) fn merge(&mut self, other: &Self) -> Result<(), String> {
		if self.key != other.key {
			return Err("Key mismatch".to_owned());
		}

		for (next_char, occurrence) in &other.transitions {
			*self.transitions.entry(*next_char).or_insert(0) += *occurrence;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transitions_accumulate_with_multiplicity() {
		let mut state = State::new('a');
		state.add_transition('b');
		state.add_transition('b');
		state.add_transition('c');

		assert_eq!(state.count('b'), 2);
		assert_eq!(state.count('c'), 1);
		assert_eq!(state.count('z'), 0);
	}

	#[test]
	fn distribution_is_normalized_and_sorted() {
		let mut state = State::new('a');
		state.add_transition('c');
		state.add_transition('b');
		state.add_transition('b');
		state.add_transition('b');

		let distribution = state.distribution();
		let outcomes: Vec<(char, f64)> = distribution.outcomes().collect();

		assert_eq!(outcomes.len(), 2);
		assert_eq!(outcomes[0].0, 'b');
		assert_eq!(outcomes[1].0, 'c');
		assert!((outcomes[0].1 - 0.75).abs() < 1e-9);
		assert!((outcomes[1].1 - 0.25).abs() < 1e-9);
	}

	#[test]
	fn merge_sums_occurrences() {
		let mut left = State::new('a');
		left.add_transition('b');

		let mut right = State::new('a');
		right.add_transition('b');
		right.add_transition('c');

		left.merge(&right).unwrap();
		assert_eq!(left.count('b'), 2);
		assert_eq!(left.count('c'), 1);
	}

	#[test]
	fn merge_rejects_mismatched_keys() {
		let mut left = State::new('a');
		let right = State::new('b');
		assert!(left.merge(&right).is_err());
	}
}
