use std::collections::HashMap;

use rand::Rng;

use serde::{Deserialize, Serialize};

/// Normalized outgoing distribution of a single source character.
///
/// Outcomes are held sorted by character, so sampling a distribution with
/// a fixed random seed reproduces the same draws regardless of how the
/// underlying counts were stored.
///
/// ## Invariants
/// - At least one outcome
/// - Every probability is in (0, 1] and the probabilities sum to 1
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Distribution {
	/// The source character this distribution belongs to.
	key: char,
	/// Possible next characters with their probabilities, sorted by character.
	outcomes: Vec<(char, f64)>,
}

impl Distribution {
	/// Creates a distribution from pre-normalized outcomes.
	///
	/// # Visibility
	/// - `pub(crate)` to prevent construction outside the crate; only
	///   `TransitionTable::normalize` produces distributions.
	pub(crate) fn new(key: char, outcomes: Vec<(char, f64)>) -> Self {
		Self { key, outcomes }
	}

	/// Returns the source character of this distribution.
	pub fn key(&self) -> char {
		self.key
	}

	/// Returns an iterator over `(next_char, probability)` pairs,
	/// sorted by character.
	pub fn outcomes(&self) -> impl Iterator<Item = (char, f64)> {
		self.outcomes.iter().copied()
	}

	/// Samples one next character using weighted random choice.
	///
	/// Each candidate's selection probability equals its recorded
	/// probability. Draws are independent across calls; nothing is
	/// memoized.
	///
	/// This method performs:
	/// - one uniform draw in [0, 1)
	/// - a cumulative subtraction to select a bucket
	pub fn sample<R: Rng>(&self, rng: &mut R) -> char {
		let mut roll: f64 = rng.random();

		for (next_char, probability) in &self.outcomes {
			if roll < *probability {
				return *next_char;
			}
			roll -= probability;
		}

		// Floating-point rounding can leave a sliver of mass past the last
		// bucket; it belongs to the last outcome.
		self.outcomes[self.outcomes.len() - 1].0
	}
}

/// Normalized probability model derived from a `TransitionTable`.
///
/// Holds one `Distribution` per recorded source character. Derived once
/// per training text and read-only afterwards; generation walks it without
/// ever mutating it, so a table can be shared freely between sessions.
///
/// # Responsibilities
/// - Look up the outgoing distribution of a character
/// - Generate sequences by weighted random walk with an injectable
///   random source
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ProbabilityTable {
	/// Mapping from a source character to its outgoing distribution.
	distributions: HashMap<char, Distribution>,
}

impl ProbabilityTable {
	/// Assembles a table from per-source distributions.
	pub(crate) fn new(distributions: Vec<Distribution>) -> Self {
		Self {
			distributions: distributions.into_iter().map(|d| (d.key(), d)).collect(),
		}
	}

	/// Returns the outgoing distribution of `symbol`, if it was ever
	/// observed as a source.
	pub fn distribution(&self, symbol: char) -> Option<&Distribution> {
		self.distributions.get(&symbol)
	}

	/// Returns an iterator over all distributions, in no particular order.
	pub fn distributions(&self) -> impl Iterator<Item = &Distribution> {
		self.distributions.values()
	}

	/// Returns the number of source characters in the table.
	pub fn len(&self) -> usize {
		self.distributions.len()
	}

	/// Returns true if the table holds no distributions.
	pub fn is_empty(&self) -> bool {
		self.distributions.is_empty()
	}

	/// Generates a sequence by weighted random walk.
	///
	/// # Parameters
	/// - `start`: First character of the result. It does not need to be a
	///   known source; an unknown start simply terminates the walk at once.
	/// - `target_length`: Upper bound on the result length, in characters.
	/// - `rng`: Random source. Pass a seeded generator for reproducible
	///   output, or `rand::rng()` when reproducibility does not matter.
	///
	/// # Behavior
	/// The result opens with `start`. Up to `target_length - 1` times: if
	/// the current character has no recorded distribution the walk halts
	/// (expected early termination, not an error); otherwise one next
	/// character is sampled, appended, and becomes the current character.
	///
	/// # Returns
	/// A sequence of 1 to `target_length` characters.
	pub fn generate<R: Rng>(&self, start: char, target_length: usize, rng: &mut R) -> String {
		let mut result = String::new();
		result.push(start);

		let mut current = start;
		for _ in 1..target_length {
			match self.distribution(current) {
				Some(distribution) => {
					let next_char = distribution.sample(rng);
					result.push(next_char);
					current = next_char;
				}
				None => break,
			}
		}

		result
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::transition::TransitionTable;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	#[test]
	fn single_outcome_always_sampled() {
		let table = TransitionTable::from_text("xx").normalize();
		let distribution = table.distribution('x').unwrap();

		let mut rng = StdRng::seed_from_u64(7);
		for _ in 0..32 {
			assert_eq!(distribution.sample(&mut rng), 'x');
		}
	}

	#[test]
	fn target_length_one_returns_only_the_start() {
		let table = TransitionTable::from_text("aab").normalize();
		let mut rng = StdRng::seed_from_u64(0);

		// Known and unknown starts behave the same at length 1
		assert_eq!(table.generate('a', 1, &mut rng), "a");
		assert_eq!(table.generate('?', 1, &mut rng), "?");
	}

	#[test]
	fn unknown_start_halts_immediately() {
		let table = TransitionTable::from_text("aab").normalize();
		let mut rng = StdRng::seed_from_u64(0);

		assert_eq!(table.generate('z', 10, &mut rng), "z");
	}

	#[test]
	fn self_loop_reaches_the_target_length() {
		let table = TransitionTable::from_text("xx").normalize();
		let mut rng = StdRng::seed_from_u64(1);

		assert_eq!(table.generate('x', 4, &mut rng), "xxxx");
	}

	#[test]
	fn fixed_seed_reproduces_the_walk() {
		let table = TransitionTable::from_text("the quick brown fox jumps over the lazy dog").normalize();

		let first = table.generate('t', 24, &mut StdRng::seed_from_u64(42));
		let second = table.generate('t', 24, &mut StdRng::seed_from_u64(42));

		assert_eq!(first, second);
	}
}
