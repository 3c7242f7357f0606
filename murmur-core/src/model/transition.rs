use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use serde::{Deserialize, Serialize};

use super::probability::ProbabilityTable;
use super::state::State;
use crate::io::{build_output_path, read_file};

/// Raw first-order transition model built from a training text.
///
/// The `TransitionTable` maps every observed source character to its
/// outgoing transition counts. Characters that were never followed by
/// anything simply do not appear as sources.
///
/// # Responsibilities
/// - Count adjacent character pairs from a training text
/// - Accumulate counts for each source character with multiplicity
/// - Merge with another table (ex. parallel training support)
/// - Normalize into a `ProbabilityTable`
///
/// # Invariants
/// - Every recorded source has at least one outgoing transition
/// - A table is built once per training text and not mutated afterwards;
///   a new text yields a fresh table
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TransitionTable {
	/// Mapping from a source character to its recorded state.
	states: HashMap<char, State>,
}

impl TransitionTable {
	/// Builds a transition table from a training text.
	///
	/// Every adjacent character pair is counted with multiplicity: repeated
	/// transitions accumulate. Texts shorter than two characters contain no
	/// pairs and produce an empty table.
	///
	/// Pure function of the input, no side effects.
	pub fn from_text(text: &str) -> Self {
		let mut table = Self::default();
		table.add_text(text);
		table
	}

	/// Counts every adjacent character pair of `text` into the table.
	fn add_text(&mut self, text: &str) {
		let chars: Vec<char> = text.chars().collect();
		if chars.len() < 2 {
			// Text too short, no transitions to record
			return;
		}

		for pair in chars.windows(2) {
			let state = self.states.entry(pair[0]).or_insert_with(|| State::new(pair[0]));
			state.add_transition(pair[1]);
		}
	}

	/// Builds a transition table from a corpus file, one line at a time.
	///
	/// Transitions are counted within each line; pairs never span line
	/// boundaries.
	///
	/// # Behavior
	/// - If a binary sibling of the input file exists, loads it directly.
	/// - Otherwise splits the lines into chunks (based on CPU cores * factor),
	///   builds partial tables in worker threads, merges them, and serializes
	///   the result next to the input for future fast loading.
	///
	/// # Errors
	/// Returns an error if file I/O, deserialization, or merging fails.
	///
	/// # Notes
	/// - Uses MPSC channels to collect partial tables from threads.
	pub fn from_corpus<P: AsRef<Path>>(filepath: P) -> Result<Self, Box<dyn std::error::Error>> {
		let binary_data_path = build_output_path(&filepath, "bin")?;
		if binary_data_path.exists() {
			let bytes = std::fs::read(binary_data_path)?;
			return Ok(postcard::from_bytes(&bytes)?);
		}

		let lines = read_file(&filepath)?;
		if lines.is_empty() {
			return Ok(Self::default());
		}

		let cpus = num_cpus::get();
		let factor = 8;
		let chunks = cpus * factor;
		let chunk_size = ((lines.len() + chunks - 1) / chunks).max(1);

		let (tx, rx) = mpsc::channel();
		for chunk in lines.chunks(chunk_size) {
			let tx = tx.clone();
			let chunk: Vec<String> = chunk.to_vec();

			thread::spawn(move || {
				let mut partial_table = TransitionTable::default();
				for line in chunk {
					partial_table.add_text(&line);
				}
				tx.send(partial_table).expect("Failed to send from thread");
			});
		}
		drop(tx);

		let mut final_table = TransitionTable::default();
		for partial_table in rx.iter() {
			final_table.merge(&partial_table)?;
		}

		let bytes = postcard::to_stdvec(&final_table)?;
		std::fs::write(binary_data_path, bytes)?;

		Ok(final_table)
	}

	/// Loads a table previously written with [`TransitionTable::save`].
	pub fn load<P: AsRef<Path>>(filepath: P) -> Result<Self, Box<dyn std::error::Error>> {
		let bytes = std::fs::read(filepath)?;
		Ok(postcard::from_bytes(&bytes)?)
	}

	/// Serializes the table to a compact binary file.
	pub fn save<P: AsRef<Path>>(&self, filepath: P) -> Result<(), Box<dyn std::error::Error>> {
		let bytes = postcard::to_stdvec(self)?;
		std::fs::write(filepath, bytes)?;
		Ok(())
	}

	/// Returns the number of recorded source characters.
	pub fn len(&self) -> usize {
		self.states.len()
	}

	/// Returns true if no transitions were recorded.
	pub fn is_empty(&self) -> bool {
		self.states.is_empty()
	}

	/// Returns the occurrence count recorded from `source` toward `destination`.
	///
	/// Unknown pairs return 0.
	pub fn count(&self, source: char, destination: char) -> usize {
		self.states.get(&source).map_or(0, |state| state.count(destination))
	}

	/// Merges another transition table into this one.
	///
	/// Occurrence counts for matching sources and transitions are summed;
	/// sources unknown to `self` are cloned over.
	///
	/// # Errors
	/// Returns an error if two states disagree on their key. Cannot happen
	/// for tables built through this module's constructors.
	pub fn merge(&mut self, other: &Self) -> Result<(), String> {
		for (key, state) in &other.states {
			if let Some(existing) = self.states.get_mut(key) {
				existing.merge(state)?;
			} else {
				self.states.insert(*key, state.clone());
			}
		}

		Ok(())
	}

	/// Normalizes the table into per-source probability distributions.
	///
	/// For each source character, every occurrence count is divided by the
	/// total number of occurrences recorded for that source, yielding
	/// probabilities in (0, 1] that sum to 1.
	///
	/// # Panics
	/// Panics if a recorded source has zero total mass. This violates the
	/// construction contract and indicates a builder bug; it is never
	/// silently recovered.
	pub fn normalize(&self) -> ProbabilityTable {
		let distributions = self
			.states
			.values()
			.map(|state| state.distribution())
			.collect();
		ProbabilityTable::new(distributions)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn counts_adjacent_pairs_with_multiplicity() {
		let table = TransitionTable::from_text("aab");

		assert_eq!(table.len(), 1);
		assert_eq!(table.count('a', 'a'), 1);
		assert_eq!(table.count('a', 'b'), 1);
		// 'b' is terminal and must not appear as a source
		assert_eq!(table.count('b', 'a'), 0);
	}

	#[test]
	fn short_inputs_produce_an_empty_table() {
		assert!(TransitionTable::from_text("").is_empty());
		assert!(TransitionTable::from_text("x").is_empty());
	}

	#[test]
	fn repeated_transitions_accumulate() {
		let table = TransitionTable::from_text("ababab");

		assert_eq!(table.count('a', 'b'), 3);
		assert_eq!(table.count('b', 'a'), 2);
	}

	#[test]
	fn merge_is_count_additive() {
		let mut table = TransitionTable::from_text("aab");
		table.merge(&TransitionTable::from_text("aab")).unwrap();

		assert_eq!(table.count('a', 'a'), 2);
		assert_eq!(table.count('a', 'b'), 2);
	}
}
