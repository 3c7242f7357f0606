use std::collections::{HashMap, VecDeque};

use sha2::{Digest, Sha256};

/// Content-hash key identifying one synthesized utterance.
pub type ContentKey = [u8; 32];

/// Derives the cache key for a `(lang, text)` pair.
///
/// The language participates in the hash so the same text synthesized in
/// two languages does not collide.
pub fn content_key(lang: &str, text: &str) -> ContentKey {
	let mut hasher = Sha256::new();
	hasher.update(lang.as_bytes());
	hasher.update([0u8]);
	hasher.update(text.as_bytes());
	hasher.finalize().into()
}

/// Bounded cache of synthesized audio, keyed by content hash.
///
/// Stores at most `capacity` entries; inserting past the bound evicts the
/// oldest entry first. The cache itself is not synchronized: callers that
/// share it across threads wrap it in a `Mutex`, and generation never
/// needs to hold that lock.
pub struct AudioCache {
	capacity: usize,
	entries: HashMap<ContentKey, Vec<u8>>,
	order: VecDeque<ContentKey>,
}

impl AudioCache {
	/// Creates a cache retaining at most `capacity` entries.
	///
	/// A capacity of zero disables caching entirely.
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			entries: HashMap::new(),
			order: VecDeque::new(),
		}
	}

	/// Returns the number of cached utterances.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true if nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Looks up the audio bytes cached under `key`.
	pub fn get(&self, key: &ContentKey) -> Option<&[u8]> {
		self.entries.get(key).map(Vec::as_slice)
	}

	/// Stores `audio` under `key`, evicting the oldest entry at capacity.
	///
	/// Re-inserting a known key replaces its bytes without touching the
	/// eviction order.
	pub fn insert(&mut self, key: ContentKey, audio: Vec<u8>) {
		if self.capacity == 0 {
			return;
		}

		if self.entries.contains_key(&key) {
			self.entries.insert(key, audio);
			return;
		}

		if self.entries.len() >= self.capacity {
			if let Some(oldest) = self.order.pop_front() {
				self.entries.remove(&oldest);
			}
		}

		self.order.push_back(key);
		self.entries.insert(key, audio);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn distinct_text_and_language_pairs_get_distinct_keys() {
		assert_ne!(content_key("en", "hello"), content_key("ja", "hello"));
		assert_ne!(content_key("en", "hello"), content_key("en", "world"));
		assert_eq!(content_key("en", "hello"), content_key("en", "hello"));
	}

	#[test]
	fn language_separator_prevents_boundary_collisions() {
		// "ja" + "bc" must not hash like "j" + "abc"
		assert_ne!(content_key("ja", "bc"), content_key("j", "abc"));
	}

	#[test]
	fn cached_bytes_are_returned_on_hit() {
		let mut cache = AudioCache::new(4);
		let key = content_key("en", "hello");

		assert!(cache.get(&key).is_none());
		cache.insert(key, vec![1, 2, 3]);
		assert_eq!(cache.get(&key), Some(&[1u8, 2, 3][..]));
	}

	#[test]
	fn eviction_keeps_the_capacity_bound() {
		let mut cache = AudioCache::new(2);
		let first = content_key("en", "one");
		let second = content_key("en", "two");
		let third = content_key("en", "three");

		cache.insert(first, vec![1]);
		cache.insert(second, vec![2]);
		cache.insert(third, vec![3]);

		assert_eq!(cache.len(), 2);
		// Oldest entry goes first
		assert!(cache.get(&first).is_none());
		assert!(cache.get(&second).is_some());
		assert!(cache.get(&third).is_some());
	}

	#[test]
	fn reinsert_replaces_without_evicting() {
		let mut cache = AudioCache::new(2);
		let first = content_key("en", "one");
		let second = content_key("en", "two");

		cache.insert(first, vec![1]);
		cache.insert(second, vec![2]);
		cache.insert(first, vec![9]);

		assert_eq!(cache.len(), 2);
		assert_eq!(cache.get(&first), Some(&[9u8][..]));
		assert_eq!(cache.get(&second), Some(&[2u8][..]));
	}

	#[test]
	fn zero_capacity_disables_caching() {
		let mut cache = AudioCache::new(0);
		let key = content_key("en", "hello");

		cache.insert(key, vec![1]);
		assert!(cache.is_empty());
		assert!(cache.get(&key).is_none());
	}
}
