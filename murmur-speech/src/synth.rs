use std::thread;
use std::time::Duration;

use log::warn;

use crate::{Result, SpeechError};

/// Default synthesis endpoint, the public translate TTS service.
const DEFAULT_ENDPOINT: &str = "https://translate.google.com/translate_tts";

/// Turns rendered text into audio bytes.
///
/// The trait is the seam between the generation loop and whatever engine
/// actually produces audio; tests substitute a scripted implementation.
pub trait Synthesizer {
	/// Synthesizes `text` spoken in `lang` (an IETF language code such as
	/// `"ja"` or `"en"`) into encoded audio bytes.
	///
	/// # Errors
	/// - `SpeechError::RateLimited` when the service asks to slow down
	/// - `SpeechError::Synthesis` on any other service-side failure
	/// - `SpeechError::Network` on transport failures
	fn synthesize(&self, text: &str, lang: &str) -> Result<Vec<u8>>;
}

/// HTTP synthesizer speaking the translate-TTS query protocol.
///
/// Sends a blocking GET with the text and language as query parameters and
/// returns the MP3 body. The endpoint is configurable so tests can point
/// the client at a local server.
pub struct HttpSynthesizer {
	client: reqwest::blocking::Client,
	endpoint: String,
}

impl HttpSynthesizer {
	/// Creates a synthesizer against the default public endpoint.
	pub fn new() -> Self {
		Self::with_endpoint(DEFAULT_ENDPOINT)
	}

	/// Creates a synthesizer against a custom endpoint.
	pub fn with_endpoint(endpoint: &str) -> Self {
		Self {
			client: reqwest::blocking::Client::new(),
			endpoint: endpoint.to_owned(),
		}
	}
}

impl Default for HttpSynthesizer {
	fn default() -> Self {
		Self::new()
	}
}

impl Synthesizer for HttpSynthesizer {
	fn synthesize(&self, text: &str, lang: &str) -> Result<Vec<u8>> {
		let response = self
			.client
			.get(&self.endpoint)
			.query(&[("ie", "UTF-8"), ("client", "tw-ob"), ("q", text), ("tl", lang)])
			.send()?;

		let status = response.status();
		if status.is_success() {
			Ok(response.bytes()?.to_vec())
		} else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
			Err(SpeechError::RateLimited)
		} else {
			Err(SpeechError::Synthesis(format!("service returned {status}")))
		}
	}
}

/// Bounded retry policy for a rate-limited synthesis service.
///
/// The delay starts at `initial_delay` and doubles after every rate-limited
/// attempt. Only `RateLimited` is retried; every other error propagates
/// immediately.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
	/// Total number of attempts, including the first one.
	pub max_attempts: usize,
	/// Delay before the second attempt; doubles for each further attempt.
	pub initial_delay: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 4,
			initial_delay: Duration::from_millis(500),
		}
	}
}

/// Synthesizes `text`, retrying rate-limited attempts under `policy`.
///
/// # Errors
/// Returns `SpeechError::RateLimited` once every attempt was rate limited,
/// or the first non-rate-limit error encountered.
pub fn synthesize_with_retry<S: Synthesizer + ?Sized>(
	synthesizer: &S,
	text: &str,
	lang: &str,
	policy: &RetryPolicy,
) -> Result<Vec<u8>> {
	let mut delay = policy.initial_delay;

	for attempt in 1..=policy.max_attempts {
		match synthesizer.synthesize(text, lang) {
			Err(SpeechError::RateLimited) if attempt < policy.max_attempts => {
				warn!(
					"synthesis rate limited, retrying in {delay:?} (attempt {attempt}/{})",
					policy.max_attempts
				);
				thread::sleep(delay);
				delay *= 2;
			}
			other => return other,
		}
	}

	// Only reachable with max_attempts == 0
	Err(SpeechError::RateLimited)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::cell::Cell;

	/// Scripted synthesizer: rate limited for the first `limited` calls,
	/// successful afterwards.
	struct Scripted {
		limited: usize,
		calls: Cell<usize>,
	}

	impl Synthesizer for Scripted {
		fn synthesize(&self, text: &str, _lang: &str) -> Result<Vec<u8>> {
			let call = self.calls.get() + 1;
			self.calls.set(call);
			if call <= self.limited {
				Err(SpeechError::RateLimited)
			} else {
				Ok(text.as_bytes().to_vec())
			}
		}
	}

	fn immediate(max_attempts: usize) -> RetryPolicy {
		RetryPolicy {
			max_attempts,
			initial_delay: Duration::ZERO,
		}
	}

	#[test]
	fn succeeds_after_rate_limited_attempts() {
		let synthesizer = Scripted { limited: 2, calls: Cell::new(0) };

		let audio = synthesize_with_retry(&synthesizer, "abc", "en", &immediate(4)).unwrap();
		assert_eq!(audio, b"abc");
		assert_eq!(synthesizer.calls.get(), 3);
	}

	#[test]
	fn gives_up_once_attempts_are_exhausted() {
		let synthesizer = Scripted { limited: 10, calls: Cell::new(0) };

		let result = synthesize_with_retry(&synthesizer, "abc", "en", &immediate(3));
		assert!(matches!(result, Err(SpeechError::RateLimited)));
		assert_eq!(synthesizer.calls.get(), 3);
	}

	#[test]
	fn non_rate_limit_errors_are_not_retried() {
		struct Broken {
			calls: Cell<usize>,
		}

		impl Synthesizer for Broken {
			fn synthesize(&self, _text: &str, _lang: &str) -> Result<Vec<u8>> {
				self.calls.set(self.calls.get() + 1);
				Err(SpeechError::Synthesis("boom".to_owned()))
			}
		}

		let synthesizer = Broken { calls: Cell::new(0) };
		let result = synthesize_with_retry(&synthesizer, "abc", "en", &immediate(5));

		assert!(matches!(result, Err(SpeechError::Synthesis(_))));
		assert_eq!(synthesizer.calls.get(), 1);
	}
}
