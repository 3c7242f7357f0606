//! Speech boundary of the murmur system.
//!
//! Everything here is deliberately outside the Markov core: synthesis of
//! generated text into audio bytes over HTTP, the retry policy for a
//! rate-limited synthesis service, a bounded content-addressed audio
//! cache, and playback on the host.

pub mod cache;
pub mod playback;
pub mod synth;

use thiserror::Error;

/// Speech boundary errors
#[derive(Error, Debug)]
pub enum SpeechError {
	#[error("rate limited by the synthesis service")]
	RateLimited,

	#[error("synthesis failed: {0}")]
	Synthesis(String),

	#[error("network error: {0}")]
	Network(#[from] reqwest::Error),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("no audio player available on this host")]
	NoPlayer,

	#[error("playback failed: {0}")]
	Playback(String),
}

/// Result type for speech operations
pub type Result<T> = std::result::Result<T, SpeechError>;
