use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

use crate::{Result, SpeechError};

/// Player binaries tried in order, best match for MP3 input first.
#[cfg(target_os = "macos")]
const PLAYER_CANDIDATES: &[&str] = &["afplay"];
#[cfg(not(target_os = "macos"))]
const PLAYER_CANDIDATES: &[&str] = &["mpg123", "mpv", "ffplay"];

static PLAY_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Locates an audio player on this host.
///
/// Walks `PATH` for each candidate binary and returns the first match.
/// Returns `None` on hosts without any known player; callers then tell
/// the user that manual playback is required.
pub fn find_player() -> Option<PathBuf> {
	PLAYER_CANDIDATES.iter().find_map(|bin| get_from_path(bin))
}

fn get_from_path(bin: &str) -> Option<PathBuf> {
	let paths = env::var_os("PATH")?;
	env::split_paths(&paths)
		.map(|dir| dir.join(bin))
		.find(|candidate| candidate.is_file())
}

/// Plays encoded audio bytes through the first available host player.
///
/// The bytes are written to a temporary file, handed to the player, and
/// the file is removed once playback finishes. Blocks until the player
/// exits.
///
/// # Errors
/// - `SpeechError::NoPlayer` if no player binary was found
/// - `SpeechError::Io` if the temporary file cannot be written
/// - `SpeechError::Playback` if the player exits unsuccessfully
pub fn play(audio: &[u8]) -> Result<()> {
	let player = find_player().ok_or(SpeechError::NoPlayer)?;
	play_using(&player, audio)
}

/// Plays encoded audio bytes through a specific player binary.
pub fn play_using(player: &Path, audio: &[u8]) -> Result<()> {
	let path = temp_audio_path();
	fs::write(&path, audio)?;
	debug!("playing {} bytes via {}", audio.len(), player.display());

	let mut command = Command::new(player);
	if player.file_name() == Some(OsStr::new("ffplay")) {
		// ffplay opens a window and keeps running unless told otherwise
		command.args(["-nodisp", "-autoexit", "-loglevel", "quiet"]);
	}
	let status = command.arg(&path).status();

	// The file is scratch either way
	let _ = fs::remove_file(&path);

	let status = status?;
	if status.success() {
		Ok(())
	} else {
		Err(SpeechError::Playback(format!(
			"{} exited with {status}",
			player.display()
		)))
	}
}

fn temp_audio_path() -> PathBuf {
	let serial = PLAY_COUNTER.fetch_add(1, Ordering::Relaxed);
	env::temp_dir().join(format!("murmur-{}-{serial}.mp3", std::process::id()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn temp_paths_do_not_repeat() {
		assert_ne!(temp_audio_path(), temp_audio_path());
	}

	#[test]
	fn missing_binary_is_not_resolved() {
		assert!(get_from_path("murmur-definitely-not-a-real-player").is_none());
	}
}
