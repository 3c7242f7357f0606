use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::{get, put, web, App, HttpResponse, HttpServer, Responder};

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;

use murmur_core::model::probability::ProbabilityTable;
use murmur_core::model::transition::TransitionTable;
use murmur_speech::cache::{content_key, AudioCache};
use murmur_speech::synth::{synthesize_with_retry, HttpSynthesizer, RetryPolicy};

/// Struct representing query parameters for the `/v1/generate` endpoint
#[derive(Deserialize)]
struct GenerateParams {
	start: Option<String>,
	length: Option<usize>,
	seed: Option<u64>,
}

/// Struct representing query parameters for the `/v1/speak` endpoint
#[derive(Deserialize)]
struct SpeakParams {
	start: Option<String>,
	length: Option<usize>,
	lang: Option<String>,
}

struct SharedData {
	/// First character of the training text, used when no start is given.
	default_start: Option<char>,
	table: Option<ProbabilityTable>,
}

/// Resolves the requested start character.
///
/// A missing parameter falls back to the first character of the training
/// text; an explicit parameter must be exactly one character.
fn resolve_start(requested: Option<&str>, fallback: Option<char>) -> Result<char, String> {
	match requested {
		None => fallback.ok_or_else(|| "No start character available".to_owned()),
		Some(s) => {
			let mut chars = s.chars();
			match (chars.next(), chars.next()) {
				(Some(c), None) => Ok(c),
				_ => Err("Start must be exactly one character".into()),
			}
		}
	}
}

/// HTTP PUT endpoint `/v1/train`
///
/// Rebuilds the transition and probability tables from the request body.
/// The previous tables are discarded; training is a single pass.
#[put("/v1/train")]
async fn put_training(data: web::Data<Mutex<SharedData>>, body: String) -> impl Responder {
	let text = body.trim();
	if text.is_empty() {
		return HttpResponse::BadRequest().body("Training text cannot be empty");
	}

	let table = TransitionTable::from_text(text).normalize();

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	shared_data.default_start = text.chars().next();
	shared_data.table = Some(table);

	HttpResponse::Ok().body("Model trained")
}

/// HTTP GET endpoint `/v1/generate`
///
/// Generates one sequence from the trained probability table. Passing an
/// integer `seed` makes the output reproducible.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<Mutex<SharedData>>, query: web::Query<GenerateParams>) -> impl Responder {
	let length = query.length.unwrap_or(14).max(1);

	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	let table = match &shared_data.table {
		Some(t) => t,
		None => return HttpResponse::BadRequest().body("Model is not trained yet"),
	};

	let start = match resolve_start(query.start.as_deref(), shared_data.default_start) {
		Ok(c) => c,
		Err(e) => return HttpResponse::BadRequest().body(e),
	};

	let word = match query.seed {
		Some(seed) => table.generate(start, length, &mut StdRng::seed_from_u64(seed)),
		None => table.generate(start, length, &mut rand::rng()),
	};

	HttpResponse::Ok().body(word)
}

/// HTTP GET endpoint `/v1/probabilities`
///
/// Dumps the per-source transition probabilities of the trained model.
#[get("/v1/probabilities")]
async fn get_probabilities(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	match &shared_data.table {
		Some(table) => HttpResponse::Ok().json(table),
		None => HttpResponse::BadRequest().body("Model is not trained yet"),
	}
}

/// HTTP GET endpoint `/v1/speak`
///
/// Generates one sequence and returns it synthesized as MP3 bytes.
/// Synthesis results are cached by content hash, so repeated sequences do
/// not hit the synthesis service again.
#[get("/v1/speak")]
async fn get_speech(
	data: web::Data<Mutex<SharedData>>,
	cache: web::Data<Mutex<AudioCache>>,
	synthesizer: web::Data<HttpSynthesizer>,
	query: web::Query<SpeakParams>,
) -> impl Responder {
	let length = query.length.unwrap_or(14).max(1);
	let lang = query.lang.clone().unwrap_or_else(|| "ja".to_owned());

	let word = {
		let shared_data = match data.lock() {
			Ok(m) => m,
			Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
		};

		let table = match &shared_data.table {
			Some(t) => t,
			None => return HttpResponse::BadRequest().body("Model is not trained yet"),
		};

		let start = match resolve_start(query.start.as_deref(), shared_data.default_start) {
			Ok(c) => c,
			Err(e) => return HttpResponse::BadRequest().body(e),
		};

		table.generate(start, length, &mut rand::rng())
	};

	// The blocking HTTP client must not run on an async worker
	let result = web::block(move || {
		let key = content_key(&lang, &word);

		{
			let cache = cache.lock().map_err(|_| murmur_speech::SpeechError::Synthesis("Cache lock failed".to_owned()))?;
			if let Some(audio) = cache.get(&key) {
				return Ok::<_, murmur_speech::SpeechError>(audio.to_vec());
			}
		}

		let audio = synthesize_with_retry(synthesizer.get_ref(), &word, &lang, &RetryPolicy::default())?;
		if let Ok(mut cache) = cache.lock() {
			cache.insert(key, audio.clone());
		}
		Ok(audio)
	})
	.await;

	match result {
		Ok(Ok(audio)) => HttpResponse::Ok().content_type("audio/mpeg").body(audio),
		Ok(Err(e)) => HttpResponse::ServiceUnavailable().body(format!("Synthesis failed: {e}")),
		Err(_) => HttpResponse::InternalServerError().body("Synthesis task failed"),
	}
}

/// Main entry point for the server.
///
/// Holds the trained model and the audio cache behind mutexes and starts
/// an Actix-web HTTP server exposing training, generation, and speech
/// endpoints.
///
/// # Notes
/// - The server binds to 127.0.0.1:5000.
/// - The model starts untrained; PUT /v1/train before generating.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::init();

	let shared_data = SharedData {
		default_start: None,
		table: None,
	};
	let shared_model = web::Data::new(Mutex::new(shared_data));
	let shared_cache = web::Data::new(Mutex::new(AudioCache::new(64)));
	let synthesizer = web::Data::new(HttpSynthesizer::new());

	info!("listening on 127.0.0.1:5000");
	HttpServer::new(move || {
		App::new()
			.wrap(Cors::permissive())
			.app_data(shared_model.clone())
			.app_data(shared_cache.clone())
			.app_data(synthesizer.clone())
			.service(put_training)
			.service(get_generated)
			.service(get_probabilities)
			.service(get_speech)
	})
		.bind(("127.0.0.1", 5000))?
		.run()
		.await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_start_falls_back_to_the_training_text() {
		assert_eq!(resolve_start(None, Some('a')).unwrap(), 'a');
		assert!(resolve_start(None, None).is_err());
	}

	#[test]
	fn explicit_start_must_be_a_single_character() {
		assert_eq!(resolve_start(Some("x"), Some('a')).unwrap(), 'x');
		assert_eq!(resolve_start(Some("し"), None).unwrap(), 'し');
		assert!(resolve_start(Some(""), Some('a')).is_err());
		assert!(resolve_start(Some("xy"), Some('a')).is_err());
	}
}
