use std::io::BufRead;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use murmur_core::model::probability::ProbabilityTable;
use murmur_core::model::transition::TransitionTable;
use murmur_speech::cache::{content_key, AudioCache};
use murmur_speech::playback;
use murmur_speech::synth::{synthesize_with_retry, HttpSynthesizer, RetryPolicy};
use murmur_speech::SpeechError;

/// Markov babble generator with spoken playback.
///
/// Trains a transition model on the given text once, then generates one
/// sequence per interval, speaks it, and plays it until stopped.
#[derive(Parser, Debug)]
#[command(name = "murmur")]
struct Args {
    /// Training text for the transition model
    #[arg(long)]
    text: String,

    /// Start character (default: first character of the training text)
    #[arg(long)]
    start: Option<char>,

    /// Target length of each generated sequence
    #[arg(long, default_value_t = 14)]
    length: usize,

    /// Language code passed to the synthesizer
    #[arg(long, default_value = "ja")]
    lang: String,

    /// Seconds between generations
    #[arg(long, default_value_t = 5)]
    interval: u64,

    /// Stop after this many sequences (default: run until Enter is pressed)
    #[arg(long)]
    iterations: Option<u64>,

    /// Seed for reproducible generation
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum number of cached audio clips
    #[arg(long, default_value_t = 32)]
    cache_capacity: usize,

    /// Generate and log only, skipping synthesis and playback
    #[arg(long)]
    no_play: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), String> {
    let text = args.text.trim().to_owned();
    if text.is_empty() {
        return Err("Training text cannot be empty".to_owned());
    }

    // Should not fail, the text was checked for emptiness
    let start = match args.start {
        Some(c) => c,
        None => text.chars().next().unwrap(),
    };

    let table = TransitionTable::from_text(&text).normalize();
    log_probabilities(&table);

    let stop = Arc::new(AtomicBool::new(false));
    watch_for_enter(stop.clone());

    println!("Generating every {}s. Press Enter to stop.", args.interval);

    let (tx, rx) = mpsc::channel::<String>();
    let producer = spawn_scheduler(
        table,
        start,
        args.length,
        Duration::from_secs(args.interval),
        args.iterations,
        args.seed,
        stop,
        tx,
    );

    consume(&rx, &args);

    producer.join().map_err(|_| "Scheduler thread panicked".to_owned())
}

/// Logs the per-source transition probabilities the model was trained to.
fn log_probabilities(table: &ProbabilityTable) {
    let mut distributions: Vec<_> = table.distributions().collect();
    distributions.sort_by_key(|d| d.key());

    for distribution in distributions {
        let outcomes: Vec<String> = distribution
            .outcomes()
            .map(|(next, probability)| format!("'{next}': {probability:.2}"))
            .collect();
        info!("from '{}': {}", distribution.key(), outcomes.join(", "));
    }
}

/// Flips the stop flag once the user presses Enter.
fn watch_for_enter(stop: Arc<AtomicBool>) {
    thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        stop.store(true, Ordering::Relaxed);
    });
}

/// Spawns the timed generation task.
///
/// One sequence is generated per tick and pushed through the channel; the
/// thread ends when the stop flag is raised, the iteration bound is
/// reached, or the consumer goes away.
fn spawn_scheduler(
    table: ProbabilityTable,
    start: char,
    length: usize,
    interval: Duration,
    iterations: Option<u64>,
    seed: Option<u64>,
    stop: Arc<AtomicBool>,
    tx: mpsc::Sender<String>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut produced = 0u64;
        while !stop.load(Ordering::Relaxed) {
            if let Some(limit) = iterations {
                if produced >= limit {
                    break;
                }
            }

            let word = table.generate(start, length, &mut rng);
            if tx.send(word).is_err() {
                break;
            }
            produced += 1;

            // Sleep in small steps so a stop request does not have to wait
            // out the whole interval
            let step = Duration::from_millis(100);
            let mut slept = Duration::ZERO;
            while slept < interval && !stop.load(Ordering::Relaxed) {
                thread::sleep(step);
                slept += step;
            }
        }
    })
}

/// Drains generated sequences: logs each one, then synthesizes (cache
/// first) and plays it unless playback is disabled.
fn consume(rx: &mpsc::Receiver<String>, args: &Args) {
    let synthesizer = HttpSynthesizer::new();
    let policy = RetryPolicy::default();
    let mut cache = AudioCache::new(args.cache_capacity);

    if !args.no_play && playback::find_player().is_none() {
        warn!("no audio player found on this host, sequences will only be logged");
    }

    for word in rx {
        println!("generated: {word}");
        if args.no_play {
            continue;
        }

        let key = content_key(&args.lang, &word);
        let audio = match cache.get(&key) {
            Some(bytes) => bytes.to_vec(),
            None => match synthesize_with_retry(&synthesizer, &word, &args.lang, &policy) {
                Ok(bytes) => {
                    cache.insert(key, bytes.clone());
                    bytes
                }
                Err(e) => {
                    warn!("synthesis failed for {word:?}: {e}");
                    continue;
                }
            },
        };

        match playback::play(&audio) {
            Ok(()) => {}
            Err(SpeechError::NoPlayer) => {
                info!("speak {word:?} manually, no player is available");
            }
            Err(e) => warn!("playback failed: {e}"),
        }
    }
}
