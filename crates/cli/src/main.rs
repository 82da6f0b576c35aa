//! Voiceover CLI: assemble per-scene narration into one audio track.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;

use voiceover_core::config::PipelineConfig;
use voiceover_core::media::classify::{classify, classify_local};
use voiceover_core::media::transcoder::Ffmpeg;
use voiceover_core::pipeline::Pipeline;
use voiceover_core::recognition::parse_flash_response;
use voiceover_core::script::{HttpFetcher, ScriptResolver, narration_script};
use voiceover_core::tts::{CommandSynthesizer, SpeechSynthesizer, synthesizer_available};
use voiceover_core::types::Scene;

// ─── Top-level CLI ───────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "voiceover",
    about = "Scene-by-scene narration assembly with TTS and video-audio fallback",
    version,
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the merged narration track for a scene list
    Assemble(AssembleArgs),
    /// Print the combined narration script for a scene list
    Script(ScriptArgs),
    /// Show how visual sources are classified
    Classify(ClassifyArgs),
    /// Print sentences from a saved flash-recognition response
    Transcript(TranscriptArgs),
}

// ─── Shared arguments (embedded in each subcommand) ──────────────

#[derive(Parser, Debug)]
struct SharedArgs {
    /// JSON config file (missing keys keep their defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// RNG seed for reproducible line and video selection
    #[arg(long)]
    seed: Option<u64>,

    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

// ─── Assemble ────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Synthesize or extract audio per scene, then merge")]
struct AssembleArgs {
    /// JSON file with an ordered list of scenes
    scenes: PathBuf,

    #[command(flatten)]
    shared: SharedArgs,

    /// Output directory (overrides config)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Synthesizer voice (overrides config)
    #[arg(long)]
    voice: Option<String>,

    /// Speaking rate multiplier (overrides config)
    #[arg(long)]
    rate: Option<f64>,

    /// Transcoder binary (overrides config and VOICEOVER_FFMPEG)
    #[arg(long)]
    ffmpeg: Option<String>,

    /// Text-to-speech program (espeak-ng compatible)
    #[arg(long, default_value = "espeak-ng")]
    tts_program: String,

    /// Custom run name (default: auto-generated)
    #[arg(long)]
    run_name: Option<String>,

    /// Print the result as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

// ─── Script ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Resolve every scene's text source and print the script")]
struct ScriptArgs {
    /// JSON file with an ordered list of scenes
    scenes: PathBuf,

    #[command(flatten)]
    shared: SharedArgs,
}

// ─── Classify ────────────────────────────────────────────────────

#[derive(Parser, Debug)]
struct ClassifyArgs {
    /// Paths or URLs to classify
    #[arg(required = true)]
    sources: Vec<String>,

    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

// ─── Transcript ──────────────────────────────────────────────────

#[derive(Parser, Debug)]
struct TranscriptArgs {
    /// Saved response body
    response: PathBuf,

    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

// ─── Main ────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    // Init logging
    let log_level = match &cli.command {
        Command::Assemble(a) if a.shared.verbose => "debug",
        Command::Script(a) if a.shared.verbose => "debug",
        Command::Classify(a) if a.verbose => "debug",
        Command::Transcript(a) if a.verbose => "debug",
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Command::Assemble(args) => run_assemble(args),
        Command::Script(args) => run_script(args),
        Command::Classify(args) => run_classify(args),
        Command::Transcript(args) => run_transcript(args),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

// ─── Helpers ─────────────────────────────────────────────────────

/// Config file (or defaults), then environment overrides.
fn load_config(shared: &SharedArgs) -> Result<PipelineConfig> {
    let mut config = match &shared.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if shared.seed.is_some() {
        config.seed = shared.seed;
    }
    Ok(config.with_env())
}

/// Read the ordered scene list.
fn load_scenes(path: &Path) -> Result<Vec<Scene>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scene list: {}", path.display()))?;
    let scenes: Vec<Scene> = serde_json::from_str(&data)
        .with_context(|| format!("Invalid scene list: {}", path.display()))?;
    if scenes.is_empty() {
        bail!("Scene list is empty: {}", path.display());
    }
    Ok(scenes)
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

// ─── Assemble runner ─────────────────────────────────────────────

fn run_assemble(args: AssembleArgs) -> Result<()> {
    let scenes = load_scenes(&args.scenes)?;

    let mut config = load_config(&args.shared)?;
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(voice) = args.voice {
        config.voice = voice;
    }
    if let Some(rate) = args.rate {
        config.rate = rate;
    }
    if let Some(ffmpeg) = args.ffmpeg {
        config.ffmpeg_path = ffmpeg;
    }

    let synthesizer = CommandSynthesizer::new(&args.tts_program, config.synthesis_timeout());
    if !synthesizer_available(&args.tts_program) {
        // Not fatal: scenes with video sources can still fall back
        log::warn!(
            "{} does not respond; scenes will use audio from their visual sources",
            synthesizer.name()
        );
    }
    let transcoder = Ffmpeg::new(&config.ffmpeg_path);
    let fetcher = HttpFetcher::new(config.fetch_timeout());
    let mut rng = make_rng(config.seed);

    let mut pipeline = Pipeline::new(config, &synthesizer, &transcoder, &fetcher)?;
    if let Some(name) = args.run_name.as_deref() {
        pipeline = pipeline.with_run_name(name);
    }

    let output = pipeline.assemble(scenes, &mut rng)?;

    for warning in &output.warnings {
        log::warn!("{}", warning);
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for scene in &output.scenes {
            println!(
                "Scene {}: {:?} ({:.2}s)",
                scene.scene_index + 1,
                scene.source,
                scene.duration_secs
            );
        }
        println!("Output: {}", output.merged.display());
    }

    Ok(())
}

// ─── Script runner ───────────────────────────────────────────────

fn run_script(args: ScriptArgs) -> Result<()> {
    let mut scenes = load_scenes(&args.scenes)?;
    for (i, scene) in scenes.iter_mut().enumerate() {
        scene.index = i;
    }
    let config = load_config(&args.shared)?;
    config.validate()?;

    let fetcher = HttpFetcher::new(config.fetch_timeout());
    let mut rng = make_rng(config.seed);
    let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
    let resolver = ScriptResolver::new(&fetcher, scratch.path());

    let mut warnings = Vec::new();
    let resolved = resolver.resolve_scenes(&scenes, &mut rng, &mut warnings);
    for warning in &warnings {
        log::warn!("{}", warning);
    }
    for scene in &resolved {
        log::debug!("Scene {}: {:?}", scene.scene_index + 1, scene.narration_text);
    }

    println!("{}", narration_script(&resolved));
    Ok(())
}

// ─── Classify runner ─────────────────────────────────────────────

fn run_classify(args: ClassifyArgs) -> Result<()> {
    for source in &args.sources {
        let by_name = classify(source);
        let local = classify_local(source);
        if by_name == local {
            println!("{:?}\t{}", by_name, source);
        } else {
            println!("{:?} (file missing: {:?})\t{}", by_name, local, source);
        }
    }
    Ok(())
}

// ─── Transcript runner ───────────────────────────────────────────

fn run_transcript(args: TranscriptArgs) -> Result<()> {
    let body = std::fs::read_to_string(&args.response)
        .with_context(|| format!("Failed to read response: {}", args.response.display()))?;
    let sentences = parse_flash_response(&body)
        .with_context(|| format!("Unusable response: {}", args.response.display()))?;

    for s in &sentences {
        let begin = Duration::from_millis(s.begin_ms);
        let end = Duration::from_millis(s.end_ms);
        println!(
            "[{:>8.2} - {:>8.2}] {}",
            begin.as_secs_f64(),
            end.as_secs_f64(),
            s.text
        );
    }
    log::info!("{} sentence(s)", sentences.len());
    Ok(())
}
