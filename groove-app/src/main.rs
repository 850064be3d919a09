//! groove - vinyl playback emulation
//!
//! Renders a track through the vinyl chain to a WAV file, lists the
//! presets, and (with the `playback` feature) plays a track live.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use groove_audio::{presets, Engine, EngineContext, MasteringMode, ParamId, RenderMode};
use groove_library::{AssetDirectory, Config, TrackLoader};

#[cfg(feature = "playback")]
mod playback;

#[derive(Parser, Debug)]
#[command(name = "groove")]
#[command(version, about = "Vinyl playback emulation", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by render and play
#[derive(Args, Debug)]
struct ChainArgs {
    /// Preset id (see `groove presets`)
    #[arg(short, long)]
    preset: Option<String>,

    /// Mastering mode: neutral, motown, blueNote, abbeyRoad
    #[arg(short, long)]
    mastering: Option<MasteringMode>,

    /// Pitch shift in semitones (-12 to 12)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pitch: f32,

    /// Override one parameter after the preset, e.g. `--set age=4000`
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    overrides: Vec<(ParamId, f32)>,

    /// Crackle file to use instead of the preset's
    #[arg(long)]
    crackle: Option<String>,

    /// Asset root holding `crackle/`
    #[arg(long)]
    assets: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a track through the vinyl chain to a 16-bit WAV file
    Render {
        /// Input audio file
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        chain: ChainArgs,

        /// Apply only the pitch shift, no coloration
        #[arg(long)]
        pitch_only: bool,

        /// Seed for dropout timing
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List the available presets
    Presets,

    /// Play a track through the default output device
    #[cfg(feature = "playback")]
    Play {
        /// Input audio file
        input: PathBuf,

        #[command(flatten)]
        chain: ChainArgs,
    },
}

fn parse_assignment(s: &str) -> Result<(ParamId, f32), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    let id: ParamId = name.trim().parse()?;
    let value: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", value.trim()))?;
    Ok((id, value))
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("groove_app={level},groove_audio={level},groove_library={level}"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from(path).with_context(|| format!("reading config {}", path.display()))?,
        None => Config::load(),
    };

    match cli.command {
        Commands::Render {
            input,
            output,
            chain,
            pitch_only,
            seed,
        } => {
            let context = EngineContext::new(config.sample_rate, config.channels);
            let mode = if pitch_only { RenderMode::PitchOnly } else { config.export_mode };
            render(
                &config,
                context,
                &input,
                &output,
                &chain,
                mode,
                seed.unwrap_or(config.render_seed),
            )
        }
        Commands::Presets => {
            list_presets();
            Ok(())
        }
        #[cfg(feature = "playback")]
        Commands::Play { input, chain } => playback::run(&config, &input, &chain),
    }
}

/// Build an engine that decodes at `context` and reads noise from the asset root
fn build_engine(config: &Config, context: EngineContext, chain: &ChainArgs) -> (Engine, groove_audio::SignalPath) {
    let root = chain.assets.clone().unwrap_or_else(|| config.asset_root.clone());
    info!(root = %root.display(), "asset root");
    Engine::new(
        context,
        Arc::new(TrackLoader::new(context)),
        Arc::new(AssetDirectory::new(root)),
    )
}

/// Read and decode the input file into the engine
fn load_input(engine: &mut Engine, input: &Path) -> anyhow::Result<()> {
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let hint = input.extension().and_then(|e| e.to_str());
    let state = engine
        .load_audio_file(&bytes, hint)
        .with_context(|| format!("decoding {}", input.display()))?;
    info!(file = %input.display(), duration = state.duration_secs, "loaded");
    Ok(())
}

/// Preset, then mastering, pitch and individual overrides
fn configure(engine: &mut Engine, config: &Config, chain: &ChainArgs) -> anyhow::Result<()> {
    let preset = chain.preset.as_deref().unwrap_or(&config.default_preset);
    engine
        .select_preset(preset)
        .with_context(|| format!("selecting preset '{}'", preset))?;

    engine.set_mastering_mode(chain.mastering.unwrap_or(config.mastering));
    engine.set_pitch(chain.pitch);

    for &(id, value) in &chain.overrides {
        let stored = engine.set_parameter(id, value);
        if stored != value {
            warn!(param = %id, requested = value, stored, "value clamped");
        }
    }

    if let Some(name) = chain.crackle.as_deref() {
        if let Err(e) = engine.load_crackle(name) {
            warn!(error = %e, "keeping preset crackle");
        }
    }
    Ok(())
}

fn render(
    config: &Config,
    context: EngineContext,
    input: &Path,
    output: &Path,
    chain: &ChainArgs,
    mode: RenderMode,
    seed: u64,
) -> anyhow::Result<()> {
    let (mut engine, _path) = build_engine(config, context, chain);
    load_input(&mut engine, input)?;
    configure(&mut engine, config, chain)?;
    engine.set_render_mode(mode);
    engine.set_render_seed(seed);

    let bytes = engine.export(|progress| info!("rendering {:>3.0}%", progress * 100.0))?;
    if bytes.is_empty() {
        bail!("nothing was rendered");
    }
    fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;

    info!(
        file = %output.display(),
        bytes = bytes.len(),
        mastering = %engine.mastering_mode(),
        "export written"
    );
    Ok(())
}

fn list_presets() {
    let width = presets::all().iter().map(|p| p.id.len()).max().unwrap_or(0);
    for preset in presets::all() {
        println!(
            "{:width$}  {:<26} {}",
            preset.id,
            preset.name,
            preset.description,
            width = width
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("age=4000"), Ok((ParamId::Age, 4000.0)));
        assert_eq!(parse_assignment(" ghostEcho = 0.5 "), Ok((ParamId::GhostEcho, 0.5)));
        assert!(parse_assignment("age").is_err());
        assert!(parse_assignment("flux=1").is_err());
        assert!(parse_assignment("age=loud").is_err());
    }

    #[test]
    fn test_cli_parses_render() {
        let cli = Cli::try_parse_from([
            "groove",
            "render",
            "in.flac",
            "-o",
            "out.wav",
            "--preset",
            "midnight-jazz",
            "--mastering",
            "blueNote",
            "--pitch",
            "-3",
            "--set",
            "riaa=0.5",
            "--set",
            "warp=0.2",
            "--pitch-only",
        ])
        .unwrap();

        match cli.command {
            Commands::Render {
                chain, pitch_only, ..
            } => {
                assert_eq!(chain.preset.as_deref(), Some("midnight-jazz"));
                assert_eq!(chain.mastering, Some(MasteringMode::BlueNote));
                assert_eq!(chain.pitch, -3.0);
                assert_eq!(chain.overrides, vec![(ParamId::Riaa, 0.5), (ParamId::Warp, 0.2)]);
                assert!(pitch_only);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
