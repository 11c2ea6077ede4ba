//! Groovebox CLI: bounce a groove to WAV or play it on the sound card.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use groovebox_core::config::StudioConfig;
use groovebox_core::context::ManualBackend;
use groovebox_core::native::CpalBackend;
use groovebox_core::persistence::FileStorage;
use groovebox_core::renderer::{bars_to_seconds, bounce, encode_wav};
use groovebox_core::rhythm::RhythmStyle;
use groovebox_core::studio::Studio;

#[derive(Parser)]
#[command(name = "groovebox")]
#[command(about = "Procedural drum machine and step synth", long_about = None)]
struct Cli {
    /// JSON file overriding engine settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Session directory to load patterns and sounds from
    #[arg(short, long, global = true)]
    session: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a groove to a WAV file
    Bounce {
        /// Output WAV file path
        output: PathBuf,

        /// Rhythm description, e.g. "funky house" (keeps the session grid if omitted)
        #[arg(long)]
        style: Option<String>,

        /// Number of 16-step bars
        #[arg(short, long, default_value = "2")]
        bars: u32,

        /// Length in seconds (overrides bars)
        #[arg(long)]
        seconds: Option<f64>,

        /// Tempo in BPM (60-200)
        #[arg(long, default_value = "120")]
        bpm: u32,
    },

    /// Play a groove on the default output device
    Play {
        #[arg(long)]
        style: Option<String>,

        #[arg(long, default_value = "120")]
        bpm: u32,

        /// How long to play
        #[arg(long, default_value = "8.0")]
        seconds: f64,

        /// Save the session back after playing
        #[arg(long)]
        save: bool,
    },

    /// List the built-in rhythm styles
    Styles,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<StudioConfig> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Ok(StudioConfig::from_json(&text)?)
        }
        None => Ok(StudioConfig::default()),
    }
}

fn session_storage(dir: Option<&Path>) -> Option<FileStorage> {
    match dir {
        Some(dir) => Some(FileStorage::new(dir)),
        None => FileStorage::default_location(),
    }
}

fn prepare(studio: &mut Studio, style: Option<&str>, bpm: u32) -> anyhow::Result<()> {
    if let Some(text) = style {
        match studio.generate_pattern(text)? {
            Some(style) => info!(style = style.name(), "using preset groove"),
            None => info!("no style matched, using a random groove"),
        }
    }
    let bpm = studio.set_bpm(bpm);
    info!(bpm, "tempo set");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let storage = session_storage(cli.session.as_deref());

    match cli.command {
        Commands::Bounce {
            output,
            style,
            bars,
            seconds,
            bpm,
        } => {
            let mut studio = Studio::new(config.clone());
            if let Some(storage) = storage.as_ref() {
                studio.load_from(storage);
            }
            let mut backend = ManualBackend::new(config.sample_rate);
            studio.initialize(&mut backend)?;
            prepare(&mut studio, style.as_deref(), bpm)?;

            let seconds = seconds.unwrap_or_else(|| bars_to_seconds(bars, studio.transport_state().bpm));
            let samples = bounce(&mut studio, &mut backend, seconds);
            let wav = encode_wav(&samples, config.sample_rate);
            fs::write(&output, wav).with_context(|| format!("writing {}", output.display()))?;
            info!(path = %output.display(), seconds, "bounced");
        }
        Commands::Play {
            style,
            bpm,
            seconds,
            save,
        } => {
            let mut studio = Studio::new(config);
            if let Some(storage) = storage.as_ref() {
                studio.load_from(storage);
            }
            let mut backend = CpalBackend::new();
            studio.initialize(&mut backend)?;
            prepare(&mut studio, style.as_deref(), bpm)?;

            let start = Instant::now();
            let elapsed_ms = || start.elapsed().as_secs_f64() * 1000.0;
            studio.play(elapsed_ms());
            while elapsed_ms() < seconds * 1000.0 {
                studio.poll(elapsed_ms());
                thread::sleep(Duration::from_millis(2));
            }
            studio.stop();
            // let the fade finish
            thread::sleep(Duration::from_millis(250));

            if save {
                let mut storage = storage.context("no session directory available")?;
                studio.save_to(&mut storage)?;
                info!(dir = %storage.dir().display(), "session saved");
            }
        }
        Commands::Styles => {
            for style in RhythmStyle::ALL {
                println!("{}", style.name());
            }
        }
    }
    Ok(())
}
