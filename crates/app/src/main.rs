mod refresh;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};
use refresh::PacedRefresh;
use tracing_subscriber::EnvFilter;
use whitney_core::{
    AppConfig, ControlRegistry, DirectoryStore, ExportCommand, ExportDriver, ExportOutcome,
    Framebuffer, LoggingConfig, MediaTrack, MemoryRenderer, MemoryStore, MemorySurface, Playhead,
    Session, StaticAudioSource, WhitneyError,
};

fn main() -> whitney_core::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())?;
    init_tracing(&config.logging);
    log_config_source(cli.config.as_deref(), &config);

    match cli.command {
        Commands::Play { duration, ease } => run_play(config, duration, ease),
        Commands::Export {
            duration,
            out,
            audio,
            ease,
        } => run_export(config, duration, &out, audio, ease),
    }
}

fn run_play(mut config: AppConfig, duration: Option<f64>, ease: bool) -> whitney_core::Result<()> {
    if let Some(duration) = duration {
        config.playback.default_duration_secs = duration;
    }
    let framebuffer = Framebuffer::shared();
    let export = ExportDriver::new(
        config.export.clone(),
        Box::new(MemorySurface::new(framebuffer.clone())),
        Box::new(MemoryStore::new()),
        Rc::new(RefCell::new(ControlRegistry::new())),
    );
    let mut session = Session::new(
        &config,
        playhead(ease),
        export,
        Box::new(MemoryRenderer::new(framebuffer.clone())),
    );
    tracing::info!(duration_ms = session.duration_ms(), "starting playback");

    let refreshes = PacedRefresh::new(config.export.fps);
    session.toggle_playback(refreshes.now());
    let mut next_report = 0.0;
    for now in refreshes {
        session.refresh(now)?;
        if !session.playback().is_playing() {
            break;
        }
        if now >= next_report {
            let position = session.playhead().position();
            tracing::info!(u = position.u, t = ?position.t, "playing");
            next_report = now + 1000.0;
        }
    }

    tracing::info!(draws = framebuffer.borrow().draws(), "playback finished");
    Ok(())
}

fn run_export(
    mut config: AppConfig,
    duration: f64,
    out: &Path,
    audio: bool,
    ease: bool,
) -> whitney_core::Result<()> {
    config.playback.default_duration_secs = duration;
    let framebuffer = Framebuffer::shared();
    let controls = Rc::new(RefCell::new(ControlRegistry::new()));
    let mut export = ExportDriver::new(
        config.export.clone(),
        Box::new(MemorySurface::new(framebuffer.clone())),
        Box::new(DirectoryStore::new(out)),
        controls.clone(),
    );
    if audio {
        export = export.with_audio(Box::new(StaticAudioSource::new(vec![MediaTrack::audio(
            "line-in",
        )])));
    }
    let mut session = Session::new(
        &config,
        playhead(ease),
        export,
        Box::new(MemoryRenderer::new(framebuffer)),
    );

    if let ExportCommand::Started(plan) = session.toggle_export()? {
        tracing::info!(
            frames = plan.total_captures(),
            disabled = ?controls.borrow().disabled(),
            "rendering"
        );
    }

    let mut refreshes = PacedRefresh::new(config.export.fps);
    let mut last_decile = 0;
    while session.export().is_active() {
        let Some(now) = refreshes.next() else { break };
        session.refresh(now)?;
        if let Some(progress) = session.export().progress() {
            let decile = (progress * 10.0) as u32;
            if decile > last_decile {
                tracing::info!(percent = decile * 10, "export progress");
                last_decile = decile;
            }
        }
    }

    match session.export().last_report().map(|report| &report.outcome) {
        Some(ExportOutcome::Saved { file_name, bytes }) => {
            tracing::info!(file = %out.join(file_name).display(), bytes, "export saved");
            Ok(())
        }
        Some(ExportOutcome::Failed(message)) => Err(WhitneyError::msg(message.clone())),
        Some(ExportOutcome::Cancelled) | None => Err(WhitneyError::msg("export did not complete")),
    }
}

fn playhead(ease: bool) -> Playhead {
    if ease {
        Playhead::with_derived(|u| u * u * (3.0 - 2.0 * u))
    } else {
        Playhead::new()
    }
}

fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Runs once the subscriber is installed; loading happens before it exists.
fn log_config_source(path: Option<&Path>, config: &AppConfig) {
    match path {
        Some(path) => tracing::debug!(path = %path.display(), ?config, "loaded configuration"),
        None => tracing::debug!(?config, "using default configuration"),
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Real-time and frame-exact animation timeline", long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play the animation in real time until it reaches the end.
    Play {
        /// Animation duration in seconds.
        #[arg(short, long)]
        duration: Option<f64>,
        /// Derive an eased `t` from the playhead.
        #[arg(long)]
        ease: bool,
    },
    /// Capture every frame of the animation to a file.
    Export {
        /// Animation duration in seconds.
        #[arg(short, long, default_value_t = 10.0)]
        duration: f64,
        /// Directory the rendered file is written to.
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
        /// Mix a live audio track into the capture.
        #[arg(long)]
        audio: bool,
        /// Derive an eased `t` from the playhead.
        #[arg(long)]
        ease: bool,
    },
}
