//! Rustle lyrics renderer
//!
//! Plays a lyrics file against a simulated playback clock and writes PNG
//! snapshots of the engine output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tiny_skia::Pixmap;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rustle_lyrics::{
    CosmicText, EngineConfig, FrameTicker, LyricLine, LyricsEngine, MonospaceText, PlaybackState,
    TextBackend, Viewport,
};

/// Render synchronized lyrics to PNG snapshots
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Lyrics JSON: an array of lines with camelCase fields
    lyrics: PathBuf,

    /// Viewport width in logical pixels
    #[arg(long, default_value_t = 480.0)]
    width: f32,

    /// Viewport height in logical pixels
    #[arg(long, default_value_t = 720.0)]
    height: f32,

    /// Device pixel ratio
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    /// Seconds of playback to simulate (last line + 5 s by default)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Frames per second
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Output directory for snapshots
    #[arg(short, long, default_value = "frames")]
    out: PathBuf,

    /// Seconds between snapshots
    #[arg(long, default_value_t = 0.5)]
    snapshot_interval: f64,

    /// Engine config file (defaults to the user config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the font-free monospace backend
    #[arg(long)]
    no_fonts: bool,

    /// Lay out as a touch device
    #[arg(long)]
    touch: bool,

    /// Pace frames in real time instead of rendering as fast as possible
    #[arg(long)]
    realtime: bool,
}

/// Playback position reported every 100-200 ms, like an audio element
struct CoarseClock {
    next_report: f64,
    short_gap: bool,
}

impl CoarseClock {
    fn new() -> Self {
        Self {
            next_report: 0.0,
            short_gap: true,
        }
    }

    fn poll(&mut self, time: f64) -> Option<f64> {
        if time < self.next_report {
            return None;
        }
        self.next_report = time + if self.short_gap { 0.1 } else { 0.2 };
        self.short_gap = !self.short_gap;
        Some(time)
    }
}

fn load_lyrics(path: &Path) -> Result<Vec<LyricLine>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read lyrics {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse lyrics {}", path.display()))
}

fn write_png(pixmap: &Pixmap, path: &Path) -> Result<()> {
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        rgba.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    let image = image::RgbaImage::from_raw(pixmap.width(), pixmap.height(), rgba)
        .context("Output surface size mismatch")?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::load(),
    };
    let lines = load_lyrics(&args.lyrics)?;
    let duration = args
        .duration
        .unwrap_or_else(|| lines.iter().map(|l| l.time).fold(0.0, f64::max) + 5.0);

    let backend: Arc<dyn TextBackend> = if args.no_fonts {
        Arc::new(MonospaceText)
    } else {
        Arc::new(CosmicText::new())
    };

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create {}", args.out.display()))?;

    let mut engine = LyricsEngine::new(config, backend);
    engine.set_lyrics(lines);
    engine.resize(Viewport {
        width: args.width,
        height: args.height,
        scale: args.scale,
        is_touch: args.touch,
    });

    let step = 1.0 / args.fps.max(1.0);
    let mut ticker = args.realtime.then(|| FrameTicker::new(args.fps));
    let mut clock = CoarseClock::new();
    let mut time = 0.0;
    let mut next_snapshot = 0.0;
    let mut written = 0usize;
    let mut active = None;

    info!(
        "Rendering {:.1}s at {} fps into {}",
        duration,
        args.fps,
        args.out.display()
    );

    while time < duration {
        let dt = match ticker.as_mut() {
            Some(ticker) => ticker.tick().await,
            None => step,
        };
        time += dt;
        if let Some(reported) = clock.poll(time) {
            engine.set_playback(PlaybackState::playing(reported));
        }
        engine.frame(dt);

        if engine.active_index() != active {
            active = engine.active_index();
            if let Some(line) = active.and_then(|i| engine.lines().get(i)) {
                info!("[{:>7.2}s] {}", time, line.text);
            }
        }

        if time >= next_snapshot {
            if let Some(output) = engine.output() {
                write_png(output, &args.out.join(format!("frame_{written:05}.png")))?;
                written += 1;
            }
            next_snapshot += args.snapshot_interval.max(step);
        }
    }

    info!("Wrote {} snapshots to {}", written, args.out.display());
    Ok(())
}
