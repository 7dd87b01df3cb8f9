//! Synchronized lyrics engine from Rustle
//!
//! Lays out lyric lines, animates them with spring physics and renders
//! karaoke highlighting into a CPU surface once per frame.

pub mod config;
pub mod engine;
pub mod scheduler;

pub use config::{ConfigError, EngineConfig};
pub use engine::{
    CosmicText, LineId, LyricLine, LyricWord, LyricsEngine, MonospaceText, PlaybackState,
    PointerKind, ScrollMode, SeekRequest, TextBackend, Viewport,
};
pub use scheduler::FrameTicker;
