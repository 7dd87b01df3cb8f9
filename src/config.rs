//! Engine configuration persistence
//!
//! Every tunable of the layout, camera, renderer and karaoke animation lives
//! here. Sections default independently so a partial `engine.json` only
//! overrides what it names.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::spring::SpringConfig;

/// Text layout parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Main font size as a fraction of container width
    pub font_size_ratio: f32,
    pub min_font_size: f32,
    pub max_font_size: f32,
    /// Multiplier applied on touch (mobile) layouts
    pub mobile_font_scale: f32,
    /// Translation font size relative to the main font
    pub translation_ratio: f32,
    /// Line height multiplier for main text
    pub line_height: f32,
    /// Line height multiplier for translation text
    pub translation_line_height: f32,
    /// Horizontal padding in em
    pub padding_x: f32,
    /// Vertical padding in em
    pub padding_y: f32,
    /// Number of preceding lines whose widths align translations
    pub peer_window: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            font_size_ratio: 0.055,
            min_font_size: 16.0,
            max_font_size: 48.0,
            mobile_font_scale: 0.9,
            translation_ratio: 0.6,
            line_height: 1.4,
            translation_line_height: 1.3,
            padding_x: 0.5,
            padding_y: 0.4,
            peer_window: 5,
        }
    }
}

/// Camera and per-line spring parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Vertical position of the active line's centre as a fraction of viewport height
    pub focal_ratio: f32,
    /// Seconds of idle time after an interaction before auto-follow resumes
    pub resume_delay: f64,
    /// Per-frame multiplier applied to coasting velocity
    pub drag_decay: f64,
    /// Coasting stops below this speed (px/s)
    pub min_coast_velocity: f64,
    pub wheel_multiplier: f64,
    /// Pointer travel below which a press counts as a tap (logical px)
    pub tap_slop: f32,
    /// Overscroll at which drag resistance halves movement
    pub max_overscroll: f64,
    pub camera_stiffness: f64,
    pub camera_damping: f64,
    pub behind_stiffness: f64,
    pub behind_damping: f64,
    /// Stiffness of the line right after the active one
    pub ahead_stiffness: f64,
    pub ahead_min_stiffness: f64,
    /// Per-line stiffness decay for lines ahead of active
    pub ahead_decay: f64,
    /// Lines beyond this distance ahead use the far spring, kept looser than
    /// `ahead_min_stiffness`
    pub far_distance: usize,
    pub far_stiffness: f64,
    /// Seconds a tapped line stays active while playback catches up
    pub pending_seek_timeout: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            focal_ratio: 0.35,
            resume_delay: 3.0,
            drag_decay: 0.92,
            min_coast_velocity: 5.0,
            wheel_multiplier: 1.0,
            tap_slop: 6.0,
            max_overscroll: 150.0,
            camera_stiffness: SpringConfig::CAMERA.stiffness,
            camera_damping: SpringConfig::CAMERA.damping,
            behind_stiffness: SpringConfig::LINE_BEHIND.stiffness,
            behind_damping: SpringConfig::LINE_BEHIND.damping,
            ahead_stiffness: 300.0,
            ahead_min_stiffness: 40.0,
            ahead_decay: 0.5,
            far_distance: 8,
            far_stiffness: 30.0,
            pending_seek_timeout: 1.0,
        }
    }
}

/// Frame compositing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Lines this far outside the viewport are still drawn (logical px)
    pub cull_margin: f32,
    /// Opacity of the farthest inactive line
    pub min_opacity: f32,
    /// Blur radius at normalized distance 1 (logical px)
    pub max_blur: f32,
    /// Height of the top and bottom fade as a fraction of viewport height
    pub fade_ratio: f32,
    /// Visual-time smoothing constant (seconds)
    pub visual_time_tau: f64,
    /// Visual-time divergence treated as a seek (seconds)
    pub jump_threshold: f64,
    /// Catch-up rate while paused (1/s)
    pub paused_ease_rate: f64,
    pub active_scale: f64,
    pub inactive_scale: f64,
    /// Interlude height smoothing rate (1/s)
    pub interlude_height_rate: f32,
    /// Output clear color (RGBA)
    pub background: [u8; 4],
    /// Text color (RGB)
    pub text_color: [u8; 3],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            cull_margin: 100.0,
            min_opacity: 0.25,
            max_blur: 4.0,
            fade_ratio: 0.12,
            visual_time_tau: 0.25,
            jump_threshold: 1.0,
            paused_ease_rate: 10.0,
            active_scale: 1.0,
            inactive_scale: 0.97,
            interlude_height_rate: 8.0,
            background: [0x12, 0x12, 0x16, 0xFF],
            text_color: [0xFF, 0xFF, 0xFF],
        }
    }
}

/// Word highlight animation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KaraokeConfig {
    /// Longest word (in chars) eligible for the glow animation
    pub glow_max_chars: usize,
    /// Shortest word duration (seconds) eligible for the glow animation
    pub glow_min_duration: f64,
    /// Wave half-width in characters
    pub wave_width: f32,
    /// Per-character intensity decay along the word
    pub char_decay: f32,
    pub min_scale_boost: f32,
    pub max_scale_boost: f32,
    /// Peak vertical lift in em
    pub lift: f32,
    /// Peak horizontal skew of the sweep
    pub skew: f32,
    /// Width of the sweep's soft edge in em
    pub sweep_fade: f32,
    /// Alpha of unlit text on the active line
    pub dim_alpha: f32,
    /// Alpha of inactive lines
    pub inactive_alpha: f32,
    pub glow_alpha: f32,
    /// Glow blur radius in em
    pub glow_radius: f32,
    /// Progress steps below this are not redrawn
    pub progress_threshold: f32,
    /// Minimum seconds between glow samples
    pub glow_sample_interval: f64,
}

impl Default for KaraokeConfig {
    fn default() -> Self {
        Self {
            glow_max_chars: 7,
            glow_min_duration: 1.0,
            wave_width: 2.75,
            char_decay: 0.94,
            min_scale_boost: 1.03,
            max_scale_boost: 1.3,
            lift: 0.06,
            skew: 0.08,
            sweep_fade: 0.5,
            dim_alpha: 0.35,
            inactive_alpha: 0.6,
            glow_alpha: 0.8,
            glow_radius: 0.2,
            progress_threshold: 0.0025,
            glow_sample_interval: 0.05,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub layout: LayoutConfig,
    pub scroll: ScrollConfig,
    pub render: RenderConfig,
    pub karaoke: KaraokeConfig,
}

impl EngineConfig {
    /// Get the config file path
    pub fn file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "rustle", "Rustle")
            .map(|dirs| dirs.config_dir().join("engine.json"))
    }

    /// Load config from file, or return defaults if missing or invalid
    pub fn load() -> Self {
        let Some(path) = Self::file_path() else {
            tracing::warn!("Could not determine config directory, using default engine config");
            return Self::default();
        };
        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default engine config ({}): {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load config from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save config to the default file
    pub fn save(&self) -> Result<(), ConfigError> {
        match Self::file_path() {
            Some(path) => self.save_to_file(&path),
            None => Err(ConfigError::NoConfigDir),
        }
    }

    /// Save config to a specific file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Errors that can occur with engine config
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Could not determine config directory")]
    NoConfigDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("rustle-lyrics-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.scroll.focal_ratio, 0.35);
        assert_eq!(config.scroll.resume_delay, 3.0);
        assert_eq!(config.scroll.drag_decay, 0.92);
        assert_eq!(config.render.cull_margin, 100.0);
        assert_eq!(config.render.jump_threshold, 1.0);
        assert_eq!(config.layout.peer_window, 5);
        assert_eq!(config.karaoke.glow_max_chars, 7);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "scroll": { "resume_delay": 5.0 } }"#).unwrap();
        assert_eq!(config.scroll.resume_delay, 5.0);
        assert_eq!(config.scroll.focal_ratio, 0.35);
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn test_save_and_load_file() {
        let path = temp_path("engine.json");
        let mut config = EngineConfig::default();
        config.render.min_opacity = 0.5;
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_errors() {
        let missing = EngineConfig::load_from_file(&temp_path("missing.json"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));

        let path = temp_path("broken.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        let broken = EngineConfig::load_from_file(&path);
        assert!(matches!(broken, Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_file(&path);
    }
}
