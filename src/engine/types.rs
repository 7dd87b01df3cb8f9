//! Core data types for the lyrics engine
//!
//! Input lines come from the lyric-loading subsystem already parsed; everything
//! else in this module is derived render state owned by the engine.
//!
//! ## Units
//!
//! - Times are seconds (`f64`), matching the playback clock.
//! - Layout distances are logical pixels (`f32`); surfaces are sized in device
//!   pixels by multiplying with the device scale.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

/// One word of verbatim karaoke timing as supplied by the lyric source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricWord {
    pub text: String,
    /// Seconds
    pub start_time: f64,
    /// Seconds
    pub end_time: f64,
}

impl LyricWord {
    pub fn new(text: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            text: text.into(),
            start_time,
            end_time,
        }
    }
}

/// A single lyric line (immutable per track load)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricLine {
    /// Line start in seconds
    pub time: f64,
    /// Full line text
    #[serde(default)]
    pub text: String,
    /// Verbatim word timing, if the source had any
    #[serde(default)]
    pub words: Option<Vec<LyricWord>>,
    /// Translation text (line-level)
    #[serde(default)]
    pub translation: Option<String>,
    /// Instrumental gap rendered as breathing dots
    #[serde(default)]
    pub is_interlude: bool,
}

impl LyricLine {
    /// Plain line with no word timing
    pub fn new(time: f64, text: impl Into<String>) -> Self {
        Self {
            time,
            text: text.into(),
            words: None,
            translation: None,
            is_interlude: false,
        }
    }

    /// Line built from verbatim words; the text is their concatenation
    pub fn with_words(time: f64, words: Vec<LyricWord>) -> Self {
        let text = words.iter().map(|w| w.text.as_str()).collect();
        Self {
            time,
            text,
            words: Some(words),
            translation: None,
            is_interlude: false,
        }
    }

    pub fn interlude(time: f64) -> Self {
        Self {
            is_interlude: true,
            ..Self::new(time, "")
        }
    }

    pub fn translated(mut self, translation: impl Into<String>) -> Self {
        self.translation = Some(translation.into());
        self
    }

    /// Whether any word carries usable timing
    pub fn has_word_timing(&self) -> bool {
        self.words
            .as_ref()
            .is_some_and(|words| words.iter().any(|w| w.end_time > w.start_time))
    }
}

/// Stable identity of a line across lyric reloads
///
/// Derived from the line's time and text so that springs survive insertions
/// and removals elsewhere in the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(pub u64);

impl LineId {
    /// Compute ids for a whole track; duplicates get distinct ordinals
    pub fn for_lines(lines: &[LyricLine]) -> Vec<LineId> {
        let mut seen: std::collections::HashMap<u64, u32> = std::collections::HashMap::new();
        lines
            .iter()
            .map(|line| {
                let base = Self::hash(line, 0);
                let ordinal = seen.entry(base).or_insert(0);
                let id = if *ordinal == 0 {
                    base
                } else {
                    Self::hash(line, *ordinal)
                };
                *ordinal += 1;
                LineId(id)
            })
            .collect()
    }

    fn hash(line: &LyricLine, ordinal: u32) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(&line.time.to_bits().to_le_bytes());
        hasher.update(line.text.as_bytes());
        hasher.update(&[line.is_interlude as u8]);
        hasher.update(&ordinal.to_le_bytes());
        hasher.digest()
    }
}

/// Last drawn state of a word, used to skip redraws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderSnapshot {
    pub phase: WordPhase,
    /// Progress quantized to the karaoke progress threshold
    pub progress_step: u32,
}

/// Which karaoke path a word is currently drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WordPhase {
    /// Solid fill, no timing or inactive line
    #[default]
    Flat,
    /// Clipped left-to-right reveal
    Sweep,
    /// Per-character wave activation with glow
    Glow,
}

/// Positioned word inside a line block
#[derive(Debug, Clone, PartialEq)]
pub struct WordLayout {
    pub text: String,
    /// Offset from the line's local origin (logical px)
    pub x: f32,
    pub y: f32,
    pub width: f32,
    /// Seconds
    pub start_time: f64,
    pub end_time: f64,
    /// True when timing came from the lyric source rather than being inferred
    pub is_verbatim: bool,
    pub char_widths: Vec<f32>,
    /// Left edge of each char relative to `x`
    pub char_offsets: Vec<f32>,
    /// Last progress the word was drawn with
    pub render_progress: f32,
    pub render_snapshot: Option<RenderSnapshot>,
}

impl WordLayout {
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }

    pub fn char_count(&self) -> usize {
        self.char_widths.len()
    }

    /// Pure whitespace tokens are laid out but never drawn
    pub fn is_space(&self) -> bool {
        !self.text.is_empty() && self.text.trim().is_empty()
    }

    /// Karaoke highlight progress at `time`, clamped to `[0, 1]`
    pub fn progress_at(&self, time: f64) -> f32 {
        let duration = self.duration();
        if duration <= 0.0 {
            return if time >= self.end_time { 1.0 } else { 0.0 };
        }
        ((time - self.start_time) / duration).clamp(0.0, 1.0) as f32
    }
}

/// One wrapped row of translation text
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRow {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

/// Measured block of one lyric line
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineLayout {
    pub words: Vec<WordLayout>,
    pub translation_lines: Vec<TranslationRow>,
    /// Total block height including vertical padding (logical px)
    pub height: f32,
    /// Widest wrapped row of the main text
    pub text_width: f32,
    /// Number of wrapped rows of the main text
    pub row_count: usize,
    /// Font size the block was measured with
    pub font_size: f32,
    pub translation_font_size: f32,
    /// Width the block was measured against
    pub container_width: f32,
}

/// Host surface geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    /// Device pixel ratio
    pub scale: f32,
    /// Touch layouts skip distance blur and hover
    pub is_touch: bool,
}

impl Viewport {
    pub fn new(width: f32, height: f32, scale: f32) -> Self {
        Self {
            width,
            height,
            scale,
            is_touch: false,
        }
    }

    /// Zero or non-finite sizes mean "nothing to draw yet"
    pub fn is_valid(&self) -> bool {
        self.width.is_finite()
            && self.height.is_finite()
            && self.width >= 1.0
            && self.height >= 1.0
            && self.scale > 0.0
    }

    /// Size in device pixels
    pub fn device_size(&self) -> (u32, u32) {
        (
            (self.width * self.scale).ceil().max(1.0) as u32,
            (self.height * self.scale).ceil().max(1.0) as u32,
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

/// Playback state polled from the audio element every frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    /// Seconds
    pub current_time: f64,
    pub is_playing: bool,
    pub playback_rate: f64,
}

impl PlaybackState {
    pub fn playing(current_time: f64) -> Self {
        Self {
            current_time,
            is_playing: true,
            playback_rate: 1.0,
        }
    }

    pub fn paused(current_time: f64) -> Self {
        Self {
            current_time,
            is_playing: false,
            playback_rate: 1.0,
        }
    }
}

/// Kind of pointer that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    /// Touch with its platform identifier
    Touch(u64),
}

/// Request for the playback element to jump
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekRequest {
    /// Seconds
    pub time: f64,
    /// Seek without fading
    pub immediate: bool,
}

/// Axis-aligned rectangle in logical viewport pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LineRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LineRect {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether the rect lies entirely outside `[-margin, height + margin]`
    pub fn is_outside(&self, viewport_height: f32, margin: f32) -> bool {
        self.y + self.height < -margin || self.y > viewport_height + margin
    }
}

/// Index of the line whose window contains `time`
///
/// `None` before the first line (an `activeIndex` of -1 to JS-style callers).
pub fn find_active_index(lines: &[LyricLine], time: f64) -> Option<usize> {
    if lines.is_empty() || !time.is_finite() {
        return None;
    }
    let after = lines.partition_point(|line| line.time <= time);
    after.checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> Vec<LyricLine> {
        vec![
            LyricLine::new(0.5, "one"),
            LyricLine::new(5.0, "two"),
            LyricLine::new(10.0, "three"),
        ]
    }

    #[test]
    fn test_active_index_before_first_line() {
        assert_eq!(find_active_index(&track(), 0.0), None);
        assert_eq!(find_active_index(&track(), 0.499), None);
    }

    #[test]
    fn test_active_index_windows() {
        let lines = track();
        assert_eq!(find_active_index(&lines, 0.5), Some(0));
        assert_eq!(find_active_index(&lines, 4.999), Some(0));
        assert_eq!(find_active_index(&lines, 5.0), Some(1));
        assert_eq!(find_active_index(&lines, 99.0), Some(2));
    }

    #[test]
    fn test_active_index_unique_window() {
        let lines = track();
        for step in 0..240 {
            let t = step as f64 * 0.05;
            let matching: Vec<usize> = (0..lines.len())
                .filter(|&i| {
                    lines[i].time <= t && lines.get(i + 1).is_none_or(|next| t < next.time)
                })
                .collect();
            assert!(matching.len() <= 1);
            assert_eq!(find_active_index(&lines, t), matching.first().copied());
        }
    }

    #[test]
    fn test_line_ids_are_stable_and_distinct() {
        let mut lines = track();
        lines.push(LyricLine::new(10.0, "three"));
        let ids = LineId::for_lines(&lines);
        assert_ne!(ids[2], ids[3], "duplicate lines need distinct ids");

        let mut edited = lines.clone();
        edited.insert(1, LyricLine::new(2.0, "inserted"));
        let edited_ids = LineId::for_lines(&edited);
        assert_eq!(ids[0], edited_ids[0]);
        assert_eq!(ids[1], edited_ids[2]);
        assert_eq!(ids[3], edited_ids[4]);
    }

    #[test]
    fn test_word_progress_is_clamped() {
        let word = WordLayout {
            text: "hey".into(),
            x: 0.0,
            y: 0.0,
            width: 10.0,
            start_time: 2.0,
            end_time: 3.0,
            is_verbatim: true,
            char_widths: vec![3.0; 3],
            char_offsets: vec![0.0, 3.0, 6.0],
            render_progress: 0.0,
            render_snapshot: None,
        };
        assert_eq!(word.progress_at(-10.0), 0.0);
        assert_eq!(word.progress_at(1.9), 0.0);
        assert!((word.progress_at(2.5) - 0.5).abs() < 1e-6);
        assert_eq!(word.progress_at(3.5), 1.0);
        assert_eq!(word.progress_at(f64::MAX), 1.0);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"[{"time":1.5,"text":"hi","words":[{"text":"hi","startTime":1.5,"endTime":2.0}],"isInterlude":false}]"#;
        let lines: Vec<LyricLine> = serde_json::from_str(json).unwrap();
        assert_eq!(lines[0].words.as_ref().unwrap()[0].end_time, 2.0);
        assert!(lines[0].has_word_timing());
    }
}
