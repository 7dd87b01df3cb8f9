//! Line measurement and wrapping
//!
//! Font sizes and spacing derive from the container width alone, so a line's
//! layout is a pure function of its content, the width, and whether the host
//! is a touch (mobile) surface.

use std::collections::VecDeque;

use super::text_shaper::TextMeasurer;
use super::types::{LineLayout, LyricLine, TranslationRow, WordLayout};
use super::word_splitter::{Token, segment_line, segment_plain, split_token};
use crate::config::LayoutConfig;

/// Layout parameters calculated from container width
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    /// Main lyric font size in logical pixels
    pub font_size: f32,
    /// Translation font size in logical pixels
    pub translation_font_size: f32,
    /// Main row height
    pub line_height: f32,
    /// Translation row height
    pub trans_line_height: f32,
    pub padding_x: f32,
    pub padding_y: f32,
}

impl LayoutMetrics {
    pub fn new(container_width: f32, is_mobile: bool, config: &LayoutConfig) -> Self {
        let mut font_size = (container_width * config.font_size_ratio)
            .clamp(config.min_font_size, config.max_font_size);
        if is_mobile {
            font_size *= config.mobile_font_scale;
        }
        let translation_font_size = font_size * config.translation_ratio;

        Self {
            font_size,
            translation_font_size,
            line_height: font_size * config.line_height,
            trans_line_height: translation_font_size * config.translation_line_height,
            padding_x: font_size * config.padding_x,
            padding_y: font_size * config.padding_y,
        }
    }

    /// Width available to text inside the horizontal padding
    pub fn available_width(&self, container_width: f32) -> f32 {
        (container_width - 2.0 * self.padding_x).max(1.0)
    }
}

/// Sliding window over the text widths of the most recently measured lines
///
/// Suggests a translation wrap width so similar consecutive lines align.
#[derive(Debug, Clone)]
pub struct PeerWidthWindow {
    widths: VecDeque<f32>,
    capacity: usize,
}

impl PeerWidthWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            widths: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Widest of the remembered widths
    pub fn suggest(&self) -> Option<f32> {
        self.widths.iter().copied().reduce(f32::max)
    }

    pub fn push(&mut self, width: f32) {
        if self.widths.len() == self.capacity {
            self.widths.pop_front();
        }
        self.widths.push_back(width);
    }
}

/// Advance width with the zero-width fallback
fn measure_text(measurer: &dyn TextMeasurer, text: &str, font_size: f32) -> f32 {
    let width = measurer.measure(text, font_size);
    if width > 0.0 || text.is_empty() {
        width
    } else {
        0.5 * font_size * text.chars().count() as f32
    }
}

/// Per-char widths and left offsets via prefix measurement
fn measure_chars(measurer: &dyn TextMeasurer, text: &str, font_size: f32) -> (Vec<f32>, Vec<f32>) {
    let count = text.chars().count();
    let total = measure_text(measurer, text, font_size);
    if measurer.measure(text, font_size) <= 0.0 {
        // Fallback width: spread evenly
        let each = if count > 0 { total / count as f32 } else { 0.0 };
        let offsets = (0..count).map(|i| i as f32 * each).collect();
        return (vec![each; count], offsets);
    }

    let mut offsets = Vec::with_capacity(count);
    let mut widths = Vec::with_capacity(count);
    let mut previous = 0.0f32;
    for (i, (byte_idx, c)) in text.char_indices().enumerate() {
        offsets.push(previous);
        let end = byte_idx + c.len_utf8();
        let next = if i + 1 == count {
            total
        } else {
            measurer.measure(&text[..end], font_size).max(previous)
        };
        widths.push(next - previous);
        previous = next;
    }
    (widths, offsets)
}

/// Largest char prefix of `token` that fits `width`; at least one char
fn fitting_prefix(measurer: &dyn TextMeasurer, token: &Token, font_size: f32, width: f32) -> usize {
    let (widths, _) = measure_chars(measurer, &token.text, font_size);
    let mut used = 0.0;
    let mut fit = 0;
    for w in widths {
        if used + w > width {
            break;
        }
        used += w;
        fit += 1;
    }
    fit.max(1)
}

/// Measure one line against `container_width`
///
/// Words are packed greedily inside the horizontal padding. A word too wide
/// for an empty row is broken at character boundaries; only a single glyph
/// wider than the row may overflow.
pub fn measure_line(
    line: &LyricLine,
    container_width: f32,
    metrics: &LayoutMetrics,
    measurer: &dyn TextMeasurer,
    suggested_peer_width: Option<f32>,
) -> LineLayout {
    let font_size = metrics.font_size;
    let available = metrics.available_width(container_width);

    let mut words: Vec<WordLayout> = Vec::new();
    let mut row = 0usize;
    let mut cursor = 0.0f32;
    let mut text_width = 0.0f32;

    let mut pending: VecDeque<Token> = segment_line(line).into();
    while let Some(token) = pending.pop_front() {
        let is_space = token.is_space();
        if is_space && cursor == 0.0 && !words.is_empty() {
            continue;
        }

        let width = measure_text(measurer, &token.text, font_size);
        if cursor > 0.0 && cursor + width > available {
            row += 1;
            cursor = 0.0;
            if is_space {
                continue;
            }
        }

        if cursor == 0.0 && width > available && token.char_count() > 1 {
            let fit = fitting_prefix(measurer, &token, font_size, available);
            if fit < token.char_count() {
                let (head, tail) = split_token(&token, fit);
                pending.push_front(tail);
                pending.push_front(head);
                continue;
            }
        }

        let (char_widths, char_offsets) = measure_chars(measurer, &token.text, font_size);
        words.push(WordLayout {
            text: token.text,
            x: metrics.padding_x + cursor,
            y: metrics.padding_y + row as f32 * metrics.line_height,
            width,
            start_time: token.start_time,
            end_time: token.end_time,
            is_verbatim: token.is_verbatim,
            char_widths,
            char_offsets,
            render_progress: 0.0,
            render_snapshot: None,
        });
        cursor += width;
        if !is_space {
            text_width = text_width.max(cursor);
        }
    }
    let row_count = row + 1;

    let translation_lines = match line.translation.as_deref() {
        Some(text) if !text.trim().is_empty() => {
            let wrap = text_width
                .max(suggested_peer_width.unwrap_or(0.0))
                .min(available);
            let wrap = if wrap < 1.0 { available } else { wrap };
            wrap_translation(
                text,
                wrap,
                metrics,
                measurer,
                metrics.padding_y + row_count as f32 * metrics.line_height,
            )
        }
        _ => Vec::new(),
    };

    let height = row_count as f32 * metrics.line_height
        + translation_lines.len() as f32 * metrics.trans_line_height
        + 2.0 * metrics.padding_y;

    LineLayout {
        words,
        translation_lines,
        height,
        text_width,
        row_count,
        font_size,
        translation_font_size: metrics.translation_font_size,
        container_width,
    }
}

/// Greedy wrap of translation text; rows start below the main text at `top`
fn wrap_translation(
    text: &str,
    wrap_width: f32,
    metrics: &LayoutMetrics,
    measurer: &dyn TextMeasurer,
    top: f32,
) -> Vec<TranslationRow> {
    let font_size = metrics.translation_font_size;
    let mut rows: Vec<String> = vec![String::new()];
    let mut cursor = 0.0f32;

    for token in segment_plain(text, 0.0) {
        let width = measure_text(measurer, &token.text, font_size);
        let is_space = token.is_space();
        if cursor > 0.0 && cursor + width > wrap_width {
            rows.push(String::new());
            cursor = 0.0;
        }
        if is_space && cursor == 0.0 {
            continue;
        }
        if let Some(current) = rows.last_mut() {
            current.push_str(&token.text);
        }
        cursor += width;
    }

    rows.into_iter()
        .filter(|row| !row.trim().is_empty())
        .enumerate()
        .map(|(i, row)| {
            let text = row.trim_end().to_string();
            let width = measure_text(measurer, &text, font_size);
            TranslationRow {
                text,
                x: metrics.padding_x,
                y: top + i as f32 * metrics.trans_line_height,
                width,
            }
        })
        .collect()
}
