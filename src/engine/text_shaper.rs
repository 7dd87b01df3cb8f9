//! Text measurement and rasterization
//!
//! The layout and karaoke renderer only need two capabilities: the advance
//! width of a run of text, and a white-on-transparent sprite of a word. Both
//! are traits so the engine can run on cosmic-text or on a font-free
//! monospace backend.
//!
//! ## Caching
//!
//! Shaping is expensive, so widths are cached by text content and font size
//! (multiplied by 100 and rounded). The cache is cleared wholesale once it
//! exceeds its bound.

use std::collections::HashMap;

use cosmic_text::{Attrs, Buffer, Color, Family, FontSystem, Metrics, Shaping, SwashCache};
use parking_lot::Mutex;
use tiny_skia::{Paint, Pixmap, Rect, Transform};

use super::word_splitter::is_cjk_char;

/// Line height relative to font size used for sprites
pub const SPRITE_LINE_HEIGHT: f32 = 1.4;

/// Width cache bound
const WIDTH_CACHE_LIMIT: usize = 4096;

/// Advance-width measurement
pub trait TextMeasurer: Send + Sync {
    /// Logical-pixel advance width of `text` at `font_size`
    fn measure(&self, text: &str, font_size: f32) -> f32;
}

/// Rendered word sprite
///
/// The text's line box starts at `(pad, pad)`; the box is
/// `font_size_px * SPRITE_LINE_HEIGHT` tall.
#[derive(Debug, Clone)]
pub struct TextSprite {
    pub pixmap: Pixmap,
    /// Transparent margin around the line box in device pixels
    pub pad: u32,
    /// Baseline offset from the top of the line box
    pub baseline: f32,
}

/// Word rasterization into device-pixel sprites
pub trait GlyphRasterizer: Send + Sync {
    /// White-on-transparent sprite of `text`, or `None` for blank text
    fn rasterize(&self, text: &str, font_size_px: f32) -> Option<TextSprite>;
}

/// Combined capability the engine is generic over
pub trait TextBackend: TextMeasurer + GlyphRasterizer {
    fn as_measurer(&self) -> &dyn TextMeasurer;
    fn as_rasterizer(&self) -> &dyn GlyphRasterizer;
}

impl<T: TextMeasurer + GlyphRasterizer> TextBackend for T {
    fn as_measurer(&self) -> &dyn TextMeasurer {
        self
    }

    fn as_rasterizer(&self) -> &dyn GlyphRasterizer {
        self
    }
}

/// Cache key for measured widths
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WidthCacheKey {
    text: String,
    /// Font size multiplied by 100 and rounded
    font_size_x100: u32,
}

impl WidthCacheKey {
    fn new(text: &str, font_size: f32) -> Self {
        Self {
            text: text.to_string(),
            font_size_x100: (font_size * 100.0).round() as u32,
        }
    }
}

struct CosmicState {
    font_system: FontSystem,
    swash_cache: SwashCache,
}

/// cosmic-text backed shaper
pub struct CosmicText {
    state: Mutex<CosmicState>,
    width_cache: Mutex<HashMap<WidthCacheKey, f32>>,
    font_family: Option<String>,
}

impl CosmicText {
    /// Shaper using system fonts and the sans-serif fallback
    pub fn new() -> Self {
        Self::with_font_system(FontSystem::new(), None)
    }

    pub fn with_font_system(font_system: FontSystem, font_family: Option<String>) -> Self {
        match &font_family {
            Some(family) => tracing::debug!("[TextShaper] Using font family: {}", family),
            None => tracing::debug!("[TextShaper] Using fallback font: SansSerif"),
        }
        Self {
            state: Mutex::new(CosmicState {
                font_system,
                swash_cache: SwashCache::new(),
            }),
            width_cache: Mutex::new(HashMap::new()),
            font_family,
        }
    }

    fn attrs(&self) -> Attrs<'_> {
        match &self.font_family {
            Some(name) => Attrs::new().family(Family::Name(name)),
            None => Attrs::new().family(Family::SansSerif),
        }
    }

    fn shape(&self, state: &mut CosmicState, text: &str, font_size: f32) -> Buffer {
        let metrics = Metrics::new(font_size, font_size * SPRITE_LINE_HEIGHT);
        let mut buffer = Buffer::new(&mut state.font_system, metrics);
        buffer.set_size(&mut state.font_system, None, None);
        buffer.set_text(
            &mut state.font_system,
            text,
            &self.attrs(),
            Shaping::Advanced,
            None,
        );
        buffer.shape_until_scroll(&mut state.font_system, false);
        buffer
    }
}

impl Default for CosmicText {
    fn default() -> Self {
        Self::new()
    }
}

impl TextMeasurer for CosmicText {
    fn measure(&self, text: &str, font_size: f32) -> f32 {
        if text.is_empty() {
            return 0.0;
        }

        let key = WidthCacheKey::new(text, font_size);
        if let Some(width) = self.width_cache.lock().get(&key) {
            return *width;
        }

        let width = {
            let mut state = self.state.lock();
            let buffer = self.shape(&mut state, text, font_size);
            buffer
                .layout_runs()
                .map(|run| run.line_w)
                .fold(0.0f32, f32::max)
        };

        let mut cache = self.width_cache.lock();
        if cache.len() > WIDTH_CACHE_LIMIT {
            cache.clear();
        }
        cache.insert(key, width);
        width
    }
}

impl GlyphRasterizer for CosmicText {
    fn rasterize(&self, text: &str, font_size_px: f32) -> Option<TextSprite> {
        if text.trim().is_empty() || font_size_px <= 0.0 {
            return None;
        }

        let mut state = self.state.lock();
        let buffer = self.shape(&mut state, text, font_size_px);
        let (width, baseline) = buffer
            .layout_runs()
            .next()
            .map(|run| (run.line_w, run.line_y))
            .unwrap_or((0.0, font_size_px));

        let pad = sprite_pad(font_size_px);
        let mut pixmap = Pixmap::new(
            width.ceil() as u32 + pad * 2,
            (font_size_px * SPRITE_LINE_HEIGHT).ceil() as u32 + pad * 2,
        )?;
        let stride = pixmap.width() as i32;
        let rows = pixmap.height() as i32;
        let data = pixmap.data_mut();

        let CosmicState {
            font_system,
            swash_cache,
        } = &mut *state;
        buffer.draw(
            font_system,
            swash_cache,
            Color::rgb(0xFF, 0xFF, 0xFF),
            |x, y, w, h, color| {
                let alpha = color.a();
                if alpha == 0 {
                    return;
                }
                for dy in 0..h as i32 {
                    for dx in 0..w as i32 {
                        let px = x + dx + pad as i32;
                        let py = y + dy + pad as i32;
                        if px < 0 || py < 0 || px >= stride || py >= rows {
                            continue;
                        }
                        let idx = ((py * stride + px) * 4) as usize;
                        // Premultiplied white: every channel equals alpha
                        let merged = data[idx + 3].max(alpha);
                        data[idx..idx + 4].fill(merged);
                    }
                }
            },
        );

        Some(TextSprite {
            pixmap,
            pad,
            baseline,
        })
    }
}

/// Font-free deterministic backend
///
/// Latin glyphs are half an em wide and CJK glyphs a full em; spaces take
/// 0.3 em. Rasterization fills each glyph box.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonospaceText;

impl MonospaceText {
    pub fn char_width(c: char, font_size: f32) -> f32 {
        if c.is_whitespace() {
            font_size * 0.3
        } else if is_cjk_char(c) {
            font_size
        } else {
            font_size * 0.5
        }
    }
}

impl TextMeasurer for MonospaceText {
    fn measure(&self, text: &str, font_size: f32) -> f32 {
        text.chars().map(|c| Self::char_width(c, font_size)).sum()
    }
}

impl GlyphRasterizer for MonospaceText {
    fn rasterize(&self, text: &str, font_size_px: f32) -> Option<TextSprite> {
        if text.trim().is_empty() || font_size_px <= 0.0 {
            return None;
        }

        let pad = sprite_pad(font_size_px);
        let width = self.measure(text, font_size_px);
        let line_h = font_size_px * SPRITE_LINE_HEIGHT;
        let mut pixmap = Pixmap::new(
            width.ceil() as u32 + pad * 2,
            line_h.ceil() as u32 + pad * 2,
        )?;

        let mut paint = Paint::default();
        paint.set_color_rgba8(255, 255, 255, 255);
        paint.anti_alias = false;

        let glyph_top = pad as f32 + line_h * 0.2;
        let glyph_h = line_h * 0.6;
        let mut x = pad as f32;
        for c in text.chars() {
            let advance = Self::char_width(c, font_size_px);
            if !c.is_whitespace() {
                let inset = advance * 0.1;
                if let Some(rect) =
                    Rect::from_xywh(x + inset, glyph_top, advance - inset * 2.0, glyph_h)
                {
                    pixmap.fill_rect(rect, &paint, Transform::identity(), None);
                }
            }
            x += advance;
        }

        Some(TextSprite {
            pixmap,
            pad,
            baseline: line_h * 0.8,
        })
    }
}

/// Sprite margin leaving room for glow and scale overshoot
fn sprite_pad(font_size_px: f32) -> u32 {
    (font_size_px * 0.5).ceil().max(2.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monospace_widths() {
        let m = MonospaceText;
        assert_eq!(m.measure("ab", 20.0), 20.0);
        assert_eq!(m.measure("你好", 20.0), 40.0);
        assert!((m.measure("a b", 20.0) - 26.0).abs() < 1e-4);
        assert_eq!(m.measure("", 20.0), 0.0);
    }

    #[test]
    fn test_monospace_sprite_covers_glyphs() {
        let sprite = MonospaceText.rasterize("ab", 20.0).unwrap();
        let pad = sprite.pad;
        assert_eq!(sprite.pixmap.width(), 20 + pad * 2);
        assert_eq!(sprite.pixmap.height(), 28 + pad * 2);

        // Centre of the first glyph box is opaque, the margin is clear
        let inside = sprite.pixmap.pixel(pad + 5, pad + 14).unwrap();
        assert_eq!(inside.alpha(), 255);
        let margin = sprite.pixmap.pixel(0, 0).unwrap();
        assert_eq!(margin.alpha(), 0);
    }

    #[test]
    fn test_blank_text_has_no_sprite() {
        assert!(MonospaceText.rasterize("", 20.0).is_none());
        assert!(MonospaceText.rasterize("   ", 20.0).is_none());
    }

    #[test]
    fn test_cache_key_quantizes_font_size() {
        assert_eq!(
            WidthCacheKey::new("hi", 24.0),
            WidthCacheKey::new("hi", 24.0001)
        );
        assert_ne!(
            WidthCacheKey::new("hi", 24.0),
            WidthCacheKey::new("hi", 24.5)
        );
    }
}
