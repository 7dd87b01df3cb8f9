//! Word sprite cache
//!
//! Each distinct word string is rasterized once per device font size and
//! tinted with the text colour. Glow rendering additionally needs per-char
//! sub-sprites and two blurred copies of each (half and full glow radius);
//! those are cut from the word sprite on first use and kept alongside it.
//!
//! The cache is cleared wholesale when it exceeds its bound, the same policy
//! as the width cache in the shaper.

use std::collections::HashMap;

use tiny_skia::{IntRect, Pixmap, PixmapPaint, Transform};

use super::blur;
use super::text_shaper::{GlyphRasterizer, TextSprite};

/// Entry bound before the cache is flushed
pub const SPRITE_CACHE_LIMIT: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SpriteKey {
    text: String,
    /// Device font size multiplied by 100 and rounded
    font_px_x100: u32,
}

impl SpriteKey {
    fn new(text: &str, font_px: f32) -> Self {
        Self {
            text: text.to_string(),
            font_px_x100: (font_px * 100.0).round() as u32,
        }
    }
}

/// One character cut out of a word sprite
#[derive(Debug, Clone)]
pub struct CharSprite {
    pub pixmap: Pixmap,
    /// Left edge inside the word sprite, device px
    pub x: f32,
    /// Transparent margin on each side (glow copies only)
    pub margin: f32,
}

/// Halo copies of one char, sharing the same margin
#[derive(Debug, Clone)]
pub struct GlowSprites {
    /// Blurred at half the glow radius
    pub soft: CharSprite,
    /// Blurred at the full glow radius
    pub wide: CharSprite,
}

/// Cached sprite of one word plus its lazily built char sprites
#[derive(Debug, Clone)]
pub struct CachedWord {
    pub sprite: TextSprite,
    chars: Option<Vec<Option<CharSprite>>>,
    glows: Option<Vec<Option<GlowSprites>>>,
}

impl CachedWord {
    fn new(sprite: TextSprite) -> Self {
        Self {
            sprite,
            chars: None,
            glows: None,
        }
    }

    /// Cut per-char sprites (and blurred glow copies) if not done yet
    ///
    /// `offsets` and `widths` are device px relative to the word's left edge.
    pub fn ensure_chars(&mut self, offsets: &[f32], widths: &[f32], glow_radius_px: f32) {
        if self
            .chars
            .as_ref()
            .is_some_and(|chars| chars.len() == offsets.len())
        {
            return;
        }

        let pad = self.sprite.pad as f32;
        let sprite_w = self.sprite.pixmap.width() as i32;
        let sprite_h = self.sprite.pixmap.height();
        let chars: Vec<Option<CharSprite>> = offsets
            .iter()
            .zip(widths)
            .map(|(offset, width)| {
                let left = (pad + offset).floor() as i32;
                let right = ((pad + offset + width).ceil() as i32).min(sprite_w);
                let rect = IntRect::from_xywh(left, 0, (right - left).max(1) as u32, sprite_h)?;
                let pixmap = self.sprite.pixmap.clone_rect(rect)?;
                Some(CharSprite {
                    pixmap,
                    x: left as f32,
                    margin: 0.0,
                })
            })
            .collect();

        let margin = glow_radius_px.ceil().max(1.0);
        let glows = chars
            .iter()
            .map(|glyph| {
                let glyph = glyph.as_ref()?;
                Some(GlowSprites {
                    soft: glow_copy(glyph, margin, glow_radius_px * 0.5)?,
                    wide: glow_copy(glyph, margin, glow_radius_px)?,
                })
            })
            .collect();

        self.chars = Some(chars);
        self.glows = Some(glows);
    }

    pub fn chars(&self) -> &[Option<CharSprite>] {
        self.chars.as_deref().unwrap_or(&[])
    }

    pub fn glows(&self) -> &[Option<GlowSprites>] {
        self.glows.as_deref().unwrap_or(&[])
    }
}

/// Blurred copy of `glyph` with room for the blur to spread
fn glow_copy(glyph: &CharSprite, margin: f32, radius_px: f32) -> Option<CharSprite> {
    let m = margin as u32;
    let mut pixmap = Pixmap::new(glyph.pixmap.width() + m * 2, glyph.pixmap.height())?;
    pixmap.draw_pixmap(
        m as i32,
        0,
        glyph.pixmap.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
    blur::box_blur(&mut pixmap, blur::box_radius(radius_px), blur::PASSES);
    Some(CharSprite {
        pixmap,
        x: glyph.x - margin,
        margin,
    })
}

/// Multiply a premultiplied white sprite by `rgb`
fn tint(pixmap: &mut Pixmap, rgb: [u8; 3]) {
    if rgb == [255, 255, 255] {
        return;
    }
    for pixel in pixmap.data_mut().chunks_exact_mut(4) {
        for (channel, factor) in pixel.iter_mut().zip(rgb) {
            *channel = ((*channel as u16 * factor as u16 + 127) / 255) as u8;
        }
    }
}

/// Sprite cache shared by every line
#[derive(Debug)]
pub struct GlyphSpriteCache {
    entries: HashMap<SpriteKey, CachedWord>,
    rgb: [u8; 3],
    limit: usize,
}

impl GlyphSpriteCache {
    pub fn new(rgb: [u8; 3]) -> Self {
        Self {
            entries: HashMap::new(),
            rgb,
            limit: SPRITE_CACHE_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Sprite of `text` at `font_px`, rasterizing on a miss
    ///
    /// Blank text has no sprite.
    pub fn word(
        &mut self,
        rasterizer: &dyn GlyphRasterizer,
        text: &str,
        font_px: f32,
    ) -> Option<&mut CachedWord> {
        let key = SpriteKey::new(text, font_px);
        if !self.entries.contains_key(&key) {
            let mut sprite = rasterizer.rasterize(text, font_px)?;
            tint(&mut sprite.pixmap, self.rgb);
            if self.entries.len() >= self.limit {
                tracing::debug!(
                    "[GlyphSpriteCache] flushing {} sprites",
                    self.entries.len()
                );
                self.entries.clear();
            }
            self.entries.insert(key.clone(), CachedWord::new(sprite));
        }
        self.entries.get_mut(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::text_shaper::MonospaceText;

    #[test]
    fn test_sprite_is_cached_and_tinted() {
        let mut cache = GlyphSpriteCache::new([255, 0, 0]);
        let sprite = cache.word(&MonospaceText, "ab", 20.0).unwrap();
        let pad = sprite.sprite.pad;
        let pixel = sprite.sprite.pixmap.pixel(pad + 5, pad + 14).unwrap();
        assert_eq!((pixel.red(), pixel.green(), pixel.alpha()), (255, 0, 255));

        cache.word(&MonospaceText, "ab", 20.0);
        cache.word(&MonospaceText, "ab", 24.0);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_blank_words_are_skipped() {
        let mut cache = GlyphSpriteCache::new([255; 3]);
        assert!(cache.word(&MonospaceText, " ", 20.0).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_flush_when_over_limit() {
        let mut cache = GlyphSpriteCache::new([255; 3]).with_limit(2);
        cache.word(&MonospaceText, "a", 20.0);
        cache.word(&MonospaceText, "b", 20.0);
        cache.word(&MonospaceText, "c", 20.0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_char_sprites_follow_offsets() {
        let mut cache = GlyphSpriteCache::new([255; 3]);
        let word = cache.word(&MonospaceText, "abc", 20.0).unwrap();
        word.ensure_chars(&[0.0, 10.0, 20.0], &[10.0, 10.0, 10.0], 4.0);

        let pad = word.sprite.pad as f32;
        let chars = word.chars();
        assert_eq!(chars.len(), 3);
        let second = chars[1].as_ref().unwrap();
        assert_eq!(second.x, pad + 10.0);
        assert_eq!(second.pixmap.width(), 10);

        let glows = word.glows()[1].as_ref().unwrap();
        let glow = &glows.wide;
        assert_eq!(glow.pixmap.width(), 10 + 2 * glow.margin as u32);
        assert_eq!(glow.x, second.x - glow.margin);
        assert_eq!(glows.soft.margin, glow.margin);
        // Blur spreads coverage into the margin
        let edge_y = 14 + word.sprite.pad;
        let edge = glow.pixmap.pixel(glow.margin as u32 - 1, edge_y).unwrap();
        assert!(edge.alpha() > 0);
    }

    #[test]
    fn test_wide_glow_spreads_further() {
        let mut cache = GlyphSpriteCache::new([255; 3]);
        let word = cache.word(&MonospaceText, "a", 40.0).unwrap();
        word.ensure_chars(&[0.0], &[20.0], 8.0);
        let y = 28 + word.sprite.pad;
        let glows = word.glows()[0].as_ref().unwrap();
        let outer = |sprite: &CharSprite| {
            let x = sprite.margin as u32 - 3;
            sprite.pixmap.pixel(x, y).unwrap().alpha()
        };
        assert!(outer(&glows.wide) > outer(&glows.soft));
    }
}
