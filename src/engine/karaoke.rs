//! Karaoke word rendering
//!
//! Draws one line's words into its private surface. Each word takes one of
//! three paths:
//!
//! - **Flat**: no usable timing, or the line is not active. Solid fill,
//!   dimmed when inactive.
//! - **Sweep**: timed words that are long or fast. A soft-edged reveal moves
//!   left to right over a dim base copy, with a small lift and skew that
//!   settle once the word completes.
//! - **Glow**: short words held for a while. A gaussian wave crosses the
//!   characters; each char is scaled, lifted, brightened and given a blurred
//!   halo by its wave intensity.
//!
//! Redraws are gated per line: the renderer remembers the time/active/hover
//! triple it last drew with and each word's [`RenderSnapshot`]. A new frame
//! only repaints when a snapshot changed by more than the progress threshold
//! (glow words additionally at most every `glow_sample_interval`).

use std::f32::consts::PI;

use tiny_skia::{
    BlendMode, Color, FilterQuality, GradientStop, LinearGradient, Paint, Pixmap, PixmapPaint,
    Point, Rect, SpreadMode, Transform,
};

use crate::config::KaraokeConfig;

use super::glyph_cache::GlyphSpriteCache;
use super::interlude_dots;
use super::text_shaper::GlyphRasterizer;
use super::types::{LineLayout, RenderSnapshot, WordLayout, WordPhase};

/// Opacity of translation rows relative to the line
const TRANSLATION_ALPHA: f32 = 0.7;
/// Minimum opacity of words on a hovered inactive line
const HOVER_ALPHA: f32 = 0.85;
/// Word duration span over which the glow scale boost ramps to its maximum
const BOOST_RAMP_SECONDS: f64 = 2.0;
/// Interlude dot radius relative to font size
const DOT_RADIUS_EM: f32 = 0.25;

/// Per-frame inputs for one line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFrame {
    /// Time basis in seconds (visual time for the active line)
    pub time: f64,
    pub is_active: bool,
    pub is_hovered: bool,
    /// Device pixel ratio
    pub scale: f32,
    /// Seconds into the interlude window and its length, for interlude lines
    pub interlude: Option<(f32, f32)>,
}

/// Redraw bookkeeping of one line surface
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineRenderState {
    last: Option<(f64, bool, bool)>,
    last_glow_sample: Option<f64>,
}

impl LineRenderState {
    /// Forget everything; the next frame redraws
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }
}

/// Which path `word` is drawn with
pub fn word_phase(word: &WordLayout, is_active: bool, config: &KaraokeConfig) -> WordPhase {
    if !is_active || !word.is_verbatim || word.duration() <= 0.0 {
        WordPhase::Flat
    } else if word.char_count() <= config.glow_max_chars
        && word.duration() >= config.glow_min_duration
    {
        WordPhase::Glow
    } else {
        WordPhase::Sweep
    }
}

/// Gaussian wave activation of each char at `progress`
///
/// The front travels from `-W` to `n + W` so the wave fully enters and leaves
/// the word. Intensity decays geometrically along the word and vanishes
/// before the word starts and after it ends.
pub fn wave_intensities(progress: f32, chars: usize, config: &KaraokeConfig) -> Vec<f32> {
    if progress <= 0.0 || progress >= 1.0 {
        return vec![0.0; chars];
    }
    let width = config.wave_width.max(f32::EPSILON);
    let front = wave_front(progress, chars, width);
    let sigma = width / 2.0;
    (0..chars)
        .map(|i| {
            let d = i as f32 + 0.5 - front;
            (-(d * d) / (2.0 * sigma * sigma)).exp() * config.char_decay.powi(i as i32)
        })
        .collect()
}

fn wave_front(progress: f32, chars: usize, width: f32) -> f32 {
    progress * (chars as f32 + 2.0 * width) - width
}

/// Opacities of the soft and wide halo copies at wave intensity `g`
///
/// They sum to `g`, and the wide copy takes over as `g` grows, so both the
/// halo's strength and its spread peak at the wave front.
pub fn halo_mix(g: f32) -> (f32, f32) {
    let g = g.clamp(0.0, 1.0);
    (g * (1.0 - g), g * g)
}

/// Word-level karaoke renderer
#[derive(Debug, Clone)]
pub struct KaraokeRenderer {
    config: KaraokeConfig,
}

impl KaraokeRenderer {
    pub fn new(config: KaraokeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KaraokeConfig {
        &self.config
    }

    fn snapshot(&self, word: &WordLayout, frame: &LineFrame) -> RenderSnapshot {
        let phase = word_phase(word, frame.is_active, &self.config);
        let progress_step = match phase {
            WordPhase::Flat => 0,
            _ => {
                let threshold = self.config.progress_threshold.max(f32::EPSILON);
                (word.progress_at(frame.time) / threshold).round() as u32
            }
        };
        RenderSnapshot {
            phase,
            progress_step,
        }
    }

    /// Whether `layout` must be repainted for `frame`
    pub fn needs_redraw(
        &self,
        layout: &LineLayout,
        state: &LineRenderState,
        frame: &LineFrame,
    ) -> bool {
        let Some((time, active, hovered)) = state.last else {
            return true;
        };
        if active != frame.is_active || hovered != frame.is_hovered {
            return true;
        }
        if time == frame.time {
            return false;
        }
        if frame.interlude.is_some() {
            return frame.is_active;
        }

        let glow_due = state
            .last_glow_sample
            .is_none_or(|last| (frame.time - last).abs() >= self.config.glow_sample_interval);

        layout.words.iter().filter(|w| !w.is_space()).any(|word| {
            let next = self.snapshot(word, frame);
            match word.render_snapshot {
                None => true,
                Some(prev) if prev.phase != next.phase => true,
                Some(prev) if prev.progress_step == next.progress_step => false,
                Some(_) => {
                    // Glow words repaint at a capped rate except when finishing
                    next.phase != WordPhase::Glow
                        || glow_due
                        || word.progress_at(frame.time) >= 1.0
                }
            }
        })
    }

    /// Repaint `surface` with `layout` at `frame`
    pub fn render(
        &self,
        surface: &mut Pixmap,
        layout: &mut LineLayout,
        state: &mut LineRenderState,
        frame: &LineFrame,
        glyphs: &mut GlyphSpriteCache,
        rasterizer: &dyn GlyphRasterizer,
    ) {
        surface.fill(Color::TRANSPARENT);
        let scale = frame.scale;
        let font_px = layout.font_size * scale;
        let mut drew_glow = false;

        if let Some((elapsed, duration)) = frame.interlude {
            let dots = interlude_dots::sample(elapsed, duration);
            let x = layout.words.first().map(|w| w.x).unwrap_or(0.0) * scale;
            interlude_dots::draw(
                surface,
                &dots,
                x,
                layout.height * scale / 2.0,
                font_px * DOT_RADIUS_EM,
                [255, 255, 255],
            );
        }

        for i in 0..layout.words.len() {
            let snapshot = self.snapshot(&layout.words[i], frame);
            let word = &mut layout.words[i];
            word.render_snapshot = Some(snapshot);
            word.render_progress = word.progress_at(frame.time);
            if word.is_space() || word.text.is_empty() {
                continue;
            }
            let word = &layout.words[i];
            match snapshot.phase {
                WordPhase::Flat => {
                    self.draw_flat(surface, word, frame, glyphs, rasterizer, font_px)
                }
                WordPhase::Sweep => {
                    self.draw_sweep(surface, word, frame, glyphs, rasterizer, font_px)
                }
                WordPhase::Glow => {
                    self.draw_glow(surface, word, frame, glyphs, rasterizer, font_px);
                    drew_glow = true;
                }
            }
        }

        let line_alpha = self.flat_alpha(frame) * TRANSLATION_ALPHA;
        let trans_px = layout.translation_font_size * scale;
        for row in &layout.translation_lines {
            let Some(cached) = glyphs.word(rasterizer, &row.text, trans_px) else {
                continue;
            };
            let sprite = &cached.sprite;
            draw_sprite(
                surface,
                &sprite.pixmap,
                Transform::from_translate(
                    row.x * scale - sprite.pad as f32,
                    row.y * scale - sprite.pad as f32,
                ),
                line_alpha,
            );
        }

        state.last = Some((frame.time, frame.is_active, frame.is_hovered));
        if drew_glow {
            state.last_glow_sample = Some(frame.time);
        }
    }

    fn flat_alpha(&self, frame: &LineFrame) -> f32 {
        if frame.is_active {
            1.0
        } else if frame.is_hovered {
            self.config.inactive_alpha.max(HOVER_ALPHA)
        } else {
            self.config.inactive_alpha
        }
    }

    fn draw_flat(
        &self,
        surface: &mut Pixmap,
        word: &WordLayout,
        frame: &LineFrame,
        glyphs: &mut GlyphSpriteCache,
        rasterizer: &dyn GlyphRasterizer,
        font_px: f32,
    ) {
        let Some(cached) = glyphs.word(rasterizer, &word.text, font_px) else {
            return;
        };
        let sprite = &cached.sprite;
        let (x, y) = sprite_origin(word, frame.scale, sprite.pad);
        draw_sprite(
            surface,
            &sprite.pixmap,
            Transform::from_translate(x, y),
            self.flat_alpha(frame),
        );
    }

    fn draw_sweep(
        &self,
        surface: &mut Pixmap,
        word: &WordLayout,
        frame: &LineFrame,
        glyphs: &mut GlyphSpriteCache,
        rasterizer: &dyn GlyphRasterizer,
        font_px: f32,
    ) {
        let Some(cached) = glyphs.word(rasterizer, &word.text, font_px) else {
            return;
        };
        let sprite = &cached.sprite;
        let progress = word.progress_at(frame.time);
        let (x, y) = sprite_origin(word, frame.scale, sprite.pad);

        // Lift and skew peak mid-word and settle at completion
        let bump = (PI * progress).sin();
        let lift = self.config.lift * font_px * bump;
        let skew = -self.config.skew * bump;
        let baseline = sprite.pad as f32 + sprite.baseline;
        let transform = Transform::from_translate(x, y - lift + baseline)
            .pre_concat(Transform::from_skew(skew, 0.0))
            .pre_translate(0.0, -baseline);

        draw_sprite(surface, &sprite.pixmap, transform, self.config.dim_alpha);
        if progress <= 0.0 {
            return;
        }
        if progress >= 1.0 {
            draw_sprite(surface, &sprite.pixmap, transform, 1.0);
            return;
        }

        let fade = self.config.sweep_fade * font_px;
        let edge = sprite.pad as f32 + progress * (word.width * frame.scale + fade);
        let mut bright = sprite.pixmap.clone();
        mask_left_of(&mut bright, edge - fade, edge);
        draw_sprite(surface, &bright, transform, 1.0);
    }

    fn draw_glow(
        &self,
        surface: &mut Pixmap,
        word: &WordLayout,
        frame: &LineFrame,
        glyphs: &mut GlyphSpriteCache,
        rasterizer: &dyn GlyphRasterizer,
        font_px: f32,
    ) {
        let Some(cached) = glyphs.word(rasterizer, &word.text, font_px) else {
            return;
        };
        let scale = frame.scale;
        let offsets: Vec<f32> = word.char_offsets.iter().map(|o| o * scale).collect();
        let widths: Vec<f32> = word.char_widths.iter().map(|w| w * scale).collect();
        cached.ensure_chars(&offsets, &widths, self.config.glow_radius * font_px);

        let config = &self.config;
        let progress = word.progress_at(frame.time);
        let n = word.char_count();
        let intensities = wave_intensities(progress, n, config);
        let front = wave_front(progress, n, config.wave_width);

        let ramp = ((word.duration() - config.glow_min_duration) / BOOST_RAMP_SECONDS)
            .clamp(0.0, 1.0) as f32;
        let boost =
            config.min_scale_boost + (config.max_scale_boost - config.min_scale_boost) * ramp;

        let (x, y) = sprite_origin(word, scale, cached.sprite.pad);
        let center_y = y + cached.sprite.pad as f32 + font_px * 0.7;

        for (i, glyph) in cached.chars().iter().enumerate() {
            let Some(glyph) = glyph else {
                continue;
            };
            let g = intensities.get(i).copied().unwrap_or(0.0);
            let lit = if progress >= 1.0 {
                1.0
            } else {
                (front - i as f32).clamp(0.0, 1.0)
            };
            let alpha = config.dim_alpha + (1.0 - config.dim_alpha) * lit.max(g);
            let char_scale = 1.0 + (boost - 1.0) * g;
            let lift = config.lift * font_px * g;

            let half_w = glyph.pixmap.width() as f32 / 2.0;
            let center_x = x + glyph.x + half_w;
            let place = |margin: f32| {
                Transform::from_translate(center_x, center_y - lift)
                    .pre_scale(char_scale, char_scale)
                    .pre_translate(-half_w - margin, y - center_y)
            };

            if g > 0.0 {
                if let Some(Some(halo)) = cached.glows().get(i) {
                    let (soft, wide) = halo_mix(g);
                    for (copy, weight) in [(&halo.soft, soft), (&halo.wide, wide)] {
                        let opacity = config.glow_alpha * weight;
                        draw_sprite(surface, &copy.pixmap, place(copy.margin), opacity);
                    }
                }
            }
            draw_sprite(surface, &glyph.pixmap, place(0.0), alpha);
        }
    }
}

impl Default for KaraokeRenderer {
    fn default() -> Self {
        Self::new(KaraokeConfig::default())
    }
}

/// Top-left of a word's sprite in device px
fn sprite_origin(word: &WordLayout, scale: f32, pad: u32) -> (f32, f32) {
    (word.x * scale - pad as f32, word.y * scale - pad as f32)
}

fn draw_sprite(surface: &mut Pixmap, sprite: &Pixmap, transform: Transform, opacity: f32) {
    if opacity <= 0.0 {
        return;
    }
    let paint = PixmapPaint {
        opacity: opacity.min(1.0),
        blend_mode: BlendMode::SourceOver,
        quality: FilterQuality::Bilinear,
    };
    surface.draw_pixmap(0, 0, sprite.as_ref(), &paint, transform, None);
}

/// Keep only what lies left of a soft edge running from `solid_until` to `clear_from`
fn mask_left_of(pixmap: &mut Pixmap, solid_until: f32, clear_from: f32) {
    let Some(rect) = Rect::from_xywh(0.0, 0.0, pixmap.width() as f32, pixmap.height() as f32)
    else {
        return;
    };
    let shader = LinearGradient::new(
        Point::from_xy(solid_until, 0.0),
        Point::from_xy(clear_from.max(solid_until + 1.0), 0.0),
        vec![
            GradientStop::new(0.0, Color::WHITE),
            GradientStop::new(1.0, Color::TRANSPARENT),
        ],
        SpreadMode::Pad,
        Transform::identity(),
    );
    let Some(shader) = shader else {
        return;
    };
    let paint = Paint {
        shader,
        blend_mode: BlendMode::DestinationIn,
        anti_alias: false,
        ..Paint::default()
    };
    pixmap.fill_rect(rect, &paint, Transform::identity(), None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::engine::layout::{LayoutMetrics, measure_line};
    use crate::engine::text_shaper::MonospaceText;
    use crate::engine::types::{LyricLine, LyricWord};

    fn word(text: &str, start: f64, end: f64) -> WordLayout {
        let chars = text.chars().count();
        WordLayout {
            text: text.into(),
            x: 10.0,
            y: 5.0,
            width: chars as f32 * 10.0,
            start_time: start,
            end_time: end,
            is_verbatim: true,
            char_widths: vec![10.0; chars],
            char_offsets: (0..chars).map(|i| i as f32 * 10.0).collect(),
            render_progress: 0.0,
            render_snapshot: None,
        }
    }

    fn frame(time: f64, is_active: bool) -> LineFrame {
        LineFrame {
            time,
            is_active,
            is_hovered: false,
            scale: 1.0,
            interlude: None,
        }
    }

    fn line_layout(line: &LyricLine) -> LineLayout {
        let metrics = LayoutMetrics::new(400.0, false, &LayoutConfig::default());
        measure_line(line, 400.0, &metrics, &MonospaceText, None)
    }

    fn surface(layout: &LineLayout) -> Pixmap {
        Pixmap::new(400, layout.height.ceil() as u32).unwrap()
    }

    #[test]
    fn test_phase_selection() {
        let config = KaraokeConfig::default();
        assert_eq!(word_phase(&word("hey", 0.0, 2.0), true, &config), WordPhase::Glow);
        assert_eq!(word_phase(&word("hey", 0.0, 0.3), true, &config), WordPhase::Sweep);
        assert_eq!(
            word_phase(&word("wonderful", 0.0, 2.0), true, &config),
            WordPhase::Sweep
        );
        assert_eq!(word_phase(&word("hey", 0.0, 2.0), false, &config), WordPhase::Flat);

        let mut untimed = word("hey", 1.0, 1.0);
        untimed.is_verbatim = false;
        assert_eq!(word_phase(&untimed, true, &config), WordPhase::Flat);
    }

    #[test]
    fn test_wave_travels_left_to_right() {
        let config = KaraokeConfig::default();
        let early = wave_intensities(0.3, 5, &config);
        let late = wave_intensities(0.7, 5, &config);
        assert!(early[0] > early[4]);
        assert!(late[4] > early[4]);
        assert!(early.iter().chain(&late).all(|g| (0.0..=1.0).contains(g)));
    }

    #[test]
    fn test_wave_is_silent_outside_word() {
        let config = KaraokeConfig::default();
        assert!(wave_intensities(0.0, 4, &config).iter().all(|g| *g == 0.0));
        assert!(wave_intensities(1.0, 4, &config).iter().all(|g| *g == 0.0));
    }

    #[test]
    fn test_halo_spreads_toward_the_front() {
        assert_eq!(halo_mix(0.0), (0.0, 0.0));
        assert_eq!(halo_mix(1.0), (0.0, 1.0));
        let (soft, wide) = halo_mix(0.25);
        assert!(soft > wide);
        assert!((soft + wide - 0.25).abs() < 1e-6);
        let (soft, wide) = halo_mix(0.8);
        assert!(wide > soft);
    }

    #[test]
    fn test_inactive_line_draws_once() {
        let renderer = KaraokeRenderer::default();
        let mut glyphs = GlyphSpriteCache::new([255; 3]);
        let line = LyricLine::with_words(
            0.0,
            vec![LyricWord::new("hello ", 0.0, 0.5), LyricWord::new("world", 0.5, 1.0)],
        );
        let mut layout = line_layout(&line);
        let mut pixmap = surface(&layout);
        let mut state = LineRenderState::default();

        let first = frame(0.2, false);
        assert!(renderer.needs_redraw(&layout, &state, &first));
        renderer.render(
            &mut pixmap,
            &mut layout,
            &mut state,
            &first,
            &mut glyphs,
            &MonospaceText,
        );
        assert!(pixmap.pixels().iter().any(|p| p.alpha() > 0));

        assert!(!renderer.needs_redraw(&layout, &state, &frame(0.7, false)));
        assert!(renderer.needs_redraw(&layout, &state, &frame(0.7, true)));
    }

    #[test]
    fn test_sweep_redraws_only_on_visible_progress() {
        let renderer = KaraokeRenderer::default();
        let mut glyphs = GlyphSpriteCache::new([255; 3]);
        let line = LyricLine::with_words(0.0, vec![LyricWord::new("wonderful", 0.0, 1.0)]);
        let mut layout = line_layout(&line);
        let mut pixmap = surface(&layout);
        let mut state = LineRenderState::default();

        renderer.render(
            &mut pixmap,
            &mut layout,
            &mut state,
            &frame(0.5,
            true),
            &mut glyphs,
            &MonospaceText,
        );
        assert!(!renderer.needs_redraw(&layout, &state, &frame(0.5001, true)));
        assert!(renderer.needs_redraw(&layout, &state, &frame(0.52, true)));
    }

    #[test]
    fn test_sweep_lights_left_side_first() {
        let renderer = KaraokeRenderer::default();
        let mut glyphs = GlyphSpriteCache::new([255; 3]);
        let line = LyricLine::with_words(0.0, vec![LyricWord::new("wonderful", 0.0, 1.0)]);
        let mut layout = line_layout(&line);
        let mut pixmap = surface(&layout);
        let mut state = LineRenderState::default();

        renderer.render(
            &mut pixmap,
            &mut layout,
            &mut state,
            &frame(0.5,
            true),
            &mut glyphs,
            &MonospaceText,
        );
        let w = &layout.words[0];
        let row = (w.y + layout.font_size * 0.7) as u32;
        let first_char = (w.x + w.char_offsets[0] + w.char_widths[0] / 2.0) as u32;
        let last_char = (w.x + w.char_offsets[8] + w.char_widths[8] / 2.0) as u32;
        let left = pixmap.pixel(first_char, row).unwrap().alpha();
        let right = pixmap.pixel(last_char, row).unwrap().alpha();
        assert!(left > right, "left {left} right {right}");
        assert!(right > 0, "dim base copy is drawn");
    }

    #[test]
    fn test_glow_samples_are_rate_limited() {
        let renderer = KaraokeRenderer::default();
        let mut glyphs = GlyphSpriteCache::new([255; 3]);
        let line = LyricLine::with_words(0.0, vec![LyricWord::new("hey", 0.0, 2.0)]);
        let mut layout = line_layout(&line);
        let mut pixmap = surface(&layout);
        let mut state = LineRenderState::default();

        renderer.render(
            &mut pixmap,
            &mut layout,
            &mut state,
            &frame(1.0,
            true),
            &mut glyphs,
            &MonospaceText,
        );
        assert_eq!(layout.words[0].render_snapshot.unwrap().phase, WordPhase::Glow);
        // Progress moved past the threshold but the glow interval has not elapsed
        assert!(!renderer.needs_redraw(&layout, &state, &frame(1.02, true)));
        assert!(renderer.needs_redraw(&layout, &state, &frame(1.06, true)));
        // Completion always repaints
        assert!(renderer.needs_redraw(&layout, &state, &frame(2.01, true)));
    }

    #[test]
    fn test_interlude_draws_dots() {
        let renderer = KaraokeRenderer::default();
        let mut glyphs = GlyphSpriteCache::new([255; 3]);
        let mut layout = line_layout(&LyricLine::interlude(0.0));
        let mut pixmap = surface(&layout);
        let mut state = LineRenderState::default();
        let dots = LineFrame {
            interlude: Some((2.5, 6.0)),
            ..frame(2.5, true)
        };
        renderer.render(
            &mut pixmap,
            &mut layout,
            &mut state,
            &dots,
            &mut glyphs,
            &MonospaceText,
        );
        assert!(pixmap.pixels().iter().any(|p| p.alpha() > 0));
        assert!(renderer.needs_redraw(&layout, &state, &LineFrame { time: 2.6, ..dots }));
    }
}
