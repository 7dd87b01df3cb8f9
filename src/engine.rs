//! Lyrics render engine
//!
//! Frame-driven renderer for synchronized lyrics: a scrolling stack of lines
//! that springs toward the active line, recedes with distance, and highlights
//! words in time with playback.
//!
//! ## Frame pipeline
//!
//! Each [`LyricsEngine::frame`] call runs, in order:
//! 1. visual clock advance (jump detection forces a camera scrub)
//! 2. active line resolution from the reported playback time
//! 3. interlude height animation and stack positions
//! 4. camera update and per-line springs
//! 5. culling, hover and lens falloff
//! 6. karaoke redraw of visible line surfaces
//! 7. compositing onto the shared output with the edge fade
//!
//! The engine never reads a wall clock; "now" is the sum of the `dt` values
//! it has been given. Inputs (lyrics, playback state, pointer events) are
//! pushed in and take effect on the next frame.

pub mod blur;
pub mod compositor;
pub mod glyph_cache;
pub mod interlude_dots;
pub mod karaoke;
pub mod layout;
pub mod lens;
pub mod line_animation;
pub mod physics;
pub mod spring;
pub mod text_shaper;
pub mod types;
pub mod visual_time;
pub mod word_splitter;

pub use lens::{Falloff, LensModel};
pub use line_animation::{LineAnimator, LinePhysicsState};
pub use physics::{InteractionState, ScrollController, ScrollMode};
pub use spring::{SpringConfig, SpringState, SpringSystem};
pub use text_shaper::{CosmicText, GlyphRasterizer, MonospaceText, TextBackend, TextMeasurer};
pub use types::{
    LineId, LineLayout, LineRect, LyricLine, LyricWord, PlaybackState, PointerKind, SeekRequest,
    Viewport,
};
pub use visual_time::VisualClock;

use std::sync::Arc;

use tiny_skia::Pixmap;

use crate::config::EngineConfig;

use compositor::{BlurCache, Compositor};
use glyph_cache::GlyphSpriteCache;
use karaoke::{KaraokeRenderer, LineFrame, LineRenderState};
use layout::{LayoutMetrics, PeerWidthWindow, measure_line};
use line_animation::LineTarget;
use physics::{CameraFrame, PointerRelease};
use spring::Num;
use types::find_active_index;

/// Render state of one line
#[derive(Debug)]
struct LineSlot {
    layout: LineLayout,
    /// Private surface in device pixels; dropped while culled
    surface: Option<Pixmap>,
    /// Bumped on every repaint
    version: u64,
    render: LineRenderState,
    blur: BlurCache,
    /// Height used for stacking (interludes animate it)
    current_height: f32,
    /// Physical rect from the last frame, logical px
    rect: LineRect,
    visible: bool,
    hovered: bool,
    falloff: Falloff,
}

impl LineSlot {
    fn new() -> Self {
        Self {
            layout: LineLayout::default(),
            surface: None,
            version: 0,
            render: LineRenderState::default(),
            blur: BlurCache::default(),
            current_height: 0.0,
            rect: LineRect::default(),
            visible: false,
            hovered: false,
            falloff: Falloff::SHARP,
        }
    }

    fn release_surface(&mut self) {
        if self.surface.take().is_some() {
            self.render.invalidate();
            self.blur.clear();
        }
    }
}

/// Synchronized lyrics engine
pub struct LyricsEngine {
    config: EngineConfig,
    backend: Arc<dyn TextBackend>,
    viewport: Viewport,
    lines: Vec<LyricLine>,
    ids: Vec<LineId>,
    slots: Vec<LineSlot>,
    layout_dirty: bool,

    camera: ScrollController,
    interaction: InteractionState,
    animator: LineAnimator,
    clock: VisualClock,
    lens: LensModel,
    karaoke: KaraokeRenderer,
    glyphs: GlyphSpriteCache,
    compositor: Compositor,

    /// Engine time in seconds (sum of frame `dt`)
    now: f64,
    playback: PlaybackState,
    active: Option<usize>,
    /// Line marked active by a tap, until playback catches up or the deadline passes
    pending_active: Option<(usize, f64)>,
    /// Mouse position for hover, logical px
    hover_point: Option<(f32, f32)>,
}

impl LyricsEngine {
    pub fn new(config: EngineConfig, backend: Arc<dyn TextBackend>) -> Self {
        Self {
            camera: ScrollController::new(config.scroll.clone()),
            interaction: InteractionState::default(),
            animator: LineAnimator::new(),
            clock: VisualClock::from_config(&config.render),
            lens: LensModel::from_config(&config.render),
            karaoke: KaraokeRenderer::new(config.karaoke.clone()),
            glyphs: GlyphSpriteCache::new(config.render.text_color),
            compositor: Compositor::new(&config.render),
            backend,
            viewport: Viewport::default(),
            lines: Vec::new(),
            ids: Vec::new(),
            slots: Vec::new(),
            layout_dirty: true,
            now: 0.0,
            playback: PlaybackState::paused(0.0),
            active: None,
            pending_active: None,
            hover_point: None,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the track; lines are ordered by time
    ///
    /// Springs of lines that exist in both tracks are kept.
    pub fn set_lyrics(&mut self, mut lines: Vec<LyricLine>) {
        lines.sort_by(|a, b| a.time.total_cmp(&b.time));
        tracing::info!("[LyricsEngine] Loaded {} lyric lines", lines.len());

        self.ids = LineId::for_lines(&lines);
        self.animator.reconcile(&self.ids);
        self.slots = lines.iter().map(|_| LineSlot::new()).collect();
        self.lines = lines;
        self.active = None;
        self.pending_active = None;
        self.layout_dirty = true;
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    /// Host surface size; a change re-runs layout on the next frame
    pub fn resize(&mut self, viewport: Viewport) {
        if viewport == self.viewport {
            return;
        }
        tracing::debug!(
            "[LyricsEngine] viewport {}x{} @{}x",
            viewport.width,
            viewport.height,
            viewport.scale
        );
        let width_changed = viewport.width != self.viewport.width
            || viewport.scale != self.viewport.scale
            || viewport.is_touch != self.viewport.is_touch;
        self.viewport = viewport;
        if width_changed {
            self.layout_dirty = true;
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Playback state as polled from the audio element
    pub fn set_playback(&mut self, playback: PlaybackState) {
        self.playback = playback;
    }

    /// External jump; the next frame snaps clock and camera
    pub fn seek(&mut self, time: f64) {
        self.playback.current_time = time;
        self.clock.snap(time);
        self.pending_active = None;
        self.camera.scrub();
    }

    pub fn pointer_down(&mut self, kind: PointerKind, x: f32, y: f32) {
        self.track_hover(kind, x, y);
        self.camera
            .pointer_down(&mut self.interaction, kind, x, y, self.now);
    }

    pub fn pointer_move(&mut self, kind: PointerKind, x: f32, y: f32) {
        self.track_hover(kind, x, y);
        self.camera.pointer_move(&mut self.interaction, x, y, self.now);
    }

    /// Pointer release; a tap on a line yields a seek to its start
    pub fn pointer_up(&mut self, kind: PointerKind, x: f32, y: f32) -> Option<SeekRequest> {
        self.track_hover(kind, x, y);
        match self
            .camera
            .pointer_up(&mut self.interaction, x, y, self.now)
        {
            PointerRelease::Tap { x, y } => self.tap(x, y),
            PointerRelease::Drag | PointerRelease::Ignored => None,
        }
    }

    pub fn pointer_leave(&mut self) {
        self.hover_point = None;
    }

    /// Wheel delta in logical px
    pub fn wheel(&mut self, delta_y: f32) {
        self.camera.wheel(&mut self.interaction, delta_y, self.now);
    }

    fn track_hover(&mut self, kind: PointerKind, x: f32, y: f32) {
        self.hover_point = match kind {
            PointerKind::Mouse => Some((x, y)),
            PointerKind::Touch(_) => None,
        };
    }

    fn tap(&mut self, x: f32, y: f32) -> Option<SeekRequest> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.visible && slot.rect.contains(x, y))?;
        let time = self.lines.get(index)?.time;
        tracing::debug!("[LyricsEngine] tap on line {} -> seek {:.3}s", index, time);

        self.active = Some(index);
        self.pending_active = Some((index, self.now + self.config.scroll.pending_seek_timeout));
        self.camera.resume_auto(&mut self.interaction);
        Some(SeekRequest {
            time,
            immediate: true,
        })
    }

    /// Index of the line now playing
    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn visual_time(&self) -> f64 {
        self.clock.value()
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn camera_mode(&self) -> ScrollMode {
        self.camera.mode()
    }

    pub fn camera_offset(&self) -> Num {
        self.camera.offset()
    }

    /// Physical rect of a line as of the last frame
    pub fn line_rect(&self, index: usize) -> Option<LineRect> {
        self.slots.get(index).map(|slot| slot.rect)
    }

    pub fn line_layout(&self, index: usize) -> Option<&LineLayout> {
        self.slots.get(index).map(|slot| &slot.layout)
    }

    pub fn line_state(&self, index: usize) -> Option<&LinePhysicsState> {
        self.ids.get(index).and_then(|id| self.animator.get(id))
    }

    /// Whether a line survived culling on the last frame
    pub fn is_visible(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|slot| slot.visible)
    }

    pub fn has_surface(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .is_some_and(|slot| slot.surface.is_some())
    }

    /// Composited output of the last frame
    pub fn output(&self) -> Option<&Pixmap> {
        self.compositor.output()
    }

    /// Advance and render one frame
    pub fn frame(&mut self, dt: f64) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.now += dt;
        if !self.viewport.is_valid() {
            return;
        }
        if self.layout_dirty {
            self.relayout();
        }

        if self.clock.advance(dt, &self.playback) {
            tracing::debug!(
                "[LyricsEngine] visual time jumped to {:.3}s",
                self.clock.value()
            );
            self.pending_active = None;
            self.camera.scrub();
        }
        let visual_time = self.clock.value();
        let active = self.resolve_active(self.playback.current_time);
        if active != self.active {
            tracing::debug!("[LyricsEngine] active line {:?} -> {:?}", self.active, active);
            self.active = active;
        }

        self.animate_heights(dt);
        let tops = self.line_tops();
        let focal = self.viewport.height * self.config.scroll.focal_ratio;
        let auto_target = self.update_bounds(&tops, focal);
        let camera = self
            .camera
            .update(&mut self.interaction, self.now, dt, auto_target);
        self.animate_lines(&tops, camera, dt);
        self.place_lines(focal);
        self.render_lines(visual_time);
        self.composite();
    }

    fn relayout(&mut self) {
        let width = self.viewport.width;
        let metrics = LayoutMetrics::new(width, self.viewport.is_touch, &self.config.layout);
        let mut peers = PeerWidthWindow::new(self.config.layout.peer_window);
        let measurer = self.backend.as_measurer();

        for (i, (line, slot)) in self.lines.iter().zip(self.slots.iter_mut()).enumerate() {
            let layout = measure_line(line, width, &metrics, measurer, peers.suggest());
            if !line.is_interlude {
                peers.push(layout.text_width);
            }
            slot.current_height = if line.is_interlude && self.active != Some(i) {
                0.0
            } else {
                layout.height
            };
            slot.layout = layout;
            slot.release_surface();
        }

        tracing::debug!(
            "[LyricsEngine] layout pass: {} lines at {:.0}px, font {:.1}px",
            self.lines.len(),
            width,
            metrics.font_size
        );
        self.layout_dirty = false;
    }

    fn resolve_active(&mut self, time: f64) -> Option<usize> {
        let computed = find_active_index(&self.lines, time);
        if let Some((index, deadline)) = self.pending_active {
            if computed == Some(index) || self.now >= deadline || index >= self.lines.len() {
                self.pending_active = None;
            } else {
                return Some(index);
            }
        }
        computed
    }

    /// Interludes open while active and collapse otherwise
    fn animate_heights(&mut self, dt: f64) {
        let blend = 1.0 - (-(dt as f32) * self.config.render.interlude_height_rate).exp();
        for (i, (line, slot)) in self.lines.iter().zip(self.slots.iter_mut()).enumerate() {
            if !line.is_interlude {
                slot.current_height = slot.layout.height;
                continue;
            }
            let target = if self.active == Some(i) {
                slot.layout.height
            } else {
                0.0
            };
            slot.current_height += (target - slot.current_height) * blend;
            if (target - slot.current_height).abs() < 0.01 {
                slot.current_height = target;
            }
        }
    }

    /// Stack position of each line's top, logical px
    fn line_tops(&self) -> Vec<f32> {
        let mut top = 0.0f32;
        self.slots
            .iter()
            .map(|slot| {
                let this = top;
                top += slot.current_height;
                this
            })
            .collect()
    }

    /// Bound the camera to the stack and return the auto-follow target
    fn update_bounds(&mut self, tops: &[f32], focal: f32) -> Option<Num> {
        let (first, last) = (self.slots.first()?, self.slots.last()?);
        let last_top = tops.last().copied().unwrap_or(0.0);
        let min = focal - (last_top + last.current_height / 2.0);
        let max = focal - first.current_height / 2.0;
        self.camera.set_bounds(min as Num, max as Num);

        let anchor = self.active.unwrap_or(0);
        let slot = self.slots.get(anchor)?;
        let top = tops.get(anchor).copied().unwrap_or(0.0);
        Some((focal - (top + slot.current_height / 2.0)) as Num)
    }

    fn animate_lines(&mut self, tops: &[f32], camera: CameraFrame, dt: f64) {
        let render = &self.config.render;
        let active = self.active;
        let targets: Vec<LineTarget> = self
            .ids
            .iter()
            .zip(tops)
            .enumerate()
            .map(|(i, (id, top))| {
                let is_active = active == Some(i);
                LineTarget {
                    id: *id,
                    y: camera.offset + *top as Num,
                    scale: if is_active {
                        render.active_scale
                    } else {
                        render.inactive_scale
                    },
                    distance: match active {
                        Some(a) => i as isize - a as isize,
                        None => i as isize + 1,
                    },
                }
            })
            .collect();
        self.animator
            .update(&targets, dt, camera.snap_lines, &self.config.scroll);
    }

    /// Physical rects, culling, hover and falloff
    fn place_lines(&mut self, focal: f32) {
        let viewport = self.viewport;
        let margin = self.config.render.cull_margin;
        let hover = self
            .hover_point
            .filter(|_| !viewport.is_touch && !self.interaction.is_dragging);

        for (i, (id, slot)) in self.ids.iter().zip(self.slots.iter_mut()).enumerate() {
            let y = self.animator.get(id).map(|state| state.y()).unwrap_or(0.0);
            slot.rect = LineRect {
                x: 0.0,
                y,
                width: viewport.width,
                height: slot.current_height,
            };
            slot.visible =
                slot.current_height > 0.5 && !slot.rect.is_outside(viewport.height, margin);
            slot.hovered = slot.visible && hover.is_some_and(|(x, y)| slot.rect.contains(x, y));

            slot.falloff = if self.active == Some(i) {
                Falloff::SHARP
            } else {
                let (_, center_y) = slot.rect.center();
                let distance = LensModel::normalized_distance(center_y, focal, viewport.height);
                self.lens.falloff(distance, viewport.is_touch)
            };
            if slot.hovered {
                slot.falloff = LensModel::hovered(slot.falloff);
            }
        }
    }

    fn render_lines(&mut self, visual_time: f64) {
        let scale = self.viewport.scale;
        let rasterizer = self.backend.as_rasterizer();

        for (i, slot) in self.slots.iter_mut().enumerate() {
            if !slot.visible {
                slot.release_surface();
                continue;
            }

            let width = (slot.layout.container_width * scale).ceil().max(1.0) as u32;
            let height = (slot.layout.height * scale).ceil().max(1.0) as u32;
            let fits = slot
                .surface
                .as_ref()
                .is_some_and(|s| s.width() == width && s.height() == height);
            if !fits {
                slot.surface = Pixmap::new(width, height);
                slot.render.invalidate();
                slot.blur.clear();
            }
            let Some(surface) = slot.surface.as_mut() else {
                continue;
            };

            let line = &self.lines[i];
            let is_active = self.active == Some(i);
            // Inactive lines follow raw playback time so they rarely repaint
            let time = if is_active {
                visual_time
            } else {
                self.playback.current_time
            };
            let interlude = line.is_interlude.then(|| {
                let end = self.lines.get(i + 1).map_or(line.time, |next| next.time);
                ((time - line.time) as f32, (end - line.time) as f32)
            });
            let frame = LineFrame {
                time,
                is_active,
                is_hovered: slot.hovered,
                scale,
                interlude,
            };

            if self.karaoke.needs_redraw(&slot.layout, &slot.render, &frame) {
                self.karaoke.render(
                    surface,
                    &mut slot.layout,
                    &mut slot.render,
                    &frame,
                    &mut self.glyphs,
                    rasterizer,
                );
                slot.version += 1;
            }
        }
    }

    fn composite(&mut self) {
        let scale = self.viewport.scale;
        let (width, height) = self.viewport.device_size();
        self.compositor.begin(width, height);

        for (id, slot) in self.ids.iter().zip(self.slots.iter_mut()) {
            if !slot.visible {
                continue;
            }
            let Some(surface) = slot.surface.as_ref() else {
                continue;
            };
            let line_scale = self
                .animator
                .get(id)
                .map(|state| state.scale())
                .unwrap_or(1.0);
            let collapse = if slot.layout.height > 0.0 {
                (slot.current_height / slot.layout.height).clamp(0.0, 1.0)
            } else {
                1.0
            };
            let source = slot.blur.get(surface, slot.version, slot.falloff.blur * scale);
            self.compositor.draw_line(
                source,
                slot.rect.y,
                line_scale,
                slot.falloff.opacity * collapse,
                scale,
            );
        }
        self.compositor.finish();
    }
}
