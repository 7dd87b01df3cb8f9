//! Frame compositing
//!
//! Line surfaces are drawn onto a transparent layer (translate, then scale
//! around the line's vertical centre), the layer is faded at the top and
//! bottom edges, and the result is laid over the background on the shared
//! output surface.

use tiny_skia::{
    BlendMode, Color, FilterQuality, GradientStop, LinearGradient, Mask, MaskType, Paint, Pixmap,
    PixmapPaint, Point, Rect, SpreadMode, Transform,
};

use crate::config::RenderConfig;

use super::blur;

/// Blurred copy of a line surface, reused while the surface and radius hold
#[derive(Debug, Clone, Default)]
pub struct BlurCache {
    key: Option<(u64, usize)>,
    pixmap: Option<Pixmap>,
}

impl BlurCache {
    /// `surface` blurred by `radius_px`; the surface itself below half a pixel
    pub fn get<'a>(&'a mut self, surface: &'a Pixmap, version: u64, radius_px: f32) -> &'a Pixmap {
        let radius = blur::box_radius(radius_px);
        if radius == 0 {
            return surface;
        }
        let key = (version, radius);
        if self.key != Some(key) || self.pixmap.is_none() {
            let mut copy = surface.clone();
            blur::box_blur(&mut copy, radius, blur::PASSES);
            self.pixmap = Some(copy);
            self.key = Some(key);
        }
        self.pixmap.as_ref().unwrap_or(surface)
    }

    pub fn clear(&mut self) {
        self.key = None;
        self.pixmap = None;
    }
}

/// Composites line surfaces into the output
#[derive(Debug)]
pub struct Compositor {
    layer: Option<Pixmap>,
    output: Option<Pixmap>,
    fade: Option<(u32, u32, Mask)>,
    fade_ratio: f32,
    background: [u8; 4],
}

impl Compositor {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            layer: None,
            output: None,
            fade: None,
            fade_ratio: config.fade_ratio.clamp(0.0, 0.5),
            background: config.background,
        }
    }

    /// Last finished frame
    pub fn output(&self) -> Option<&Pixmap> {
        self.output.as_ref()
    }

    /// Start a frame of `width x height` device pixels
    pub fn begin(&mut self, width: u32, height: u32) {
        let fits = self
            .layer
            .as_ref()
            .is_some_and(|layer| layer.width() == width && layer.height() == height);
        if fits {
            if let Some(layer) = self.layer.as_mut() {
                layer.fill(Color::TRANSPARENT);
            }
            return;
        }
        tracing::debug!("[Compositor] allocating {}x{} surfaces", width, height);
        self.layer = Pixmap::new(width, height);
        self.output = Pixmap::new(width, height);
    }

    /// Draw one line surface
    ///
    /// `top` is the line's top in logical px; the surface is scaled by
    /// `line_scale` around its vertical centre.
    pub fn draw_line(
        &mut self,
        surface: &Pixmap,
        top: f32,
        line_scale: f32,
        opacity: f32,
        device_scale: f32,
    ) {
        let Some(layer) = self.layer.as_mut() else {
            return;
        };
        if opacity <= 0.0 {
            return;
        }
        let half_h = surface.height() as f32 / 2.0;
        let transform = Transform::from_translate(0.0, top * device_scale + half_h)
            .pre_scale(line_scale, line_scale)
            .pre_translate(0.0, -half_h);
        let paint = PixmapPaint {
            opacity: opacity.min(1.0),
            blend_mode: BlendMode::SourceOver,
            quality: FilterQuality::Bilinear,
        };
        layer.draw_pixmap(0, 0, surface.as_ref(), &paint, transform, None);
    }

    /// Fade the layer edges and lay it over the background
    pub fn finish(&mut self) {
        let Some(layer) = self.layer.as_mut() else {
            return;
        };
        let (width, height) = (layer.width(), layer.height());
        let stale = !matches!(&self.fade, Some((w, h, _)) if *w == width && *h == height);
        if stale && self.fade_ratio > 0.0 {
            self.fade = fade_mask(width, height, self.fade_ratio).map(|mask| (width, height, mask));
        }
        if let Some((_, _, mask)) = &self.fade {
            layer.apply_mask(mask);
        }

        let Some(output) = self.output.as_mut() else {
            return;
        };
        let [r, g, b, a] = self.background;
        output.fill(Color::from_rgba8(r, g, b, a));
        output.draw_pixmap(
            0,
            0,
            layer.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
}

/// Vertical alpha ramp: clear at both edges, opaque between `ratio` and `1 - ratio`
fn fade_mask(width: u32, height: u32, ratio: f32) -> Option<Mask> {
    let mut ramp = Pixmap::new(width, height)?;
    let h = height as f32;
    let shader = LinearGradient::new(
        Point::from_xy(0.0, 0.0),
        Point::from_xy(0.0, h),
        vec![
            GradientStop::new(0.0, Color::TRANSPARENT),
            GradientStop::new(ratio, Color::WHITE),
            GradientStop::new(1.0 - ratio, Color::WHITE),
            GradientStop::new(1.0, Color::TRANSPARENT),
        ],
        SpreadMode::Pad,
        Transform::identity(),
    )?;
    let paint = Paint {
        shader,
        anti_alias: false,
        ..Paint::default()
    };
    ramp.fill_rect(
        Rect::from_xywh(0.0, 0.0, width as f32, h)?,
        &paint,
        Transform::identity(),
        None,
    );
    Some(Mask::from_pixmap(ramp.as_ref(), MaskType::Alpha))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32) -> Pixmap {
        let mut pixmap = Pixmap::new(width, height).unwrap();
        pixmap.fill(Color::WHITE);
        pixmap
    }

    #[test]
    fn test_background_and_line() {
        let mut compositor = Compositor::new(&RenderConfig::default());
        compositor.begin(100, 200);
        compositor.draw_line(&solid(100, 20), 90.0, 1.0, 1.0, 1.0);
        compositor.finish();

        let output = compositor.output().unwrap();
        let line = output.pixel(50, 100).unwrap();
        assert_eq!(line.red(), 255);
        let bg = output.pixel(50, 50).unwrap();
        assert_eq!(bg.red(), RenderConfig::default().background[0]);
    }

    #[test]
    fn test_edges_fade_out() {
        let mut compositor = Compositor::new(&RenderConfig::default());
        compositor.begin(10, 200);
        compositor.draw_line(&solid(10, 200), 0.0, 1.0, 1.0, 1.0);
        compositor.finish();

        let output = compositor.output().unwrap();
        let top = output.pixel(5, 0).unwrap().red();
        let middle = output.pixel(5, 100).unwrap().red();
        assert!(top < 64, "top {top}");
        assert_eq!(middle, 255);
    }

    #[test]
    fn test_scale_is_around_vertical_centre() {
        let mut compositor = Compositor::new(&RenderConfig {
            fade_ratio: 0.0,
            ..RenderConfig::default()
        });
        compositor.begin(100, 100);
        compositor.draw_line(&solid(100, 40), 30.0, 0.5, 1.0, 1.0);
        compositor.finish();

        let output = compositor.output().unwrap();
        // Scaled to 20 px tall, centred on y = 50
        assert_eq!(output.pixel(10, 50).unwrap().red(), 255);
        assert!(output.pixel(10, 35).unwrap().red() < 255);
    }

    #[test]
    fn test_blur_cache_reuses_copy() {
        let surface = solid(20, 20);
        let mut cache = BlurCache::default();
        let first = cache.get(&surface, 1, 4.0).data().as_ptr();
        let again = cache.get(&surface, 1, 4.2).data().as_ptr();
        assert_eq!(first, again);

        assert!(std::ptr::eq(cache.get(&surface, 1, 0.1), &surface));
    }
}
