//! Interlude dots
//!
//! Three breathing dots shown for instrumental gaps. The animation is a pure
//! function of time into the interlude, so redraws at the same instant are
//! identical.

use std::f32::consts::PI;

use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};

/// Target length of one breath in seconds
const BREATHE_PERIOD: f32 = 1.5;
/// Scale fade-in length
const FADE_IN: f32 = 2.0;
/// Scale fade-out length
const FADE_OUT: f32 = 0.75;
/// Resting scale of the dot group
const BASE_SCALE: f32 = 0.7;

fn ease_in_out_back(x: f32) -> f32 {
    const C1: f32 = 1.70158;
    const C2: f32 = C1 * 1.525;

    if x < 0.5 {
        ((2.0 * x).powi(2) * ((C2 + 1.0) * 2.0 * x - C2)) / 2.0
    } else {
        ((2.0 * x - 2.0).powi(2) * ((C2 + 1.0) * (x * 2.0 - 2.0) + C2) + 2.0) / 2.0
    }
}

fn ease_out_expo(x: f32) -> f32 {
    if x >= 1.0 {
        1.0
    } else {
        1.0 - 2.0_f32.powf(-10.0 * x)
    }
}

/// Animated state of the dots at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DotsFrame {
    /// Group scale; zero hides the dots
    pub scale: f32,
    pub opacities: [f32; 3],
}

impl DotsFrame {
    pub fn is_visible(&self) -> bool {
        self.scale > 0.0 && self.opacities.iter().any(|o| *o > 0.0)
    }
}

/// Sample the dots `elapsed` seconds into an interlude lasting `duration`
pub fn sample(elapsed: f32, duration: f32) -> DotsFrame {
    if !(0.0..=duration).contains(&elapsed) || duration <= 0.0 {
        return DotsFrame::default();
    }

    let breathe = duration / (duration / BREATHE_PERIOD).ceil().max(1.0);
    let mut scale = (1.5 * PI - (elapsed / breathe) * 2.0).sin() / 20.0 + 1.0;
    let mut opacity = 1.0f32;

    if elapsed < FADE_IN {
        scale *= ease_out_expo(elapsed / FADE_IN);
    }
    if elapsed < 0.5 {
        opacity = 0.0;
    } else if elapsed < 1.0 {
        opacity = (elapsed - 0.5) / 0.5;
    }

    let remaining = duration - elapsed;
    if remaining < FADE_OUT {
        scale *= 1.0 - ease_in_out_back((FADE_OUT - remaining) / FADE_OUT / 2.0);
    }
    if remaining < FADE_OUT / 2.0 {
        opacity *= (remaining / (FADE_OUT / 2.0)).clamp(0.0, 1.0);
    }

    // Dots light up one after another over the body of the interlude
    let lit = (duration - FADE_OUT).max(f32::EPSILON);
    let dot = |index: f32| {
        let local = (elapsed - lit / 3.0 * index) * 3.0 / lit;
        (local * 0.75).clamp(0.25, 1.0) * opacity
    };

    DotsFrame {
        scale: scale.max(0.0) * BASE_SCALE,
        opacities: [dot(0.0), dot(1.0), dot(2.0)],
    }
}

/// Draw the dots left-aligned at `(x, center_y)` in device pixels
pub fn draw(
    pixmap: &mut Pixmap,
    frame: &DotsFrame,
    x: f32,
    center_y: f32,
    dot_radius: f32,
    rgb: [u8; 3],
) {
    if !frame.is_visible() {
        return;
    }

    let spacing = dot_radius * 3.0;
    let group_width = spacing * 2.0 + dot_radius * 2.0;
    // Scale around the group's centre
    let origin_x = x + group_width / 2.0;
    let transform = Transform::from_translate(origin_x, center_y)
        .pre_scale(frame.scale, frame.scale)
        .pre_translate(-group_width / 2.0, 0.0);

    for (i, opacity) in frame.opacities.iter().enumerate() {
        if *opacity <= 0.0 {
            continue;
        }
        let cx = dot_radius + spacing * i as f32;
        let Some(path) = PathBuilder::from_circle(cx, 0.0, dot_radius) else {
            continue;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(rgb[0], rgb[1], rgb[2], (opacity * 255.0).round() as u8);
        paint.anti_alias = true;
        pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
    }
}
