//! Lens model for distance-based falloff
//!
//! Inactive lines fade and blur with their distance from the focal point,
//! so the active line reads sharp while the rest of the stack recedes.

use crate::config::RenderConfig;

/// Opacity assigned to a hovered line at minimum
const HOVER_OPACITY: f32 = 0.85;

/// Visual properties of one line for this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Falloff {
    pub opacity: f32,
    /// Blur radius in logical pixels
    pub blur: f32,
}

impl Falloff {
    pub const SHARP: Self = Self {
        opacity: 1.0,
        blur: 0.0,
    };
}

/// Lens model for calculating falloff from position
#[derive(Debug, Clone, Copy)]
pub struct LensModel {
    /// Opacity of the farthest inactive line
    min_opacity: f32,
    /// Blur radius at normalized distance 1
    max_blur: f32,
}

impl LensModel {
    pub fn new(min_opacity: f32, max_blur: f32) -> Self {
        Self {
            min_opacity: min_opacity.clamp(0.0, 1.0),
            max_blur: max_blur.max(0.0),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.min_opacity, config.max_blur)
    }

    /// Distance from the focal point normalized by the larger viewport half
    pub fn normalized_distance(center_y: f32, focal_y: f32, viewport_height: f32) -> f32 {
        let reach = focal_y.max(viewport_height - focal_y).max(1.0);
        ((center_y - focal_y).abs() / reach).clamp(0.0, 1.0)
    }

    /// Falloff of an inactive line
    ///
    /// `opacity = min + (1 - min) * (1 - d^0.5)`; blur grows linearly with `d`
    /// and is skipped on touch layouts.
    pub fn falloff(&self, norm_dist: f32, is_touch: bool) -> Falloff {
        let d = norm_dist.clamp(0.0, 1.0);
        let opacity = self.min_opacity + (1.0 - self.min_opacity) * (1.0 - d.sqrt());
        let blur = if is_touch { 0.0 } else { d * self.max_blur };
        Falloff { opacity, blur }
    }

    /// Hovered lines are lifted out of the falloff
    pub fn hovered(falloff: Falloff) -> Falloff {
        Falloff {
            opacity: falloff.opacity.max(HOVER_OPACITY),
            blur: 0.0,
        }
    }
}

impl Default for LensModel {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}
