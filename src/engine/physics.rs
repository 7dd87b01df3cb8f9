//! Camera controller for lyrics scrolling
//!
//! One spring channel (`scrollY`) holds the offset added to every line's
//! layout position. Three modes decide how it moves:
//! - Auto-follow: springs toward the position that centres the active line
//!   at the focal ratio
//! - User scrolling: follows the pointer, then coasts with geometric decay;
//!   lasts until the resume delay has passed since the last interaction
//! - Scrub lock: the next frame snaps straight to the auto target
//!
//! The interaction bookkeeping is an explicit [`InteractionState`] owned by the
//! caller and handed to every handler, so independent views never share it.

use crate::config::ScrollConfig;

use super::spring::{Num, SpringConfig, SpringSystem};
use super::types::PointerKind;

/// Spring channel of the camera
pub const SCROLL_CHANNEL: &str = "scrollY";

/// Camera state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollMode {
    /// Tracking the active line
    AutoFollow,
    /// Dragging, coasting, or waiting out the resume delay
    UserScrolling,
    /// Snap on the next frame (seek)
    ScrubLock,
}

/// Ephemeral pointer bookkeeping, reset on each drag start and end
#[derive(Debug, Clone, Default)]
pub struct InteractionState {
    pub is_dragging: bool,
    /// Engine time (seconds) of the last pointer or wheel event
    pub last_interaction_time: Option<f64>,
    /// Last pointer position in logical px
    pub last_pointer: Option<(f32, f32)>,
    /// Instantaneous drag velocity (px/s)
    pub touch_velocity: Num,
    pub pointer: Option<PointerKind>,
    press_origin: Option<(f32, f32)>,
    moved_beyond_slop: bool,
    last_move_time: f64,
}

impl InteractionState {
    fn stamp(&mut self, now: f64) {
        self.last_interaction_time = Some(now);
    }
}

/// What a pointer release amounted to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerRelease {
    /// Pressed and released without moving; position in logical px
    Tap { x: f32, y: f32 },
    /// End of a drag
    Drag,
    /// No press was in progress
    Ignored,
}

/// Result of one camera update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    /// Camera offset to add to layout positions
    pub offset: Num,
    /// Lines should jump to their targets instead of springing
    pub snap_lines: bool,
    pub moving: bool,
}

/// Scroll/camera controller
#[derive(Debug, Clone)]
pub struct ScrollController {
    springs: SpringSystem<&'static str>,
    mode: ScrollMode,
    /// Residual velocity while coasting (px/s)
    coast_velocity: Num,
    /// Allowed camera range `(min, max)`
    bounds: (Num, Num),
    config: ScrollConfig,
}

impl ScrollController {
    pub fn new(config: ScrollConfig) -> Self {
        let mut springs = SpringSystem::new();
        springs.set_value(&SCROLL_CHANNEL, 0.0);
        Self {
            springs,
            mode: ScrollMode::AutoFollow,
            coast_velocity: 0.0,
            bounds: (Num::MIN, Num::MAX),
            config,
        }
    }

    pub fn mode(&self) -> ScrollMode {
        self.mode
    }

    pub fn offset(&self) -> Num {
        self.springs.value(&SCROLL_CHANNEL).unwrap_or(0.0)
    }

    pub fn config(&self) -> &ScrollConfig {
        &self.config
    }

    fn spring_config(&self) -> SpringConfig {
        SpringConfig::new(1.0, self.config.camera_stiffness, self.config.camera_damping)
    }

    /// Set the camera range; `min <= max` is enforced by swapping
    pub fn set_bounds(&mut self, min: Num, max: Num) {
        self.bounds = if min <= max { (min, max) } else { (max, min) };
    }

    /// Overscroll past the nearest bound (zero when inside)
    fn overscroll(&self, value: Num) -> Num {
        let (min, max) = self.bounds;
        if value < min {
            min - value
        } else if value > max {
            value - max
        } else {
            0.0
        }
    }

    /// Drag resistance once out of bounds: `1 / (1 + (over / max_over)^2)`
    fn resistance(&self, value: Num) -> Num {
        let over = self.overscroll(value);
        if over <= 0.0 {
            1.0
        } else {
            1.0 / (1.0 + (over / self.config.max_overscroll.max(1.0)).powi(2))
        }
    }

    /// Move the camera by `delta` under direct user control
    fn shift(&mut self, delta: Num) {
        let current = self.offset();
        let moved = current + delta * self.resistance(current);
        self.springs.set_value(&SCROLL_CHANNEL, moved);
    }

    fn enter_user_mode(&mut self) {
        if self.mode != ScrollMode::UserScrolling {
            tracing::debug!("[ScrollController] user scrolling");
        }
        self.mode = ScrollMode::UserScrolling;
    }

    pub fn pointer_down(
        &mut self,
        interaction: &mut InteractionState,
        kind: PointerKind,
        x: f32,
        y: f32,
        now: f64,
    ) {
        interaction.is_dragging = true;
        interaction.pointer = Some(kind);
        interaction.last_pointer = Some((x, y));
        interaction.press_origin = Some((x, y));
        interaction.moved_beyond_slop = false;
        interaction.touch_velocity = 0.0;
        interaction.last_move_time = now;
        interaction.stamp(now);

        // Grab the camera where it is
        let current = self.offset();
        self.springs.set_value(&SCROLL_CHANNEL, current);
        self.coast_velocity = 0.0;
        self.enter_user_mode();
    }

    pub fn pointer_move(&mut self, interaction: &mut InteractionState, x: f32, y: f32, now: f64) {
        interaction.stamp(now);
        if !interaction.is_dragging {
            return;
        }
        let Some((_, last_y)) = interaction.last_pointer else {
            return;
        };
        interaction.last_pointer = Some((x, y));

        if let Some((ox, oy)) = interaction.press_origin {
            let travel = ((x - ox).powi(2) + (y - oy).powi(2)).sqrt();
            if travel > self.config.tap_slop {
                interaction.moved_beyond_slop = true;
            }
        }
        if !interaction.moved_beyond_slop {
            return;
        }

        let dy = (y - last_y) as Num;
        self.shift(dy);

        let elapsed = now - interaction.last_move_time;
        if elapsed > 0.0 {
            let instant = dy / elapsed;
            // Light smoothing against jittery event timing
            interaction.touch_velocity = interaction.touch_velocity * 0.2 + instant * 0.8;
        }
        interaction.last_move_time = now;
    }

    pub fn pointer_up(
        &mut self,
        interaction: &mut InteractionState,
        x: f32,
        y: f32,
        now: f64,
    ) -> PointerRelease {
        if !interaction.is_dragging {
            return PointerRelease::Ignored;
        }
        interaction.is_dragging = false;
        interaction.press_origin = None;
        interaction.last_pointer = Some((x, y));
        interaction.stamp(now);

        if interaction.moved_beyond_slop {
            // A pause before release cancels the fling
            let idle = now - interaction.last_move_time;
            self.coast_velocity = if idle > 0.1 {
                0.0
            } else {
                interaction.touch_velocity
            };
            interaction.touch_velocity = 0.0;
            PointerRelease::Drag
        } else {
            interaction.touch_velocity = 0.0;
            PointerRelease::Tap { x, y }
        }
    }

    /// Wheel delta in logical px; positive scrolls toward later lines
    pub fn wheel(&mut self, interaction: &mut InteractionState, delta_y: f32, now: f64) {
        interaction.stamp(now);
        self.coast_velocity = 0.0;
        self.enter_user_mode();
        self.shift(-(delta_y as Num) * self.config.wheel_multiplier);
    }

    /// External jump (seek): snap on the next update
    ///
    /// While the user holds the camera the jump is left to auto-follow once
    /// the resume delay runs out.
    pub fn scrub(&mut self) {
        if self.mode == ScrollMode::UserScrolling {
            tracing::debug!("[ScrollController] scrub deferred to user scrolling");
            return;
        }
        tracing::debug!("[ScrollController] scrub lock");
        self.coast_velocity = 0.0;
        self.mode = ScrollMode::ScrubLock;
    }

    /// Return to auto-follow right away (tap-to-seek)
    pub fn resume_auto(&mut self, interaction: &mut InteractionState) {
        interaction.is_dragging = false;
        interaction.last_interaction_time = None;
        self.coast_velocity = 0.0;
        if self.mode != ScrollMode::AutoFollow {
            tracing::debug!("[ScrollController] auto-follow");
        }
        self.mode = ScrollMode::AutoFollow;
    }

    /// Advance one frame
    ///
    /// `auto_target` is the offset that centres the active line at the focal
    /// point; it is ignored while the user is in control.
    pub fn update(
        &mut self,
        interaction: &mut InteractionState,
        now: f64,
        dt: Num,
        auto_target: Option<Num>,
    ) -> CameraFrame {
        match self.mode {
            ScrollMode::ScrubLock => {
                if let Some(target) = auto_target {
                    self.springs.set_value(&SCROLL_CHANNEL, self.clamp(target));
                }
                self.mode = ScrollMode::AutoFollow;
                return CameraFrame {
                    offset: self.offset(),
                    snap_lines: true,
                    moving: false,
                };
            }
            ScrollMode::UserScrolling => {
                if interaction.is_dragging {
                    return CameraFrame {
                        offset: self.offset(),
                        snap_lines: true,
                        moving: true,
                    };
                }
                self.coast(dt);

                let idle = interaction
                    .last_interaction_time
                    .is_none_or(|t| now - t >= self.config.resume_delay);
                if idle {
                    tracing::debug!("[ScrollController] auto-follow");
                    self.mode = ScrollMode::AutoFollow;
                    self.coast_velocity = 0.0;
                }
            }
            ScrollMode::AutoFollow => {
                if let Some(target) = auto_target {
                    let config = self.spring_config();
                    let target = self.clamp(target);
                    self.springs.set_target(&SCROLL_CHANNEL, target, config);
                }
            }
        }

        let moving = self.springs.update(dt) || self.coast_velocity != 0.0;
        CameraFrame {
            offset: self.offset(),
            snap_lines: false,
            moving,
        }
    }

    /// Inertial coasting and spring-back after a release
    fn coast(&mut self, dt: Num) {
        let current = self.offset();
        let (min, max) = self.bounds;

        if self.overscroll(current) > 0.0 {
            // Released out of bounds: spring back, dropping momentum
            self.coast_velocity = 0.0;
            let config = self.spring_config();
            self.springs
                .set_target(&SCROLL_CHANNEL, current.clamp(min, max), config);
            return;
        }

        if self.coast_velocity.abs() < self.config.min_coast_velocity {
            self.coast_velocity = 0.0;
            // Target tracks the channel so the spring never fights the user
            if let Some(state) = self.springs.get_mut(&SCROLL_CHANNEL) {
                state.target = state.current;
                state.velocity = 0.0;
            }
            return;
        }

        let next = current + self.coast_velocity * dt * self.resistance(current);
        self.springs.set_value(&SCROLL_CHANNEL, next);
        self.coast_velocity *= self.config.drag_decay;
    }

    fn clamp(&self, value: Num) -> Num {
        let (min, max) = self.bounds;
        value.clamp(min, max)
    }
}
