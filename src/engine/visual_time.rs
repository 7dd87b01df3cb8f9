//! Visual time smoothing
//!
//! Playback position arrives coarsely (every 50-200 ms) while frames are drawn
//! at display rate. The visual clock advances with `dt` on its own and is
//! blended toward the authoritative time:
//!
//! ```text
//! playing: visual += dt * rate
//!          visual += (target - visual) * (1 - e^(-dt / tau))
//! paused:  visual += (target - visual) * min(1, dt * ease_rate)
//! ```
//!
//! A non-finite clock or a divergence beyond the jump threshold snaps
//! immediately and is reported so the camera can re-target.

use crate::config::RenderConfig;

use super::types::PlaybackState;

/// Smoothed animation clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualClock {
    value: f64,
    tau: f64,
    jump_threshold: f64,
    paused_ease_rate: f64,
    initialized: bool,
}

impl VisualClock {
    pub fn new(tau: f64, jump_threshold: f64, paused_ease_rate: f64) -> Self {
        Self {
            value: 0.0,
            tau: tau.max(f64::EPSILON),
            jump_threshold,
            paused_ease_rate,
            initialized: false,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(
            config.visual_time_tau,
            config.jump_threshold,
            config.paused_ease_rate,
        )
    }

    /// Current smoothed time in seconds
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Jump straight to `time`
    pub fn snap(&mut self, time: f64) {
        self.value = time;
        self.initialized = true;
    }

    /// Advance one frame; returns `true` when the clock had to snap
    pub fn advance(&mut self, dt: f64, playback: &PlaybackState) -> bool {
        let target = playback.current_time;
        if !target.is_finite() {
            return false;
        }

        if !self.initialized
            || !self.value.is_finite()
            || (self.value - target).abs() > self.jump_threshold
        {
            let was_initialized = self.initialized;
            self.snap(target);
            return was_initialized;
        }

        if playback.is_playing {
            let rate = if playback.playback_rate.is_finite() {
                playback.playback_rate
            } else {
                1.0
            };
            self.value += dt * rate;
            self.value += (target - self.value) * (1.0 - (-dt / self.tau).exp());
        } else {
            let ease = (dt * self.paused_ease_rate).min(1.0);
            self.value += (target - self.value) * ease;
        }

        // Advancing on its own may overshoot a stalled clock; treat as a jump
        if (self.value - target).abs() > self.jump_threshold {
            self.snap(target);
            return true;
        }
        false
    }
}

impl Default for VisualClock {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: f64 = 1.0 / 60.0;

    #[test]
    fn test_first_sample_snaps_without_jump() {
        let mut clock = VisualClock::default();
        assert!(!clock.advance(FRAME, &PlaybackState::playing(12.0)));
        assert_eq!(clock.value(), 12.0);
    }

    #[test]
    fn test_drift_stays_bounded_with_coarse_updates() {
        let mut clock = VisualClock::default();
        let mut real = 0.0f64;
        let mut reported = 0.0f64;
        let mut since_report = 0.0f64;

        for frame in 0..60 * 120 {
            real += FRAME;
            since_report += FRAME;
            // Alternate 50 ms and 200 ms reporting gaps
            let gap = if (frame / 90) % 2 == 0 { 0.05 } else { 0.2 };
            if since_report >= gap {
                reported = real;
                since_report = 0.0;
            }
            let jumped = clock.advance(FRAME, &PlaybackState::playing(reported));
            assert!(!jumped, "unexpected jump at frame {frame}");
            assert!((clock.value() - reported).abs() < 1.0);
        }
    }

    #[test]
    fn test_seek_snaps_and_signals() {
        let mut clock = VisualClock::default();
        clock.advance(FRAME, &PlaybackState::playing(10.0));
        assert!(clock.advance(FRAME, &PlaybackState::playing(42.0)));
        assert_eq!(clock.value(), 42.0);
    }

    #[test]
    fn test_non_finite_value_recovers() {
        let mut clock = VisualClock::default();
        clock.snap(f64::NAN);
        assert!(clock.advance(FRAME, &PlaybackState::playing(3.0)));
        assert_eq!(clock.value(), 3.0);
    }

    #[test]
    fn test_paused_converges_quickly() {
        let mut clock = VisualClock::default();
        clock.advance(FRAME, &PlaybackState::paused(5.0));
        clock.advance(FRAME, &PlaybackState::paused(5.5));
        for _ in 0..60 {
            clock.advance(FRAME, &PlaybackState::paused(5.5));
        }
        assert!((clock.value() - 5.5).abs() < 1e-3);
    }

    #[test]
    fn test_playing_advances_between_reports() {
        let mut clock = VisualClock::default();
        clock.advance(FRAME, &PlaybackState::playing(1.0));
        clock.advance(FRAME, &PlaybackState::playing(1.0));
        assert!(clock.value() > 1.0);
    }
}
