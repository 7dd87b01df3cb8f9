//! Frame scheduler
//!
//! Drives [`LyricsEngine::frame`](crate::LyricsEngine::frame) from a tokio
//! interval. Missed ticks are skipped rather than replayed, and the measured
//! `dt` is clamped so a stalled host never produces a huge physics step.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Smallest `dt` handed to the engine
pub const MIN_DT: f64 = 0.001;
/// Largest `dt` handed to the engine
pub const MAX_DT: f64 = 0.1;

pub fn clamp_dt(dt: f64) -> f64 {
    if dt.is_finite() {
        dt.clamp(MIN_DT, MAX_DT)
    } else {
        MIN_DT
    }
}

/// Fixed-rate frame tick source
#[derive(Debug)]
pub struct FrameTicker {
    interval: Interval,
    period: Duration,
    last: Option<Instant>,
}

impl FrameTicker {
    /// Ticker at `fps` frames per second (60 when not positive)
    pub fn new(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 60.0 };
        let period = Duration::from_secs_f64(1.0 / fps);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval,
            period,
            last: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next frame; returns seconds since the previous one
    pub async fn tick(&mut self) -> f64 {
        self.interval.tick().await;
        let now = Instant::now();
        let dt = match self.last {
            Some(last) => now.duration_since(last).as_secs_f64(),
            None => self.period.as_secs_f64(),
        };
        self.last = Some(now);
        clamp_dt(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_dt() {
        assert_eq!(clamp_dt(0.0), MIN_DT);
        assert_eq!(clamp_dt(5.0), MAX_DT);
        assert_eq!(clamp_dt(f64::NAN), MIN_DT);
        assert_eq!(clamp_dt(0.016), 0.016);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_frame_rate() {
        let mut ticker = FrameTicker::new(50.0);
        assert!((ticker.tick().await - 0.02).abs() < 1e-9);
        for _ in 0..5 {
            assert!((ticker.tick().await - 0.02).abs() < 1e-3);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_is_clamped_and_skipped() {
        let mut ticker = FrameTicker::new(50.0);
        ticker.tick().await;
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(ticker.tick().await, MAX_DT);
        // Missed ticks are not replayed back to back
        assert!(ticker.tick().await > 0.01);
    }

    #[tokio::test]
    async fn test_invalid_rate_falls_back() {
        let ticker = FrameTicker::new(0.0);
        assert_eq!(ticker.period(), Duration::from_secs_f64(1.0 / 60.0));
    }
}
