//! Spring physics for smooth animations
//!
//! Each channel is a damped harmonic oscillator advanced with semi-implicit
//! Euler integration:
//!
//! ```text
//! F = -stiffness * (current - target) - damping * velocity
//! velocity += F / mass * dt
//! current  += velocity * dt
//! ```
//!
//! Large frame deltas are split into substeps of at most [`MAX_SUBSTEP`] so stiff
//! springs stay stable when a frame is dropped.
//!
//! ## Spring Parameters (defaults)
//!
//! | Usage | mass | damping | stiffness |
//! |-------|------|---------|-----------|
//! | Camera | 1 | 26 | 170 |
//! | Line behind / at active | 1 | 40 | 400 |
//! | Line ahead (distance d) | 1 | 2·√k | max(40, 300·0.5^d) |
//! | Line far ahead | 1 | 2·√90 | 90 |
//! | Scale | 1 | 20 | 100 |
//!
//! Channels are independent. Cross-channel effects (the camera feeding each
//! line's target) happen at the call site.

use std::collections::HashMap;
use std::hash::Hash;

pub type Num = f64;

/// Largest integration step in seconds
pub const MAX_SUBSTEP: Num = 1.0 / 120.0;

/// Spring parameters
///
/// `stiffness > 0`, `damping >= 0` and `mass > 0` are preconditions; they are
/// not validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringConfig {
    pub mass: Num,
    pub stiffness: Num,
    pub damping: Num,
    /// Rest threshold for both displacement and velocity
    pub precision: Num,
}

impl SpringConfig {
    /// Camera spring
    pub const CAMERA: Self = Self {
        mass: 1.0,
        stiffness: 170.0,
        damping: 26.0,
        precision: 0.01,
    };

    /// Lines at or behind the active line
    pub const LINE_BEHIND: Self = Self {
        mass: 1.0,
        stiffness: 400.0,
        damping: 40.0,
        precision: 0.01,
    };

    /// Line scale
    pub const SCALE: Self = Self {
        mass: 1.0,
        stiffness: 100.0,
        damping: 20.0,
        precision: 0.001,
    };

    pub const fn new(mass: Num, stiffness: Num, damping: Num) -> Self {
        Self {
            mass,
            stiffness,
            damping,
            precision: 0.01,
        }
    }

    /// Critically damped spring of the given stiffness (`damping = 2·√k`, unit mass)
    pub fn critical(stiffness: Num) -> Self {
        Self::new(1.0, stiffness, 2.0 * stiffness.sqrt())
    }

    /// Check if overdamped or critical: damping >= 2·sqrt(stiffness·mass)
    pub fn is_overdamped(&self) -> bool {
        self.damping >= 2.0 * (self.stiffness * self.mass).sqrt()
    }
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self::new(1.0, 100.0, 10.0)
    }
}

/// One animated scalar channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringState {
    pub current: Num,
    pub velocity: Num,
    pub target: Num,
    pub config: SpringConfig,
}

impl SpringState {
    /// Channel resting at `value`
    pub fn new(value: Num, config: SpringConfig) -> Self {
        Self {
            current: value,
            velocity: 0.0,
            target: value,
            config,
        }
    }

    pub fn is_at_rest(&self) -> bool {
        self.velocity == 0.0 && self.current == self.target
    }

    pub fn set_target(&mut self, target: Num, config: SpringConfig) {
        self.target = target;
        self.config = config;
    }

    /// Hard reset to `value` with zero velocity
    pub fn set_value(&mut self, value: Num) {
        self.current = value;
        self.target = value;
        self.velocity = 0.0;
    }

    /// Advance by `dt` seconds; returns whether the channel is still moving
    pub fn step(&mut self, dt: Num) -> bool {
        if self.is_at_rest() {
            return false;
        }
        if !self.current.is_finite() || !self.velocity.is_finite() {
            self.set_value(self.target);
            return false;
        }
        if dt <= 0.0 || !dt.is_finite() {
            return true;
        }

        let SpringConfig {
            mass,
            stiffness,
            damping,
            precision,
        } = self.config;

        let steps = (dt / MAX_SUBSTEP).ceil().max(1.0) as usize;
        let h = dt / steps as Num;
        for _ in 0..steps {
            let force = -stiffness * (self.current - self.target) - damping * self.velocity;
            self.velocity += force / mass * h;
            self.current += self.velocity * h;
        }

        if self.velocity.abs() < precision && (self.current - self.target).abs() < precision {
            self.current = self.target;
            self.velocity = 0.0;
            return false;
        }
        true
    }
}

/// Named set of spring channels
///
/// Channels are created lazily; a channel first touched by [`set_target`]
/// starts at rest on that target.
///
/// [`set_target`]: SpringSystem::set_target
#[derive(Debug, Clone)]
pub struct SpringSystem<K: Eq + Hash> {
    channels: HashMap<K, SpringState>,
}

impl<K: Eq + Hash + Clone> SpringSystem<K> {
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    pub fn set_target(&mut self, key: &K, value: Num, config: SpringConfig) {
        match self.channels.get_mut(key) {
            Some(state) => state.set_target(value, config),
            None => {
                self.channels
                    .insert(key.clone(), SpringState::new(value, config));
            }
        }
    }

    /// Hard reset, zero velocity
    pub fn set_value(&mut self, key: &K, value: Num) {
        match self.channels.get_mut(key) {
            Some(state) => state.set_value(value),
            None => {
                self.channels
                    .insert(key.clone(), SpringState::new(value, SpringConfig::default()));
            }
        }
    }

    /// Inject momentum
    pub fn set_velocity(&mut self, key: &K, velocity: Num) {
        if let Some(state) = self.channels.get_mut(key) {
            state.velocity = velocity;
        }
    }

    /// Advance every channel; returns whether any is still moving
    pub fn update(&mut self, dt: Num) -> bool {
        let mut moving = false;
        for state in self.channels.values_mut() {
            moving |= state.step(dt);
        }
        moving
    }

    pub fn get(&self, key: &K) -> Option<&SpringState> {
        self.channels.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut SpringState> {
        self.channels.get_mut(key)
    }

    /// Current value, or `None` for an unknown channel
    pub fn value(&self, key: &K) -> Option<Num> {
        self.channels.get(key).map(|s| s.current)
    }

    pub fn remove(&mut self, key: &K) -> Option<SpringState> {
        self.channels.remove(key)
    }

    /// Drop every channel whose key fails the predicate
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.channels.retain(|k, _| keep(k));
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for SpringSystem<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_until_rest(state: &mut SpringState, dt: Num) -> usize {
        for frame in 0..10_000 {
            if !state.step(dt) {
                return frame;
            }
        }
        panic!("spring never settled: {state:?}");
    }

    #[test]
    fn test_spring_moves_toward_target() {
        let mut state = SpringState::new(0.0, SpringConfig::default());
        state.set_target(100.0, SpringConfig::default());
        for _ in 0..10 {
            state.step(0.01);
        }
        assert!(state.current > 0.0, "Spring should move from 0");
        assert!(state.current < 100.0, "Spring should not reach target yet");
    }

    #[test]
    fn test_convergence_for_various_configs() {
        let configs = [
            SpringConfig::default(),
            SpringConfig::CAMERA,
            SpringConfig::LINE_BEHIND,
            SpringConfig::SCALE,
            SpringConfig::critical(40.0),
            SpringConfig::new(2.0, 50.0, 2.0),
            SpringConfig::new(0.5, 300.0, 60.0),
        ];
        for config in configs {
            let mut state = SpringState::new(-250.0, config);
            state.set_target(80.0, config);
            run_until_rest(&mut state, 1.0 / 60.0);
            assert_eq!(state.current, 80.0, "{config:?}");
            assert_eq!(state.velocity, 0.0);
        }
    }

    #[test]
    fn test_idempotent_at_rest() {
        let mut state = SpringState::new(0.0, SpringConfig::CAMERA);
        state.set_target(10.0, SpringConfig::CAMERA);
        run_until_rest(&mut state, 0.016);
        let settled = state;
        for _ in 0..100 {
            assert!(!state.step(0.016));
        }
        assert_eq!(state, settled);
    }

    #[test]
    fn test_rest_is_reentered_on_new_target() {
        let mut state = SpringState::new(0.0, SpringConfig::CAMERA);
        assert!(!state.step(0.016));
        state.set_target(5.0, SpringConfig::CAMERA);
        assert!(state.step(0.016));
    }

    #[test]
    fn test_large_dt_is_substepped() {
        let mut state = SpringState::new(0.0, SpringConfig::LINE_BEHIND);
        state.set_target(100.0, SpringConfig::LINE_BEHIND);
        state.step(0.5);
        assert!(state.current.is_finite());
        assert!((state.current - 100.0).abs() < 10.0);
    }

    #[test]
    fn test_system_channels_are_independent() {
        let mut system: SpringSystem<&'static str> = SpringSystem::new();
        system.set_value(&"a", 0.0);
        system.set_value(&"b", 0.0);
        system.set_target(&"a", 50.0, SpringConfig::CAMERA);

        assert!(system.update(0.016));
        assert!(system.value(&"a").unwrap() > 0.0);
        assert_eq!(system.value(&"b"), Some(0.0));
    }

    #[test]
    fn test_system_velocity_injection() {
        let mut system: SpringSystem<u8> = SpringSystem::new();
        system.set_value(&0, 0.0);
        system.set_velocity(&0, 500.0);
        assert!(system.update(0.016));
        assert!(system.value(&0).unwrap() > 0.0);

        for _ in 0..2_000 {
            if !system.update(0.016) {
                break;
            }
        }
        assert_eq!(system.value(&0), Some(0.0));
    }

    #[test]
    fn test_overdamped() {
        assert!(SpringConfig::critical(300.0).is_overdamped());
        assert!(SpringConfig::new(1.0, 100.0, 100.0).is_overdamped());
        assert!(!SpringConfig::new(1.0, 100.0, 5.0).is_overdamped());
    }
}
