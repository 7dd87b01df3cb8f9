//! Per-line animation state
//!
//! Each line owns a position spring and a scale spring, keyed by its stable
//! [`LineId`] so edits elsewhere in the track never hand one line's motion
//! to another. Position targets are the camera offset plus the line's layout
//! top; how quickly a line follows depends on its distance from the active
//! line:
//!
//! | Distance | stiffness | damping |
//! |----------|-----------|---------|
//! | behind / active | 400 | 40 |
//! | d ahead (1..=8) | max(40, 300·0.5^d) | 2·√k |
//! | beyond 8 ahead | 90 | 2·√90 |
//!
//! Lines ahead therefore drift in progressively later, producing the
//! cascading reveal.

use std::collections::HashMap;

use crate::config::ScrollConfig;

use super::spring::{Num, SpringConfig, SpringState};
use super::types::LineId;

/// Position and scale springs of one line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePhysicsState {
    pub pos_y: SpringState,
    pub scale: SpringState,
}

impl LinePhysicsState {
    fn new(y: Num, scale: Num) -> Self {
        Self {
            pos_y: SpringState::new(y, SpringConfig::default()),
            scale: SpringState::new(scale, SpringConfig::SCALE),
        }
    }

    pub fn y(&self) -> f32 {
        self.pos_y.current as f32
    }

    pub fn scale(&self) -> f32 {
        self.scale.current as f32
    }
}

/// Where one line should be this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineTarget {
    pub id: LineId,
    pub y: Num,
    pub scale: Num,
    /// Index distance from the active line (negative = behind)
    pub distance: isize,
}

/// Position spring profile for a line `distance` away from active
pub fn position_config(distance: isize, config: &ScrollConfig) -> SpringConfig {
    if distance <= 0 {
        return SpringConfig::new(1.0, config.behind_stiffness, config.behind_damping);
    }
    let distance = distance as usize;
    if distance > config.far_distance {
        return SpringConfig::critical(config.far_stiffness);
    }
    let stiffness = (config.ahead_stiffness * config.ahead_decay.powi(distance as i32))
        .max(config.ahead_min_stiffness);
    SpringConfig::critical(stiffness)
}

/// Animation state for every line
#[derive(Debug, Clone, Default)]
pub struct LineAnimator {
    states: HashMap<LineId, LinePhysicsState>,
}

impl LineAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep springs of lines that persist, drop the rest
    pub fn reconcile(&mut self, ids: &[LineId]) {
        let before = self.states.len();
        let keep: std::collections::HashSet<&LineId> = ids.iter().collect();
        self.states.retain(|id, _| keep.contains(id));
        tracing::debug!(
            "[LineAnimator] reconciled {} -> {} line states",
            before,
            self.states.len()
        );
    }

    pub fn get(&self, id: &LineId) -> Option<&LinePhysicsState> {
        self.states.get(id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Retarget and advance every line; returns whether any is moving
    ///
    /// Lines seen for the first time start at their target. With `snap`
    /// positions jump directly (drag, scrub).
    pub fn update(
        &mut self,
        targets: &[LineTarget],
        dt: Num,
        snap: bool,
        config: &ScrollConfig,
    ) -> bool {
        let mut moving = false;
        for target in targets {
            let state = self
                .states
                .entry(target.id)
                .or_insert_with(|| LinePhysicsState::new(target.y, target.scale));

            if snap {
                state.pos_y.set_value(target.y);
            } else {
                state
                    .pos_y
                    .set_target(target.y, position_config(target.distance, config));
                moving |= state.pos_y.step(dt);
            }
            state.scale.set_target(target.scale, SpringConfig::SCALE);
            moving |= state.scale.step(dt);
        }
        moving
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Num = 1.0 / 60.0;

    fn targets(offset: Num, active: isize) -> Vec<LineTarget> {
        (0..12)
            .map(|i| LineTarget {
                id: LineId(i as u64),
                y: offset + i as Num * 50.0,
                scale: if i as isize == active { 1.0 } else { 0.97 },
                distance: i as isize - active,
            })
            .collect()
    }

    #[test]
    fn test_position_config_profiles() {
        let config = ScrollConfig::default();
        assert_eq!(position_config(-3, &config).stiffness, 400.0);
        assert_eq!(position_config(0, &config).damping, 40.0);
        assert_eq!(position_config(1, &config).stiffness, 150.0);
        assert_eq!(position_config(2, &config).stiffness, 75.0);
        assert_eq!(position_config(5, &config).stiffness, 40.0);
        assert_eq!(position_config(9, &config).stiffness, 30.0);

        let ahead = position_config(2, &config);
        assert!((ahead.damping - 2.0 * 75.0f64.sqrt()).abs() < 1e-9);
        assert!(ahead.is_overdamped());
    }

    #[test]
    fn test_new_lines_start_at_target() {
        let mut animator = LineAnimator::new();
        let config = ScrollConfig::default();
        animator.update(&targets(100.0, 0), FRAME, false, &config);
        assert_eq!(animator.get(&LineId(3)).unwrap().y(), 250.0);
    }

    #[test]
    fn test_cascading_follow() {
        let mut animator = LineAnimator::new();
        let config = ScrollConfig::default();
        animator.update(&targets(0.0, 0), FRAME, false, &config);

        // Camera moves up one line; the line right behind active snaps fastest
        for _ in 0..10 {
            animator.update(&targets(-50.0, 1), FRAME, false, &config);
        }
        let progress = |i: u64| {
            let start = i as Num * 50.0;
            (start - animator.get(&LineId(i)).unwrap().pos_y.current) / 50.0
        };
        assert!(progress(0) > progress(2));
        assert!(progress(2) > progress(4));
        // Lines past the far distance never overtake nearer ones
        assert!(progress(8) > progress(11));
    }

    #[test]
    fn test_snap_moves_instantly() {
        let mut animator = LineAnimator::new();
        let config = ScrollConfig::default();
        animator.update(&targets(0.0, 0), FRAME, false, &config);
        animator.update(&targets(-400.0, 3), FRAME, true, &config);
        assert_eq!(animator.get(&LineId(5)).unwrap().y(), -150.0);
    }

    #[test]
    fn test_reconcile_preserves_survivors() {
        let mut animator = LineAnimator::new();
        let config = ScrollConfig::default();
        animator.update(&targets(0.0, 0), FRAME, false, &config);
        animator.update(&targets(-80.0, 2), FRAME, false, &config);
        let survivor = *animator.get(&LineId(4)).unwrap();

        animator.reconcile(&[LineId(4), LineId(99)]);
        assert_eq!(animator.len(), 1);
        assert_eq!(animator.get(&LineId(4)), Some(&survivor));
        assert!(animator.get(&LineId(0)).is_none());
    }
}
