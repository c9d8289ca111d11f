use crate::events::{Direction, Rotation};

pub const DEFAULT_DAMPING: f32 = 0.12;

const NUDGE: f32 = 0.08;
const NUDGE_LIMIT: f32 = 0.25;
const DRAG_YAW_PER_PX: f32 = 0.003;
const DRAG_PITCH_PER_PX: f32 = 0.0026;
const DRAG_YAW_LIMIT: f32 = 0.38;
const DRAG_PITCH_MIN: f32 = -0.28;
const DRAG_PITCH_MAX: f32 = 0.32;

/// Damped target/current rotation pair driven by drag, nudges and the host's
/// rest pose.
#[derive(Debug, Clone)]
pub struct RotationController {
    target: Rotation,
    current: Rotation,
    rest: Rotation,
    damping: f32,
    dragging: bool,
    frozen: bool,
    last_direction: Option<Direction>,
}

impl RotationController {
    pub fn new(damping: f32) -> Self {
        Self {
            target: Rotation::ZERO,
            current: Rotation::ZERO,
            rest: Rotation::ZERO,
            damping: damping.clamp(f32::EPSILON, 1.0),
            dragging: false,
            frozen: false,
            last_direction: None,
        }
    }

    pub fn target(&self) -> Rotation {
        self.target
    }

    pub fn current(&self) -> Rotation {
        self.current
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn set_rest(&mut self, rest: Rotation) {
        if rest == self.rest {
            return;
        }
        self.rest = rest;
        self.target = rest;
    }

    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    /// Edge-triggered: only a change into a new non-none direction nudges.
    pub fn set_direction(&mut self, direction: Option<Direction>) {
        let Some(direction) = direction else {
            self.last_direction = None;
            return;
        };
        if self.last_direction == Some(direction) {
            return;
        }
        self.last_direction = Some(direction);
        let delta = match direction {
            Direction::Next => -NUDGE,
            Direction::Prev => NUDGE,
        };
        self.target.y = (self.target.y + delta).clamp(-NUDGE_LIMIT, NUDGE_LIMIT);
    }

    pub fn begin_drag(&mut self) {
        self.dragging = true;
    }

    /// `dx`/`dy` are the cumulative pointer displacement since the drag began.
    pub fn drag_to(&mut self, dx: f32, dy: f32) {
        if !self.dragging || self.frozen {
            return;
        }
        self.target.y = (self.rest.y + dx * DRAG_YAW_PER_PX).clamp(-DRAG_YAW_LIMIT, DRAG_YAW_LIMIT);
        self.target.x =
            (self.rest.x - dy * DRAG_PITCH_PER_PX).clamp(DRAG_PITCH_MIN, DRAG_PITCH_MAX);
    }

    pub fn end_drag(&mut self) {
        self.dragging = false;
        self.target = self.rest;
    }

    /// One frame of first-order smoothing towards the target.
    pub fn tick(&mut self) -> Rotation {
        self.current.x += (self.target.x - self.current.x) * self.damping;
        self.current.y += (self.target.y - self.current.y) * self.damping;
        self.current
    }
}

impl Default for RotationController {
    fn default() -> Self {
        Self::new(DEFAULT_DAMPING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nudge_is_edge_triggered() {
        let mut rot = RotationController::default();
        rot.set_direction(Some(Direction::Next));
        assert!((rot.target().y + 0.08).abs() < 1e-6);
        rot.set_direction(Some(Direction::Next));
        assert!((rot.target().y + 0.08).abs() < 1e-6);
        rot.set_direction(None);
        rot.set_direction(Some(Direction::Next));
        assert!((rot.target().y + 0.16).abs() < 1e-6);
        rot.set_direction(Some(Direction::Prev));
        assert!((rot.target().y + 0.08).abs() < 1e-6);
    }

    #[test]
    fn nudge_is_clamped() {
        let mut rot = RotationController::default();
        for _ in 0..5 {
            rot.set_direction(Some(Direction::Prev));
            rot.set_direction(None);
        }
        assert!((rot.target().y - 0.25).abs() < 1e-6);
    }

    #[test]
    fn drag_follows_formula_and_clamps() {
        let mut rot = RotationController::default();
        rot.set_rest(Rotation::new(0.1, 0.0));
        rot.begin_drag();
        rot.drag_to(50.0, 20.0);
        assert!((rot.target().y - 0.15).abs() < 1e-6);
        assert!((rot.target().x - (0.1 - 0.052)).abs() < 1e-6);

        rot.drag_to(1_000.0, -1_000.0);
        assert!((rot.target().y - 0.38).abs() < 1e-6);
        assert!((rot.target().x - 0.32).abs() < 1e-6);

        rot.end_drag();
        assert_eq!(rot.target(), Rotation::new(0.1, 0.0));
    }

    #[test]
    fn frozen_ignores_drag_motion() {
        let mut rot = RotationController::default();
        rot.set_frozen(true);
        rot.begin_drag();
        rot.drag_to(100.0, 100.0);
        assert_eq!(rot.target(), Rotation::ZERO);
    }

    #[test]
    fn drag_motion_without_press_is_ignored() {
        let mut rot = RotationController::default();
        rot.drag_to(100.0, 0.0);
        assert_eq!(rot.target(), Rotation::ZERO);
    }

    #[test]
    fn damping_converges_without_overshoot() {
        let mut rot = RotationController::default();
        rot.set_rest(Rotation::new(0.2, -0.3));
        let mut prev = rot.current();
        let mut ticks = 0;
        while (rot.current().x - 0.2).abs() > 1e-4 || (rot.current().y + 0.3).abs() > 1e-4 {
            let now = rot.tick();
            assert!(now.x >= prev.x && now.x <= 0.2);
            assert!(now.y <= prev.y && now.y >= -0.3);
            prev = now;
            ticks += 1;
            assert!(ticks < 200, "rotation failed to converge");
        }
    }
}
