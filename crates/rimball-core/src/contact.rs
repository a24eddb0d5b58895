use serde::{Deserialize, Serialize};

use crate::ball::BallState;
use crate::math::{EPSILON, Vec2};
use crate::wheel::WheelState;

/// Friction regime chosen for one contact step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrictionMode {
    /// The ball's contact point moves with the wheel surface exactly.
    Rolling,
    /// The contact point slides; kinetic friction damps the slip.
    Slipping,
}

/// Contact against the inner rim, recomputed every step and discarded after
/// the impulses are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// How far the ball center exceeded the allowed circle (m), >= 0.
    pub penetration_depth: f32,
    /// Unit vector from the wheel center through the ball center — the
    /// direction the ball is pressed against the rim.
    pub normal: Vec2,
    /// Ball-contact-point velocity minus wheel-surface velocity, projected
    /// on the tangent (m/s). Zero when rolling without slipping.
    pub relative_tangential_velocity: f32,
    /// Regime the resolver picked for this step.
    pub friction_mode: FrictionMode,
}

/// Geometric rim containment check: penetration depth and contact normal,
/// or `None` while the ball is strictly inside the allowed circle.
///
/// A ball sitting exactly at the wheel center has no meaningful normal and
/// is treated as no-contact.
pub fn detect_rim_penetration(ball: &BallState, wheel: &WheelState) -> Option<(f32, Vec2)> {
    let dist = ball.position.length();
    if dist < EPSILON || !dist.is_finite() {
        return None;
    }
    let allowed = wheel.radius - ball.radius;
    if dist <= allowed {
        return None;
    }
    Some((dist - allowed, ball.position / dist))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball_at(position: Vec2) -> BallState {
        BallState::at_rest(position, 0.05, 1.0)
    }

    #[test]
    fn no_contact_inside_rim() {
        let wheel = WheelState::new(1.8);
        let ball = ball_at(Vec2::new(0.5, 0.5));
        assert!(detect_rim_penetration(&ball, &wheel).is_none());
    }

    #[test]
    fn no_contact_at_wheel_center() {
        let wheel = WheelState::new(1.8);
        let ball = ball_at(Vec2::ZERO);
        assert!(detect_rim_penetration(&ball, &wheel).is_none());
    }

    #[test]
    fn contact_exactly_on_boundary_is_none() {
        let wheel = WheelState::new(1.8);
        let allowed = wheel.radius - 0.05;
        let ball = ball_at(Vec2::new(0.0, allowed));
        assert!(detect_rim_penetration(&ball, &wheel).is_none());
    }

    #[test]
    fn penetration_depth_and_normal() {
        let wheel = WheelState::new(1.8);
        let ball = ball_at(Vec2::new(0.0, 1.77));
        let (depth, normal) = detect_rim_penetration(&ball, &wheel).expect("must penetrate");
        assert!((depth - 0.02).abs() < 1e-5);
        assert!((normal.x).abs() < 1e-6);
        assert!((normal.y - 1.0).abs() < 1e-6);
    }
}
