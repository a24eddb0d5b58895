use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// Full kinematic state of the ball, in the wheel frame.
///
/// `spin` is the ball's own angular velocity about its center; `orientation`
/// is its time integral, kept so a renderer can draw rotating surface
/// markings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallState {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Angular velocity about the ball's own center (rad/s).
    pub spin: f32,
    /// Accumulated rotation (rad), wrapped into `[0, 2π)`.
    pub orientation: f32,
    /// Ball radius (m). Immutable after construction.
    pub radius: f32,
    /// Ball mass (kg). Immutable after construction.
    pub mass: f32,
    /// Moment of inertia of a uniform solid disk: `0.5 * mass * radius²`.
    /// Derived at construction so angular-impulse math stays consistent.
    pub moment_of_inertia: f32,
}

impl BallState {
    /// Ball at rest at the given position.
    pub fn at_rest(position: Vec2, radius: f32, mass: f32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            spin: 0.0,
            orientation: 0.0,
            radius,
            mass,
            moment_of_inertia: 0.5 * mass * radius * radius,
        }
    }

    /// Kinetic energy, translational plus rotational (J).
    pub fn kinetic_energy(&self) -> f32 {
        let translational = 0.5 * self.mass * self.velocity.length_squared();
        let rotational = 0.5 * self.moment_of_inertia * self.spin * self.spin;
        translational + rotational
    }
}
