use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::math::{Vec2, wrap_angle};

/// Rotational state of the wheel. The wheel is a rigid ring of fixed radius
/// spinning about the origin; the ball never alters its angular velocity
/// (infinite-inertia, one-way coupling).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelState {
    /// Inner rim radius (m). Immutable after construction.
    pub radius: f32,
    /// Rotation angle (rad), wrapped into `[0, 2π)`.
    pub angle: f32,
    /// Angular velocity (rad/s).
    pub angular_velocity: f32,
}

impl WheelState {
    /// Wheel at rest. `radius` is assumed already validated (> 0).
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            angle: 0.0,
            angular_velocity: 0.0,
        }
    }

    /// Add a signed tap impulse to the angular velocity. Any finite
    /// magnitude is accepted; a fast wheel is valid, not a fault.
    /// Non-finite input is ignored.
    pub fn apply_spin_impulse(&mut self, magnitude: f32) {
        if magnitude.is_finite() {
            self.angular_velocity += magnitude;
        } else {
            tracing::warn!("Ignoring non-finite spin impulse");
        }
    }

    /// Add a uniform random tap impulse in the configured range.
    pub fn random_spin_impulse<R: Rng>(&mut self, rng: &mut R, config: &SimConfig) {
        let magnitude = rng.random_range(config.spin_impulse_min..=config.spin_impulse_max);
        self.apply_spin_impulse(magnitude);
    }

    /// Integrate rotation and apply first-order bearing damping.
    /// `dt <= 0` is a no-op.
    pub fn step(&mut self, dt: f32, damping_rate: f32) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }
        self.angle = wrap_angle(self.angle + self.angular_velocity * dt);
        self.angular_velocity *= (1.0 - damping_rate * dt).max(0.0);
        if !self.angular_velocity.is_finite() {
            tracing::warn!("Wheel angular velocity went non-finite, resetting to 0");
            self.angular_velocity = 0.0;
        }
    }

    /// Instantaneous rigid-surface velocity at a point in the wheel frame.
    pub fn surface_velocity_at(&self, point: Vec2) -> Vec2 {
        point.perp() * self.angular_velocity
    }
}
