use serde::{Deserialize, Serialize};

/// Named physical constants and geometry for the simulation, loadable from
/// TOML. Every field has a default matching the reference tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Inner rim radius of the wheel (m). The ball contacts this boundary.
    pub wheel_radius: f32,
    /// Ball radius (m). Must be strictly smaller than `wheel_radius`.
    pub ball_radius: f32,
    /// Ball mass (kg).
    pub ball_mass: f32,
    /// Gravitational acceleration (m/s², +y is down).
    pub gravity: f32,
    /// First-order linear air drag on the ball (1/s).
    pub air_drag_rate: f32,
    /// Fraction of normal-direction speed preserved on a rim bounce, in [0, 1].
    pub restitution: f32,
    /// Static (sticking) Coulomb friction coefficient.
    pub static_friction: f32,
    /// Kinetic (sliding) Coulomb friction coefficient.
    pub kinetic_friction: f32,
    /// Bearing/air damping on the wheel's own rotation (1/s).
    pub wheel_damping_rate: f32,
    /// Air damping on the ball's free spin (1/s).
    pub ball_spin_damping_rate: f32,
    /// Extra inward radial acceleration while in rim contact (m/s²).
    /// Keeps the ball hugging the rim instead of chattering off it.
    pub contact_inward_accel: f32,
    /// Smallest randomized tap impulse on the wheel (rad/s).
    pub spin_impulse_min: f32,
    /// Largest randomized tap impulse on the wheel (rad/s).
    pub spin_impulse_max: f32,
    /// Tangential boost speed when the ball is (re)placed near the rim (m/s).
    pub placement_boost_speed: f32,
    /// Widening factor (>= 1) applied to the static friction cone while the
    /// previous step was rolling, so the rolling/slipping decision cannot
    /// flap at the cone boundary.
    pub rolling_hysteresis: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            wheel_radius: 1.8,
            ball_radius: 0.05,
            ball_mass: 1.0,
            gravity: 5.0,
            air_drag_rate: 0.10,
            restitution: 0.25,
            static_friction: 0.45,
            kinetic_friction: 0.35,
            wheel_damping_rate: 0.25,
            ball_spin_damping_rate: 2.0,
            contact_inward_accel: 1.8,
            spin_impulse_min: 0.6,
            spin_impulse_max: 1.2,
            placement_boost_speed: 2.2,
            rolling_hysteresis: 1.1,
        }
    }
}

impl SimConfig {
    /// Load config from an env-var-pointed TOML file, then the conventional
    /// path, falling back to defaults.
    pub fn load() -> Self {
        let path = std::env::var("RIMBALL_CONFIG").unwrap_or_else(|_| "config/rimball.toml".to_string());
        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<SimConfig>(&content) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!("Failed to parse {path}: {e}, using defaults");
                    SimConfig::default()
                },
            },
            Err(_) => SimConfig::default(),
        }
    }

    /// Reject structurally meaningless configurations. Invalid values are
    /// errors, never silently clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [
            ("wheel_radius", self.wheel_radius),
            ("ball_radius", self.ball_radius),
            ("ball_mass", self.ball_mass),
            ("gravity", self.gravity),
            ("air_drag_rate", self.air_drag_rate),
            ("restitution", self.restitution),
            ("static_friction", self.static_friction),
            ("kinetic_friction", self.kinetic_friction),
            ("wheel_damping_rate", self.wheel_damping_rate),
            ("ball_spin_damping_rate", self.ball_spin_damping_rate),
            ("contact_inward_accel", self.contact_inward_accel),
            ("spin_impulse_min", self.spin_impulse_min),
            ("spin_impulse_max", self.spin_impulse_max),
            ("placement_boost_speed", self.placement_boost_speed),
            ("rolling_hysteresis", self.rolling_hysteresis),
        ];
        for (field, value) in all {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field });
            }
        }

        for (field, value) in [
            ("wheel_radius", self.wheel_radius),
            ("ball_radius", self.ball_radius),
            ("ball_mass", self.ball_mass),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::NonPositive { field, value });
            }
        }

        for (field, value) in [
            ("gravity", self.gravity),
            ("air_drag_rate", self.air_drag_rate),
            ("static_friction", self.static_friction),
            ("kinetic_friction", self.kinetic_friction),
            ("wheel_damping_rate", self.wheel_damping_rate),
            ("ball_spin_damping_rate", self.ball_spin_damping_rate),
            ("contact_inward_accel", self.contact_inward_accel),
        ] {
            if value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }

        if self.ball_radius >= self.wheel_radius {
            return Err(ConfigError::BallTooLarge {
                ball_radius: self.ball_radius,
                wheel_radius: self.wheel_radius,
            });
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(ConfigError::RestitutionOutOfRange {
                value: self.restitution,
            });
        }
        if self.rolling_hysteresis < 1.0 {
            return Err(ConfigError::HysteresisBelowOne {
                value: self.rolling_hysteresis,
            });
        }
        if self.spin_impulse_min > self.spin_impulse_max {
            return Err(ConfigError::ImpulseRangeInverted {
                min: self.spin_impulse_min,
                max: self.spin_impulse_max,
            });
        }
        Ok(())
    }

    /// Radius of the circle the ball center rides while in rim contact.
    pub fn contact_radius(&self) -> f32 {
        self.wheel_radius - self.ball_radius
    }
}

/// Configuration rejected at initialization time.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    NonFinite { field: &'static str },
    NonPositive { field: &'static str, value: f32 },
    Negative { field: &'static str, value: f32 },
    BallTooLarge { ball_radius: f32, wheel_radius: f32 },
    BallOutsideWheel { distance: f32, allowed: f32 },
    RestitutionOutOfRange { value: f32 },
    HysteresisBelowOne { value: f32 },
    ImpulseRangeInverted { min: f32, max: f32 },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFinite { field } => write!(f, "{field} must be finite"),
            Self::NonPositive { field, value } => {
                write!(f, "{field} must be positive, got {value}")
            },
            Self::Negative { field, value } => {
                write!(f, "{field} must not be negative, got {value}")
            },
            Self::BallTooLarge {
                ball_radius,
                wheel_radius,
            } => write!(
                f,
                "ball radius {ball_radius} does not fit inside wheel radius {wheel_radius}"
            ),
            Self::BallOutsideWheel { distance, allowed } => write!(
                f,
                "initial ball center at distance {distance} exceeds the allowed {allowed}"
            ),
            Self::RestitutionOutOfRange { value } => {
                write!(f, "restitution must be in [0, 1], got {value}")
            },
            Self::HysteresisBelowOne { value } => {
                write!(f, "rolling_hysteresis must be >= 1, got {value}")
            },
            Self::ImpulseRangeInverted { min, max } => {
                write!(f, "spin impulse range inverted: min {min} > max {max}")
            },
        }
    }
}

impl std::error::Error for ConfigError {}
