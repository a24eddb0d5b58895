//! Physics core for a rigid ball constrained inside a rotating wheel.
//!
//! The simulation advances in fixed timesteps: gravity and linear air drag
//! act on the ball in free flight, the wheel integrates its own rotation
//! with bearing damping, and contact against the inner rim is resolved with
//! a restitution impulse plus Coulomb (static/kinetic) friction that decides
//! each step whether the ball rolls with the surface or slips against it.
//!
//! Rendering, input handling, and frame scheduling live in the driver; the
//! core only consumes a `dt` and optional spin impulses and hands back state.

pub mod ball;
pub mod config;
pub mod contact;
pub mod math;
pub mod sim;
pub mod wheel;

pub use ball::BallState;
pub use config::{ConfigError, SimConfig};
pub use contact::{Contact, FrictionMode};
pub use math::Vec2;
pub use sim::{SimSnapshot, Simulation};
pub use wheel::WheelState;
