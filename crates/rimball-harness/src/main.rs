mod clock;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

use rimball_core::{SimConfig, Simulation};

use clock::FixedStep;

/// Frame rate the harness pretends to render at.
const FRAME_DT: f32 = 1.0 / 60.0;
/// Physics substep (half a frame, for stability at high wheel speeds).
const SUBSTEP: f32 = 1.0 / 120.0;
/// Per-frame delta clamp, so a stalled frame cannot tunnel the ball.
const MAX_FRAME_DT: f32 = 0.032;
/// Simulated seconds between randomized tap impulses.
const IMPULSE_PERIOD: f32 = 3.0;

/// Finds `--<prefix>=<value>` anywhere in the argument list and parses
/// the value; flags are order-independent.
fn flag_value<T: std::str::FromStr>(args: &[String], prefix: &str) -> Option<T> {
    args.iter()
        .find_map(|a| a.strip_prefix(prefix))
        .and_then(|v| v.parse().ok())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let seconds: f32 = flag_value(&args, "--seconds=").unwrap_or(20.0);
    let seed: Option<u64> = flag_value(&args, "--seed=");

    let config = SimConfig::load();
    let mut sim = match Simulation::new(config) {
        Ok(sim) => sim,
        Err(e) => {
            tracing::error!("Invalid simulation config: {e}");
            std::process::exit(1);
        },
    };

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    sim.place_ball_near_rim(&mut rng);

    tracing::info!(seconds, "rimball harness starting");

    let mut clock = FixedStep::new(SUBSTEP, MAX_FRAME_DT);
    let mut simulated = 0.0f32;
    let mut next_impulse = IMPULSE_PERIOD;
    let mut next_report = 1.0f32;

    while simulated < seconds {
        for _ in 0..clock.advance(FRAME_DT) {
            sim.step(clock.substep());
            simulated += clock.substep();
        }

        if simulated >= next_impulse {
            sim.random_spin_impulse(&mut rng);
            tracing::info!(
                omega = sim.wheel().angular_velocity,
                "tap impulse on the wheel"
            );
            next_impulse += IMPULSE_PERIOD;
        }

        if simulated >= next_report {
            let ball = sim.ball();
            tracing::info!(
                t = simulated,
                x = ball.position.x,
                y = ball.position.y,
                speed = ball.velocity.length(),
                spin = ball.spin,
                wheel_omega = sim.wheel().angular_velocity,
                mode = ?sim.friction_mode(),
                "state"
            );
            next_report += 1.0;
        }
    }

    match serde_json::to_string_pretty(&sim.snapshot()) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("Failed to encode final snapshot: {e}"),
    }
}
