/// Fixed-timestep accumulator.
///
/// Frame times are clamped to a maximum before accumulation so a hiccup
/// (debugger pause, tab switch) cannot feed one giant step into the physics
/// and cause tunneling; the remainder below one substep carries over to the
/// next frame, keeping the simulated clock deterministic.
#[derive(Debug)]
pub struct FixedStep {
    substep: f32,
    max_frame: f32,
    accumulator: f32,
}

impl FixedStep {
    pub fn new(substep: f32, max_frame: f32) -> Self {
        Self {
            substep,
            max_frame,
            accumulator: 0.0,
        }
    }

    /// Substep duration in seconds.
    pub fn substep(&self) -> f32 {
        self.substep
    }

    /// Feed one frame's wall-clock delta; returns how many fixed substeps
    /// to run. Non-positive or non-finite deltas contribute nothing.
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        if frame_dt > 0.0 && frame_dt.is_finite() {
            self.accumulator += frame_dt.min(self.max_frame);
        }
        let mut steps = 0;
        while self.accumulator >= self.substep {
            self.accumulator -= self.substep;
            steps += 1;
        }
        steps
    }
}
