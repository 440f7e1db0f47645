//! Movement input for the headless client.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::Vector2;

/// Produces the velocity the local player should move at each send interval.
#[derive(Debug)]
pub enum InputSource {
    /// Stands still at the spawn point.
    Idle,
    Wander(Wanderer),
}

impl InputSource {
    pub fn next_velocity(&mut self, dt: f32, max_speed: f32) -> Vector2 {
        match self {
            InputSource::Idle => Vector2::ZERO,
            InputSource::Wander(wanderer) => wanderer.next_velocity(dt, max_speed),
        }
    }
}

/// Random walk: picks a heading, holds it for a while, sometimes pauses.
#[derive(Debug)]
pub struct Wanderer {
    rng: StdRng,
    heading: Vector2,
    hold: f32,
}

impl Wanderer {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            heading: Vector2::ZERO,
            hold: 0.0,
        }
    }

    pub fn next_velocity(&mut self, dt: f32, max_speed: f32) -> Vector2 {
        self.hold -= dt;
        if self.hold <= 0.0 {
            self.hold = self.rng.gen_range(0.5..2.0);
            self.heading = if self.rng.gen_bool(0.25) {
                Vector2::ZERO
            } else {
                let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
                Vector2::new(angle.cos(), angle.sin())
            };
        }
        let speed = max_speed.abs();
        Vector2::new(self.heading.x * speed, self.heading.y * speed)
    }
}

impl Default for Wanderer {
    fn default() -> Self {
        Self::new()
    }
}
