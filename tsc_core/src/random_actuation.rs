//! Synthetic detector actuation used for simulation and demonstration runs.
//!
//! Schedules calls on uniformly random targets at intervals drawn uniformly
//! from `[min, max]` seconds. Seeded with a `ChaCha8Rng` (never the OS RNG)
//! so that two runs started from the same seed and the same config produce
//! identical call placements tick-for-tick.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomActuationConfig {
    pub enabled: bool,
    pub min_s: f64,
    pub max_s: f64,
    pub seed: u64,
}

impl Default for RandomActuationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_s: 5.0,
            max_s: 20.0,
            seed: 0,
        }
    }
}

pub struct RandomActuator {
    rng: ChaCha8Rng,
    next_in_s: f64,
    targets: Vec<u8>,
}

impl RandomActuator {
    pub fn new(config: &RandomActuationConfig, targets: Vec<u8>) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let next_in_s = if targets.is_empty() {
            f64::INFINITY
        } else {
            rng.random_range(config.min_s..=config.max_s)
        };
        Self {
            rng,
            next_in_s,
            targets,
        }
    }

    /// Advance by one tick; returns `Some(target_phase)` the tick a
    /// synthetic call fires.
    pub fn tick(&mut self, tick_size_s: f64, config: &RandomActuationConfig) -> Option<u8> {
        if !config.enabled || self.targets.is_empty() {
            return None;
        }
        self.next_in_s -= tick_size_s;
        if self.next_in_s > 0.0 {
            return None;
        }
        self.next_in_s = self.rng.random_range(config.min_s..=config.max_s);
        let idx = self.rng.random_range(0..self.targets.len());
        Some(self.targets[idx])
    }
}
