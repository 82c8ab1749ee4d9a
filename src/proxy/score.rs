//! Bounded health score for a single proxy identity
//!
//! Scores are stored as `f64` bits in an `AtomicU64` and updated with a
//! compare-and-swap loop, so concurrent reward/penalize calls from parallel
//! fetches never lose an update.

use std::sync::atomic::{AtomicU64, Ordering};

pub const INITIAL_SCORE: f64 = 1.0;
pub const MIN_SCORE: f64 = 0.1;
pub const MAX_SCORE: f64 = 10.0;
pub const REWARD_FACTOR: f64 = 1.1;
pub const PENALTY_FACTOR: f64 = 0.8;

#[derive(Debug)]
pub struct HealthScore {
    bits: AtomicU64,
}

impl HealthScore {
    pub fn new() -> Self {
        Self {
            bits: AtomicU64::new(INITIAL_SCORE.to_bits()),
        }
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Multiply by the reward factor, capped at [`MAX_SCORE`]. Returns the new score.
    pub fn reward(&self) -> f64 {
        self.update(|score| (score * REWARD_FACTOR).min(MAX_SCORE))
    }

    /// Multiply by the penalty factor, floored at [`MIN_SCORE`]. Returns the new score.
    pub fn penalize(&self) -> f64 {
        self.update(|score| (score * PENALTY_FACTOR).max(MIN_SCORE))
    }

    fn update(&self, f: impl Fn(f64) -> f64) -> f64 {
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            let next = f(f64::from_bits(current));
            match self.bits.compare_exchange_weak(
                current,
                next.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for HealthScore {
    fn default() -> Self {
        Self::new()
    }
}
