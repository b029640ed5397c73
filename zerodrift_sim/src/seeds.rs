//! Deterministic seed schedule for multi-seed sweeps.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Derives the seeds of a sweep from one master seed.
///
/// Seeds are:
/// - Deterministic: same master seed always yields the same sweep
/// - Isolated: seed `i` does not depend on how many seeds are requested
/// - Anchored: index 0 is the master seed itself, so a one-seed sweep runs
///   exactly what the user asked for
pub struct SeedSchedule {
    master_seed: u64,
}

impl SeedSchedule {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Seed for sweep slot `index`.
    ///
    /// Derived from `master_seed * golden + index * prime` through ChaCha8.
    pub fn seed(&self, index: u64) -> u64 {
        if index == 0 {
            return self.master_seed;
        }
        let slot_seed = self
            .master_seed
            .wrapping_mul(0x9e3779b97f4a7c15) // Golden ratio prime
            .wrapping_add(index.wrapping_mul(0x517cc1b727220a95));
        ChaCha8Rng::seed_from_u64(slot_seed).next_u64()
    }

    /// The first `count` seeds of the sweep.
    pub fn seeds(&self, count: usize) -> Vec<u64> {
        (0..count as u64).map(|i| self.seed(i)).collect()
    }
}
