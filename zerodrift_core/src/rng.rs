//! Seeded xorshift64 stream.
//!
//! All initial conditions are derived from a single 64-bit seed so that any
//! run is reproducible from its seed number. No external entropy is ever
//! consulted.

use crate::error::EngineResult;
use crate::fixed::Fx;
use rand::{RngCore, SeedableRng};

/// Replacement state for seed 0, which would otherwise lock xorshift at zero.
const ZERO_SEED_STATE: u64 = 0x9e37_79b9_7f4a_7c15;

const LOW_32: u64 = 0xffff_ffff;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// 64-bit xorshift generator (shift triple 13, 7, 17).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    /// Creates a generator whose stream is a pure function of `seed`.
    ///
    /// Seed 0 is replaced by a fixed non-zero state, because xorshift never
    /// leaves zero. A run recorded by a generator that keeps seed 0 at zero
    /// (every node at `-span/2`) will not replay under this one.
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { ZERO_SEED_STATE } else { seed };
        Self { state }
    }

    /// Advances the state and returns it.
    pub fn next(&mut self) -> u64 {
        let mut s = self.state;
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        self.state = s;
        s
    }

    /// Uniform sample in `[-span/2, span/2)` from the low 32 bits of `next()`.
    pub fn centered(&mut self, span: f64) -> f64 {
        let unit = (self.next() & LOW_32) as f64 / TWO_POW_32;
        unit * span - span / 2.0
    }

    /// Same as [`centered`](Self::centered), converted to fixed point.
    pub fn centered_fx(&mut self, span: f64) -> EngineResult<Fx> {
        Fx::from_f64(self.centered(span))
    }
}

impl RngCore for Xorshift64 {
    fn next_u32(&mut self) -> u32 {
        (self.next() & LOW_32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut chunks = dest.chunks_exact_mut(8);
        for chunk in &mut chunks {
            chunk.copy_from_slice(&self.next().to_le_bytes());
        }
        let rem = chunks.into_remainder();
        if !rem.is_empty() {
            let bytes = self.next().to_le_bytes();
            rem.copy_from_slice(&bytes[..rem.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Xorshift64 {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }

    /// Uses the integer directly instead of rand's PCG seed expansion, so
    /// `seed_from_u64(s)` and `Xorshift64::new(s)` yield the same stream.
    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}
