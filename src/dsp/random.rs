//! The one random source each engine owns.
//!
//! Macro-mode rolls, dropouts, vinyl hiss and tape noise all draw from the
//! same seeded generator, so a stored seed replays an engine bit for bit.

use rand::{rngs::SmallRng, Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct Random {
    rng: SmallRng,
}

impl Random {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Uniform in `[0, 1)`.
    #[inline]
    pub fn unit(&mut self) -> f32 {
        self.rng.random::<f32>()
    }

    /// Uniform in `[-1, 1)`.
    #[inline]
    pub fn bipolar(&mut self) -> f32 {
        self.unit() * 2.0 - 1.0
    }

    /// True with probability `p` (clamped to `[0, 1]`).
    #[inline]
    pub fn chance(&mut self, p: f32) -> bool {
        p > 0.0 && self.unit() < p.min(1.0)
    }

    /// Uniform in `[lo, hi)`.
    #[inline]
    pub fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.unit()
    }

    /// Uniform index in `[0, n)`. Returns 0 for `n == 0`.
    #[inline]
    pub fn index(&mut self, n: usize) -> usize {
        if n == 0 {
            0
        } else {
            self.rng.random_range(0..n)
        }
    }

    /// Pick one of two values with equal probability.
    #[inline]
    pub fn either<T>(&mut self, a: T, b: T) -> T {
        if self.rng.random::<bool>() {
            a
        } else {
            b
        }
    }
}
