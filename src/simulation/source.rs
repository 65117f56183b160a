//! Random sources for vitals synthesis.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Supplies the randomness consumed by one simulation cycle.
///
/// Implementations must honor the ranges below; the driver relies on them to
/// keep synthesized values inside the configured bounds.
pub trait VitalsSource: Send {
    /// A value in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// An integer in `[0, bound)`. Returns 0 when `bound` is 0.
    fn next_below(&mut self, bound: u32) -> u32;
}

impl<T: VitalsSource + ?Sized> VitalsSource for Box<T> {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }

    fn next_below(&mut self, bound: u32) -> u32 {
        (**self).next_below(bound)
    }
}

/// Pseudo-random source backed by [`StdRng`].
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    /// Seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence for a given seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl VitalsSource for RandomSource {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn next_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.rng.gen_range(0..bound)
    }
}

/// Returns the same values on every draw. Out-of-range inputs are clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSource {
    unit: f64,
    offset: u32,
}

impl FixedSource {
    /// `unit` is returned by `next_unit`, `offset` by `next_below`.
    #[must_use]
    pub fn new(unit: f64, offset: u32) -> Self {
        let unit = if unit.is_nan() {
            0.0
        } else {
            unit.clamp(0.0, 1.0 - f64::EPSILON)
        };
        Self { unit, offset }
    }
}

impl VitalsSource for FixedSource {
    fn next_unit(&mut self) -> f64 {
        self.unit
    }

    fn next_below(&mut self, bound: u32) -> u32 {
        self.offset.min(bound.saturating_sub(1))
    }
}
