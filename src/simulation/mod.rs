//! Vitals simulation.
//!
//! Randomness is injected through [`VitalsSource`] so tests can pin the
//! synthesized values and assert exact alert outcomes.

mod driver;
mod source;

pub use driver::{synthesize, DriverState, SimulationDriver};
pub use source::{FixedSource, RandomSource, VitalsSource};
