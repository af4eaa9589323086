//! Seeded random number generation.
//!
//! Every stochastic decision in a run (tree generation, ephemeral sampling,
//! selection, variation) draws from a single sequential stream, so a seed
//! fully determines the outcome.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Creates the engine's random number generator from a seed.
///
/// Two generators created from the same seed yield identical streams.
pub fn create_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
