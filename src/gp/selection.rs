//! Selection strategies for GP.
//!
//! Selection picks which individuals enter the next generation's variation
//! pool. Strategies return indices and never modify the population.
//!
//! # References
//!
//! - Blickle & Thiele (1996), "A Comparison of Selection Schemes used in
//!   Evolutionary Algorithms"
//! - Miller & Goldberg (1995), "Genetic Algorithms, Tournament Selection,
//!   and the Effects of Noise"

use super::types::{compare_fitness, Individual, Value};
use rand::Rng;
use std::cmp::Ordering;

/// Selection strategy.
///
/// All strategies assume **minimization** (lower fitness = better).
/// Unevaluated individuals rank below every evaluated one.
///
/// # Examples
///
/// ```
/// use u_gp::gp::Selection;
///
/// // Tournament with size 3, as in the classic symbolic regression setups
/// let sel = Selection::Tournament(3);
///
/// // Uniform random, ignoring fitness
/// let sel = Selection::Random;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Selection {
    /// Tournament selection: sample `k` individuals with replacement,
    /// keep the best. Ties go to the first sampled.
    ///
    /// - k=1: uniform random selection
    /// - k=2-3: light to moderate pressure (GP default is 3)
    /// - k>7: strong pressure, fast loss of diversity
    ///
    /// # Complexity
    /// O(k) per selection
    Tournament(usize),

    /// Uniform random selection with replacement.
    ///
    /// # Complexity
    /// O(1) per selection
    Random,

    /// Always the best individual (first one on ties).
    ///
    /// # Complexity
    /// O(n) per selection
    Best,
}

impl Default for Selection {
    fn default() -> Self {
        Selection::Tournament(3)
    }
}

impl Selection {
    /// Select one index from the population.
    ///
    /// # Panics
    /// Panics if `population` is empty.
    pub fn select<V: Value, R: Rng>(&self, population: &[Individual<V>], rng: &mut R) -> usize {
        assert!(
            !population.is_empty(),
            "cannot select from empty population"
        );

        match self {
            Selection::Tournament(k) => tournament(population, *k, rng),
            Selection::Random => rng.random_range(0..population.len()),
            Selection::Best => best(population),
        }
    }

    /// Select `n` indices, independently and with replacement.
    ///
    /// # Panics
    /// Panics if `population` is empty and `n > 0`.
    pub fn select_many<V: Value, R: Rng>(
        &self,
        population: &[Individual<V>],
        n: usize,
        rng: &mut R,
    ) -> Vec<usize> {
        (0..n).map(|_| self.select(population, rng)).collect()
    }
}

/// Tournament selection: pick k random individuals, return best.
fn tournament<V: Value, R: Rng>(population: &[Individual<V>], k: usize, rng: &mut R) -> usize {
    let k = k.max(1);
    let n = population.len();

    let mut best_idx = rng.random_range(0..n);
    for _ in 1..k {
        let idx = rng.random_range(0..n);
        if compare_fitness(population[idx].fitness(), population[best_idx].fitness()) == Ordering::Less {
            best_idx = idx;
        }
    }
    best_idx
}

fn best<V: Value>(population: &[Individual<V>]) -> usize {
    let mut best_idx = 0;
    for idx in 1..population.len() {
        if compare_fitness(population[idx].fitness(), population[best_idx].fitness()) == Ordering::Less {
            best_idx = idx;
        }
    }
    best_idx
}
