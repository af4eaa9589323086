//! GP configuration.
//!
//! [`GpConfig`] holds all parameters that control the evolutionary loop.

use super::generate::Generator;
use super::selection::Selection;

/// Configuration for the GP run.
///
/// Controls population size, operator rates, tree construction bounds,
/// bloat control, archive size and parallelism.
///
/// # Defaults
///
/// ```
/// use u_gp::gp::GpConfig;
///
/// let config = GpConfig::default();
/// assert_eq!(config.population_size, 300);
/// assert_eq!(config.generations, 40);
/// assert_eq!(config.max_height, Some(17));
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_gp::gp::{Generator, GpConfig, Selection};
///
/// let config = GpConfig::default()
///     .with_population_size(1000)
///     .with_generations(50)
///     .with_selection(Selection::Tournament(3))
///     .with_init(Generator::half_and_half(1, 2))
///     .with_mutation(Generator::full(0, 2))
///     .with_max_height(Some(15))
///     .with_seed(0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpConfig {
    /// Number of individuals in the population.
    pub population_size: usize,

    /// Number of generations after the initial evaluation.
    ///
    /// There is no convergence-based early stop.
    pub generations: usize,

    /// Probability of applying crossover to each adjacent pair (0.0–1.0).
    pub crossover_rate: f64,

    /// Probability of applying mutation to each individual (0.0–1.0).
    ///
    /// Drawn independently of crossover: an individual may undergo both.
    pub mutation_rate: f64,

    /// Selection strategy filling the variation pool.
    pub selection: Selection,

    /// Generator for the initial population.
    pub init: Generator,

    /// Generator for subtrees inserted by mutation.
    pub mutation: Generator,

    /// Maximum tree height accepted from variation.
    ///
    /// Offspring exceeding it revert to their parent. `None` disables the
    /// limit.
    pub max_height: Option<usize>,

    /// Capacity of the Hall of Fame.
    pub hall_of_fame_size: usize,

    /// Number of values every fitness tuple must contain.
    pub objectives: usize,

    /// Whether to evaluate individuals in parallel using rayon.
    ///
    /// Only effective with the `parallel` feature. Results are identical
    /// either way: evaluation never consumes randomness.
    pub parallel: bool,

    /// Random seed for reproducibility.
    ///
    /// `None` uses a random seed.
    pub seed: Option<u64>,
}

impl Default for GpConfig {
    fn default() -> Self {
        Self {
            population_size: 300,
            generations: 40,
            crossover_rate: 0.5,
            mutation_rate: 0.1,
            selection: Selection::default(),
            init: Generator::half_and_half(1, 2),
            mutation: Generator::grow(0, 2),
            max_height: Some(17),
            hall_of_fame_size: 1,
            objectives: 1,
            parallel: true,
            seed: None,
        }
    }
}

impl GpConfig {
    /// Sets the population size.
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the number of generations.
    pub fn with_generations(mut self, n: usize) -> Self {
        self.generations = n;
        self
    }

    /// Sets the crossover rate.
    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the mutation rate.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the selection strategy.
    pub fn with_selection(mut self, sel: Selection) -> Self {
        self.selection = sel;
        self
    }

    /// Convenience builder for setting tournament size.
    ///
    /// Equivalent to `.with_selection(Selection::Tournament(k))`.
    pub fn with_tournament_size(self, k: usize) -> Self {
        self.with_selection(Selection::Tournament(k))
    }

    /// Sets the initial population generator.
    pub fn with_init(mut self, generator: Generator) -> Self {
        self.init = generator;
        self
    }

    /// Sets the mutation subtree generator.
    pub fn with_mutation(mut self, generator: Generator) -> Self {
        self.mutation = generator;
        self
    }

    /// Sets the static height limit (`None` to disable).
    pub fn with_max_height(mut self, max_height: Option<usize>) -> Self {
        self.max_height = max_height;
        self
    }

    /// Sets the Hall of Fame capacity.
    pub fn with_hall_of_fame_size(mut self, n: usize) -> Self {
        self.hall_of_fame_size = n;
        self
    }

    /// Sets the expected fitness tuple length.
    pub fn with_objectives(mut self, n: usize) -> Self {
        self.objectives = n;
        self
    }

    /// Enables or disables parallel evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration.
    ///
    /// Returns `Err` with a description if any parameter is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.population_size == 0 {
            return Err("population_size must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err("crossover_rate must be within [0, 1]".into());
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err("mutation_rate must be within [0, 1]".into());
        }
        if self.selection == Selection::Tournament(0) {
            return Err("tournament size must be at least 1".into());
        }
        self.init.validate().map_err(|e| format!("init: {e}"))?;
        self.mutation.validate().map_err(|e| format!("mutation: {e}"))?;
        if let Some(h) = self.max_height {
            if h < self.init.max_depth {
                return Err(format!(
                    "max_height ({h}) is below init max_depth ({})",
                    self.init.max_depth
                ));
            }
        }
        if self.hall_of_fame_size == 0 {
            return Err("hall_of_fame_size must be at least 1".into());
        }
        if self.objectives == 0 {
            return Err("objectives must be at least 1".into());
        }
        Ok(())
    }
}
