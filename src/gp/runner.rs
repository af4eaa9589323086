//! GP evolutionary loop execution.
//!
//! [`GpRunner`] orchestrates the generational process:
//! evaluation → archive update → selection → crossover → mutation → repeat.

use super::config::GpConfig;
use super::generate::Generator;
use super::hall_of_fame::HallOfFame;
use super::operators::{crossover_one_point, mutate_uniform, StaticLimit};
use super::primitives::PrimitiveSet;
use super::types::{compare_fitness, Fitness, GpProblem, Individual, Value};
use crate::error::{GpError, Result};
use crate::random::create_rng;
use rand::Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-generation record of the run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerationStats {
    /// Generation number (0 = initial population).
    pub generation: usize,

    /// Fitness evaluations performed in this generation.
    pub evaluations: usize,

    /// Best primary fitness in the current population.
    pub best_fitness: f64,

    /// Best primary fitness ever seen (Hall of Fame top).
    pub best_ever: f64,

    /// Mean tree size of the population.
    pub mean_size: f64,

    /// Largest tree height in the population.
    pub max_height: usize,
}

/// Result of a GP run.
#[derive(Debug, Clone)]
pub struct GpResult<V> {
    /// The best individual found during the entire run.
    pub best: Individual<V>,

    /// Best fitness (same as `best.fitness()`).
    pub best_fitness: Fitness,

    /// Archive of the best individuals ever seen.
    pub hall_of_fame: HallOfFame<V>,

    /// Population after the last generation.
    pub population: Vec<Individual<V>>,

    /// Number of generations executed.
    pub generations: usize,

    /// Whether the run was cancelled externally.
    pub cancelled: bool,

    /// Best-ever primary fitness after each generation, generation 0 included.
    pub fitness_history: Vec<f64>,

    /// Per-generation statistics, generation 0 included.
    pub logbook: Vec<GenerationStats>,
}

/// Executes the GP evolutionary loop.
///
/// # Usage
///
/// ```ignore
/// let problem = MyRegression::new();
/// let config = GpConfig::default().with_seed(0);
/// let result = GpRunner::run(&problem, &config)?;
/// println!("{} -> {:?}", result.best.tree, result.best_fitness);
/// ```
pub struct GpRunner;

impl GpRunner {
    /// Runs GP from a freshly generated population.
    ///
    /// # Errors
    ///
    /// - [`GpError::InvalidConfig`] if the configuration is invalid
    /// - [`GpError::UnsatisfiableType`] if the primitive set cannot build
    ///   complete trees
    /// - any error raised during evolution (see [`evolve`](Self::evolve))
    pub fn run<P: GpProblem>(problem: &P, config: &GpConfig) -> Result<GpResult<P::Value>> {
        Self::run_with_cancel(problem, config, None)
    }

    /// Runs GP with an optional cancellation token.
    ///
    /// If `cancel` is `Some` and the flag is set to `true`, the run stops at
    /// the next generation boundary and returns the state reached so far.
    pub fn run_with_cancel<P: GpProblem>(
        problem: &P,
        config: &GpConfig,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<GpResult<P::Value>> {
        config.validate().map_err(GpError::InvalidConfig)?;
        let pset = problem.primitive_set();
        pset.validate()?;

        let mut rng = match config.seed {
            Some(seed) => create_rng(seed),
            None => create_rng(rand::random()),
        };

        let population = Self::init_population(pset, &config.init, config.population_size, &mut rng)?;
        let hall_of_fame = HallOfFame::new(config.hall_of_fame_size);
        Self::evolve(problem, population, hall_of_fame, config, &mut rng, cancel)
    }

    /// Builds `n` unevaluated individuals with `generator`.
    ///
    /// # Errors
    ///
    /// Propagates generator errors.
    pub fn init_population<V: Value, R: Rng>(
        pset: &PrimitiveSet<V>,
        generator: &Generator,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Individual<V>>> {
        (0..n)
            .map(|_| generator.generate(pset, rng).map(Individual::new))
            .collect()
    }

    /// Evolves a given population (`eaSimple` with `varAnd` variation).
    ///
    /// Individuals lacking fitness are evaluated first and the archive is
    /// updated. Each generation then selects `population.len()` clones,
    /// applies crossover to adjacent pairs with probability
    /// `crossover_rate`, then mutation to each individual with probability
    /// `mutation_rate` (both under the static height limit), evaluates the
    /// changed offspring, updates the archive and replaces the population.
    ///
    /// # Errors
    ///
    /// - [`GpError::EmptyPopulation`] if `population` is empty
    /// - [`GpError::InvalidConfig`] if the configuration is invalid or
    ///   `hall_of_fame` has zero capacity
    /// - [`GpError::FitnessArity`] if the fitness function returns a tuple
    ///   of the wrong length
    /// - generator errors raised by mutation
    pub fn evolve<P: GpProblem, R: Rng>(
        problem: &P,
        mut population: Vec<Individual<P::Value>>,
        mut hall_of_fame: HallOfFame<P::Value>,
        config: &GpConfig,
        rng: &mut R,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<GpResult<P::Value>> {
        config.validate().map_err(GpError::InvalidConfig)?;
        if population.is_empty() {
            return Err(GpError::EmptyPopulation);
        }
        if hall_of_fame.capacity() == 0 {
            return Err(GpError::InvalidConfig(
                "hall of fame capacity must be at least 1".into(),
            ));
        }

        let limit = config
            .max_height
            .map_or_else(StaticLimit::unbounded, StaticLimit::height);

        // 1. Evaluate initial population
        let evaluations = evaluate_invalid(problem, &mut population, config.objectives, config.parallel)?;
        hall_of_fame.update(&population);

        let mut logbook = Vec::with_capacity(config.generations + 1);
        let mut fitness_history = Vec::with_capacity(config.generations + 1);
        let stats = record(0, evaluations, &population, &hall_of_fame);
        fitness_history.push(stats.best_ever);
        logbook.push(stats);

        let mut generations = 0;
        let mut cancelled = false;

        // 2. Evolutionary loop
        for gen in 1..=config.generations {
            if let Some(ref flag) = cancel {
                if flag.load(Ordering::Relaxed) {
                    cancelled = true;
                    break;
                }
            }

            // Selection (clones, so repeated picks never alias)
            let picks = config.selection.select_many(&population, population.len(), rng);
            let mut offspring: Vec<Individual<P::Value>> =
                picks.into_iter().map(|i| population[i].clone()).collect();

            // Variation
            vary(problem.primitive_set(), &mut offspring, config, &limit, rng)?;

            // Evaluation of changed offspring
            let evaluations = evaluate_invalid(problem, &mut offspring, config.objectives, config.parallel)?;
            hall_of_fame.update(&offspring);
            population = offspring;
            generations = gen;

            let stats = record(gen, evaluations, &population, &hall_of_fame);
            log::debug!(
                "gen {gen}: evals={} best={:.6} best_ever={:.6} max_height={}",
                stats.evaluations,
                stats.best_fitness,
                stats.best_ever,
                stats.max_height
            );
            fitness_history.push(stats.best_ever);
            logbook.push(stats);

            if let Some(best) = hall_of_fame.best().and_then(Individual::fitness) {
                problem.on_generation(gen, best);
            }
        }

        let best = hall_of_fame.best().cloned().ok_or(GpError::EmptyPopulation)?;
        let best_fitness = best
            .fitness()
            .cloned()
            .ok_or(GpError::EmptyPopulation)?;

        if cancelled {
            log::info!("run cancelled after {generations} generation(s); best {best_fitness:?}");
        } else {
            log::info!("run finished after {generations} generation(s); best {best_fitness:?}");
        }

        Ok(GpResult {
            best,
            best_fitness,
            hall_of_fame,
            population,
            generations,
            cancelled,
            fitness_history,
            logbook,
        })
    }
}

/// Crossover on adjacent pairs, then mutation on every individual.
///
/// Each probability check is an independent draw.
fn vary<V: Value, R: Rng>(
    pset: &PrimitiveSet<V>,
    pool: &mut [Individual<V>],
    config: &GpConfig,
    limit: &StaticLimit,
    rng: &mut R,
) -> Result<()> {
    for i in (1..pool.len()).step_by(2) {
        if rng.random::<f64>() < config.crossover_rate {
            limit.apply(&mut pool[i - 1..=i], |pair| {
                let (a, b) = pair.split_at_mut(1);
                crossover_one_point(&mut a[0].tree, &mut b[0].tree, &mut *rng);
                Ok(())
            })?;
        }
    }

    for i in 0..pool.len() {
        if rng.random::<f64>() < config.mutation_rate {
            limit.apply(&mut pool[i..=i], |one| {
                mutate_uniform(&mut one[0].tree, pset, &config.mutation, &mut *rng)
            })?;
        }
    }
    Ok(())
}

/// Evaluate every individual lacking fitness. Returns the count evaluated.
fn evaluate_invalid<P: GpProblem>(
    problem: &P,
    population: &mut [Individual<P::Value>],
    objectives: usize,
    parallel: bool,
) -> Result<usize> {
    let pending: Vec<&mut Individual<P::Value>> =
        population.iter_mut().filter(|ind| !ind.is_evaluated()).collect();
    let count = pending.len();
    evaluate_pending(problem, pending, objectives, parallel)?;
    Ok(count)
}

#[cfg(feature = "parallel")]
fn evaluate_pending<P: GpProblem>(
    problem: &P,
    pending: Vec<&mut Individual<P::Value>>,
    objectives: usize,
    parallel: bool,
) -> Result<()> {
    if parallel {
        // each worker owns a disjoint &mut, so every fitness is written once
        return pending
            .into_par_iter()
            .try_for_each(|ind| assign_fitness(problem, ind, objectives));
    }
    pending
        .into_iter()
        .try_for_each(|ind| assign_fitness(problem, ind, objectives))
}

#[cfg(not(feature = "parallel"))]
fn evaluate_pending<P: GpProblem>(
    problem: &P,
    pending: Vec<&mut Individual<P::Value>>,
    objectives: usize,
    _parallel: bool,
) -> Result<()> {
    pending
        .into_iter()
        .try_for_each(|ind| assign_fitness(problem, ind, objectives))
}

fn assign_fitness<P: GpProblem>(problem: &P, ind: &mut Individual<P::Value>, objectives: usize) -> Result<()> {
    let fitness = problem.evaluate(&ind.tree);
    if fitness.len() != objectives {
        return Err(GpError::FitnessArity {
            expected: objectives,
            actual: fitness.len(),
        });
    }
    ind.set_fitness(fitness);
    Ok(())
}

fn record<V: Value>(
    generation: usize,
    evaluations: usize,
    population: &[Individual<V>],
    hall_of_fame: &HallOfFame<V>,
) -> GenerationStats {
    let best_fitness = population
        .iter()
        .min_by(|a, b| compare_fitness(a.fitness(), b.fitness()))
        .and_then(Individual::fitness)
        .map_or(f64::INFINITY, Fitness::primary);
    let best_ever = hall_of_fame
        .best()
        .and_then(Individual::fitness)
        .map_or(f64::INFINITY, Fitness::primary);
    let total_size: usize = population.iter().map(|ind| ind.tree.len()).sum();
    let max_height = population.iter().map(|ind| ind.tree.height()).max().unwrap_or(0);

    GenerationStats {
        generation,
        evaluations,
        best_fitness,
        best_ever,
        mean_size: total_size as f64 / population.len().max(1) as f64,
        max_height,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gp::{PrimitiveTree, Selection, TypeTag};
    use std::sync::atomic::AtomicUsize;

    fn protected_div(a: &[f64]) -> f64 {
        if a[1] == 0.0 {
            1.0
        } else {
            a[0] / a[1]
        }
    }

    fn arithmetic(pset: &mut PrimitiveSet<f64>) {
        let f = TypeTag::new("float");
        let ff = vec![f.clone(), f.clone()];
        pset.add_primitive("add", ff.clone(), f.clone(), |a: &[f64]| a[0] + a[1]).unwrap();
        pset.add_primitive("sub", ff.clone(), f.clone(), |a: &[f64]| a[0] - a[1]).unwrap();
        pset.add_primitive("mul", ff.clone(), f.clone(), |a: &[f64]| a[0] * a[1]).unwrap();
        pset.add_primitive("protectedDiv", ff, f, protected_div).unwrap();
    }

    // ---- Approximate pi: constants 1..9, no inputs ----

    struct ApproximatePi {
        pset: PrimitiveSet<f64>,
        calls: AtomicUsize,
    }

    impl ApproximatePi {
        fn new() -> Self {
            let f = TypeTag::new("float");
            let mut pset = PrimitiveSet::new("main", vec![], f.clone());
            arithmetic(&mut pset);
            for v in 1..=9 {
                pset.add_terminal(f64::from(v), f.clone()).unwrap();
            }
            Self {
                pset,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl GpProblem for ApproximatePi {
        type Value = f64;

        fn primitive_set(&self) -> &PrimitiveSet<f64> {
            &self.pset
        }

        fn evaluate(&self, tree: &PrimitiveTree<f64>) -> Fitness {
            let value = tree
                .compile(&self.pset)
                .and_then(|f| f.call(&[]))
                .unwrap_or(f64::NAN);
            let d = (value - std::f64::consts::PI).abs();
            let fit = d.ln() + 1e-4 * tree.len() as f64;
            Fitness::single(if fit.is_nan() { f64::INFINITY } else { fit })
        }

        fn on_generation(&self, _generation: usize, _best: &Fitness) {
            self.calls.fetch_add(1, Ordering::Relaxed);
        }
    }

    // ---- Koza-1: x^4 + x^3 + x^2 + x on [-1, 1] ----

    struct Koza1 {
        pset: PrimitiveSet<f64>,
        points: Vec<f64>,
    }

    impl Koza1 {
        fn new() -> Self {
            let f = TypeTag::new("float");
            let mut pset = PrimitiveSet::new("main", vec![f.clone()], f.clone());
            arithmetic(&mut pset);
            pset.add_primitive("neg", vec![f.clone()], f.clone(), |a: &[f64]| -a[0]).unwrap();
            pset.add_primitive("sin", vec![f.clone()], f.clone(), |a: &[f64]| a[0].sin())
                .unwrap();
            pset.add_uniform_ephemeral("randp1n1", f, -1.0, 1.0).unwrap();
            pset.rename_argument(0, "x").unwrap();
            Self {
                pset,
                points: (-10..=10).map(|x| f64::from(x) / 10.0).collect(),
            }
        }
    }

    impl GpProblem for Koza1 {
        type Value = f64;

        fn primitive_set(&self) -> &PrimitiveSet<f64> {
            &self.pset
        }

        fn evaluate(&self, tree: &PrimitiveTree<f64>) -> Fitness {
            let Ok(func) = tree.compile(&self.pset) else {
                return Fitness::single(f64::INFINITY);
            };
            let mse = self
                .points
                .iter()
                .map(|&x| {
                    let y = func.call(&[x]).unwrap_or(f64::NAN);
                    let target = x.powi(4) + x.powi(3) + x.powi(2) + x;
                    (y - target).powi(2)
                })
                .sum::<f64>()
                / self.points.len() as f64;
            Fitness::single(if mse.is_finite() { mse } else { f64::INFINITY })
        }
    }

    fn pi_config() -> GpConfig {
        GpConfig::default()
            .with_population_size(1000)
            .with_generations(50)
            .with_crossover_rate(0.5)
            .with_mutation_rate(0.1)
            .with_init(Generator::half_and_half(1, 2))
            .with_mutation(Generator::full(0, 2))
            .with_max_height(Some(15))
            .with_seed(0)
            .with_parallel(false)
    }

    #[test]
    fn test_approximate_pi_scenario() {
        let problem = ApproximatePi::new();
        let result = GpRunner::run(&problem, &pi_config()).unwrap();

        assert_eq!(result.generations, 50);
        assert_eq!(result.population.len(), 1000);
        assert_eq!(result.fitness_history.len(), 51);
        assert_eq!(problem.calls.load(Ordering::Relaxed), 50);
        assert!(
            result.best_fitness.primary() < -3.0,
            "expected |value - pi| well below 0.05, got {:?} for {}",
            result.best_fitness,
            result.best.tree
        );
    }

    #[test]
    fn test_same_seed_same_run() {
        let problem = ApproximatePi::new();
        let config = pi_config().with_population_size(200).with_generations(15);

        let a = GpRunner::run(&problem, &config).unwrap();
        let b = GpRunner::run(&problem, &config).unwrap();

        assert_eq!(a.population, b.population);
        assert_eq!(a.best, b.best);
        assert_eq!(a.logbook, b.logbook);

        let c = GpRunner::run(&problem, &config.clone().with_seed(1)).unwrap();
        assert_ne!(a.population, c.population);
    }

    #[test]
    fn test_best_fitness_monotone() {
        let problem = Koza1::new();
        let config = GpConfig::default()
            .with_population_size(200)
            .with_generations(20)
            .with_init(Generator::grow(1, 6))
            .with_max_height(Some(10))
            .with_seed(3)
            .with_parallel(false);

        let result = GpRunner::run(&problem, &config).unwrap();
        for window in result.fitness_history.windows(2) {
            assert!(
                window[1] <= window[0],
                "best-ever fitness must not increase: {} > {}",
                window[1],
                window[0]
            );
        }
        assert!(result.fitness_history[20] < result.fitness_history[0]);
        assert_eq!(
            result.best_fitness.primary(),
            *result.fitness_history.last().unwrap()
        );
        for ind in result.population.iter() {
            assert!(ind.is_evaluated());
        }
    }

    #[test]
    fn test_height_limit_holds_every_generation() {
        let problem = Koza1::new();
        let config = GpConfig::default()
            .with_population_size(100)
            .with_generations(25)
            .with_crossover_rate(0.9)
            .with_mutation_rate(0.5)
            .with_init(Generator::half_and_half(1, 3))
            .with_mutation(Generator::grow(0, 4))
            .with_max_height(Some(5))
            .with_seed(11)
            .with_parallel(false);

        let result = GpRunner::run(&problem, &config).unwrap();
        assert!(result.logbook.iter().all(|s| s.max_height <= 5));
        assert!(result.population.iter().all(|i| i.tree.height() <= 5));
    }

    #[test]
    fn test_no_variation_means_no_evaluations() {
        let problem = ApproximatePi::new();
        let config = pi_config()
            .with_population_size(50)
            .with_generations(5)
            .with_crossover_rate(0.0)
            .with_mutation_rate(0.0);

        let result = GpRunner::run(&problem, &config).unwrap();
        assert_eq!(result.logbook[0].evaluations, 50);
        assert!(result.logbook[1..].iter().all(|s| s.evaluations == 0));
    }

    #[test]
    fn test_hall_of_fame_size() {
        let problem = ApproximatePi::new();
        let config = pi_config()
            .with_population_size(100)
            .with_generations(5)
            .with_hall_of_fame_size(5);

        let result = GpRunner::run(&problem, &config).unwrap();
        assert_eq!(result.hall_of_fame.len(), 5);
        let fits: Vec<f64> = result
            .hall_of_fame
            .iter()
            .map(|i| i.fitness().unwrap().primary())
            .collect();
        assert!(fits.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(result.best, *result.hall_of_fame.best().unwrap());
    }

    #[test]
    fn test_cancellation_before_first_generation() {
        let problem = ApproximatePi::new();
        let cancel = Arc::new(AtomicBool::new(true));
        let result = GpRunner::run_with_cancel(&problem, &pi_config(), Some(cancel)).unwrap();

        assert!(result.cancelled);
        assert_eq!(result.generations, 0);
        assert_eq!(result.fitness_history.len(), 1);
    }

    #[test]
    fn test_evolve_given_population() {
        let problem = Koza1::new();
        let config = GpConfig::default()
            .with_generations(3)
            .with_selection(Selection::Tournament(2))
            .with_parallel(false);
        let mut rng = create_rng(8);
        let population =
            GpRunner::init_population(problem.primitive_set(), &Generator::grow(1, 3), 30, &mut rng).unwrap();

        let result = GpRunner::evolve(&problem, population, HallOfFame::new(1), &config, &mut rng, None).unwrap();
        assert_eq!(result.population.len(), 30);
        assert_eq!(result.generations, 3);
    }

    #[test]
    fn test_empty_population_rejected() {
        let problem = Koza1::new();
        let mut rng = create_rng(0);
        let err = GpRunner::evolve(&problem, vec![], HallOfFame::new(1), &GpConfig::default(), &mut rng, None)
            .unwrap_err();
        assert_eq!(err, GpError::EmptyPopulation);
    }

    #[test]
    fn test_zero_capacity_hall_of_fame_rejected() {
        let problem = ApproximatePi::new();
        let mut rng = create_rng(0);
        let population =
            GpRunner::init_population(problem.primitive_set(), &Generator::grow(1, 2), 10, &mut rng).unwrap();
        let config = pi_config().with_generations(3);

        let err = GpRunner::evolve(&problem, population, HallOfFame::new(0), &config, &mut rng, None).unwrap_err();
        assert!(matches!(err, GpError::InvalidConfig(_)), "{err:?}");
        assert_eq!(problem.calls.load(Ordering::Relaxed), 0, "no generation may run");
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let problem = Koza1::new();
        let config = GpConfig::default()
            .with_population_size(300)
            .with_generations(15)
            .with_init(Generator::grow(1, 6))
            .with_mutation(Generator::full(0, 2))
            .with_max_height(Some(10))
            .with_seed(21);

        let sequential = GpRunner::run(&problem, &config.clone().with_parallel(false)).unwrap();
        let parallel = GpRunner::run(&problem, &config.with_parallel(true)).unwrap();

        assert_eq!(sequential.population, parallel.population);
        assert_eq!(sequential.best, parallel.best);
        assert_eq!(sequential.logbook, parallel.logbook);
    }

    struct WrongArity(PrimitiveSet<f64>);

    impl GpProblem for WrongArity {
        type Value = f64;

        fn primitive_set(&self) -> &PrimitiveSet<f64> {
            &self.0
        }

        fn evaluate(&self, _tree: &PrimitiveTree<f64>) -> Fitness {
            Fitness::new(vec![1.0, 2.0])
        }
    }

    #[test]
    fn test_fitness_arity_checked() {
        let problem = WrongArity(ApproximatePi::new().pset);
        let config = pi_config().with_population_size(10);
        let err = GpRunner::run(&problem, &config).unwrap_err();
        assert_eq!(err, GpError::FitnessArity { expected: 1, actual: 2 });

        let ok = GpRunner::run(&problem, &config.with_objectives(2).with_generations(2));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_unsatisfiable_primitive_set_rejected() {
        let f = TypeTag::new("float");
        let g = TypeTag::new("float32");
        let mut pset = PrimitiveSet::new("main", vec![], f.clone());
        pset.add_terminal(1.0, f.clone()).unwrap();
        pset.add_primitive("cast", vec![g.clone()], f, |a: &[f64]| a[0]).unwrap();
        let problem = WrongArity(pset);

        let err = GpRunner::run(&problem, &pi_config()).unwrap_err();
        assert!(matches!(err, GpError::UnsatisfiableType { .. }));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let problem = ApproximatePi::new();
        let err = GpRunner::run(&problem, &pi_config().with_population_size(0)).unwrap_err();
        assert!(matches!(err, GpError::InvalidConfig(_)));
    }
}
