//! Core type definitions for the GP engine.
//!
//! [`Fitness`], [`Individual`] and the [`GpProblem`] trait define the
//! contract between the generic GP engine and a concrete symbolic
//! regression task.

use super::primitives::PrimitiveSet;
use super::tree::PrimitiveTree;
use std::cmp::Ordering;
use std::fmt;

/// Runtime values flowing through an expression tree.
///
/// Type tags, not Rust types, drive type-safety of tree construction, so a
/// single value type may back several tags (for example `"float"` and
/// `"float32"` both carried as `f64`).
pub trait Value: Clone + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static {}

/// Fitness of an evaluated individual: a tuple of real-valued scores.
///
/// Lower is better (minimization). Tuples compare lexicographically. The
/// engine is single-objective in practice, so most fitness values have a
/// single entry created with [`Fitness::single`].
#[derive(Debug, Clone, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fitness {
    values: Vec<f64>,
}

impl Fitness {
    /// Creates a fitness tuple.
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Creates a single-objective fitness.
    pub fn single(value: f64) -> Self {
        Self {
            values: vec![value],
        }
    }

    /// All objective values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// First objective, or `+inf` for an empty tuple.
    pub fn primary(&self) -> f64 {
        self.values.first().copied().unwrap_or(f64::INFINITY)
    }

    /// Number of objectives.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` for an empty tuple.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<f64> for Fitness {
    fn from(value: f64) -> Self {
        Self::single(value)
    }
}

/// Orders optional fitness values best first; unevaluated sorts last.
///
/// Tuples compare lexicographically. A NaN entry is worse than any number,
/// `+inf` included, so a NaN fitness never blocks a real improvement.
pub(crate) fn compare_fitness(a: Option<&Fitness>, b: Option<&Fitness>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a
            .values
            .iter()
            .zip(&b.values)
            .map(|(x, y)| compare_objective(*x, *y))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| a.values.len().cmp(&b.values.len())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_objective(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        // -0.0 and 0.0 tie
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
    }
}

/// A candidate solution: an expression tree and its fitness, if evaluated.
///
/// Absence of a fitness value means the tree has not been evaluated since
/// it was created or last modified.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual<V> {
    /// The expression tree.
    pub tree: PrimitiveTree<V>,
    fitness: Option<Fitness>,
}

impl<V: Value> Individual<V> {
    /// Wraps a freshly built tree; the individual starts unevaluated.
    pub fn new(tree: PrimitiveTree<V>) -> Self {
        Self {
            tree,
            fitness: None,
        }
    }

    /// Returns the fitness, if evaluated.
    pub fn fitness(&self) -> Option<&Fitness> {
        self.fitness.as_ref()
    }

    /// Attaches a fitness value.
    pub fn set_fitness(&mut self, fitness: Fitness) {
        self.fitness = Some(fitness);
    }

    /// Clears the fitness value, marking the individual unevaluated.
    pub fn invalidate(&mut self) {
        self.fitness = None;
    }

    /// Returns `true` if a fitness value is attached.
    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }
}

/// Defines a GP symbolic regression problem.
///
/// The user supplies the primitive set and the fitness function; the engine
/// handles tree construction, variation, selection and archiving.
///
/// # Implementing
///
/// ```
/// use u_gp::gp::{Fitness, GpProblem, PrimitiveSet, PrimitiveTree, TypeTag};
///
/// struct Square {
///     pset: PrimitiveSet<f64>,
/// }
///
/// impl GpProblem for Square {
///     type Value = f64;
///
///     fn primitive_set(&self) -> &PrimitiveSet<f64> {
///         &self.pset
///     }
///
///     fn evaluate(&self, tree: &PrimitiveTree<f64>) -> Fitness {
///         let Ok(func) = tree.compile(&self.pset) else {
///             return Fitness::single(f64::INFINITY);
///         };
///         let error: f64 = (-5..=5)
///             .map(|x| {
///                 let x = f64::from(x);
///                 let y = func.call(&[x]).unwrap_or(f64::NAN);
///                 (y - x * x).powi(2)
///             })
///             .sum();
///         Fitness::single(error)
///     }
/// }
/// ```
///
/// # Thread Safety
///
/// `GpProblem` must be `Send + Sync` because the runner may evaluate
/// individuals in parallel when the `parallel` feature is enabled.
pub trait GpProblem: Send + Sync {
    /// Value type carried by the expression trees.
    type Value: Value;

    /// The primitive set defining the search space.
    fn primitive_set(&self) -> &PrimitiveSet<Self::Value>;

    /// Evaluates a tree and returns its fitness. Lower is better.
    ///
    /// Numeric failures (division by zero, overflow, domain errors) are the
    /// implementation's responsibility; the engine accepts whatever tuple is
    /// returned as long as its length matches the configured objectives.
    fn evaluate(&self, tree: &PrimitiveTree<Self::Value>) -> Fitness;

    /// Called at the end of each generation with the best-ever fitness.
    ///
    /// The default implementation is a no-op.
    fn on_generation(&self, _generation: usize, _best_fitness: &Fitness) {}
}
