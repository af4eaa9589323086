//! Type-safe genetic operators for expression trees.
//!
//! # Crossover
//!
//! - [`crossover_one_point`]: exchange two subtrees of the same type
//!
//! # Mutation
//!
//! - [`mutate_uniform`]: replace a random subtree with a freshly generated one
//!
//! # Bloat control
//!
//! - [`StaticLimit`]: reverts offspring exceeding a height (or size) bound
//!   to the individual they were produced from
//!
//! # References
//!
//! - Koza (1992), *Genetic Programming*
//! - Koza (1992), static depth limit of 17 for offspring
//! - Montana (1995), "Strongly Typed Genetic Programming"

use super::generate::Generator;
use super::primitives::PrimitiveSet;
use super::tree::PrimitiveTree;
use super::types::{Individual, Value};
use crate::error::Result;
use rand::Rng;

// ============================================================================
// Crossover
// ============================================================================

/// One-point typed subtree crossover.
///
/// Picks a uniform random non-root node in `a`, then scans the non-root
/// nodes of `b` in random order for the first node of the same type. If
/// one is found, the two subtrees are swapped in place.
///
/// Trees with fewer than two nodes, or pairs without a type-compatible
/// point, are left unchanged. This never fails.
///
/// Returns `true` if subtrees were exchanged.
///
/// # Complexity
/// O(|a| + |b|)
pub fn crossover_one_point<V: Value, R: Rng>(
    a: &mut PrimitiveTree<V>,
    b: &mut PrimitiveTree<V>,
    rng: &mut R,
) -> bool {
    if a.len() < 2 || b.len() < 2 {
        return false;
    }

    let index_a = rng.random_range(1..a.len());
    let ty = a.nodes()[index_a].ret().clone();

    // Lazy Fisher-Yates over b's non-root indices: stop at first match.
    let mut order: Vec<usize> = (1..b.len()).collect();
    let mut index_b = None;
    for k in 0..order.len() {
        let j = rng.random_range(k..order.len());
        order.swap(k, j);
        if *b.nodes()[order[k]].ret() == ty {
            index_b = Some(order[k]);
            break;
        }
    }
    let Some(index_b) = index_b else {
        return false;
    };

    let range_a = a.search_subtree(index_a);
    let range_b = b.search_subtree(index_b);
    let sub_a = a.nodes()[range_a.clone()].to_vec();
    let sub_b = b.nodes()[range_b.clone()].to_vec();
    a.replace_subtree(range_a, sub_b);
    b.replace_subtree(range_b, sub_a);
    true
}

// ============================================================================
// Mutation
// ============================================================================

/// Uniform subtree mutation.
///
/// Picks a uniform random node (the root included), discards its subtree
/// and splices in a new subtree of the same type built by `generator`. The
/// tree's root type never changes.
///
/// # Errors
///
/// Propagates generator errors ([`GpError::UnsatisfiableType`],
/// [`GpError::InvalidConfig`]).
///
/// [`GpError::UnsatisfiableType`]: crate::error::GpError::UnsatisfiableType
/// [`GpError::InvalidConfig`]: crate::error::GpError::InvalidConfig
pub fn mutate_uniform<V: Value, R: Rng>(
    tree: &mut PrimitiveTree<V>,
    pset: &PrimitiveSet<V>,
    generator: &Generator,
    rng: &mut R,
) -> Result<()> {
    let index = rng.random_range(0..tree.len());
    let ty = tree.nodes()[index].ret().clone();
    let replacement = generator.generate_typed(pset, &ty, rng)?;
    let range = tree.search_subtree(index);
    tree.replace_subtree(range, replacement);
    Ok(())
}

// ============================================================================
// Static limit
// ============================================================================

/// Tree measure bounded by a [`StaticLimit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LimitKey {
    /// Tree height.
    #[default]
    Height,
    /// Node count.
    Size,
}

/// Structural limit wrapped around a variation operator.
///
/// After the operator runs, any offspring whose measure exceeds
/// `max_value` is replaced by the individual it was produced from, exactly
/// as it was before the operator ran. There is no retry.
///
/// Offspring whose tree actually changed lose their fitness; reverted or
/// untouched offspring keep theirs.
///
/// # Examples
///
/// ```
/// use u_gp::gp::operators::{crossover_one_point, StaticLimit};
/// # use u_gp::gp::{Generator, Individual, PrimitiveSet, TypeTag};
/// # use u_gp::random::create_rng;
/// # let f = TypeTag::new("float");
/// # let mut pset = PrimitiveSet::new("main", vec![], f.clone());
/// # pset.add_primitive("add", vec![f.clone(), f.clone()], f.clone(), |a: &[f64]| a[0] + a[1]).unwrap();
/// # pset.add_terminal(1.0, f).unwrap();
/// let mut rng = create_rng(0);
/// let gen = Generator::full(3, 3);
/// let mut pair = vec![
///     Individual::new(gen.generate(&pset, &mut rng).unwrap()),
///     Individual::new(gen.generate(&pset, &mut rng).unwrap()),
/// ];
///
/// let limit = StaticLimit::height(3);
/// limit
///     .apply(&mut pair, |inds| {
///         let (a, b) = inds.split_at_mut(1);
///         crossover_one_point(&mut a[0].tree, &mut b[0].tree, &mut rng);
///         Ok(())
///     })
///     .unwrap();
/// assert!(pair.iter().all(|ind| ind.tree.height() <= 3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StaticLimit {
    /// What to measure.
    pub key: LimitKey,
    /// Largest accepted measure (inclusive).
    pub max_value: usize,
}

impl StaticLimit {
    /// Limit on tree height.
    pub fn height(max_value: usize) -> Self {
        Self {
            key: LimitKey::Height,
            max_value,
        }
    }

    /// Limit on node count.
    pub fn size(max_value: usize) -> Self {
        Self {
            key: LimitKey::Size,
            max_value,
        }
    }

    /// A limit that never rejects.
    pub fn unbounded() -> Self {
        Self::height(usize::MAX)
    }

    /// Measures a tree with this limit's key.
    pub fn measure<V: Value>(&self, tree: &PrimitiveTree<V>) -> usize {
        match self.key {
            LimitKey::Height => tree.height(),
            LimitKey::Size => tree.len(),
        }
    }

    /// Runs `op` on `individuals`, then enforces the limit.
    ///
    /// Returns the number of offspring reverted.
    ///
    /// # Errors
    ///
    /// Errors from `op` propagate; on error the individuals are left as the
    /// operator left them.
    pub fn apply<V, F>(&self, individuals: &mut [Individual<V>], op: F) -> Result<usize>
    where
        V: Value,
        F: FnOnce(&mut [Individual<V>]) -> Result<()>,
    {
        let originals: Vec<Individual<V>> = individuals.to_vec();
        op(individuals)?;

        let mut reverted = 0;
        for (ind, orig) in individuals.iter_mut().zip(originals) {
            if self.measure(&ind.tree) > self.max_value {
                log::trace!(
                    "static limit: reverting offspring ({:?} {} > {})",
                    self.key,
                    self.measure(&ind.tree),
                    self.max_value
                );
                *ind = orig;
                reverted += 1;
            } else if ind.tree != orig.tree {
                ind.invalidate();
            }
        }
        Ok(reverted)
    }
}
