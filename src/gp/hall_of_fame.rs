//! Bounded archive of the best individuals ever seen.

use super::types::{compare_fitness, Individual, Value};
use std::cmp::Ordering;

/// Fixed-capacity archive of the best individuals, best first.
///
/// Entries are deep copies, so later variation of the live population
/// never touches the archive. An individual with the same fitness and the
/// same tree as an archived entry is not inserted twice.
///
/// # Examples
///
/// ```
/// use u_gp::gp::{Fitness, HallOfFame, Individual, Node, PrimitiveTree, TypeTag};
///
/// let leaf = |v: f64| {
///     let tree = PrimitiveTree::new(vec![Node::Constant { value: v, ret: TypeTag::new("float") }]).unwrap();
///     let mut ind = Individual::new(tree);
///     ind.set_fitness(Fitness::single(v));
///     ind
/// };
///
/// let mut hof = HallOfFame::new(2);
/// hof.update(&[leaf(3.0), leaf(1.0), leaf(2.0)]);
/// assert_eq!(hof.len(), 2);
/// assert_eq!(hof.best().unwrap().fitness(), Some(&Fitness::single(1.0)));
/// ```
#[derive(Debug, Clone)]
pub struct HallOfFame<V> {
    entries: Vec<Individual<V>>,
    capacity: usize,
}

impl<V: Value> HallOfFame<V> {
    /// Creates an empty archive holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Offers every evaluated individual of `population` to the archive.
    ///
    /// An individual enters when the archive has free room or it is
    /// strictly better than the worst entry. Equal-fitness entries keep
    /// their arrival order. Unevaluated individuals are ignored.
    pub fn update(&mut self, population: &[Individual<V>]) {
        if self.capacity == 0 {
            return;
        }
        for ind in population {
            let Some(fitness) = ind.fitness() else {
                continue;
            };
            let admissible = self.entries.len() < self.capacity
                || self
                    .entries
                    .last()
                    .is_some_and(|worst| compare_fitness(Some(fitness), worst.fitness()) == Ordering::Less);
            if !admissible || self.contains(ind) {
                continue;
            }
            if self.entries.len() >= self.capacity {
                self.entries.pop();
            }
            let pos = self
                .entries
                .partition_point(|e| compare_fitness(e.fitness(), Some(fitness)) != Ordering::Greater);
            self.entries.insert(pos, ind.clone());
        }
    }

    /// The best entry.
    pub fn best(&self) -> Option<&Individual<V>> {
        self.entries.first()
    }

    /// Entry at rank `index` (0 = best).
    pub fn get(&self, index: usize) -> Option<&Individual<V>> {
        self.entries.get(index)
    }

    /// Entries, best first.
    pub fn iter(&self) -> impl Iterator<Item = &Individual<V>> {
        self.entries.iter()
    }

    /// Number of archived entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been archived yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn contains(&self, ind: &Individual<V>) -> bool {
        self.entries
            .iter()
            .any(|e| e.fitness() == ind.fitness() && e.tree == ind.tree)
    }
}
