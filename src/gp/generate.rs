//! Random tree construction.
//!
//! # Methods
//!
//! - [`InitMethod::Full`]: every leaf sits exactly at the target height
//! - [`InitMethod::Grow`]: leaves may appear at any depth past `min_depth`
//! - [`InitMethod::HalfAndHalf`]: fair coin between Full and Grow per tree
//!
//! For each tree the target height is drawn uniformly from
//! `[min_depth, max_depth]`.
//!
//! # References
//!
//! - Koza (1992), *Genetic Programming: On the Programming of Computers by
//!   Means of Natural Selection*
//! - Montana (1995), "Strongly Typed Genetic Programming"

use super::primitives::{PrimitiveSet, TypeTag};
use super::tree::{Node, PrimitiveTree};
use super::types::Value;
use crate::error::{GpError, Result};
use rand::Rng;

/// Tree construction method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InitMethod {
    /// Primitives down to the target height, terminals exactly there.
    Full,
    /// Terminals chosen with the set's terminal ratio past `min_depth`.
    Grow,
    /// Full or Grow, chosen per tree.
    #[default]
    HalfAndHalf,
}

/// Random tree generator with depth bounds.
///
/// # Examples
///
/// ```
/// use u_gp::gp::{Generator, PrimitiveSet, TypeTag};
/// use u_gp::random::create_rng;
///
/// let f = TypeTag::new("float");
/// let mut pset = PrimitiveSet::new("main", vec![], f.clone());
/// pset.add_primitive("add", vec![f.clone(), f.clone()], f.clone(), |a: &[f64]| a[0] + a[1])
///     .unwrap();
/// pset.add_terminal(1.0, f.clone()).unwrap();
///
/// let mut rng = create_rng(42);
/// let tree = Generator::full(2, 2).generate(&pset, &mut rng).unwrap();
/// assert_eq!(tree.height(), 2);
/// assert_eq!(tree.len(), 7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Generator {
    /// Construction method.
    pub method: InitMethod,
    /// Minimum target height.
    pub min_depth: usize,
    /// Maximum target height (inclusive).
    pub max_depth: usize,
}

impl Generator {
    /// Creates a generator.
    pub fn new(method: InitMethod, min_depth: usize, max_depth: usize) -> Self {
        Self {
            method,
            min_depth,
            max_depth,
        }
    }

    /// Full method generator.
    pub fn full(min_depth: usize, max_depth: usize) -> Self {
        Self::new(InitMethod::Full, min_depth, max_depth)
    }

    /// Grow method generator.
    pub fn grow(min_depth: usize, max_depth: usize) -> Self {
        Self::new(InitMethod::Grow, min_depth, max_depth)
    }

    /// Ramped half-and-half generator.
    pub fn half_and_half(min_depth: usize, max_depth: usize) -> Self {
        Self::new(InitMethod::HalfAndHalf, min_depth, max_depth)
    }

    /// Validates the depth bounds.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.min_depth > self.max_depth {
            return Err(format!(
                "min_depth ({}) exceeds max_depth ({})",
                self.min_depth, self.max_depth
            ));
        }
        Ok(())
    }

    /// Generates a complete tree returning the set's root type.
    ///
    /// # Errors
    ///
    /// See [`generate_typed`](Self::generate_typed).
    pub fn generate<V: Value, R: Rng>(&self, pset: &PrimitiveSet<V>, rng: &mut R) -> Result<PrimitiveTree<V>> {
        let nodes = self.generate_typed(pset, pset.root_type(), rng)?;
        Ok(PrimitiveTree::from_nodes(nodes))
    }

    /// Generates prefix-ordered nodes for a subtree returning `ty`.
    ///
    /// # Errors
    ///
    /// - [`GpError::InvalidConfig`] if `min_depth > max_depth`
    /// - [`GpError::UnsatisfiableType`] if some required type has no
    ///   candidate able to fill its position
    pub fn generate_typed<V: Value, R: Rng>(
        &self,
        pset: &PrimitiveSet<V>,
        ty: &TypeTag,
        rng: &mut R,
    ) -> Result<Vec<Node<V>>> {
        self.validate().map_err(GpError::InvalidConfig)?;

        let method = match self.method {
            InitMethod::HalfAndHalf => {
                if rng.random_bool(0.5) {
                    InitMethod::Grow
                } else {
                    InitMethod::Full
                }
            }
            m => m,
        };
        let height = rng.random_range(self.min_depth..=self.max_depth);
        let ratio = pset.terminal_ratio();

        let mut nodes = Vec::new();
        let mut stack: Vec<(usize, TypeTag)> = vec![(0, ty.clone())];
        while let Some((depth, ty)) = stack.pop() {
            let want_terminal = depth >= height
                || (method == InitMethod::Grow && depth >= self.min_depth && rng.random::<f64>() < ratio);

            let prims = pset.primitive_ids(&ty);
            let terms = pset.terminal_ids(&ty);
            let use_terminal = match (want_terminal, terms.is_empty(), prims.is_empty()) {
                (_, true, true) => return Err(GpError::UnsatisfiableType { type_tag: ty, depth }),
                // depth exhausted, nothing can end the branch here
                (true, true, false) if depth >= height => {
                    return Err(GpError::UnsatisfiableType { type_tag: ty, depth })
                }
                (true, true, false) => false,
                (false, false, true) => true,
                (want, _, _) => want,
            };

            if use_terminal {
                let id = terms[rng.random_range(0..terms.len())];
                nodes.push(pset.terminal(id).instantiate(rng));
            } else {
                let id = prims[rng.random_range(0..prims.len())];
                let prim = pset.primitive(id).clone();
                for arg in prim.args().iter().rev() {
                    stack.push((depth + 1, arg.clone()));
                }
                nodes.push(Node::Primitive(prim));
            }
        }
        Ok(nodes)
    }
}
