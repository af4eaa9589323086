//! Tree compilation into callable expressions.
//!
//! Compilation validates the tree once against its primitive set; the
//! resulting [`CompiledExpr`] evaluates the prefix node sequence with a
//! value stack, binding input arguments by position.

use super::primitives::PrimitiveSet;
use super::tree::{Node, PrimitiveTree};
use super::types::Value;
use crate::error::{GpError, Result};

/// A validated tree ready for evaluation.
///
/// Borrows the tree; compiling is cheap and does not copy nodes.
#[derive(Debug, Clone, Copy)]
pub struct CompiledExpr<'a, V> {
    nodes: &'a [Node<V>],
    arg_count: usize,
}

impl<V: Value> PrimitiveTree<V> {
    /// Compiles the tree for the given primitive set.
    ///
    /// # Errors
    ///
    /// - [`GpError::TypeMismatch`] / [`GpError::ArityMismatch`] if the tree
    ///   violates its structural invariants or does not return the set's
    ///   root type
    /// - [`GpError::UnknownArgument`] if the tree references an argument the
    ///   set does not declare
    pub fn compile(&self, pset: &PrimitiveSet<V>) -> Result<CompiledExpr<'_, V>> {
        self.check(pset.root_type())?;
        let count = pset.arg_count();
        for node in self.nodes() {
            if let Node::Argument { index, .. } = node {
                if *index >= count {
                    return Err(GpError::UnknownArgument { index: *index, count });
                }
            }
        }
        Ok(CompiledExpr {
            nodes: self.nodes(),
            arg_count: count,
        })
    }
}

impl<V: Value> CompiledExpr<'_, V> {
    /// Number of positional arguments expected by [`call`](Self::call).
    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    /// Evaluates the expression with positional arguments.
    ///
    /// # Errors
    ///
    /// [`GpError::ArityMismatch`] if `args.len()` differs from the primitive
    /// set's declared input count.
    pub fn call(&self, args: &[V]) -> Result<V> {
        if args.len() != self.arg_count {
            return Err(GpError::ArityMismatch(format!(
                "expression takes {} argument(s), {} given",
                self.arg_count,
                args.len()
            )));
        }

        let mut stack: Vec<V> = Vec::with_capacity(self.nodes.len());
        let mut operands: Vec<V> = Vec::new();
        // Reverse prefix order visits children before parents; the first
        // child ends up on top of the stack.
        for node in self.nodes.iter().rev() {
            match node {
                Node::Constant { value, .. } => stack.push(value.clone()),
                Node::Argument { index, .. } => stack.push(args[*index].clone()),
                Node::Primitive(p) => {
                    operands.clear();
                    for _ in 0..p.arity() {
                        // validated at compile time
                        let v = stack.pop().ok_or_else(|| {
                            GpError::ArityMismatch(format!("`{}` is missing operands", p.name()))
                        })?;
                        operands.push(v);
                    }
                    stack.push(p.apply(&operands));
                }
            }
        }
        stack
            .pop()
            .ok_or_else(|| GpError::ArityMismatch("empty expression".into()))
    }
}
