//! Expression trees in flat prefix layout.
//!
//! A [`PrimitiveTree`] stores its nodes in pre-order. The subtree rooted at
//! index `i` is the contiguous range starting at `i` that ends once the
//! cumulative arity of the scanned nodes is exhausted, so subtree queries,
//! crossover and mutation are plain slice operations.

use super::primitives::{Primitive, TypeTag};
use super::types::Value;
use crate::error::{GpError, Result};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// A single tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node<V> {
    /// Function node; its children are the next `arity` subtrees.
    Primitive(Arc<Primitive<V>>),
    /// Frozen constant (fixed terminal or sampled ephemeral).
    Constant { value: V, ret: TypeTag },
    /// Positional input argument.
    Argument {
        index: usize,
        name: Arc<str>,
        ret: TypeTag,
    },
}

impl<V> Node<V> {
    /// Type produced by this node.
    pub fn ret(&self) -> &TypeTag {
        match self {
            Node::Primitive(p) => p.ret(),
            Node::Constant { ret, .. } | Node::Argument { ret, .. } => ret,
        }
    }

    /// Number of children.
    pub fn arity(&self) -> usize {
        match self {
            Node::Primitive(p) => p.arity(),
            Node::Constant { .. } | Node::Argument { .. } => 0,
        }
    }

    /// Declared child types, empty for leaves.
    pub fn arg_types(&self) -> &[TypeTag] {
        match self {
            Node::Primitive(p) => p.args(),
            Node::Constant { .. } | Node::Argument { .. } => &[],
        }
    }

    /// Returns `true` for constants and arguments.
    pub fn is_leaf(&self) -> bool {
        self.arity() == 0
    }
}

impl<V: fmt::Display> fmt::Display for Node<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Primitive(p) => f.write_str(p.name()),
            Node::Constant { value, .. } => write!(f, "{value}"),
            Node::Argument { name, .. } => f.write_str(name),
        }
    }
}

/// Typed expression tree.
///
/// Invariants for any tree produced by the engine:
/// - each primitive's declared argument types match its children's return
///   types, left to right;
/// - the root returns the primitive set's root type;
/// - every node has exactly `arity` children.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveTree<V> {
    nodes: Vec<Node<V>>,
}

impl<V: Value> PrimitiveTree<V> {
    /// Builds a tree from prefix-ordered nodes, checking saturation and
    /// child types.
    ///
    /// # Errors
    ///
    /// [`GpError::ArityMismatch`] or [`GpError::TypeMismatch`] if the nodes
    /// do not form exactly one well-typed tree.
    pub fn new(nodes: Vec<Node<V>>) -> Result<Self> {
        let tree = Self { nodes };
        let root = tree
            .nodes
            .first()
            .map(|n| n.ret().clone())
            .ok_or_else(|| GpError::ArityMismatch("tree has no nodes".into()))?;
        tree.check(&root)?;
        Ok(tree)
    }

    pub(crate) fn from_nodes(nodes: Vec<Node<V>>) -> Self {
        debug_assert!(!nodes.is_empty(), "tree must have a root");
        Self { nodes }
    }

    /// Nodes in prefix order.
    pub fn nodes(&self) -> &[Node<V>] {
        &self.nodes
    }

    /// Node count.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false` for trees built by the engine.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root node.
    pub fn root(&self) -> &Node<V> {
        &self.nodes[0]
    }

    /// Longest root-to-leaf path, counted in edges. A single node has
    /// height 0.
    pub fn height(&self) -> usize {
        let mut stack = vec![0usize];
        let mut max_depth = 0;
        for node in &self.nodes {
            let depth = stack.pop().unwrap_or(0);
            max_depth = max_depth.max(depth);
            stack.extend(std::iter::repeat(depth + 1).take(node.arity()));
        }
        max_depth
    }

    /// Index range of the subtree rooted at `begin`.
    ///
    /// # Panics
    ///
    /// Panics if `begin` is out of bounds.
    pub fn search_subtree(&self, begin: usize) -> Range<usize> {
        let mut end = begin + 1;
        let mut remaining = self.nodes[begin].arity();
        while remaining > 0 {
            remaining = remaining + self.nodes[end].arity() - 1;
            end += 1;
        }
        begin..end
    }

    /// Replaces the subtree at `range` with `replacement` nodes.
    pub(crate) fn replace_subtree<I>(&mut self, range: Range<usize>, replacement: I)
    where
        I: IntoIterator<Item = Node<V>>,
    {
        self.nodes.splice(range, replacement);
    }

    /// Verifies the structural invariants against an expected root type.
    ///
    /// # Errors
    ///
    /// - [`GpError::TypeMismatch`] for a node of the wrong type
    /// - [`GpError::ArityMismatch`] for missing or trailing nodes
    pub fn check(&self, root: &TypeTag) -> Result<()> {
        let mut expected: Vec<&TypeTag> = vec![root];
        for (position, node) in self.nodes.iter().enumerate() {
            let want = expected.pop().ok_or_else(|| {
                GpError::ArityMismatch(format!(
                    "{} trailing node(s) after a complete tree",
                    self.nodes.len() - position
                ))
            })?;
            if node.ret() != want {
                return Err(GpError::TypeMismatch {
                    position,
                    expected: want.clone(),
                    found: node.ret().clone(),
                });
            }
            expected.extend(node.arg_types().iter().rev());
        }
        if expected.is_empty() {
            Ok(())
        } else {
            Err(GpError::ArityMismatch(format!(
                "tree is missing {} child node(s)",
                expected.len()
            )))
        }
    }
}

impl<V: fmt::Display> fmt::Display for PrimitiveTree<V> {
    /// Renders the tree in call syntax, e.g. `add(mul(x, 2), 3)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack: Vec<(&Node<V>, Vec<String>)> = Vec::new();
        for node in &self.nodes {
            stack.push((node, Vec::new()));
            while let Some((top, args)) = stack.last() {
                if args.len() < top.arity() {
                    break;
                }
                let text = if top.arity() == 0 {
                    top.to_string()
                } else {
                    format!("{top}({})", args.join(", "))
                };
                stack.pop();
                match stack.last_mut() {
                    Some((_, parent_args)) => parent_args.push(text),
                    None => return f.write_str(&text),
                }
            }
        }
        Ok(())
    }
}
