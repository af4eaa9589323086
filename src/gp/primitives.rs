//! Typed primitive set: the registry defining the search space.
//!
//! A [`PrimitiveSet`] owns every primitive (function node), terminal
//! (constant, input argument, or ephemeral generator) and the type tags
//! that connect them. Generators and operators only ever query it.
//!
//! # Examples
//!
//! ```
//! use u_gp::gp::{PrimitiveSet, TypeTag};
//!
//! let float = TypeTag::new("float");
//! let mut pset = PrimitiveSet::new("main", vec![float.clone()], float.clone());
//! pset.add_primitive("add", vec![float.clone(), float.clone()], float.clone(), |a: &[f64]| a[0] + a[1])
//!     .unwrap();
//! pset.add_terminal(1.0, float.clone()).unwrap();
//! pset.add_uniform_ephemeral("rand11", float.clone(), -1.0, 1.0).unwrap();
//! pset.rename_argument(0, "x").unwrap();
//!
//! assert_eq!(pset.arg_count(), 1);
//! assert_eq!(pset.argument_names(), vec!["x"]);
//! assert!(pset.validate().is_ok());
//! ```

use super::tree::Node;
use super::types::Value;
use crate::error::{GpError, Result};
use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Identifier naming a data type, such as `"float"` or `"float32"`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(Arc<str>);

impl TypeTag {
    /// Creates a type tag.
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// The tag's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeTag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.0)
    }
}

type PrimitiveFn<V> = Arc<dyn Fn(&[V]) -> V + Send + Sync>;
type EphemeralFn<V> = Arc<dyn Fn(&mut dyn RngCore) -> V + Send + Sync>;

/// A typed operation with a fixed, non-empty argument list.
pub struct Primitive<V> {
    name: String,
    args: Vec<TypeTag>,
    ret: TypeTag,
    func: PrimitiveFn<V>,
}

impl<V> Primitive<V> {
    /// Primitive name, unique within its set.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Argument types in positional order.
    pub fn args(&self) -> &[TypeTag] {
        &self.args
    }

    /// Return type.
    pub fn ret(&self) -> &TypeTag {
        &self.ret
    }

    /// Number of arguments (always at least 1).
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Applies the operation to already evaluated arguments.
    pub fn apply(&self, args: &[V]) -> V {
        (self.func)(args)
    }
}

impl<V> fmt::Debug for Primitive<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Primitive")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("ret", &self.ret)
            .finish()
    }
}

// Names are unique within a set, so name + signature identifies a primitive.
impl<V> PartialEq for Primitive<V> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.args == other.args && self.ret == other.ret
    }
}

/// What a terminal produces when instantiated into a tree.
#[derive(Clone)]
pub enum TerminalKind<V> {
    /// A fixed value.
    Constant(V),
    /// The positional input argument with this index.
    Argument(usize),
    /// A generator sampled once per instantiation.
    Ephemeral(EphemeralFn<V>),
}

impl<V: fmt::Debug> fmt::Debug for TerminalKind<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalKind::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            TerminalKind::Argument(i) => f.debug_tuple("Argument").field(i).finish(),
            TerminalKind::Ephemeral(_) => f.write_str("Ephemeral"),
        }
    }
}

/// A zero-arity leaf candidate.
#[derive(Debug, Clone)]
pub struct Terminal<V> {
    name: String,
    ret: TypeTag,
    kind: TerminalKind<V>,
}

impl<V: Value> Terminal<V> {
    /// Terminal name, unique within its set.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type produced by the terminal.
    pub fn ret(&self) -> &TypeTag {
        &self.ret
    }

    /// The terminal's variant.
    pub fn kind(&self) -> &TerminalKind<V> {
        &self.kind
    }

    /// Materializes the terminal as a tree node.
    ///
    /// Ephemeral generators are sampled here; the resulting node is an
    /// ordinary constant with no link back to the generator.
    pub fn instantiate<R: Rng>(&self, rng: &mut R) -> Node<V> {
        match &self.kind {
            TerminalKind::Constant(value) => Node::Constant {
                value: value.clone(),
                ret: self.ret.clone(),
            },
            TerminalKind::Argument(index) => Node::Argument {
                index: *index,
                name: Arc::from(self.name.as_str()),
                ret: self.ret.clone(),
            },
            TerminalKind::Ephemeral(sample) => {
                let rng: &mut dyn RngCore = rng;
                Node::Constant {
                    value: sample(rng),
                    ret: self.ret.clone(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Signature {
    args: Vec<TypeTag>,
    ret: TypeTag,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<&str> = self.args.iter().map(TypeTag::as_str).collect();
        write!(f, "({}) -> {}", args.join(", "), self.ret)
    }
}

/// Typed registry of primitives and terminals.
///
/// Construction-time only: entries can be added and arguments renamed, but
/// nothing is ever removed. Per-type candidate lists keep insertion order,
/// so random choices are reproducible for a given seed.
#[derive(Debug, Clone)]
pub struct PrimitiveSet<V> {
    name: String,
    ins: Vec<TypeTag>,
    ret: TypeTag,
    primitives: Vec<Arc<Primitive<V>>>,
    terminals: Vec<Terminal<V>>,
    prims_by_type: HashMap<TypeTag, Vec<usize>>,
    terms_by_type: HashMap<TypeTag, Vec<usize>>,
    signatures: HashMap<String, Signature>,
}

impl<V: Value> PrimitiveSet<V> {
    /// Creates a set whose trees take `ins` as positional arguments and
    /// return `ret`.
    ///
    /// One argument terminal per input is registered, named `ARG0`, `ARG1`,
    /// and so on.
    pub fn new(name: &str, ins: Vec<TypeTag>, ret: TypeTag) -> Self {
        let mut pset = Self {
            name: name.to_string(),
            ins: ins.clone(),
            ret,
            primitives: Vec::new(),
            terminals: Vec::new(),
            prims_by_type: HashMap::new(),
            terms_by_type: HashMap::new(),
            signatures: HashMap::new(),
        };
        for (index, ty) in ins.into_iter().enumerate() {
            let term = Terminal {
                name: format!("ARG{index}"),
                ret: ty,
                kind: TerminalKind::Argument(index),
            };
            pset.push_terminal(term);
        }
        pset
    }

    /// Registers a primitive.
    ///
    /// # Errors
    ///
    /// - [`GpError::NullaryPrimitive`] if `args` is empty
    /// - [`GpError::TypeConflict`] if `name` is already registered with a
    ///   different signature
    pub fn add_primitive<F>(&mut self, name: &str, args: Vec<TypeTag>, ret: TypeTag, func: F) -> Result<()>
    where
        F: Fn(&[V]) -> V + Send + Sync + 'static,
    {
        if args.is_empty() {
            return Err(GpError::NullaryPrimitive(name.to_string()));
        }
        let signature = Signature {
            args: args.clone(),
            ret: ret.clone(),
        };
        if !self.claim_name(name, signature)? {
            return Ok(());
        }
        let index = self.primitives.len();
        self.prims_by_type.entry(ret.clone()).or_default().push(index);
        self.primitives.push(Arc::new(Primitive {
            name: name.to_string(),
            args,
            ret,
            func: Arc::new(func),
        }));
        Ok(())
    }

    /// Registers a constant terminal, identified by its rendered value.
    ///
    /// # Errors
    ///
    /// [`GpError::TypeConflict`] if the same value is already registered
    /// under another type.
    pub fn add_terminal(&mut self, value: V, ret: TypeTag) -> Result<()> {
        let name = value.to_string();
        self.add_leaf(name, ret, TerminalKind::Constant(value))
    }

    /// Registers an ephemeral constant generator.
    ///
    /// The generator runs each time the terminal is placed into a tree.
    ///
    /// # Errors
    ///
    /// [`GpError::TypeConflict`] if `name` is already registered with a
    /// different signature.
    pub fn add_ephemeral_constant<F>(&mut self, name: &str, ret: TypeTag, generator: F) -> Result<()>
    where
        F: Fn(&mut dyn RngCore) -> V + Send + Sync + 'static,
    {
        self.add_leaf(name.to_string(), ret, TerminalKind::Ephemeral(Arc::new(generator)))
    }

    /// Renames the input argument at `index`.
    ///
    /// # Errors
    ///
    /// - [`GpError::UnknownArgument`] if `index` is out of range
    /// - [`GpError::TypeConflict`] if `name` is taken by another entry
    pub fn rename_argument(&mut self, index: usize, name: &str) -> Result<()> {
        let count = self.ins.len();
        let pos = self
            .terminals
            .iter()
            .position(|t| matches!(t.kind, TerminalKind::Argument(i) if i == index))
            .ok_or(GpError::UnknownArgument { index, count })?;

        let old = self.terminals[pos].name.clone();
        if old == name {
            return Ok(());
        }
        let signature = Signature {
            args: Vec::new(),
            ret: self.terminals[pos].ret.clone(),
        };
        if let Some(existing) = self.signatures.get(name) {
            return Err(GpError::TypeConflict {
                name: name.to_string(),
                existing: existing.to_string(),
                requested: signature.to_string(),
            });
        }
        self.signatures.remove(&old);
        self.signatures.insert(name.to_string(), signature);
        self.terminals[pos].name = name.to_string();
        Ok(())
    }

    /// Set name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type every tree must return.
    pub fn root_type(&self) -> &TypeTag {
        &self.ret
    }

    /// Positional input argument types.
    pub fn input_types(&self) -> &[TypeTag] {
        &self.ins
    }

    /// Number of input arguments of compiled trees.
    pub fn arg_count(&self) -> usize {
        self.ins.len()
    }

    /// Current argument names in positional order.
    pub fn argument_names(&self) -> Vec<&str> {
        let mut names = vec![""; self.ins.len()];
        for term in &self.terminals {
            if let TerminalKind::Argument(i) = term.kind {
                names[i] = term.name.as_str();
            }
        }
        names
    }

    /// All registered primitives, in registration order.
    pub fn primitives(&self) -> &[Arc<Primitive<V>>] {
        &self.primitives
    }

    /// All registered terminals, in registration order.
    pub fn terminals(&self) -> &[Terminal<V>] {
        &self.terminals
    }

    /// Primitives returning `ty`.
    pub fn primitives_of<'a>(&'a self, ty: &TypeTag) -> impl Iterator<Item = &'a Arc<Primitive<V>>> + 'a {
        self.primitive_ids(ty).iter().map(|&i| &self.primitives[i])
    }

    /// Terminals returning `ty`.
    pub fn terminals_of<'a>(&'a self, ty: &TypeTag) -> impl Iterator<Item = &'a Terminal<V>> + 'a {
        self.terminal_ids(ty).iter().map(|&i| &self.terminals[i])
    }

    pub(crate) fn primitive_ids(&self, ty: &TypeTag) -> &[usize] {
        self.prims_by_type.get(ty).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn terminal_ids(&self, ty: &TypeTag) -> &[usize] {
        self.terms_by_type.get(ty).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn primitive(&self, id: usize) -> &Arc<Primitive<V>> {
        &self.primitives[id]
    }

    pub(crate) fn terminal(&self, id: usize) -> &Terminal<V> {
        &self.terminals[id]
    }

    /// Fraction of terminals among all registered entries.
    ///
    /// Used by the Grow method as the probability of stopping early.
    pub fn terminal_ratio(&self) -> f64 {
        let terms = self.terminals.len();
        let total = terms + self.primitives.len();
        if total == 0 {
            0.0
        } else {
            terms as f64 / total as f64
        }
    }

    /// Checks that every type reachable from the root has a terminal.
    ///
    /// Without this, generation at the depth limit cannot complete.
    ///
    /// # Errors
    ///
    /// [`GpError::UnsatisfiableType`] naming the first offending type, with
    /// the depth at which it is first reached.
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashSet<&TypeTag> = HashSet::new();
        let mut frontier: Vec<(&TypeTag, usize)> = vec![(&self.ret, 0)];
        seen.insert(&self.ret);
        let mut cursor = 0;
        while cursor < frontier.len() {
            let (ty, depth) = frontier[cursor];
            cursor += 1;
            if self.terminal_ids(ty).is_empty() {
                return Err(GpError::UnsatisfiableType {
                    type_tag: ty.clone(),
                    depth,
                });
            }
            for &id in self.primitive_ids(ty) {
                for arg in &self.primitives[id].args {
                    if seen.insert(arg) {
                        frontier.push((arg, depth + 1));
                    }
                }
            }
        }
        Ok(())
    }

    fn add_leaf(&mut self, name: String, ret: TypeTag, kind: TerminalKind<V>) -> Result<()> {
        let signature = Signature {
            args: Vec::new(),
            ret: ret.clone(),
        };
        if self.claim_name(&name, signature)? {
            self.push_terminal(Terminal { name, ret, kind });
        }
        Ok(())
    }

    fn push_terminal(&mut self, term: Terminal<V>) {
        let index = self.terminals.len();
        self.signatures.insert(
            term.name.clone(),
            Signature {
                args: Vec::new(),
                ret: term.ret.clone(),
            },
        );
        self.terms_by_type.entry(term.ret.clone()).or_default().push(index);
        self.terminals.push(term);
    }

    /// Returns `Ok(true)` if `name` is new, `Ok(false)` if it is already
    /// registered with the same signature.
    fn claim_name(&mut self, name: &str, signature: Signature) -> Result<bool> {
        match self.signatures.get(name) {
            Some(existing) if *existing == signature => {
                log::warn!("`{name}` already registered in `{}`; ignoring duplicate", self.name);
                Ok(false)
            }
            Some(existing) => Err(GpError::TypeConflict {
                name: name.to_string(),
                existing: existing.to_string(),
                requested: signature.to_string(),
            }),
            None => {
                self.signatures.insert(name.to_string(), signature);
                Ok(true)
            }
        }
    }
}

impl PrimitiveSet<f64> {
    /// Registers an ephemeral constant drawn uniformly from `[low, high)`.
    ///
    /// # Errors
    ///
    /// - [`GpError::InvalidConfig`] if `low >= high` or either bound is not finite
    /// - [`GpError::TypeConflict`] as for [`add_ephemeral_constant`](Self::add_ephemeral_constant)
    pub fn add_uniform_ephemeral(&mut self, name: &str, ret: TypeTag, low: f64, high: f64) -> Result<()> {
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(GpError::InvalidConfig(format!(
                "ephemeral `{name}`: invalid range [{low}, {high})"
            )));
        }
        self.add_ephemeral_constant(name, ret, move |rng| low + (high - low) * rng.random::<f64>())
    }

    /// Registers an ephemeral constant drawn from `N(mean, std_dev²)`.
    ///
    /// # Errors
    ///
    /// - [`GpError::InvalidConfig`] if `mean` is not finite or `std_dev` is
    ///   negative or not finite
    /// - [`GpError::TypeConflict`] as for [`add_ephemeral_constant`](Self::add_ephemeral_constant)
    pub fn add_gaussian_ephemeral(&mut self, name: &str, ret: TypeTag, mean: f64, std_dev: f64) -> Result<()> {
        // Normal::new only rejects a non-finite std_dev
        if !(mean.is_finite() && std_dev.is_finite() && std_dev >= 0.0) {
            return Err(GpError::InvalidConfig(format!(
                "ephemeral `{name}`: invalid normal parameters (mean {mean}, std_dev {std_dev})"
            )));
        }
        let normal = Normal::new(mean, std_dev)
            .map_err(|e| GpError::InvalidConfig(format!("ephemeral `{name}`: {e}")))?;
        self.add_ephemeral_constant(name, ret, move |rng| normal.sample(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::create_rng;

    fn float() -> TypeTag {
        TypeTag::new("float")
    }

    fn arithmetic() -> PrimitiveSet<f64> {
        let f = float();
        let mut pset = PrimitiveSet::new("main", vec![f.clone()], f.clone());
        pset.add_primitive("add", vec![f.clone(), f.clone()], f.clone(), |a: &[f64]| a[0] + a[1])
            .unwrap();
        pset.add_primitive("neg", vec![f.clone()], f.clone(), |a: &[f64]| -a[0])
            .unwrap();
        pset.add_terminal(1.0, f).unwrap();
        pset
    }

    #[test]
    fn test_arguments_registered_as_terminals() {
        let pset = arithmetic();
        assert_eq!(pset.arg_count(), 1);
        assert_eq!(pset.argument_names(), vec!["ARG0"]);
        assert_eq!(pset.terminals_of(&float()).count(), 2);
        assert_eq!(pset.primitives_of(&float()).count(), 2);
    }

    #[test]
    fn test_rename_argument() {
        let mut pset = arithmetic();
        pset.rename_argument(0, "x").unwrap();
        assert_eq!(pset.argument_names(), vec!["x"]);

        let err = pset.rename_argument(3, "y").unwrap_err();
        assert_eq!(err, GpError::UnknownArgument { index: 3, count: 1 });
    }

    #[test]
    fn test_rename_to_taken_name_conflicts() {
        let mut pset = arithmetic();
        let err = pset.rename_argument(0, "add").unwrap_err();
        assert!(matches!(err, GpError::TypeConflict { .. }));
    }

    #[test]
    fn test_conflicting_primitive_signature() {
        let mut pset = arithmetic();
        let f32_tag = TypeTag::new("float32");
        let err = pset
            .add_primitive("add", vec![float(), f32_tag], float(), |a: &[f64]| a[0] + a[1])
            .unwrap_err();
        assert!(matches!(err, GpError::TypeConflict { ref name, .. } if name == "add"));
    }

    #[test]
    fn test_identical_reregistration_is_ignored() {
        let mut pset = arithmetic();
        pset.add_primitive("add", vec![float(), float()], float(), |a: &[f64]| a[0] + a[1])
            .unwrap();
        pset.add_terminal(1.0, float()).unwrap();
        assert_eq!(pset.primitives().len(), 2);
        assert_eq!(pset.terminals().len(), 2);
    }

    #[test]
    fn test_conflicting_terminal_type() {
        let mut pset = arithmetic();
        let err = pset.add_terminal(1.0, TypeTag::new("float32")).unwrap_err();
        assert!(matches!(err, GpError::TypeConflict { .. }));
    }

    #[test]
    fn test_nullary_primitive_rejected() {
        let mut pset = arithmetic();
        let err = pset
            .add_primitive("pi", vec![], float(), |_: &[f64]| std::f64::consts::PI)
            .unwrap_err();
        assert_eq!(err, GpError::NullaryPrimitive("pi".into()));
    }

    #[test]
    fn test_terminal_ratio() {
        let pset = arithmetic();
        assert!((pset.terminal_ratio() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_ephemeral_sampled_per_instantiation() {
        let mut pset = arithmetic();
        pset.add_uniform_ephemeral("rand11", float(), -1.0, 1.0).unwrap();
        let term = pset.terminals_of(&float()).find(|t| t.name() == "rand11").unwrap().clone();

        let mut rng = create_rng(42);
        let values: Vec<f64> = (0..20)
            .map(|_| match term.instantiate(&mut rng) {
                Node::Constant { value, .. } => value,
                other => panic!("expected constant, got {other:?}"),
            })
            .collect();
        assert!(values.iter().all(|v| (-1.0..1.0).contains(v)));
        assert!(values.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_invalid_ephemeral_parameters() {
        let mut pset = arithmetic();
        assert!(pset.add_uniform_ephemeral("bad", float(), 1.0, 1.0).is_err());
        assert!(pset.add_gaussian_ephemeral("bad", float(), 0.0, -1.0).is_err());
        assert!(pset.add_gaussian_ephemeral("randn5", float(), 0.0, 5.0).is_ok());
    }

    #[test]
    fn test_gaussian_ephemeral_parameter_errors() {
        let mut pset = arithmetic();
        for (mean, std_dev) in [(0.0, -1.0), (0.0, f64::NAN), (0.0, f64::INFINITY), (f64::NAN, 1.0)] {
            let err = pset
                .add_gaussian_ephemeral("gauss", float(), mean, std_dev)
                .unwrap_err();
            assert!(matches!(err, GpError::InvalidConfig(_)), "{mean}, {std_dev}: {err:?}");
        }
        // rejected registrations leave no trace
        assert!(pset.terminals().iter().all(|t| t.name() != "gauss"));

        pset.add_gaussian_ephemeral("gauss", float(), 0.0, 0.0).unwrap();
        let term = pset.terminals_of(&float()).find(|t| t.name() == "gauss").unwrap();
        let mut rng = create_rng(1);
        match term.instantiate(&mut rng) {
            Node::Constant { value, .. } => assert_eq!(value, 0.0),
            other => panic!("expected constant, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_detects_type_without_terminals() {
        let f = float();
        let g = TypeTag::new("float32");
        let mut pset: PrimitiveSet<f64> = PrimitiveSet::new("main", vec![], f.clone());
        pset.add_terminal(1.0, f.clone()).unwrap();
        pset.add_primitive("cast", vec![g.clone()], f, |a: &[f64]| a[0]).unwrap();

        let err = pset.validate().unwrap_err();
        assert_eq!(
            err,
            GpError::UnsatisfiableType {
                type_tag: g.clone(),
                depth: 1
            }
        );

        pset.add_terminal(2.0, g).unwrap();
        assert!(pset.validate().is_ok());
    }
}
