//! Error type shared by every GP component.

use crate::gp::TypeTag;
use thiserror::Error;

/// Errors raised while configuring or running the GP engine.
///
/// Setup-time errors ([`TypeConflict`](GpError::TypeConflict),
/// [`NullaryPrimitive`](GpError::NullaryPrimitive),
/// [`UnknownArgument`](GpError::UnknownArgument),
/// [`InvalidConfig`](GpError::InvalidConfig)) surface before evolution
/// starts. Once the loop is running, any error ends the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpError {
    #[error("type conflict for `{name}`: registered as {existing}, requested as {requested}")]
    TypeConflict {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("cannot produce a node of type `{type_tag}` at depth {depth}")]
    UnsatisfiableType { type_tag: TypeTag, depth: usize },

    #[error("arity mismatch: {0}")]
    ArityMismatch(String),

    #[error("type mismatch at node {position}: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        position: usize,
        expected: TypeTag,
        found: TypeTag,
    },

    #[error("primitive `{0}` must take at least one argument")]
    NullaryPrimitive(String),

    #[error("unknown argument index {index} (primitive set declares {count})")]
    UnknownArgument { index: usize, count: usize },

    #[error("fitness function returned {actual} values, expected {expected}")]
    FitnessArity { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("population is empty")]
    EmptyPopulation,
}

pub type Result<T> = std::result::Result<T, GpError>;
