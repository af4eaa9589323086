//! Typed tree-based Genetic Programming.
//!
//! A generic GP engine for symbolic regression. Users describe the search
//! space with a [`PrimitiveSet`] and the objective with a [`GpProblem`];
//! the engine builds, varies, selects and archives expression trees.
//!
//! # Core Types
//!
//! - [`PrimitiveSet`]: typed registry of primitives, terminals and
//!   ephemeral constants
//! - [`PrimitiveTree`]: expression tree in flat prefix layout
//! - [`Individual`]: a tree plus its fitness, if evaluated
//! - [`GpProblem`]: problem definition (primitive set + fitness function)
//!
//! # Key Types
//!
//! - [`Generator`]: Full / Grow / Half-and-Half tree construction
//! - [`GpConfig`]: algorithm parameters
//! - [`GpRunner`]: executes the generational loop
//! - [`HallOfFame`]: best-ever archive
//!
//! # Submodules
//!
//! - [`operators`]: typed crossover, uniform mutation and the static limit
//!
//! # References
//!
//! - Koza (1992), *Genetic Programming: On the Programming of Computers by
//!   Means of Natural Selection*
//! - Montana (1995), "Strongly Typed Genetic Programming"
//! - Poli, Langdon & McPhee (2008), *A Field Guide to Genetic Programming*

mod compile;
mod config;
mod generate;
mod hall_of_fame;
pub mod operators;
mod primitives;
mod runner;
mod selection;
mod tree;
mod types;

pub use compile::CompiledExpr;
pub use config::GpConfig;
pub use generate::{Generator, InitMethod};
pub use hall_of_fame::HallOfFame;
pub use primitives::{Primitive, PrimitiveSet, Terminal, TerminalKind, TypeTag};
pub use runner::{GenerationStats, GpResult, GpRunner};
pub use selection::Selection;
pub use tree::{Node, PrimitiveTree};
pub use types::{Fitness, GpProblem, Individual, Value};
