//! Typed tree-based genetic programming engine.
//!
//! Evolves populations of typed expression trees that minimize an error
//! metric, the classic symbolic regression setting:
//!
//! - **Primitive sets**: typed operations, constants, input arguments and
//!   ephemeral (randomly sampled, then frozen) constants.
//! - **Tree generation**: Full, Grow and ramped Half-and-Half under depth
//!   and type constraints.
//! - **Variation**: one-point typed subtree crossover and uniform subtree
//!   mutation, both wrapped in a static height limit against bloat.
//! - **Selection and archiving**: tournament selection and a bounded
//!   Hall of Fame.
//! - **Evolutionary loop**: generational `eaSimple`/`varAnd` semantics with
//!   seeded, reproducible randomness.
//!
//! # Architecture
//!
//! This crate sits at Layer 2 (Algorithms) in the U-Engine ecosystem.
//! It contains no problem-specific primitives:
//! protected operators, target functions and error metrics are supplied by
//! consumers at higher layers.

pub mod error;
pub mod gp;
pub mod random;

pub use error::{GpError, Result};
