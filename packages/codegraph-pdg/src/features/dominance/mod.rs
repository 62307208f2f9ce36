//! Dominance Engine
//!
//! Dominator and post-dominator trees over a procedure's CFG.

pub mod domain;
pub mod infrastructure;

pub use domain::{DominanceKind, DominatorTree};
pub use infrastructure::{compute_dominators, compute_post_dominators, natural_loops, NaturalLoop};
