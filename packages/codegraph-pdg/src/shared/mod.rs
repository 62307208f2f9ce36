//! Shared module - Common types and utilities
//!
//! Types used by every feature: spans, errors, diagnostics and the generic
//! fixpoint solver both dataflow analyses are instantiated from.

pub mod fixpoint;
pub mod models;

// Re-exports for convenience
pub use fixpoint::{DataflowProblem, Direction, Solution};
pub use models::*;
