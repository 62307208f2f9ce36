//! Control-Dependence Deriver
//!
//! Derives control dependences from CFG edges and the post-dominator tree.

pub mod domain;
pub mod infrastructure;

pub use domain::ControlDependenceEdge;
pub use infrastructure::compute_control_dependence;
