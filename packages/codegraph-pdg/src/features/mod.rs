//! Feature modules - Each feature follows Hexagonal Architecture
//!
//! Each feature contains (as far as it needs them):
//! - domain/         - Pure data model
//! - ports/          - Interface definitions (traits)
//! - application/    - Use cases
//! - infrastructure/ - Algorithms and external dependency implementations
//!
//! Stage order: syntax → flow_graph → dominance / data_flow →
//! control_dependence → pdg → export

pub mod control_dependence;
pub mod data_flow;
pub mod dominance;
pub mod export;
pub mod flow_graph;
pub mod pdg;
pub mod syntax;
