//! Reaching-Definitions Analyzer and Data-Dependence Deriver

pub mod domain;
pub mod infrastructure;

pub use domain::{DataDependenceEdge, DefId, Definition, DefinitionTable};
pub use infrastructure::{compute_data_dependence, DataDependence, ReachingDefinitions};
