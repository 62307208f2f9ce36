//! Reaching definitions and the def-use edges derived from them

pub mod data_dependence;
pub mod reaching_definitions;

pub use data_dependence::{compute_data_dependence, DataDependence};
pub use reaching_definitions::ReachingDefinitions;
