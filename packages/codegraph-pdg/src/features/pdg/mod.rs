//! Program Dependence Graph: assembly and slicing queries

pub mod application;
pub mod infrastructure;

pub use application::assemble;
pub use infrastructure::{
    DependencyType, PDGBuilder, PDGDto, PDGEdge, PDGNode, PDGStats, ProgramDependenceGraph,
};
