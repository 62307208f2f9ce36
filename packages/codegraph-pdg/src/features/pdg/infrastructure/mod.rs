pub mod pdg;

pub use pdg::{DependencyType, PDGBuilder, PDGDto, PDGEdge, PDGNode, PDGStats, ProgramDependenceGraph};
