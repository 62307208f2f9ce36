mod definition;

pub use definition::{DataDependenceEdge, DefId, Definition, DefinitionTable};
