mod dominator_tree;

pub use dominator_tree::{DominanceKind, DominatorTree};
