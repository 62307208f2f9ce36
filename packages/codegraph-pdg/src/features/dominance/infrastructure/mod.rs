pub mod dominators;

pub use dominators::{compute_dominators, compute_post_dominators, natural_loops, NaturalLoop};
