pub mod cdg;

pub use cdg::compute_control_dependence;
