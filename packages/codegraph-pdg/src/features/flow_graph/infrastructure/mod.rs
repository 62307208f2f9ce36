//! Flow Graph infrastructure

pub mod cfg_builder;
pub mod finally_support;
pub mod normalize;

pub use cfg_builder::{build_cfg, display_label, CfgBuilder};
pub use normalize::normalize_exits;
