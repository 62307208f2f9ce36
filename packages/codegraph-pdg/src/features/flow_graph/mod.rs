//! Control Flow Graph construction
//!
//! - domain/         : CFG arena (nodes, labeled edges, traversal)
//! - infrastructure/ : statement-tree lowering, jump routing, exit normalization
//! - application/    : build + normalize for one procedure

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{build_flow_graph, FlowGraphResult};
pub use domain::{BranchLabel, CfgNode, ControlEdge, ControlFlowGraph, NodeId, NodeKind};
pub use infrastructure::{build_cfg, normalize_exits};
