pub mod cfg;

pub use cfg::{BranchLabel, CfgNode, ControlEdge, ControlFlowGraph, NodeId, NodeKind};
