use serde::{Deserialize, Serialize};

use crate::features::flow_graph::domain::{BranchLabel, NodeId};

/// `to` executes depending on which way `from` branches
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlDependenceEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub label: BranchLabel,
}

impl ControlDependenceEdge {
    pub fn new(from: NodeId, to: NodeId, label: BranchLabel) -> Self {
        Self { from, to, label }
    }
}
