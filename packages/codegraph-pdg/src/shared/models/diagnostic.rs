//! Non-fatal findings collected alongside a procedure's PDG

use serde::Serialize;

use crate::features::flow_graph::domain::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DiagnosticKind {
    /// A variable the front end could not bind; data edges for it are approximate
    UnresolvedSymbol,
    /// A region with no path to EXIT; a conservative edge was added
    NonTerminatingControlFlow,
    /// A materialized node with no path from ENTRY
    UnreachableCode,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::UnresolvedSymbol => "unresolved_symbol",
            DiagnosticKind::NonTerminatingControlFlow => "non_terminating_control_flow",
            DiagnosticKind::UnreachableCode => "unreachable_code",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub node: Option<NodeId>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, node: Option<NodeId>, message: impl Into<String>) -> Self {
        Self {
            kind,
            node,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.node {
            Some(node) => write!(f, "{} (node {}): {}", self.kind.as_str(), node, self.message),
            None => write!(f, "{}: {}", self.kind.as_str(), self.message),
        }
    }
}
