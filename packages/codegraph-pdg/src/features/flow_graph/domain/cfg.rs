/*
 * Control Flow Graph arena
 *
 * Nodes live in a Vec addressed by NodeId (creation order). Edges are stored
 * once in creation order; per-node successor/predecessor lists hold edge
 * indices. ENTRY is always node 0 and EXIT node 1.
 */

use fixedbitset::FixedBitSet;
use serde::{Deserialize, Serialize};

use crate::features::syntax::domain::{VarDef, Variable};
use crate::shared::fixpoint::Direction;
use crate::shared::models::Span;

/// Dense node index, stable for the lifetime of the procedure's analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Entry,
    Exit,
    Declaration,
    Assignment,
    Call,
    Expression,
    Condition,
    LoopCondition,
    ForEachHeader,
    Switch,
    Catch,
    Return,
    Throw,
    Break,
    Continue,
    Assert,
    Synchronized,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Entry => "entry",
            NodeKind::Exit => "exit",
            NodeKind::Declaration => "declaration",
            NodeKind::Assignment => "assignment",
            NodeKind::Call => "call",
            NodeKind::Expression => "expression",
            NodeKind::Condition => "condition",
            NodeKind::LoopCondition => "loop_condition",
            NodeKind::ForEachHeader => "for_each_header",
            NodeKind::Switch => "switch",
            NodeKind::Catch => "catch",
            NodeKind::Return => "return",
            NodeKind::Throw => "throw",
            NodeKind::Break => "break",
            NodeKind::Continue => "continue",
            NodeKind::Assert => "assert",
            NodeKind::Synchronized => "synchronized",
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, NodeKind::Entry | NodeKind::Exit)
    }

    pub fn is_loop_header(&self) -> bool {
        matches!(self, NodeKind::LoopCondition | NodeKind::ForEachHeader)
    }
}

/// Label carried by a CFG edge and inherited by the control dependences it induces
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchLabel {
    Unconditional,
    True,
    False,
    Case(String),
    Default,
    Exceptional,
    /// Synthetic edge to EXIT out of a region that never terminates
    Conservative,
}

impl BranchLabel {
    pub fn is_unconditional(&self) -> bool {
        *self == BranchLabel::Unconditional
    }
}

impl std::fmt::Display for BranchLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchLabel::Unconditional => f.write_str("unconditional"),
            BranchLabel::True => f.write_str("true"),
            BranchLabel::False => f.write_str("false"),
            BranchLabel::Case(value) => write!(f, "case {}", value),
            BranchLabel::Default => f.write_str("default"),
            BranchLabel::Exceptional => f.write_str("exceptional"),
            BranchLabel::Conservative => f.write_str("conservative"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub label: BranchLabel,
}

/// Program point. Immutable once added to the arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    pub span: Span,
    pub defs: Vec<VarDef>,
    pub uses: Vec<Variable>,
    pub may_throw: bool,
}

impl CfgNode {
    pub fn defines(&self, var: &Variable) -> bool {
        self.defs.iter().any(|def| &def.var == var)
    }

    pub fn uses_var(&self, var: &Variable) -> bool {
        self.uses.contains(var)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlFlowGraph {
    procedure_id: String,
    nodes: Vec<CfgNode>,
    edges: Vec<ControlEdge>,
    #[serde(skip)]
    outgoing: Vec<Vec<usize>>,
    #[serde(skip)]
    incoming: Vec<Vec<usize>>,
}

impl ControlFlowGraph {
    pub const ENTRY: NodeId = NodeId(0);
    pub const EXIT: NodeId = NodeId(1);

    /// Fresh graph holding only ENTRY (defining `entry_defs`) and EXIT
    pub fn new(
        procedure_id: impl Into<String>,
        entry_label: impl Into<String>,
        exit_label: impl Into<String>,
        entry_defs: Vec<VarDef>,
        span: Span,
    ) -> Self {
        let mut cfg = Self {
            procedure_id: procedure_id.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
        };
        cfg.push_node(NodeKind::Entry, entry_label.into(), span, entry_defs, Vec::new(), false);
        cfg.push_node(NodeKind::Exit, exit_label.into(), span, Vec::new(), Vec::new(), false);
        cfg
    }

    pub fn procedure_id(&self) -> &str {
        &self.procedure_id
    }

    pub fn entry(&self) -> NodeId {
        Self::ENTRY
    }

    pub fn exit(&self) -> NodeId {
        Self::EXIT
    }

    pub fn push_node(
        &mut self,
        kind: NodeKind,
        label: String,
        span: Span,
        defs: Vec<VarDef>,
        uses: Vec<Variable>,
        may_throw: bool,
    ) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(CfgNode {
            id,
            kind,
            label,
            span,
            defs,
            uses,
            may_throw,
        });
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        id
    }

    /// Adds `from -> to` unless the identical labeled edge already exists.
    /// Returns whether an edge was added.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, label: BranchLabel) -> bool {
        let duplicate = self.outgoing[from.index()]
            .iter()
            .any(|&e| self.edges[e].to == to && self.edges[e].label == label);
        if duplicate {
            return false;
        }
        let index = self.edges.len();
        self.edges.push(ControlEdge { from, to, label });
        self.outgoing[from.index()].push(index);
        self.incoming[to.index()].push(index);
        true
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: NodeId) -> &CfgNode {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> &[CfgNode] {
        &self.nodes
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId::from_index)
    }

    pub fn edges(&self) -> &[ControlEdge] {
        &self.edges
    }

    pub fn out_edges(&self, id: NodeId) -> impl Iterator<Item = &ControlEdge> + '_ {
        self.outgoing[id.index()].iter().map(move |&e| &self.edges[e])
    }

    pub fn in_edges(&self, id: NodeId) -> impl Iterator<Item = &ControlEdge> + '_ {
        self.incoming[id.index()].iter().map(move |&e| &self.edges[e])
    }

    pub fn successors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.out_edges(id).map(|e| e.to)
    }

    pub fn predecessors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.in_edges(id).map(|e| e.from)
    }

    /// Neighbours a fact flows to in `direction`
    pub fn flow_successors(&self, id: NodeId, direction: Direction) -> Vec<NodeId> {
        match direction {
            Direction::Forward => self.successors(id).collect(),
            Direction::Backward => self.predecessors(id).collect(),
        }
    }

    /// Edges a fact flows in on in `direction`, paired with their flow source
    pub fn flow_in_edges(&self, id: NodeId, direction: Direction) -> Vec<(NodeId, &ControlEdge)> {
        match direction {
            Direction::Forward => self.in_edges(id).map(|e| (e.from, e)).collect(),
            Direction::Backward => self.out_edges(id).map(|e| (e.to, e)).collect(),
        }
    }

    pub fn root(&self, direction: Direction) -> NodeId {
        match direction {
            Direction::Forward => Self::ENTRY,
            Direction::Backward => Self::EXIT,
        }
    }

    /// Nodes reachable from `start` (inclusive) following `direction`
    pub fn reachable_from(&self, start: NodeId, direction: Direction) -> FixedBitSet {
        let mut seen = FixedBitSet::with_capacity(self.len());
        let mut stack = vec![start];
        seen.insert(start.index());
        while let Some(node) = stack.pop() {
            for next in self.flow_successors(node, direction) {
                if !seen.contains(next.index()) {
                    seen.insert(next.index());
                    stack.push(next);
                }
            }
        }
        seen
    }

    /// Nodes reachable from `start` by a path of at least one edge
    pub fn reachable_by_nonempty_path(&self, start: NodeId) -> FixedBitSet {
        let mut seen = FixedBitSet::with_capacity(self.len());
        let mut stack: Vec<NodeId> = self.successors(start).collect();
        while let Some(node) = stack.pop() {
            if seen.contains(node.index()) {
                continue;
            }
            seen.insert(node.index());
            stack.extend(self.successors(node));
        }
        seen
    }

    /// Reverse postorder from the direction's root. Nodes the root cannot
    /// reach are left out. Successors are visited in edge order, so the
    /// result is deterministic.
    pub fn reverse_postorder(&self, direction: Direction) -> Vec<NodeId> {
        let root = self.root(direction);
        let mut visited = FixedBitSet::with_capacity(self.len());
        let mut postorder = Vec::with_capacity(self.len());
        let mut stack: Vec<(NodeId, Vec<NodeId>, usize)> = Vec::new();

        visited.insert(root.index());
        stack.push((root, self.flow_successors(root, direction), 0));

        while let Some((node, next, cursor)) = stack.last_mut() {
            if *cursor < next.len() {
                let succ = next[*cursor];
                *cursor += 1;
                if !visited.contains(succ.index()) {
                    visited.insert(succ.index());
                    let succs = self.flow_successors(succ, direction);
                    stack.push((succ, succs, 0));
                }
            } else {
                postorder.push(*node);
                stack.pop();
            }
        }

        postorder.reverse();
        postorder
    }

    /// Edges whose target dominates their source (`dominates(a, b)` = a dom b)
    pub fn back_edges(&self, dominates: impl Fn(NodeId, NodeId) -> bool) -> Vec<&ControlEdge> {
        self.edges
            .iter()
            .filter(|edge| dominates(edge.to, edge.from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> ControlFlowGraph {
        let mut cfg = ControlFlowGraph::new("t", "ENTRY", "EXIT", Vec::new(), Span::zero());
        let c = cfg.push_node(NodeKind::Condition, "if (c)".into(), Span::line(1), vec![], vec![], false);
        let a = cfg.push_node(NodeKind::Expression, "a".into(), Span::line(2), vec![], vec![], false);
        let b = cfg.push_node(NodeKind::Expression, "b".into(), Span::line(3), vec![], vec![], false);
        cfg.add_edge(ControlFlowGraph::ENTRY, c, BranchLabel::Unconditional);
        cfg.add_edge(c, a, BranchLabel::True);
        cfg.add_edge(c, b, BranchLabel::False);
        cfg.add_edge(a, ControlFlowGraph::EXIT, BranchLabel::Unconditional);
        cfg.add_edge(b, ControlFlowGraph::EXIT, BranchLabel::Unconditional);
        cfg
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let mut cfg = diamond();
        let before = cfg.edge_count();
        assert!(!cfg.add_edge(NodeId(2), NodeId(3), BranchLabel::True));
        assert!(cfg.add_edge(NodeId(2), NodeId(3), BranchLabel::Case("1".into())));
        assert_eq!(cfg.edge_count(), before + 1);
    }

    #[test]
    fn test_reverse_postorder_forward() {
        let cfg = diamond();
        let rpo = cfg.reverse_postorder(Direction::Forward);
        assert_eq!(rpo[0], ControlFlowGraph::ENTRY);
        assert_eq!(rpo[1], NodeId(2));
        assert_eq!(*rpo.last().unwrap(), ControlFlowGraph::EXIT);
        assert_eq!(rpo.len(), 5);
    }

    #[test]
    fn test_reverse_postorder_backward_starts_at_exit() {
        let cfg = diamond();
        let rpo = cfg.reverse_postorder(Direction::Backward);
        assert_eq!(rpo[0], ControlFlowGraph::EXIT);
        assert_eq!(*rpo.last().unwrap(), ControlFlowGraph::ENTRY);
    }

    #[test]
    fn test_unreachable_node_left_out() {
        let mut cfg = diamond();
        let dead = cfg.push_node(NodeKind::Expression, "dead".into(), Span::line(9), vec![], vec![], false);
        cfg.add_edge(dead, ControlFlowGraph::EXIT, BranchLabel::Unconditional);
        let rpo = cfg.reverse_postorder(Direction::Forward);
        assert!(!rpo.contains(&dead));
        assert!(!cfg.reachable_from(cfg.entry(), Direction::Forward).contains(dead.index()));
        assert!(cfg.reachable_from(cfg.exit(), Direction::Backward).contains(dead.index()));
    }

    #[test]
    fn test_nonempty_path_excludes_self_without_cycle() {
        let cfg = diamond();
        let reach = cfg.reachable_by_nonempty_path(NodeId(2));
        assert!(!reach.contains(2));
        assert!(reach.contains(3));
        assert!(reach.contains(ControlFlowGraph::EXIT.index()));
    }
}
