/*
 * PDG (Program Dependence Graph) Module
 *
 * PDG = control dependences + data dependences over the CFG's node set.
 *
 * - petgraph DiGraph, node index == CFG NodeId (nodes added in id order)
 * - ENTRY and EXIT are part of the node set
 * - Edges keep derivation order: control first, then data
 * - Backward/forward/thin slicing and chopping
 */

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use fixedbitset::FixedBitSet;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::features::control_dependence::domain::ControlDependenceEdge;
use crate::features::data_flow::domain::DataDependenceEdge;
use crate::features::flow_graph::domain::{CfgNode, ControlFlowGraph, NodeId, NodeKind};
use crate::shared::models::Span;

/// Dependency type in PDG
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Control,
    Data,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::Control => "control",
            DependencyType::Data => "data",
        }
    }
}

/// PDG Node
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PDGNode {
    pub node_id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    pub span: Span,
    pub defined_vars: Vec<String>,
    pub used_vars: Vec<String>,
    /// False for materialized code with no path from ENTRY
    pub reachable: bool,
}

impl PDGNode {
    pub fn new(node_id: NodeId, label: impl Into<String>, kind: NodeKind, span: Span) -> Self {
        PDGNode {
            node_id,
            label: label.into(),
            kind,
            span,
            defined_vars: Vec::new(),
            used_vars: Vec::new(),
            reachable: true,
        }
    }

    pub fn from_cfg_node(node: &CfgNode, reachable: bool) -> Self {
        let mut pdg_node = Self::new(node.id, node.label.clone(), node.kind, node.span).with_vars(
            node.defs.iter().map(|d| d.var.name.clone()).collect(),
            node.uses.iter().map(|v| v.name.clone()).collect(),
        );
        pdg_node.reachable = reachable;
        pdg_node
    }

    pub fn with_vars(mut self, defined: Vec<String>, used: Vec<String>) -> Self {
        self.defined_vars = defined;
        self.used_vars = used;
        self
    }

    pub fn is_entry(&self) -> bool {
        self.kind == NodeKind::Entry
    }

    pub fn is_exit(&self) -> bool {
        self.kind == NodeKind::Exit
    }
}

/// PDG Edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PDGEdge {
    pub from_node: NodeId,
    pub to_node: NodeId,
    pub dependency_type: DependencyType,
    /// Branch label for control, variable name for data
    pub label: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub approximate: bool,
}

impl PDGEdge {
    pub fn control(from: NodeId, to: NodeId, label: impl Into<String>) -> Self {
        Self {
            from_node: from,
            to_node: to,
            dependency_type: DependencyType::Control,
            label: label.into(),
            approximate: false,
        }
    }

    pub fn data(from: NodeId, to: NodeId, variable: impl Into<String>, approximate: bool) -> Self {
        Self {
            from_node: from,
            to_node: to,
            dependency_type: DependencyType::Data,
            label: variable.into(),
            approximate,
        }
    }
}

/// Serializable DTO for ProgramDependenceGraph
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PDGDto {
    pub procedure_id: String,
    /// Always true: ENTRY and EXIT are part of the node set
    pub includes_entry_exit: bool,
    pub nodes: Vec<PDGNode>,
    pub edges: Vec<PDGEdge>,
}

/// Program Dependence Graph
///
/// Uses petgraph for efficient graph operations:
/// - O(1) node/edge lookup
/// - O(V+E) traversal for slicing
#[derive(Debug, Clone)]
pub struct ProgramDependenceGraph {
    graph: DiGraph<PDGNode, PDGEdge>,
    node_map: HashMap<NodeId, NodeIndex>,
    pub procedure_id: String,
}

// Custom serde implementation via DTO
impl serde::Serialize for ProgramDependenceGraph {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_dto().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for ProgramDependenceGraph {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let dto = PDGDto::deserialize(deserializer)?;
        let mut pdg = ProgramDependenceGraph::new(dto.procedure_id);

        for node in dto.nodes {
            pdg.add_node(node);
        }

        for edge in dto.edges {
            pdg.add_edge(edge);
        }

        Ok(pdg)
    }
}

impl ProgramDependenceGraph {
    pub fn new(procedure_id: impl Into<String>) -> Self {
        ProgramDependenceGraph {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
            procedure_id: procedure_id.into(),
        }
    }

    pub fn add_node(&mut self, node: PDGNode) -> NodeIndex {
        let node_id = node.node_id;
        let idx = self.graph.add_node(node);
        self.node_map.insert(node_id, idx);
        idx
    }

    /// Edges between unknown nodes are dropped
    pub fn add_edge(&mut self, edge: PDGEdge) -> bool {
        let from_idx = self.node_map.get(&edge.from_node);
        let to_idx = self.node_map.get(&edge.to_node);

        if let (Some(&from), Some(&to)) = (from_idx, to_idx) {
            self.graph.add_edge(from, to, edge);
            true
        } else {
            false
        }
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&PDGNode> {
        self.node_map
            .get(&node_id)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Nodes in CFG creation order
    pub fn nodes(&self) -> impl Iterator<Item = &PDGNode> {
        self.graph.node_weights()
    }

    /// Edges in derivation order
    pub fn edges(&self) -> impl Iterator<Item = &PDGEdge> {
        self.graph.edge_weights()
    }

    pub fn to_dto(&self) -> PDGDto {
        PDGDto {
            procedure_id: self.procedure_id.clone(),
            includes_entry_exit: true,
            nodes: self.graph.node_weights().cloned().collect(),
            edges: self.graph.edge_weights().cloned().collect(),
        }
    }

    /// Incoming edges (what `node_id` depends on)
    pub fn get_dependencies(&self, node_id: NodeId) -> Vec<&PDGEdge> {
        let Some(&idx) = self.node_map.get(&node_id) else {
            return Vec::new();
        };

        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.id(), e.weight()))
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, w)| w).collect()
    }

    /// Outgoing edges (what depends on `node_id`)
    pub fn get_dependents(&self, node_id: NodeId) -> Vec<&PDGEdge> {
        let Some(&idx) = self.node_map.get(&node_id) else {
            return Vec::new();
        };

        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.id(), e.weight()))
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, w)| w).collect()
    }

    /// Data edges into `node_id` for `variable`
    pub fn data_sources(&self, node_id: NodeId, variable: &str) -> Vec<NodeId> {
        self.get_dependencies(node_id)
            .into_iter()
            .filter(|e| e.dependency_type == DependencyType::Data && e.label == variable)
            .map(|e| e.from_node)
            .collect()
    }

    /// Backward slice: all nodes that affect `target_node` (Weiser, BFS)
    pub fn backward_slice(&self, target_node: NodeId, max_depth: Option<usize>) -> BTreeSet<NodeId> {
        self.backward_slice_filtered(target_node, max_depth, true, true)
    }

    /// Backward slice with dependency type filtering.
    /// `include_control = false` gives a thin slice (Sridharan et al., PLDI 2007).
    pub fn backward_slice_filtered(
        &self,
        target_node: NodeId,
        max_depth: Option<usize>,
        include_control: bool,
        include_data: bool,
    ) -> BTreeSet<NodeId> {
        self.traverse(
            target_node,
            max_depth,
            include_control,
            include_data,
            Direction::Incoming,
        )
    }

    /// Data dependences only: "why does this variable have this value?"
    pub fn thin_slice(&self, target_node: NodeId, max_depth: Option<usize>) -> BTreeSet<NodeId> {
        self.backward_slice_filtered(target_node, max_depth, false, true)
    }

    /// Forward slice: all nodes affected by `source_node`
    pub fn forward_slice(&self, source_node: NodeId, max_depth: Option<usize>) -> BTreeSet<NodeId> {
        self.forward_slice_filtered(source_node, max_depth, true, true)
    }

    pub fn forward_slice_filtered(
        &self,
        source_node: NodeId,
        max_depth: Option<usize>,
        include_control: bool,
        include_data: bool,
    ) -> BTreeSet<NodeId> {
        self.traverse(
            source_node,
            max_depth,
            include_control,
            include_data,
            Direction::Outgoing,
        )
    }

    fn traverse(
        &self,
        start: NodeId,
        max_depth: Option<usize>,
        include_control: bool,
        include_data: bool,
        direction: Direction,
    ) -> BTreeSet<NodeId> {
        let max_depth = max_depth.unwrap_or(usize::MAX);
        let mut slice_nodes = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut worklist: VecDeque<(NodeId, usize)> = VecDeque::new();

        worklist.push_back((start, 0));

        while let Some((current, depth)) = worklist.pop_front() {
            if depth > max_depth || visited.contains(&current) {
                continue;
            }

            let Some(&idx) = self.node_map.get(&current) else {
                continue;
            };

            visited.insert(current);
            slice_nodes.insert(current);

            for edge in self.graph.edges_directed(idx, direction) {
                let weight = edge.weight();
                let should_follow = match weight.dependency_type {
                    DependencyType::Control => include_control,
                    DependencyType::Data => include_data,
                };
                let next = match direction {
                    Direction::Incoming => weight.from_node,
                    Direction::Outgoing => weight.to_node,
                };

                if should_follow && !visited.contains(&next) {
                    worklist.push_back((next, depth + 1));
                }
            }
        }

        slice_nodes
    }

    /// Chop(source, target) = backward_slice(target) ∩ forward_slice(source)
    /// (Jackson & Rollins, FSE 1994)
    pub fn chop(&self, source_node: NodeId, target_node: NodeId, max_depth: Option<usize>) -> BTreeSet<NodeId> {
        self.chop_filtered(source_node, target_node, max_depth, true, true)
    }

    pub fn chop_filtered(
        &self,
        source_node: NodeId,
        target_node: NodeId,
        max_depth: Option<usize>,
        include_control: bool,
        include_data: bool,
    ) -> BTreeSet<NodeId> {
        let backward =
            self.backward_slice_filtered(target_node, max_depth, include_control, include_data);
        let forward =
            self.forward_slice_filtered(source_node, max_depth, include_control, include_data);

        backward.intersection(&forward).copied().collect()
    }

    pub fn get_stats(&self) -> PDGStats {
        let mut control_edges = 0;
        let mut data_edges = 0;
        let mut approximate_edges = 0;

        for edge in self.graph.edge_weights() {
            match edge.dependency_type {
                DependencyType::Control => control_edges += 1,
                DependencyType::Data => data_edges += 1,
            }
            if edge.approximate {
                approximate_edges += 1;
            }
        }

        PDGStats {
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            control_edges,
            data_edges,
            approximate_edges,
        }
    }

    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.node_map.contains_key(&node_id)
    }

    /// Node ids in creation order
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.graph.node_weights().map(|n| n.node_id).collect()
    }
}

/// PDG Statistics
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PDGStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub control_edges: usize,
    pub data_edges: usize,
    pub approximate_edges: usize,
}

/// PDG Builder
///
/// Collects the CFG node set and both dependence relations, then builds the
/// graph. Identical `(from, to, kind, label)` edges collapse to the first.
pub struct PDGBuilder {
    procedure_id: String,
    nodes: Vec<PDGNode>,
    control_edges: Vec<ControlDependenceEdge>,
    data_edges: Vec<DataDependenceEdge>,
}

impl PDGBuilder {
    pub fn new(procedure_id: impl Into<String>) -> Self {
        PDGBuilder {
            procedure_id: procedure_id.into(),
            nodes: Vec::new(),
            control_edges: Vec::new(),
            data_edges: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: PDGNode) {
        self.nodes.push(node);
    }

    /// Every CFG node, in id order; `reachable` marks ENTRY-reachable ones
    pub fn add_cfg_nodes(&mut self, cfg: &ControlFlowGraph, reachable: &FixedBitSet) {
        for node in cfg.nodes() {
            self.add_node(PDGNode::from_cfg_node(node, reachable.contains(node.id.index())));
        }
    }

    pub fn add_control_dependences(&mut self, edges: &[ControlDependenceEdge]) {
        self.control_edges.extend_from_slice(edges);
    }

    pub fn add_data_dependences(&mut self, edges: &[DataDependenceEdge]) {
        self.data_edges.extend_from_slice(edges);
    }

    pub fn build(self) -> ProgramDependenceGraph {
        let mut pdg = ProgramDependenceGraph::new(self.procedure_id);
        let mut seen: HashSet<(NodeId, NodeId, DependencyType, String)> = HashSet::new();

        for node in self.nodes {
            pdg.add_node(node);
        }

        let control = self
            .control_edges
            .into_iter()
            .map(|e| PDGEdge::control(e.from, e.to, e.label.to_string()));
        let data = self
            .data_edges
            .into_iter()
            .map(|e| PDGEdge::data(e.from, e.to, e.variable, e.approximate));

        for edge in control.chain(data) {
            let key = (
                edge.from_node,
                edge.to_node,
                edge.dependency_type,
                edge.label.clone(),
            );
            if seen.insert(key) {
                pdg.add_edge(edge);
            }
        }

        pdg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::flow_graph::domain::BranchLabel;

    fn n(id: u32) -> NodeId {
        NodeId(id)
    }

    fn create_simple_pdg() -> ProgramDependenceGraph {
        let mut pdg = ProgramDependenceGraph::new("test_func");

        pdg.add_node(
            PDGNode::new(n(0), "x = 1", NodeKind::Assignment, Span::new(1, 0, 1, 5))
                .with_vars(vec!["x".to_string()], vec![]),
        );
        pdg.add_node(
            PDGNode::new(n(1), "y = x + 1", NodeKind::Assignment, Span::new(2, 0, 2, 9))
                .with_vars(vec!["y".to_string()], vec!["x".to_string()]),
        );
        pdg.add_node(
            PDGNode::new(n(2), "z = y * 2", NodeKind::Assignment, Span::new(3, 0, 3, 9))
                .with_vars(vec!["z".to_string()], vec!["y".to_string()]),
        );

        pdg.add_edge(PDGEdge::data(n(0), n(1), "x", false));
        pdg.add_edge(PDGEdge::data(n(1), n(2), "y", false));
        pdg.add_edge(PDGEdge::control(n(0), n(1), "unconditional"));
        pdg.add_edge(PDGEdge::control(n(1), n(2), "unconditional"));

        pdg
    }

    /// ENTRY(0) -> if(1) -T-> a(2), a -data-> b(3), if -F-> b
    fn create_branch_pdg() -> ProgramDependenceGraph {
        let mut pdg = ProgramDependenceGraph::new("branch");
        pdg.add_node(PDGNode::new(n(0), "ENTRY", NodeKind::Entry, Span::zero()));
        pdg.add_node(PDGNode::new(n(1), "if (c)", NodeKind::Condition, Span::line(1)));
        pdg.add_node(PDGNode::new(n(2), "a = 1;", NodeKind::Assignment, Span::line(2)));
        pdg.add_node(PDGNode::new(n(3), "b = a;", NodeKind::Assignment, Span::line(3)));
        pdg.add_edge(PDGEdge::control(n(0), n(1), "unconditional"));
        pdg.add_edge(PDGEdge::control(n(1), n(2), "true"));
        pdg.add_edge(PDGEdge::control(n(1), n(3), "false"));
        pdg.add_edge(PDGEdge::data(n(2), n(3), "a", false));
        pdg
    }

    #[test]
    fn test_pdg_creation() {
        let pdg = create_simple_pdg();
        let stats = pdg.get_stats();

        assert_eq!(stats.node_count, 3);
        assert_eq!(stats.edge_count, 4);
        assert_eq!(stats.data_edges, 2);
        assert_eq!(stats.control_edges, 2);
        assert_eq!(stats.approximate_edges, 0);
    }

    #[test]
    fn test_backward_slice() {
        let pdg = create_simple_pdg();
        let slice = pdg.backward_slice(n(2), None);
        assert_eq!(slice.into_iter().collect::<Vec<_>>(), vec![n(0), n(1), n(2)]);
    }

    #[test]
    fn test_backward_slice_with_depth() {
        let pdg = create_simple_pdg();
        let slice = pdg.backward_slice(n(2), Some(1));

        assert_eq!(slice.len(), 2);
        assert!(slice.contains(&n(1)));
        assert!(!slice.contains(&n(0)));
    }

    #[test]
    fn test_forward_slice_with_depth() {
        let pdg = create_simple_pdg();
        let slice = pdg.forward_slice(n(0), Some(1));

        assert_eq!(slice.len(), 2);
        assert!(slice.contains(&n(0)));
        assert!(slice.contains(&n(1)));
        assert!(!slice.contains(&n(2)));
    }

    #[test]
    fn test_get_dependencies_in_insertion_order() {
        let pdg = create_simple_pdg();

        let deps = pdg.get_dependencies(n(2));
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].dependency_type, DependencyType::Data);
        assert_eq!(deps[1].dependency_type, DependencyType::Control);
    }

    #[test]
    fn test_thin_slice_ignores_control() {
        let pdg = create_branch_pdg();

        let full = pdg.backward_slice(n(3), None);
        assert_eq!(full.into_iter().collect::<Vec<_>>(), vec![n(0), n(1), n(2), n(3)]);

        let thin = pdg.thin_slice(n(3), None);
        assert_eq!(thin.into_iter().collect::<Vec<_>>(), vec![n(2), n(3)]);
    }

    #[test]
    fn test_chop() {
        let pdg = create_branch_pdg();
        let chop = pdg.chop(n(1), n(3), None);
        assert_eq!(chop.into_iter().collect::<Vec<_>>(), vec![n(1), n(2), n(3)]);

        let data_only = pdg.chop_filtered(n(1), n(3), None, false, true);
        assert!(data_only.is_empty());
    }

    #[test]
    fn test_nonexistent_node_slice() {
        let pdg = create_simple_pdg();
        assert!(pdg.backward_slice(n(42), None).is_empty());
        assert!(pdg.forward_slice(n(42), None).is_empty());
    }

    #[test]
    fn test_slice_max_depth_zero() {
        let pdg = create_simple_pdg();
        let slice = pdg.backward_slice(n(2), Some(0));
        assert_eq!(slice.len(), 1);
        assert!(slice.contains(&n(2)));
    }

    #[test]
    fn test_self_loop() {
        let mut pdg = ProgramDependenceGraph::new("loop");
        pdg.add_node(PDGNode::new(n(0), "s = s + i;", NodeKind::Assignment, Span::line(1)));
        pdg.add_edge(PDGEdge::data(n(0), n(0), "s", false));

        assert_eq!(pdg.backward_slice(n(0), None).len(), 1);
        assert_eq!(pdg.data_sources(n(0), "s"), vec![n(0)]);
    }

    #[test]
    fn test_builder_collapses_duplicates() {
        let mut builder = PDGBuilder::new("dups");
        builder.add_node(PDGNode::new(n(0), "ENTRY", NodeKind::Entry, Span::zero()));
        builder.add_node(PDGNode::new(n(1), "x = 1;", NodeKind::Assignment, Span::line(1)));
        builder.add_node(PDGNode::new(n(2), "y = x;", NodeKind::Assignment, Span::line(2)));
        builder.add_control_dependences(&[
            ControlDependenceEdge::new(n(0), n(1), BranchLabel::Unconditional),
            ControlDependenceEdge::new(n(0), n(1), BranchLabel::Unconditional),
            ControlDependenceEdge::new(n(0), n(2), BranchLabel::Unconditional),
        ]);
        let dd = DataDependenceEdge {
            from: n(1),
            to: n(2),
            variable: "x".into(),
            approximate: false,
        };
        builder.add_data_dependences(&[dd.clone(), dd]);

        let pdg = builder.build();
        let edges: Vec<_> = pdg.edges().cloned().collect();
        assert_eq!(
            edges,
            vec![
                PDGEdge::control(n(0), n(1), "unconditional"),
                PDGEdge::control(n(0), n(2), "unconditional"),
                PDGEdge::data(n(1), n(2), "x", false),
            ]
        );
    }

    #[test]
    fn test_serde_roundtrip_keeps_order() {
        let pdg = create_branch_pdg();
        let json = serde_json::to_string(&pdg).unwrap();
        assert!(json.contains("\"includes_entry_exit\":true"));

        let back: ProgramDependenceGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back.node_ids(), pdg.node_ids());
        assert_eq!(
            back.edges().cloned().collect::<Vec<_>>(),
            pdg.edges().cloned().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_large_scale_pdg() {
        let mut pdg = ProgramDependenceGraph::new("large");

        for i in 0..1000 {
            pdg.add_node(PDGNode::new(
                n(i),
                format!("stmt_{}", i),
                NodeKind::Expression,
                Span::new(i, 0, i, 10),
            ));
        }
        for i in 0..999 {
            pdg.add_edge(PDGEdge::data(n(i), n(i + 1), format!("v{}", i), false));
        }

        assert_eq!(pdg.get_stats().edge_count, 999);
        assert_eq!(pdg.backward_slice(n(999), None).len(), 1000);
        assert_eq!(pdg.forward_slice(n(0), None).len(), 1000);
    }
}
