//! (Post-)dominator tree with the full dominator sets kept alongside

use fixedbitset::FixedBitSet;

use crate::features::flow_graph::domain::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum DominanceKind {
    /// Rooted at ENTRY over forward edges
    Dominators,
    /// Rooted at EXIT over reversed edges
    PostDominators,
}

#[derive(Debug, Clone)]
pub struct DominatorTree {
    kind: DominanceKind,
    root: NodeId,
    idom: Vec<Option<NodeId>>,
    /// `None` for nodes the root cannot reach
    sets: Vec<Option<FixedBitSet>>,
}

impl DominatorTree {
    pub fn new(
        kind: DominanceKind,
        root: NodeId,
        idom: Vec<Option<NodeId>>,
        sets: Vec<Option<FixedBitSet>>,
    ) -> Self {
        Self {
            kind,
            root,
            idom,
            sets,
        }
    }

    pub fn kind(&self) -> DominanceKind {
        self.kind
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.idom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idom.is_empty()
    }

    pub fn immediate(&self, node: NodeId) -> Option<NodeId> {
        self.idom.get(node.index()).copied().flatten()
    }

    pub fn is_reachable(&self, node: NodeId) -> bool {
        matches!(self.sets.get(node.index()), Some(Some(_)))
    }

    /// Reflexive: every reachable node dominates itself
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        match self.sets.get(b.index()) {
            Some(Some(set)) => set.contains(a.index()),
            _ => false,
        }
    }

    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Dominators of `node`, ascending by id
    pub fn dominators_of(&self, node: NodeId) -> Vec<NodeId> {
        match self.sets.get(node.index()) {
            Some(Some(set)) => set.ones().map(NodeId::from_index).collect(),
            _ => Vec::new(),
        }
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.idom
            .iter()
            .enumerate()
            .filter(|(_, parent)| **parent == Some(node))
            .map(|(index, _)| NodeId::from_index(index))
            .collect()
    }

    /// `node`, its immediate dominator, and so on up to the root
    pub fn path_to_root(&self, node: NodeId) -> Vec<NodeId> {
        let mut path = vec![node];
        let mut current = node;
        while let Some(parent) = self.immediate(current) {
            if path.len() > self.idom.len() {
                break;
            }
            path.push(parent);
            current = parent;
        }
        path
    }

    /// Every reachable non-root node has an immediate dominator and its idom
    /// chain ends at the root without revisiting a node
    pub fn is_well_formed(&self) -> bool {
        for index in 0..self.idom.len() {
            let node = NodeId::from_index(index);
            if !self.is_reachable(node) {
                continue;
            }
            if node == self.root {
                if self.idom[index].is_some() {
                    return false;
                }
                continue;
            }
            let path = self.path_to_root(node);
            if path.last() != Some(&self.root) || path.len() > self.idom.len() {
                return false;
            }
        }
        true
    }
}
