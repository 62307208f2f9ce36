/*
 * Dominance Engine
 *
 * Iterative set-based dominators on top of the shared fixpoint solver.
 *
 * Facts are Option<FixedBitSet>: None means "not yet defined" and is ignored
 * by the meet, so the first pass in reverse postorder only intersects the
 * predecessors that already have a set. Post-dominators are the same problem
 * run backward from EXIT.
 *
 * The immediate dominator of n is the strict dominator d with
 * |dom(d)| = |dom(n)| - 1 (dominator sets of a node form a chain).
 */

use std::collections::BTreeMap;

use fixedbitset::FixedBitSet;
use tracing::debug;

use crate::features::dominance::domain::{DominanceKind, DominatorTree};
use crate::features::flow_graph::domain::{ControlFlowGraph, NodeId};
use crate::shared::fixpoint::{self, DataflowProblem, Direction};
use crate::shared::models::{PdgError, Result};

struct DominanceProblem {
    direction: Direction,
    node_count: usize,
}

impl DataflowProblem for DominanceProblem {
    type Fact = Option<FixedBitSet>;

    fn name(&self) -> &'static str {
        match self.direction {
            Direction::Forward => "dominators",
            Direction::Backward => "post-dominators",
        }
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn boundary(&self) -> Self::Fact {
        Some(FixedBitSet::with_capacity(self.node_count))
    }

    fn initial(&self) -> Self::Fact {
        None
    }

    fn meet(&self, acc: &mut Self::Fact, incoming: &Self::Fact) {
        let Some(incoming) = incoming else {
            return;
        };
        match acc {
            Some(set) => set.intersect_with(incoming),
            None => *acc = Some(incoming.clone()),
        }
    }

    fn transfer(&self, node: NodeId, input: &Self::Fact) -> Self::Fact {
        input.as_ref().map(|set| {
            let mut out = set.clone();
            out.insert(node.index());
            out
        })
    }

    fn is_monotone_step(&self, old: &Self::Fact, new: &Self::Fact) -> bool {
        match (old, new) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(old), Some(new)) => new.is_subset(old),
        }
    }

    fn height(&self) -> usize {
        self.node_count + 1
    }
}

pub fn compute_dominators(cfg: &ControlFlowGraph, max_evaluations: Option<usize>) -> Result<DominatorTree> {
    compute(cfg, DominanceKind::Dominators, max_evaluations)
}

/// Post-dominator tree rooted at EXIT. Expects a normalized CFG: a node with
/// no immediate post-dominator is an invariant violation.
pub fn compute_post_dominators(
    cfg: &ControlFlowGraph,
    max_evaluations: Option<usize>,
) -> Result<DominatorTree> {
    let tree = compute(cfg, DominanceKind::PostDominators, max_evaluations)?;

    for node in cfg.node_ids() {
        if node != tree.root() && tree.immediate(node).is_none() {
            return Err(PdgError::invariant(
                cfg.procedure_id(),
                format!("node {} ({}) has no immediate post-dominator", node, cfg.node(node).label),
            ));
        }
    }

    Ok(tree)
}

fn compute(
    cfg: &ControlFlowGraph,
    kind: DominanceKind,
    max_evaluations: Option<usize>,
) -> Result<DominatorTree> {
    let direction = match kind {
        DominanceKind::Dominators => Direction::Forward,
        DominanceKind::PostDominators => Direction::Backward,
    };
    let problem = DominanceProblem {
        direction,
        node_count: cfg.len(),
    };
    let solution = fixpoint::solve(cfg, &problem, max_evaluations)?;
    let root = cfg.root(direction);

    let mut idom = vec![None; cfg.len()];
    for node in cfg.node_ids() {
        if node == root {
            continue;
        }
        let Some(set) = solution.output(node) else {
            continue;
        };
        let size = set.count_ones(..);
        let parent = set
            .ones()
            .filter(|&d| d != node.index())
            .find(|&d| {
                solution.output[d]
                    .as_ref()
                    .map_or(false, |dom_d| dom_d.count_ones(..) + 1 == size)
            })
            .map(NodeId::from_index);

        match parent {
            Some(parent) => idom[node.index()] = Some(parent),
            None => {
                return Err(PdgError::invariant(
                    cfg.procedure_id(),
                    format!("{} of node {} do not form a chain", problem.name(), node),
                ))
            }
        }
    }

    debug!(
        procedure = cfg.procedure_id(),
        kind = ?kind,
        evaluations = solution.evaluations,
        "dominator tree built"
    );

    Ok(DominatorTree::new(kind, root, idom, solution.output))
}

/// Loop identified by a back edge `tail -> header` where header dominates tail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalLoop {
    pub header: NodeId,
    pub back_edge_sources: Vec<NodeId>,
    /// Ascending by id, header included
    pub body: Vec<NodeId>,
}

/// Natural loops of the CFG, one per header (back edges sharing a header merge)
pub fn natural_loops(cfg: &ControlFlowGraph, dominators: &DominatorTree) -> Vec<NaturalLoop> {
    let mut by_header: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for edge in cfg.back_edges(|a, b| dominators.dominates(a, b)) {
        let sources = by_header.entry(edge.to).or_default();
        if !sources.contains(&edge.from) {
            sources.push(edge.from);
        }
    }

    by_header
        .into_iter()
        .map(|(header, sources)| {
            let mut body = FixedBitSet::with_capacity(cfg.len());
            body.insert(header.index());
            let mut stack: Vec<NodeId> = sources.clone();
            while let Some(node) = stack.pop() {
                if body.contains(node.index()) {
                    continue;
                }
                body.insert(node.index());
                stack.extend(cfg.predecessors(node));
            }
            NaturalLoop {
                header,
                back_edge_sources: sources,
                body: body.ones().map(NodeId::from_index).collect(),
            }
        })
        .collect()
}
