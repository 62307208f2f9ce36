/*
 * Control Dependence Graph derivation (Ferrante/Ottenstein/Warren)
 *
 * For every CFG edge A -L-> B where B does not post-dominate A, walk the
 * post-dominator tree from B up to (excluding) ipdom(A); every node on the
 * walk is control dependent on A with label L. A loop header whose back edge
 * returns to it ends up control dependent on itself.
 *
 * Afterwards ENTRY controls, unconditionally, every ENTRY-reachable node
 * that no other node controls.
 */

use std::collections::HashSet;

use tracing::debug;

use crate::features::control_dependence::domain::ControlDependenceEdge;
use crate::features::dominance::domain::DominatorTree;
use crate::features::flow_graph::domain::{BranchLabel, ControlFlowGraph};
use crate::shared::fixpoint::Direction;
use crate::shared::models::{PdgError, Result};

pub fn compute_control_dependence(
    cfg: &ControlFlowGraph,
    post_dominators: &DominatorTree,
) -> Result<Vec<ControlDependenceEdge>> {
    let mut edges = Vec::new();
    let mut seen: HashSet<ControlDependenceEdge> = HashSet::new();
    let mut controlled = vec![false; cfg.len()];

    for edge in cfg.edges() {
        let (a, b) = (edge.from, edge.to);
        if post_dominators.dominates(b, a) {
            continue;
        }
        // Only the root lacks an ipdom, and EXIT has no outgoing edges
        let Some(stop) = post_dominators.immediate(a) else {
            continue;
        };

        let mut runner = b;
        let mut steps = 0usize;
        while runner != stop {
            let dependence = ControlDependenceEdge::new(a, runner, edge.label.clone());
            if seen.insert(dependence.clone()) {
                if a != runner {
                    controlled[runner.index()] = true;
                }
                edges.push(dependence);
            }

            steps += 1;
            runner = match post_dominators.immediate(runner) {
                Some(parent) if steps <= cfg.len() => parent,
                _ => {
                    return Err(PdgError::invariant(
                        cfg.procedure_id(),
                        format!(
                            "post-dominator walk from {} reached the root without meeting ipdom({}) = {}",
                            b, a, stop
                        ),
                    ))
                }
            };
        }
    }

    let entry = cfg.entry();
    let reachable = cfg.reachable_from(entry, Direction::Forward);
    for node in cfg.node_ids() {
        if node == entry || node == cfg.exit() || !reachable.contains(node.index()) {
            continue;
        }
        if !controlled[node.index()] {
            let dependence = ControlDependenceEdge::new(entry, node, BranchLabel::Unconditional);
            if seen.insert(dependence.clone()) {
                edges.push(dependence);
            }
        }
    }

    debug!(
        procedure = cfg.procedure_id(),
        edges = edges.len(),
        "control dependences derived"
    );

    Ok(edges)
}
