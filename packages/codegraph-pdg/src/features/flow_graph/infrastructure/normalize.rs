//! Exit normalization
//!
//! Post-dominance needs every node to reach EXIT. Regions that cannot
//! (infinite loops, code stranded behind them) get one conservative edge to
//! EXIT per sink strongly connected component, taken from the component's
//! lowest node id, until every node reaches EXIT.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use tracing::debug;

use crate::features::flow_graph::domain::{BranchLabel, ControlFlowGraph, NodeId};
use crate::shared::fixpoint::Direction;
use crate::shared::models::{Diagnostic, DiagnosticKind};

/// Adds conservative edges to EXIT and reports non-terminating and
/// unreachable regions. Returns the diagnostics in node order.
pub fn normalize_exits(cfg: &mut ControlFlowGraph) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let from_entry = cfg.reachable_from(cfg.entry(), Direction::Forward);
    let exit = cfg.exit();

    loop {
        let to_exit = cfg.reachable_from(exit, Direction::Backward);
        let stuck: Vec<NodeId> = cfg
            .node_ids()
            .filter(|id| !to_exit.contains(id.index()))
            .collect();
        if stuck.is_empty() {
            break;
        }

        let sources = sink_component_minima(cfg, &stuck);
        for &node in &sources {
            cfg.add_edge(node, exit, BranchLabel::Conservative);
            if from_entry.contains(node.index()) {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::NonTerminatingControlFlow,
                    Some(node),
                    format!(
                        "'{}' in {} never reaches the procedure exit",
                        cfg.node(node).label,
                        cfg.procedure_id()
                    ),
                ));
            }
        }
        debug!(
            procedure = cfg.procedure_id(),
            added = sources.len(),
            "conservative exit edges added"
        );
    }

    for id in cfg.node_ids() {
        if id != cfg.entry() && id != exit && !from_entry.contains(id.index()) {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnreachableCode,
                Some(id),
                format!(
                    "'{}' in {} is unreachable",
                    cfg.node(id).label,
                    cfg.procedure_id()
                ),
            ));
        }
    }

    diagnostics.sort_by_key(|d| (d.node, d.kind));
    diagnostics
}

/// Lowest node of every strongly connected component of `stuck` with no
/// edge leaving the component, ascending
fn sink_component_minima(cfg: &ControlFlowGraph, stuck: &[NodeId]) -> Vec<NodeId> {
    let mut graph: DiGraph<NodeId, ()> = DiGraph::with_capacity(stuck.len(), stuck.len());
    let index: HashMap<NodeId, NodeIndex> = stuck.iter().map(|&id| (id, graph.add_node(id))).collect();

    for &id in stuck {
        for succ in cfg.successors(id) {
            if let Some(&to) = index.get(&succ) {
                graph.update_edge(index[&id], to, ());
            }
        }
    }

    let mut minima: Vec<NodeId> = tarjan_scc(&graph)
        .into_iter()
        .filter_map(|component| {
            let members: Vec<NodeId> = component.iter().map(|&ix| graph[ix]).collect();
            let leaves = members.iter().any(|&id| {
                cfg.successors(id)
                    .any(|succ| !members.contains(&succ))
            });
            if leaves {
                None
            } else {
                members.into_iter().min()
            }
        })
        .collect();
    minima.sort();
    minima.dedup();
    minima
}
