/*
 * Data Dependence derivation
 *
 * Resolved uses: every definition of the same variable in in[N] feeds N.
 *
 * Unresolved uses fall back to name matching: any definition whose variable
 * has the same bare name and whose node reaches N by a non-empty CFG path
 * (or sits on ENTRY) is taken to reach it. Those edges are marked
 * approximate and the use is reported once per (node, name).
 */

use std::collections::{HashMap, HashSet};

use fixedbitset::FixedBitSet;
use tracing::debug;

use crate::features::data_flow::domain::DataDependenceEdge;
use crate::features::data_flow::infrastructure::reaching_definitions::ReachingDefinitions;
use crate::features::flow_graph::domain::{ControlFlowGraph, NodeId};
use crate::features::syntax::domain::Variable;
use crate::shared::models::{Diagnostic, DiagnosticKind};

#[derive(Debug, Clone, Default)]
pub struct DataDependence {
    pub edges: Vec<DataDependenceEdge>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DataDependence {
    pub fn approximate_count(&self) -> usize {
        self.edges.iter().filter(|e| e.approximate).count()
    }
}

pub fn compute_data_dependence(
    cfg: &ControlFlowGraph,
    reaching: &ReachingDefinitions,
    approximate_unresolved: bool,
) -> DataDependence {
    let mut result = DataDependence::default();
    let mut seen: HashSet<DataDependenceEdge> = HashSet::new();
    let mut reach_cache: HashMap<NodeId, FixedBitSet> = HashMap::new();
    let mut reported: HashSet<(NodeId, String)> = HashSet::new();

    let mut push = |edges: &mut Vec<DataDependenceEdge>, edge: DataDependenceEdge| {
        if seen.insert(edge.clone()) {
            edges.push(edge);
        }
    };

    for node in cfg.nodes() {
        for var in &node.uses {
            if var.is_resolved() {
                for def in reaching.reaching(node.id).filter(|d| &d.var == var) {
                    push(
                        &mut result.edges,
                        DataDependenceEdge {
                            from: def.node,
                            to: node.id,
                            variable: var.name.clone(),
                            approximate: false,
                        },
                    );
                }
                continue;
            }

            if !approximate_unresolved {
                continue;
            }

            if reported.insert((node.id, var.name.clone())) {
                result.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnresolvedSymbol,
                    Some(node.id),
                    format!("unresolved symbol '{}' in {}", var.name, cfg.procedure_id()),
                ));
            }

            for def in candidate_definitions(cfg, reaching, var, node.id, &mut reach_cache) {
                push(
                    &mut result.edges,
                    DataDependenceEdge {
                        from: def,
                        to: node.id,
                        variable: var.name.clone(),
                        approximate: true,
                    },
                );
            }
        }
    }

    debug!(
        procedure = cfg.procedure_id(),
        edges = result.edges.len(),
        approximate = result.approximate_count(),
        "data dependences derived"
    );

    result
}

/// Nodes of same-named definitions that may reach `target`
fn candidate_definitions(
    cfg: &ControlFlowGraph,
    reaching: &ReachingDefinitions,
    var: &Variable,
    target: NodeId,
    reach_cache: &mut HashMap<NodeId, FixedBitSet>,
) -> Vec<NodeId> {
    let name = var.bare_name();
    let mut nodes = Vec::new();
    for def in reaching.table().iter() {
        if def.var.bare_name() != name || nodes.contains(&def.node) {
            continue;
        }
        let reaches = def.node == cfg.entry()
            || reach_cache
                .entry(def.node)
                .or_insert_with(|| cfg.reachable_by_nonempty_path(def.node))
                .contains(target.index());
        if reaches {
            nodes.push(def.node);
        }
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::flow_graph::domain::{BranchLabel, NodeKind};
    use crate::features::syntax::domain::VarDef;
    use crate::shared::models::Span;

    fn stmt(cfg: &mut ControlFlowGraph, label: &str, defs: Vec<VarDef>, uses: Vec<Variable>) -> NodeId {
        cfg.push_node(NodeKind::Assignment, label.into(), Span::zero(), defs, uses, false)
    }

    fn chain(cfg: &mut ControlFlowGraph, nodes: &[NodeId]) {
        let mut prev = ControlFlowGraph::ENTRY;
        for &node in nodes {
            cfg.add_edge(prev, node, BranchLabel::Unconditional);
            prev = node;
        }
        cfg.add_edge(prev, ControlFlowGraph::EXIT, BranchLabel::Unconditional);
    }

    #[test]
    fn test_simple_def_use() {
        let x = Variable::local("x", 0);
        let y = Variable::local("y", 1);
        let mut cfg = ControlFlowGraph::new("m", "ENTRY", "EXIT", vec![], Span::zero());
        let d = stmt(&mut cfg, "x = 1;", vec![VarDef::strong(x.clone())], vec![]);
        let u = stmt(&mut cfg, "y = x + 1;", vec![VarDef::strong(y)], vec![x.clone()]);
        chain(&mut cfg, &[d, u]);

        let rd = ReachingDefinitions::compute(&cfg, None).unwrap();
        let dd = compute_data_dependence(&cfg, &rd, true);
        assert_eq!(
            dd.edges,
            vec![DataDependenceEdge {
                from: d,
                to: u,
                variable: "x".into(),
                approximate: false,
            }]
        );
        assert!(dd.diagnostics.is_empty());
    }

    #[test]
    fn test_unresolved_use_falls_back_to_names() {
        let field = Variable::field("count");
        let unresolved = Variable::unresolved("other.count");
        let mut cfg = ControlFlowGraph::new("m", "ENTRY", "EXIT", vec![], Span::zero());
        let d = stmt(&mut cfg, "count = 1;", vec![VarDef::strong(field)], vec![]);
        let u = stmt(&mut cfg, "y = other.count;", vec![], vec![unresolved.clone()]);
        let later = stmt(&mut cfg, "count = 2;", vec![VarDef::strong(Variable::field("count"))], vec![]);
        chain(&mut cfg, &[d, u, later]);

        let rd = ReachingDefinitions::compute(&cfg, None).unwrap();
        let dd = compute_data_dependence(&cfg, &rd, true);

        assert_eq!(dd.edges.len(), 1);
        assert_eq!(dd.edges[0].from, d);
        assert!(dd.edges[0].approximate);
        assert_eq!(dd.diagnostics.len(), 1);
        assert_eq!(dd.diagnostics[0].kind, DiagnosticKind::UnresolvedSymbol);
        assert_eq!(dd.diagnostics[0].node, Some(u));
    }

    #[test]
    fn test_fallback_can_be_disabled() {
        let mut cfg = ControlFlowGraph::new("m", "ENTRY", "EXIT", vec![], Span::zero());
        let d = stmt(&mut cfg, "v = 1;", vec![VarDef::strong(Variable::local("v", 0))], vec![]);
        let u = stmt(&mut cfg, "w = v;", vec![], vec![Variable::unresolved("v")]);
        chain(&mut cfg, &[d, u]);

        let rd = ReachingDefinitions::compute(&cfg, None).unwrap();
        let dd = compute_data_dependence(&cfg, &rd, false);
        assert!(dd.edges.is_empty());
        assert!(dd.diagnostics.is_empty());
    }

    #[test]
    fn test_loop_carried_self_edge() {
        let s = Variable::local("s", 0);
        let mut cfg = ControlFlowGraph::new("m", "ENTRY", "EXIT", vec![], Span::zero());
        let init = stmt(&mut cfg, "s = 0;", vec![VarDef::strong(s.clone())], vec![]);
        let header = cfg.push_node(NodeKind::LoopCondition, "while (c)".into(), Span::zero(), vec![], vec![], false);
        let body = stmt(&mut cfg, "s = s + 1;", vec![VarDef::strong(s.clone())], vec![s.clone()]);
        cfg.add_edge(ControlFlowGraph::ENTRY, init, BranchLabel::Unconditional);
        cfg.add_edge(init, header, BranchLabel::Unconditional);
        cfg.add_edge(header, body, BranchLabel::True);
        cfg.add_edge(body, header, BranchLabel::Unconditional);
        cfg.add_edge(header, ControlFlowGraph::EXIT, BranchLabel::False);

        let rd = ReachingDefinitions::compute(&cfg, None).unwrap();
        let dd = compute_data_dependence(&cfg, &rd, true);
        let into_body: Vec<NodeId> = dd.edges.iter().filter(|e| e.to == body).map(|e| e.from).collect();
        assert_eq!(into_body, vec![init, body]);
    }
}
