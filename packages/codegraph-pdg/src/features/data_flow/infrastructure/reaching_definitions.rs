/*
 * Reaching Definitions
 *
 * Classic forward may-analysis on bit vectors indexed by DefId:
 *   in[n]  = U out[p]  for p in preds(n)
 *   out[n] = gen[n] U (in[n] - kill[n])
 *
 * kill[n] holds the other definitions of every variable n defines strongly;
 * weak definitions only generate. ENTRY generates the definitions of
 * parameters and captured variables.
 *
 * An exceptional edge leaves n before its writes are known to have
 * happened, so it carries in[n] U gen[n] with nothing killed.
 */

use std::borrow::Cow;

use fixedbitset::FixedBitSet;
use tracing::debug;

use crate::features::data_flow::domain::{DefId, Definition, DefinitionTable};
use crate::features::flow_graph::domain::{BranchLabel, ControlEdge, ControlFlowGraph, NodeId};
use crate::shared::fixpoint::{self, DataflowProblem, Direction};
use crate::shared::models::Result;

struct ReachingDefinitionsProblem {
    universe: usize,
    gen: Vec<FixedBitSet>,
    kill: Vec<FixedBitSet>,
}

impl ReachingDefinitionsProblem {
    fn new(cfg: &ControlFlowGraph, table: &DefinitionTable) -> Self {
        let universe = table.len();
        let mut gen = vec![FixedBitSet::with_capacity(universe); cfg.len()];
        let mut kill = vec![FixedBitSet::with_capacity(universe); cfg.len()];

        for def in table.iter() {
            let n = def.node.index();
            gen[n].insert(def.id.index());
            if def.strong {
                for &other in table.of_var(&def.var) {
                    if table.get(other).node != def.node {
                        kill[n].insert(other.index());
                    }
                }
            }
        }

        Self {
            universe,
            gen,
            kill,
        }
    }
}

impl DataflowProblem for ReachingDefinitionsProblem {
    type Fact = FixedBitSet;

    fn name(&self) -> &'static str {
        "reaching-definitions"
    }

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn boundary(&self) -> FixedBitSet {
        FixedBitSet::with_capacity(self.universe)
    }

    fn initial(&self) -> FixedBitSet {
        FixedBitSet::with_capacity(self.universe)
    }

    fn meet(&self, acc: &mut FixedBitSet, incoming: &FixedBitSet) {
        acc.union_with(incoming);
    }

    fn transfer(&self, node: NodeId, input: &FixedBitSet) -> FixedBitSet {
        let mut out = input.clone();
        out.difference_with(&self.kill[node.index()]);
        out.union_with(&self.gen[node.index()]);
        out
    }

    fn edge_fact<'a>(
        &self,
        edge: &ControlEdge,
        input: &'a FixedBitSet,
        output: &'a FixedBitSet,
    ) -> Cow<'a, FixedBitSet> {
        if edge.label != BranchLabel::Exceptional {
            return Cow::Borrowed(output);
        }
        let mut carried = input.clone();
        carried.union_with(&self.gen[edge.from.index()]);
        Cow::Owned(carried)
    }

    fn is_monotone_step(&self, old: &FixedBitSet, new: &FixedBitSet) -> bool {
        old.is_subset(new)
    }

    fn height(&self) -> usize {
        self.universe + 1
    }
}

/// Per-node reaching-definition sets of one procedure
#[derive(Debug, Clone)]
pub struct ReachingDefinitions {
    table: DefinitionTable,
    input: Vec<FixedBitSet>,
    output: Vec<FixedBitSet>,
    evaluations: usize,
}

impl ReachingDefinitions {
    pub fn compute(cfg: &ControlFlowGraph, max_evaluations: Option<usize>) -> Result<Self> {
        let table = DefinitionTable::from_cfg(cfg);
        let problem = ReachingDefinitionsProblem::new(cfg, &table);
        let solution = fixpoint::solve(cfg, &problem, max_evaluations)?;

        debug!(
            procedure = cfg.procedure_id(),
            definitions = table.len(),
            evaluations = solution.evaluations,
            "reaching definitions solved"
        );

        Ok(Self {
            table,
            input: solution.input,
            output: solution.output,
            evaluations: solution.evaluations,
        })
    }

    pub fn table(&self) -> &DefinitionTable {
        &self.table
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn in_set(&self, node: NodeId) -> &FixedBitSet {
        &self.input[node.index()]
    }

    /// Definitions reaching the entry of `node`, in DefId order
    pub fn reaching(&self, node: NodeId) -> impl Iterator<Item = &Definition> + '_ {
        self.input[node.index()]
            .ones()
            .map(move |index| self.table.get(DefId(index as u32)))
    }

    /// Whether `out[n] = gen[n] U (in[n] - kill[n])` and `in[n]` is the union
    /// of what the incoming edges carry, for every ENTRY-reachable node
    pub fn is_fixed_point(&self, cfg: &ControlFlowGraph) -> bool {
        let problem = ReachingDefinitionsProblem::new(cfg, &self.table);
        let reachable = cfg.reachable_from(cfg.entry(), Direction::Forward);
        cfg.node_ids()
            .filter(|node| reachable.contains(node.index()))
            .all(|node| {
                let mut expected_in = FixedBitSet::with_capacity(self.table.len());
                for (pred, edge) in cfg.flow_in_edges(node, Direction::Forward) {
                    if reachable.contains(pred.index()) {
                        let carried = problem.edge_fact(
                            edge,
                            &self.input[pred.index()],
                            &self.output[pred.index()],
                        );
                        expected_in.union_with(&carried);
                    }
                }
                expected_in == self.input[node.index()]
                    && problem.transfer(node, &self.input[node.index()]) == self.output[node.index()]
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::flow_graph::domain::{BranchLabel, NodeKind};
    use crate::features::syntax::domain::{VarDef, Variable};
    use crate::shared::models::Span;

    fn assign(cfg: &mut ControlFlowGraph, label: &str, defs: Vec<VarDef>, uses: Vec<Variable>) -> NodeId {
        cfg.push_node(NodeKind::Assignment, label.into(), Span::zero(), defs, uses, false)
    }

    fn reaching_nodes(rd: &ReachingDefinitions, node: NodeId, var: &Variable) -> Vec<NodeId> {
        rd.reaching(node)
            .filter(|d| &d.var == var)
            .map(|d| d.node)
            .collect()
    }

    #[test]
    fn test_strong_definition_kills() {
        let x = Variable::local("x", 0);
        let mut cfg = ControlFlowGraph::new("kill", "ENTRY", "EXIT", vec![], Span::zero());
        let d1 = assign(&mut cfg, "x = 1;", vec![VarDef::strong(x.clone())], vec![]);
        let d2 = assign(&mut cfg, "x = 2;", vec![VarDef::strong(x.clone())], vec![]);
        let u = assign(&mut cfg, "y = x;", vec![], vec![x.clone()]);
        cfg.add_edge(ControlFlowGraph::ENTRY, d1, BranchLabel::Unconditional);
        cfg.add_edge(d1, d2, BranchLabel::Unconditional);
        cfg.add_edge(d2, u, BranchLabel::Unconditional);
        cfg.add_edge(u, ControlFlowGraph::EXIT, BranchLabel::Unconditional);

        let rd = ReachingDefinitions::compute(&cfg, None).unwrap();
        assert_eq!(reaching_nodes(&rd, u, &x), vec![d2]);
        assert!(rd.is_fixed_point(&cfg));
    }

    #[test]
    fn test_weak_definition_does_not_kill() {
        let a = Variable::local("a", 0);
        let mut cfg = ControlFlowGraph::new("weak", "ENTRY", "EXIT", vec![], Span::zero());
        let d1 = assign(&mut cfg, "a = new int[3];", vec![VarDef::strong(a.clone())], vec![]);
        let d2 = assign(&mut cfg, "a[0] = 1;", vec![VarDef::weak(a.clone())], vec![a.clone()]);
        let u = assign(&mut cfg, "y = a[1];", vec![], vec![a.clone()]);
        cfg.add_edge(ControlFlowGraph::ENTRY, d1, BranchLabel::Unconditional);
        cfg.add_edge(d1, d2, BranchLabel::Unconditional);
        cfg.add_edge(d2, u, BranchLabel::Unconditional);
        cfg.add_edge(u, ControlFlowGraph::EXIT, BranchLabel::Unconditional);

        let rd = ReachingDefinitions::compute(&cfg, None).unwrap();
        assert_eq!(reaching_nodes(&rd, u, &a), vec![d1, d2]);
    }

    #[test]
    fn test_parameters_defined_at_entry_and_merge_at_join() {
        let p = Variable::parameter("p", 0);
        let mut cfg = ControlFlowGraph::new(
            "join",
            "ENTRY",
            "EXIT",
            vec![VarDef::strong(p.clone())],
            Span::zero(),
        );
        let c = cfg.push_node(NodeKind::Condition, "if (c)".into(), Span::zero(), vec![], vec![], false);
        let redefine = assign(&mut cfg, "p = 0;", vec![VarDef::strong(p.clone())], vec![]);
        let u = assign(&mut cfg, "y = p;", vec![], vec![p.clone()]);
        cfg.add_edge(ControlFlowGraph::ENTRY, c, BranchLabel::Unconditional);
        cfg.add_edge(c, redefine, BranchLabel::True);
        cfg.add_edge(c, u, BranchLabel::False);
        cfg.add_edge(redefine, u, BranchLabel::Unconditional);
        cfg.add_edge(u, ControlFlowGraph::EXIT, BranchLabel::Unconditional);

        let rd = ReachingDefinitions::compute(&cfg, None).unwrap();
        assert_eq!(reaching_nodes(&rd, u, &p), vec![ControlFlowGraph::ENTRY, redefine]);
        assert!(rd.is_fixed_point(&cfg));
    }

    #[test]
    fn test_exceptional_edge_keeps_definitions_the_thrower_kills() {
        let x = Variable::local("x", 0);
        let mut cfg = ControlFlowGraph::new("throws", "ENTRY", "EXIT", vec![], Span::zero());
        let d1 = assign(&mut cfg, "x = 0;", vec![VarDef::strong(x.clone())], vec![]);
        let d2 = cfg.push_node(
            NodeKind::Assignment,
            "x = compute();".into(),
            Span::zero(),
            vec![VarDef::strong(x.clone())],
            vec![],
            true,
        );
        let handler = assign(&mut cfg, "use(x);", vec![], vec![x.clone()]);
        let after = assign(&mut cfg, "y = x;", vec![], vec![x.clone()]);
        cfg.add_edge(ControlFlowGraph::ENTRY, d1, BranchLabel::Unconditional);
        cfg.add_edge(d1, d2, BranchLabel::Unconditional);
        cfg.add_edge(d2, after, BranchLabel::Unconditional);
        cfg.add_edge(d2, handler, BranchLabel::Exceptional);
        cfg.add_edge(handler, ControlFlowGraph::EXIT, BranchLabel::Unconditional);
        cfg.add_edge(after, ControlFlowGraph::EXIT, BranchLabel::Unconditional);

        let rd = ReachingDefinitions::compute(&cfg, None).unwrap();
        assert_eq!(reaching_nodes(&rd, handler, &x), vec![d1, d2]);
        assert_eq!(reaching_nodes(&rd, after, &x), vec![d2]);
        assert!(rd.is_fixed_point(&cfg));
    }

    #[test]
    fn test_unreachable_node_keeps_empty_set() {
        let x = Variable::local("x", 0);
        let mut cfg = ControlFlowGraph::new("dead", "ENTRY", "EXIT", vec![], Span::zero());
        let d = assign(&mut cfg, "x = 1;", vec![VarDef::strong(x.clone())], vec![]);
        let dead = assign(&mut cfg, "y = x;", vec![], vec![x.clone()]);
        cfg.add_edge(ControlFlowGraph::ENTRY, d, BranchLabel::Unconditional);
        cfg.add_edge(d, ControlFlowGraph::EXIT, BranchLabel::Unconditional);
        cfg.add_edge(dead, ControlFlowGraph::EXIT, BranchLabel::Unconditional);

        let rd = ReachingDefinitions::compute(&cfg, None).unwrap();
        assert_eq!(rd.in_set(dead).count_ones(..), 0);
        assert_eq!(rd.in_set(ControlFlowGraph::EXIT).count_ones(..), 1);
    }
}
