//! Generic worklist fixpoint over a procedure's CFG
//!
//! One solver, parameterized by a [`DataflowProblem`], drives both the
//! dominance computations and reaching definitions.
//!
//! Facts flow along CFG edges. By default an edge carries its source's
//! output; a problem can refine that per edge with
//! [`DataflowProblem::edge_fact`].
//!
//! Nodes are evaluated in reverse postorder of the problem's direction,
//! starting from its root (ENTRY forward, EXIT backward). Nodes the root
//! cannot reach are never evaluated and keep the initial fact.
//!
//! Termination is checked rather than assumed: every output change must move
//! in the problem's lattice order, and the total number of node evaluations
//! may not exceed `nodes + (height + 1) * (edges + 1)`. Either failure is an
//! `InternalInvariantViolation` for the procedure.

use std::borrow::Cow;
use std::collections::BTreeSet;

use tracing::debug;

use crate::features::flow_graph::domain::{ControlEdge, ControlFlowGraph, NodeId};
use crate::shared::models::{PdgError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

pub trait DataflowProblem {
    type Fact: Clone + Eq + std::fmt::Debug;

    /// Used in logs and error messages
    fn name(&self) -> &'static str;

    fn direction(&self) -> Direction;

    /// Input fact of the root node
    fn boundary(&self) -> Self::Fact;

    /// Output fact of every node before its first evaluation. Also the
    /// identity of [`DataflowProblem::meet`].
    fn initial(&self) -> Self::Fact;

    fn meet(&self, acc: &mut Self::Fact, incoming: &Self::Fact);

    fn transfer(&self, node: NodeId, input: &Self::Fact) -> Self::Fact;

    /// Fact `edge` carries out of its flow source, given the source's input
    /// and output facts
    fn edge_fact<'a>(
        &self,
        _edge: &ControlEdge,
        _input: &'a Self::Fact,
        output: &'a Self::Fact,
    ) -> Cow<'a, Self::Fact> {
        Cow::Borrowed(output)
    }

    /// Whether `old -> new` moves in the lattice order the problem iterates in
    fn is_monotone_step(&self, old: &Self::Fact, new: &Self::Fact) -> bool;

    /// Upper bound on how often one node's output can change
    fn height(&self) -> usize;
}

/// Fixed point of a problem: per-node input/output facts indexed by NodeId
#[derive(Debug, Clone)]
pub struct Solution<F> {
    pub input: Vec<F>,
    pub output: Vec<F>,
    pub evaluations: usize,
    /// Nodes evaluated at least once
    pub evaluated: Vec<bool>,
}

impl<F> Solution<F> {
    pub fn input(&self, node: NodeId) -> &F {
        &self.input[node.index()]
    }

    pub fn output(&self, node: NodeId) -> &F {
        &self.output[node.index()]
    }
}

/// Evaluation budget implied by the lattice height
pub fn theoretical_bound(nodes: usize, edges: usize, height: usize) -> usize {
    nodes.saturating_add(height.saturating_add(1).saturating_mul(edges.saturating_add(1)))
}

pub fn solve<P: DataflowProblem>(
    cfg: &ControlFlowGraph,
    problem: &P,
    max_evaluations: Option<usize>,
) -> Result<Solution<P::Fact>> {
    let direction = problem.direction();
    let root = cfg.root(direction);
    let order = cfg.reverse_postorder(direction);

    let n = cfg.len();
    let mut rank = vec![usize::MAX; n];
    for (position, node) in order.iter().enumerate() {
        rank[node.index()] = position;
    }

    let bound = theoretical_bound(order.len(), cfg.edge_count(), problem.height());
    let limit = max_evaluations.map_or(bound, |cap| cap.min(bound));

    let mut input = vec![problem.initial(); n];
    let mut output = vec![problem.initial(); n];
    let mut evaluated = vec![false; n];
    let mut worklist: BTreeSet<usize> = (0..order.len()).collect();
    let mut evaluations = 0usize;

    while let Some(position) = worklist.pop_first() {
        let node = order[position];

        evaluations += 1;
        if evaluations > limit {
            return Err(PdgError::invariant(
                cfg.procedure_id(),
                format!(
                    "{} did not converge within {} evaluations ({} nodes, {} edges)",
                    problem.name(),
                    limit,
                    order.len(),
                    cfg.edge_count()
                ),
            ));
        }

        let fact_in = if node == root {
            problem.boundary()
        } else {
            let mut acc = problem.initial();
            for (pred, edge) in cfg.flow_in_edges(node, direction) {
                if rank[pred.index()] != usize::MAX {
                    let carried = problem.edge_fact(edge, &input[pred.index()], &output[pred.index()]);
                    problem.meet(&mut acc, &carried);
                }
            }
            acc
        };

        let fact_out = problem.transfer(node, &fact_in);
        // edge facts may read the input, so a new input alone re-queues successors
        let input_changed = fact_in != input[node.index()];
        input[node.index()] = fact_in;

        let first_visit = !evaluated[node.index()];
        evaluated[node.index()] = true;

        let output_changed = fact_out != output[node.index()];
        if output_changed {
            if !first_visit && !problem.is_monotone_step(&output[node.index()], &fact_out) {
                return Err(PdgError::invariant(
                    cfg.procedure_id(),
                    format!(
                        "{} made a non-monotone step at node {}",
                        problem.name(),
                        node
                    ),
                ));
            }
            output[node.index()] = fact_out;
        }
        if output_changed || input_changed {
            for succ in cfg.flow_successors(node, direction) {
                let succ_rank = rank[succ.index()];
                if succ_rank != usize::MAX {
                    worklist.insert(succ_rank);
                }
            }
        }
    }

    debug!(
        procedure = cfg.procedure_id(),
        problem = problem.name(),
        evaluations,
        bound = limit,
        "fixpoint converged"
    );

    Ok(Solution {
        input,
        output,
        evaluations,
        evaluated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::flow_graph::domain::{BranchLabel, NodeKind};
    use crate::shared::models::{ErrorKind, Span};

    fn chain_with_loop() -> ControlFlowGraph {
        // ENTRY -> 2 -> 3 -> 2, 3 -> EXIT
        let mut cfg = ControlFlowGraph::new("loop", "ENTRY", "EXIT", vec![], Span::zero());
        let header = cfg.push_node(NodeKind::LoopCondition, "while (c)".into(), Span::line(1), vec![], vec![], false);
        let body = cfg.push_node(NodeKind::Expression, "x++".into(), Span::line(2), vec![], vec![], false);
        cfg.add_edge(ControlFlowGraph::ENTRY, header, BranchLabel::Unconditional);
        cfg.add_edge(header, body, BranchLabel::True);
        cfg.add_edge(body, header, BranchLabel::Unconditional);
        cfg.add_edge(header, ControlFlowGraph::EXIT, BranchLabel::False);
        cfg
    }

    /// Counts path length from ENTRY, capped: a small monotone problem
    struct Distance;

    impl DataflowProblem for Distance {
        type Fact = u32;

        fn name(&self) -> &'static str {
            "distance"
        }

        fn direction(&self) -> Direction {
            Direction::Forward
        }

        fn boundary(&self) -> u32 {
            0
        }

        fn initial(&self) -> u32 {
            0
        }

        fn meet(&self, acc: &mut u32, incoming: &u32) {
            *acc = (*acc).max(*incoming);
        }

        fn transfer(&self, _node: NodeId, input: &u32) -> u32 {
            (input + 1).min(3)
        }

        fn is_monotone_step(&self, old: &u32, new: &u32) -> bool {
            new >= old
        }

        fn height(&self) -> usize {
            3
        }
    }

    /// Flips between two values forever
    struct Oscillating;

    impl DataflowProblem for Oscillating {
        type Fact = bool;

        fn name(&self) -> &'static str {
            "oscillating"
        }

        fn direction(&self) -> Direction {
            Direction::Forward
        }

        fn boundary(&self) -> bool {
            false
        }

        fn initial(&self) -> bool {
            false
        }

        fn meet(&self, acc: &mut bool, incoming: &bool) {
            *acc ^= *incoming;
        }

        fn transfer(&self, _node: NodeId, input: &bool) -> bool {
            !input
        }

        fn is_monotone_step(&self, _old: &bool, _new: &bool) -> bool {
            true
        }

        fn height(&self) -> usize {
            1
        }
    }

    /// Loop header output falls as its input grows
    struct Shrinking;

    impl DataflowProblem for Shrinking {
        type Fact = u32;

        fn name(&self) -> &'static str {
            "shrinking"
        }

        fn direction(&self) -> Direction {
            Direction::Forward
        }

        fn boundary(&self) -> u32 {
            0
        }

        fn initial(&self) -> u32 {
            0
        }

        fn meet(&self, acc: &mut u32, incoming: &u32) {
            *acc = (*acc).max(*incoming);
        }

        fn transfer(&self, node: NodeId, input: &u32) -> u32 {
            if node == NodeId(2) {
                10u32.saturating_sub(*input)
            } else {
                input.saturating_add(1)
            }
        }

        fn is_monotone_step(&self, old: &u32, new: &u32) -> bool {
            new >= old
        }

        fn height(&self) -> usize {
            10
        }
    }

    /// Distance that restarts at the loop header, whose `False` edge carries
    /// the header's input
    struct FlatOnFalse;

    impl DataflowProblem for FlatOnFalse {
        type Fact = u32;

        fn name(&self) -> &'static str {
            "flat-on-false"
        }

        fn direction(&self) -> Direction {
            Direction::Forward
        }

        fn boundary(&self) -> u32 {
            0
        }

        fn initial(&self) -> u32 {
            0
        }

        fn meet(&self, acc: &mut u32, incoming: &u32) {
            *acc = (*acc).max(*incoming);
        }

        fn transfer(&self, node: NodeId, input: &u32) -> u32 {
            if node == NodeId(2) {
                1
            } else {
                (input + 1).min(3)
            }
        }

        fn edge_fact<'a>(&self, edge: &ControlEdge, input: &'a u32, output: &'a u32) -> Cow<'a, u32> {
            if edge.label == BranchLabel::False {
                Cow::Borrowed(input)
            } else {
                Cow::Borrowed(output)
            }
        }

        fn is_monotone_step(&self, old: &u32, new: &u32) -> bool {
            new >= old
        }

        fn height(&self) -> usize {
            3
        }
    }

    #[test]
    fn test_monotone_problem_converges() {
        let cfg = chain_with_loop();
        let solution = solve(&cfg, &Distance, None).unwrap();
        assert_eq!(*solution.output(ControlFlowGraph::ENTRY), 1);
        assert_eq!(*solution.output(NodeId(2)), 3);
        assert_eq!(*solution.output(NodeId(3)), 3);
        assert!(solution.evaluations <= theoretical_bound(4, 4, 3));
    }

    #[test]
    fn test_non_convergence_is_invariant_violation() {
        let cfg = chain_with_loop();
        let err = solve(&cfg, &Oscillating, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalInvariantViolation);
        assert!(err.to_string().contains("oscillating"));
    }

    #[test]
    fn test_shrinking_output_is_invariant_violation() {
        let cfg = chain_with_loop();
        let err = solve(&cfg, &Shrinking, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalInvariantViolation);
        assert!(err.to_string().contains("non-monotone"));
        assert!(err.to_string().contains("shrinking"));
    }

    #[test]
    fn test_edge_fact_refines_what_an_edge_carries() {
        let cfg = chain_with_loop();
        let plain = solve(&cfg, &Distance, None).unwrap();
        let refined = solve(&cfg, &FlatOnFalse, None).unwrap();
        assert_eq!(*plain.input(ControlFlowGraph::EXIT), 3);
        // header -false-> EXIT carries the header's input; it grows to 2 after
        // the header's output has settled at 1
        assert_eq!(*refined.output(NodeId(2)), 1);
        assert_eq!(*refined.input(NodeId(2)), 2);
        assert_eq!(*refined.input(ControlFlowGraph::EXIT), 2);
    }

    #[test]
    fn test_evaluation_cap_applies() {
        let cfg = chain_with_loop();
        let err = solve(&cfg, &Distance, Some(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalInvariantViolation);
    }

    #[test]
    fn test_unreachable_nodes_not_evaluated() {
        let mut cfg = chain_with_loop();
        let dead = cfg.push_node(NodeKind::Expression, "dead".into(), Span::line(5), vec![], vec![], false);
        cfg.add_edge(dead, ControlFlowGraph::EXIT, BranchLabel::Unconditional);
        let solution = solve(&cfg, &Distance, None).unwrap();
        assert!(!solution.evaluated[dead.index()]);
        assert_eq!(*solution.output(dead), 0);
    }
}
