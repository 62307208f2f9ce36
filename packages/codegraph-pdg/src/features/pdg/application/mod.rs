//! Graph Assembler
//!
//! Merges control and data dependences over a procedure's CFG node set.

use tracing::debug;

use crate::features::control_dependence::domain::ControlDependenceEdge;
use crate::features::data_flow::domain::DataDependenceEdge;
use crate::features::flow_graph::domain::ControlFlowGraph;
use crate::features::pdg::infrastructure::{PDGBuilder, ProgramDependenceGraph};
use crate::shared::fixpoint::Direction;

pub fn assemble(
    cfg: &ControlFlowGraph,
    control: &[ControlDependenceEdge],
    data: &[DataDependenceEdge],
) -> ProgramDependenceGraph {
    let reachable = cfg.reachable_from(cfg.entry(), Direction::Forward);

    let mut builder = PDGBuilder::new(cfg.procedure_id());
    builder.add_cfg_nodes(cfg, &reachable);
    builder.add_control_dependences(control);
    builder.add_data_dependences(data);
    let pdg = builder.build();

    let stats = pdg.get_stats();
    debug!(
        procedure = cfg.procedure_id(),
        nodes = stats.node_count,
        control = stats.control_edges,
        data = stats.data_edges,
        "PDG assembled"
    );
    pdg
}
