use tracing::debug;

use crate::features::flow_graph::domain::ControlFlowGraph;
use crate::features::flow_graph::infrastructure::{build_cfg, normalize_exits};
use crate::features::syntax::domain::Procedure;
use crate::shared::models::{Diagnostic, Result};

/// Normalized CFG of one procedure plus what normalization found
pub struct FlowGraphResult {
    pub cfg: ControlFlowGraph,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lower the procedure, then make every node reach EXIT
pub fn build_flow_graph(procedure: &Procedure) -> Result<FlowGraphResult> {
    let mut cfg = build_cfg(procedure)?;
    let diagnostics = normalize_exits(&mut cfg);
    if !diagnostics.is_empty() {
        debug!(
            procedure = %procedure.id,
            diagnostics = diagnostics.len(),
            "flow graph normalized"
        );
    }
    Ok(FlowGraphResult { cfg, diagnostics })
}
