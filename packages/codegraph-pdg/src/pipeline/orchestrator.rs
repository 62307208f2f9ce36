//! Per-procedure orchestrator
//!
//! Runs the analysis stages for one procedure:
//!
//! ```text
//! Procedure
//!   └─ CFG build + exit normalization
//!        ├─ post-dominators ──── control dependence ─┐
//!        └─ reaching definitions ─ data dependence ──┴─ assemble → PDG
//! ```
//!
//! Post-dominance and reaching definitions only read the CFG, so they run
//! under `rayon::join` when `analysis.parallel_dataflow` is set.

use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::features::control_dependence::{compute_control_dependence, ControlDependenceEdge};
use crate::features::data_flow::{compute_data_dependence, DataDependenceEdge, ReachingDefinitions};
use crate::features::dominance::{compute_post_dominators, DominatorTree};
use crate::features::flow_graph::{build_flow_graph, ControlFlowGraph};
use crate::features::pdg::{assemble, ProgramDependenceGraph};
use crate::features::syntax::Procedure;
use crate::shared::models::{Diagnostic, Result};

/// Every intermediate product of one procedure's analysis
#[derive(Debug, Clone)]
pub struct ProcedureAnalysis {
    pub procedure_id: String,
    pub cfg: ControlFlowGraph,
    pub post_dominators: DominatorTree,
    pub reaching: ReachingDefinitions,
    pub control: Vec<ControlDependenceEdge>,
    pub data: Vec<DataDependenceEdge>,
    pub pdg: ProgramDependenceGraph,
    /// CFG diagnostics first, then data-dependence ones
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Default)]
pub struct PdgPipeline {
    config: AnalysisConfig,
}

impl PdgPipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Build the PDG of one procedure. Any error is fatal for this procedure only.
    pub fn analyze_procedure(&self, procedure: &Procedure) -> Result<ProcedureAnalysis> {
        let flow = build_flow_graph(procedure)?;
        let cfg = flow.cfg;
        let cap = self.config.max_fixpoint_evaluations;

        let (post_dominators, reaching) = if self.config.parallel_dataflow {
            rayon::join(
                || compute_post_dominators(&cfg, cap),
                || ReachingDefinitions::compute(&cfg, cap),
            )
        } else {
            (
                compute_post_dominators(&cfg, cap),
                ReachingDefinitions::compute(&cfg, cap),
            )
        };
        let post_dominators = post_dominators?;
        let reaching = reaching?;

        let control = compute_control_dependence(&cfg, &post_dominators)?;
        let data = compute_data_dependence(&cfg, &reaching, self.config.approximate_unresolved);
        let pdg = assemble(&cfg, &control, &data.edges);

        let mut diagnostics = flow.diagnostics;
        diagnostics.extend(data.diagnostics);
        for diagnostic in &diagnostics {
            warn!(procedure = %procedure.id, "{}", diagnostic);
        }
        debug!(
            procedure = %procedure.id,
            nodes = cfg.len(),
            control = control.len(),
            data = data.edges.len(),
            approximate = data.edges.iter().filter(|e| e.approximate).count(),
            "procedure analyzed"
        );

        Ok(ProcedureAnalysis {
            procedure_id: procedure.id.clone(),
            cfg,
            post_dominators,
            reaching,
            control,
            data: data.edges,
            pdg,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::pdg::DependencyType;
    use crate::features::syntax::{Effect, Stmt, StmtKind, Variable};
    use crate::shared::models::{ErrorKind, Span};

    fn assign(line: u32, text: &str, def: Variable, uses: &[Variable]) -> Stmt {
        let mut effect = Effect::new(text, Span::line(line)).defines(def);
        for var in uses {
            effect.add_use(var.clone());
        }
        Stmt::expr(effect)
    }

    #[test]
    fn test_straight_line_def_use() {
        let x = Variable::local("x", 0);
        let y = Variable::local("y", 1);
        let procedure = Procedure::new(
            "T.m()",
            "m",
            Stmt::block(vec![
                assign(2, "x = 1;", x.clone(), &[]),
                assign(3, "y = x + 1;", y, &[x]),
            ]),
        );

        for pipeline in [
            PdgPipeline::default(),
            PdgPipeline::new(AnalysisConfig::default().parallel_dataflow(false)),
        ] {
            let analysis = pipeline.analyze_procedure(&procedure).unwrap();
            let data: Vec<_> = analysis
                .pdg
                .edges()
                .filter(|e| e.dependency_type == DependencyType::Data)
                .collect();
            assert_eq!(data.len(), 1);
            assert_eq!(data[0].label, "x");
            assert!(!data[0].approximate);
            assert!(analysis.post_dominators.is_well_formed());
            assert!(analysis.diagnostics.is_empty());
        }
    }

    #[test]
    fn test_malformed_procedure_is_an_error() {
        let procedure = Procedure::new(
            "T.bad()",
            "bad",
            Stmt::block(vec![Stmt::new(StmtKind::Break(None), "break;", Span::line(2))]),
        );
        let err = PdgPipeline::default().analyze_procedure(&procedure).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedControlFlow);
    }

    #[test]
    fn test_diagnostics_collected_from_all_stages() {
        let procedure = Procedure::new(
            "T.m()",
            "m",
            Stmt::block(vec![Stmt::expr(
                Effect::new("print(ghost);", Span::line(2)).uses(Variable::unresolved("ghost")),
            )]),
        );
        let analysis = PdgPipeline::default().analyze_procedure(&procedure).unwrap();
        assert!(analysis
            .diagnostics
            .iter()
            .any(|d| d.kind == crate::shared::models::DiagnosticKind::UnresolvedSymbol));
    }
}
