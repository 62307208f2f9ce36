/*
 * CFG Builder
 *
 * Lowers a procedure's statement tree into a ControlFlowGraph.
 *
 * Every construct is built from the dangling edges that lead into it and
 * returns the dangling edges that leave it; the first node a construct emits
 * receives the incoming edges. A construct that emits nothing passes its
 * incoming edges through. Statements after an abrupt exit are still emitted,
 * with no incoming edge.
 *
 * Abrupt exits are routed through JumpScopes (see finally_support). A
 * finally body is emitted once per way of leaving its try: once for normal
 * completion and once for each distinct exit it re-issues.
 */

use tracing::debug;

use crate::features::flow_graph::domain::{BranchLabel, ControlFlowGraph, NodeId, NodeKind};
use crate::features::flow_graph::infrastructure::finally_support::{
    connect, relabel_for, Jump, JumpScopes, Pending, Scope, ScopeKind,
};
use crate::features::syntax::domain::{
    CaseLabel, CatchClause, Effect, ExprKind, Procedure, Stmt, StmtKind, SwitchCase, VarDef,
};
use crate::shared::models::{PdgError, Result, Span};

const MAX_LABEL_CHARS: usize = 100;

pub struct CfgBuilder<'p> {
    procedure: &'p Procedure,
    cfg: ControlFlowGraph,
    scopes: JumpScopes,
}

impl<'p> CfgBuilder<'p> {
    pub fn new(procedure: &'p Procedure) -> Self {
        let entry_defs = procedure
            .parameters
            .iter()
            .chain(procedure.captured.iter())
            .cloned()
            .map(VarDef::strong)
            .collect();
        let cfg = ControlFlowGraph::new(
            procedure.id.clone(),
            format!("ENTRY: {}", procedure.signature),
            format!("EXIT: {}", procedure.signature),
            entry_defs,
            procedure.span,
        );
        Self {
            procedure,
            cfg,
            scopes: JumpScopes::new(),
        }
    }

    pub fn build(mut self) -> Result<ControlFlowGraph> {
        let procedure = self.procedure;
        let entry = self.cfg.entry();
        let exits = self.stmt(&procedure.body, vec![(entry, BranchLabel::Unconditional)])?;
        let exit = self.cfg.exit();
        self.connect(exits, exit);

        debug!(
            procedure = %procedure.id,
            nodes = self.cfg.len(),
            edges = self.cfg.edge_count(),
            "CFG built"
        );
        Ok(self.cfg)
    }

    fn malformed(&self, message: impl Into<String>, span: Span) -> PdgError {
        PdgError::malformed(self.procedure.id.clone(), message, span)
    }

    fn connect(&mut self, pending: Vec<Pending>, target: NodeId) {
        connect(&mut self.cfg, pending, target);
    }

    fn route(&mut self, pending: Vec<Pending>, jump: Jump) {
        let depth = self.scopes.depth();
        self.scopes.route(&mut self.cfg, pending, jump, depth);
    }

    /// Adds a node, wires `incoming` into it, and routes its implicit throw
    fn emit(
        &mut self,
        kind: NodeKind,
        text: &str,
        span: Span,
        effect: Option<&Effect>,
        incoming: Vec<Pending>,
    ) -> NodeId {
        let (defs, uses, may_throw) = match effect {
            Some(effect) => (effect.defs.clone(), effect.uses.clone(), effect.may_throw),
            None => (Vec::new(), Vec::new(), false),
        };
        let may_throw = may_throw || kind == NodeKind::Assert;
        let node = self
            .cfg
            .push_node(kind, display_label(text), span, defs, uses, may_throw);
        self.connect(incoming, node);

        if may_throw && kind != NodeKind::Throw {
            self.route(
                vec![(node, BranchLabel::Exceptional)],
                Jump::Throw {
                    thrown: None,
                    implicit: true,
                },
            );
        }
        node
    }

    fn stmts(&mut self, stmts: &[Stmt], incoming: Vec<Pending>) -> Result<Vec<Pending>> {
        let mut pending = incoming;
        for stmt in stmts {
            pending = self.stmt(stmt, pending)?;
        }
        Ok(pending)
    }

    /// Like [`Self::stmt`], also returning the node the incoming edges landed
    /// on. `None` when the statement passed them through untouched.
    fn stmt_with_entry(
        &mut self,
        stmt: &Stmt,
        incoming: Vec<Pending>,
    ) -> Result<(Option<NodeId>, Vec<Pending>)> {
        let first_node = self.cfg.len();
        let first_edge = self.cfg.edge_count();
        let sources = incoming.clone();
        let exits = self.stmt(stmt, incoming)?;

        let landed = self.cfg.edges()[first_edge..]
            .iter()
            .find(|e| sources.iter().any(|(from, label)| *from == e.from && *label == e.label))
            .map(|e| e.to);
        let entry = match landed {
            Some(node) => Some(node),
            // unreachable statement: its first emitted node
            None if sources.is_empty() && self.cfg.len() > first_node => {
                Some(NodeId::from_index(first_node))
            }
            None => None,
        };
        Ok((entry, exits))
    }

    fn stmt(&mut self, stmt: &Stmt, incoming: Vec<Pending>) -> Result<Vec<Pending>> {
        match &stmt.kind {
            StmtKind::Empty => Ok(incoming),
            StmtKind::Block(stmts) => self.stmts(stmts, incoming),
            StmtKind::Expression { effect, kind } => {
                let node_kind = match kind {
                    ExprKind::Assignment => NodeKind::Assignment,
                    ExprKind::Call => NodeKind::Call,
                    ExprKind::Other => NodeKind::Expression,
                };
                let node = self.emit(node_kind, &stmt.text, stmt.span, Some(effect), incoming);
                Ok(vec![(node, BranchLabel::Unconditional)])
            }
            StmtKind::Declaration(effect) => {
                let node = self.emit(NodeKind::Declaration, &stmt.text, stmt.span, Some(effect), incoming);
                Ok(vec![(node, BranchLabel::Unconditional)])
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond = self.emit(NodeKind::Condition, &stmt.text, stmt.span, Some(condition), incoming);
                let mut exits = self.stmt(then_branch, vec![(cond, BranchLabel::True)])?;
                match else_branch {
                    Some(else_branch) => {
                        exits.extend(self.stmt(else_branch, vec![(cond, BranchLabel::False)])?)
                    }
                    None => exits.push((cond, BranchLabel::False)),
                }
                Ok(exits)
            }
            StmtKind::While { .. }
            | StmtKind::DoWhile { .. }
            | StmtKind::For { .. }
            | StmtKind::ForEach { .. } => self.loop_stmt(stmt, incoming, None),
            StmtKind::Labeled { label, body } => match body.kind {
                StmtKind::While { .. }
                | StmtKind::DoWhile { .. }
                | StmtKind::For { .. }
                | StmtKind::ForEach { .. } => self.loop_stmt(body, incoming, Some(label.clone())),
                _ => {
                    self.scopes.push(ScopeKind::Labeled {
                        label: label.clone(),
                    });
                    let mut exits = self.stmt(body, incoming)?;
                    let scope = self.pop_scope(stmt.span)?;
                    exits.extend(scope.breaks);
                    Ok(exits)
                }
            },
            StmtKind::Switch { selector, cases } => self.switch(stmt, selector, cases, incoming),
            StmtKind::Try {
                resources,
                body,
                catches,
                finally,
            } => self.try_stmt(resources, body, catches, finally.as_deref(), incoming),
            StmtKind::Break(label) => {
                let target = self.scopes.find_break(label.as_deref()).ok_or_else(|| {
                    self.malformed(
                        match label {
                            Some(label) => format!("break to unknown label '{}'", label),
                            None => "break outside of loop or switch".to_string(),
                        },
                        stmt.span,
                    )
                })?;
                let node = self.emit(NodeKind::Break, &stmt.text, stmt.span, None, incoming);
                self.route(vec![(node, BranchLabel::Unconditional)], Jump::Break { target });
                Ok(Vec::new())
            }
            StmtKind::Continue(label) => {
                let target = self.scopes.find_continue(label.as_deref()).ok_or_else(|| {
                    self.malformed(
                        match label {
                            Some(label) => format!("continue to unknown loop label '{}'", label),
                            None => "continue outside of loop".to_string(),
                        },
                        stmt.span,
                    )
                })?;
                let node = self.emit(NodeKind::Continue, &stmt.text, stmt.span, None, incoming);
                self.route(vec![(node, BranchLabel::Unconditional)], Jump::Continue { target });
                Ok(Vec::new())
            }
            StmtKind::Return(value) => {
                let node = self.emit(NodeKind::Return, &stmt.text, stmt.span, value.as_ref(), incoming);
                self.route(vec![(node, BranchLabel::Unconditional)], Jump::Return);
                Ok(Vec::new())
            }
            StmtKind::Throw(effect) => {
                let node = self.emit(NodeKind::Throw, &stmt.text, stmt.span, Some(effect), incoming);
                self.route(
                    vec![(node, BranchLabel::Exceptional)],
                    Jump::Throw {
                        thrown: effect.thrown_type.clone(),
                        implicit: false,
                    },
                );
                Ok(Vec::new())
            }
            StmtKind::Assert(effect) => {
                let node = self.emit(NodeKind::Assert, &stmt.text, stmt.span, Some(effect), incoming);
                Ok(vec![(node, BranchLabel::Unconditional)])
            }
            StmtKind::Synchronized { lock, body } => {
                let node = self.emit(NodeKind::Synchronized, &stmt.text, stmt.span, Some(lock), incoming);
                self.stmt(body, vec![(node, BranchLabel::Unconditional)])
            }
        }
    }

    fn pop_scope(&mut self, span: Span) -> Result<Scope> {
        self.scopes.pop().ok_or_else(|| {
            PdgError::invariant(
                self.procedure.id.clone(),
                format!("jump scope stack underflow at {}", span),
            )
        })
    }

    fn loop_stmt(&mut self, stmt: &Stmt, incoming: Vec<Pending>, label: Option<String>) -> Result<Vec<Pending>> {
        match &stmt.kind {
            StmtKind::While { condition, body } => {
                let cond = self.emit(NodeKind::LoopCondition, &stmt.text, stmt.span, Some(condition), incoming);
                self.scopes.push(ScopeKind::Loop {
                    label,
                    continue_target: Some(cond),
                });
                let body_exits = self.stmt(body, vec![(cond, BranchLabel::True)])?;
                let scope = self.pop_scope(stmt.span)?;
                self.connect(body_exits, cond);

                let mut exits = scope.breaks;
                if condition.constant != Some(true) {
                    exits.push((cond, BranchLabel::False));
                }
                Ok(exits)
            }
            StmtKind::DoWhile { body, condition } => {
                self.scopes.push(ScopeKind::Loop {
                    label,
                    continue_target: None,
                });
                let (body_entry, body_exits) = self.stmt_with_entry(body, incoming)?;
                let scope = self.pop_scope(stmt.span)?;

                let mut into_cond = body_exits;
                into_cond.extend(scope.continues);
                let cond = self.emit(NodeKind::LoopCondition, &stmt.text, stmt.span, Some(condition), into_cond);

                // an empty body loops on the condition itself
                let back_target = body_entry.unwrap_or(cond);
                self.cfg.add_edge(cond, back_target, BranchLabel::True);

                let mut exits = scope.breaks;
                if condition.constant != Some(true) {
                    exits.push((cond, BranchLabel::False));
                }
                Ok(exits)
            }
            StmtKind::For {
                init,
                condition,
                update,
                body,
            } => {
                let after_init = self.stmts(init, incoming)?;
                let cond = self.emit(NodeKind::LoopCondition, &stmt.text, stmt.span, condition.as_ref(), after_init);

                self.scopes.push(ScopeKind::Loop {
                    label,
                    continue_target: None,
                });
                let body_exits = self.stmt(body, vec![(cond, BranchLabel::True)])?;
                let scope = self.pop_scope(stmt.span)?;

                let mut back = body_exits;
                back.extend(scope.continues);
                let after_update = self.stmts(update, back)?;
                self.connect(after_update, cond);

                let mut exits = scope.breaks;
                let unbounded = condition
                    .as_ref()
                    .map_or(true, |c| c.constant == Some(true));
                if !unbounded {
                    exits.push((cond, BranchLabel::False));
                }
                Ok(exits)
            }
            StmtKind::ForEach { header, body } => {
                let head = self.emit(NodeKind::ForEachHeader, &stmt.text, stmt.span, Some(header), incoming);
                self.scopes.push(ScopeKind::Loop {
                    label,
                    continue_target: Some(head),
                });
                let body_exits = self.stmt(body, vec![(head, BranchLabel::True)])?;
                let scope = self.pop_scope(stmt.span)?;
                self.connect(body_exits, head);

                let mut exits = scope.breaks;
                exits.push((head, BranchLabel::False));
                Ok(exits)
            }
            _ => Err(self.malformed("expected a loop statement", stmt.span)),
        }
    }

    fn switch(
        &mut self,
        stmt: &Stmt,
        selector: &Effect,
        cases: &[SwitchCase],
        incoming: Vec<Pending>,
    ) -> Result<Vec<Pending>> {
        let defaults = cases
            .iter()
            .flat_map(|c| c.labels.iter())
            .filter(|l| **l == CaseLabel::Default)
            .count();
        if defaults > 1 {
            return Err(self.malformed("switch with more than one default label", stmt.span));
        }

        let sel = self.emit(NodeKind::Switch, &stmt.text, stmt.span, Some(selector), incoming);
        self.scopes.push(ScopeKind::Switch);

        let mut exits = Vec::new();
        let mut fall_through: Vec<Pending> = Vec::new();
        for case in cases {
            let mut case_in: Vec<Pending> = case
                .labels
                .iter()
                .map(|label| match label {
                    CaseLabel::Value(value) => (sel, BranchLabel::Case(value.clone())),
                    CaseLabel::Default => (sel, BranchLabel::Default),
                })
                .collect();

            if case.arrow {
                exits.append(&mut fall_through);
                exits.extend(self.stmts(&case.body, case_in)?);
            } else {
                case_in.append(&mut fall_through);
                fall_through = self.stmts(&case.body, case_in)?;
            }
        }
        exits.append(&mut fall_through);

        let scope = self.pop_scope(stmt.span)?;
        exits.extend(scope.breaks);
        if defaults == 0 {
            exits.push((sel, BranchLabel::Default));
        }
        Ok(exits)
    }

    fn try_stmt(
        &mut self,
        resources: &[Stmt],
        body: &Stmt,
        catches: &[CatchClause],
        finally: Option<&Stmt>,
        incoming: Vec<Pending>,
    ) -> Result<Vec<Pending>> {
        if finally.is_some() {
            self.scopes.push(ScopeKind::Finally {
                entries: Vec::new(),
            });
        }
        if !catches.is_empty() {
            self.scopes.push(ScopeKind::Handlers {
                catch_types: catches.iter().map(|c| c.types.clone()).collect(),
                throws: Vec::new(),
            });
        }

        let after_resources = self.stmts(resources, incoming)?;
        let mut exits = self.stmt(body, after_resources)?;

        if !catches.is_empty() {
            let scope = self.pop_scope(body.span)?;
            let ScopeKind::Handlers { throws, .. } = scope.kind else {
                return Err(PdgError::invariant(
                    self.procedure.id.clone(),
                    "expected the handlers scope on top of the jump stack",
                ));
            };
            for (index, clause) in catches.iter().enumerate() {
                let clause_in: Vec<Pending> = throws
                    .iter()
                    .filter(|(_, targets)| targets.contains(&index))
                    .flat_map(|(pending, _)| pending.iter().cloned())
                    .collect();
                let catch = self.emit(NodeKind::Catch, &clause.text, clause.span, Some(&clause.parameter), clause_in);
                exits.extend(self.stmt(&clause.body, vec![(catch, BranchLabel::Unconditional)])?);
            }
        }

        let Some(finally) = finally else {
            return Ok(exits);
        };

        let scope = self.pop_scope(finally.span)?;
        let ScopeKind::Finally { entries } = scope.kind else {
            return Err(PdgError::invariant(
                self.procedure.id.clone(),
                "expected the finally scope on top of the jump stack",
            ));
        };

        if finally.is_empty() {
            for (pending, jump) in entries {
                self.route(pending, jump.reissued());
            }
            return Ok(exits);
        }

        // pending exits grouped by the jump they resume, in first-seen order
        let mut resumed: Vec<(Jump, Vec<Pending>)> = Vec::new();
        for (pending, jump) in entries {
            let jump = jump.reissued();
            match resumed.iter_mut().find(|(seen, _)| *seen == jump) {
                Some((_, group)) => group.extend(pending),
                None => resumed.push((jump, pending)),
            }
        }

        // never entered: still materialized once, without incoming edges
        let normal_exits = if exits.is_empty() && !resumed.is_empty() {
            Vec::new()
        } else {
            self.stmt(finally, exits)?
        };
        for (jump, pending) in resumed {
            let finally_exits = self.stmt(finally, pending)?;
            let pending = relabel_for(&finally_exits, &jump);
            self.route(pending, jump);
        }
        Ok(normal_exits)
    }
}

/// Single-line label: whitespace collapsed, long text cut
pub fn display_label(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_LABEL_CHARS {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(MAX_LABEL_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

/// Convenience wrapper: build the CFG of one procedure
pub fn build_cfg(procedure: &Procedure) -> Result<ControlFlowGraph> {
    CfgBuilder::new(procedure).build()
}
