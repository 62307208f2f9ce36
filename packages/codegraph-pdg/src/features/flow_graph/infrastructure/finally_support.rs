//! Jump routing for the CFG builder
//!
//! Abrupt exits (`break`, `continue`, `return`, `throw`, and implicit throws
//! of may-throw nodes) are dangling edges that walk the scope stack outward
//! until something claims them:
//!
//! - a loop/switch/labeled scope claims the `break`/`continue` aimed at it
//! - a handlers scope records throws against the catch clauses that may
//!   match, and stops them at a catch-all or at a clause naming the thrown type
//! - a finally scope swallows every exit crossing it; the builder then emits
//!   one copy of the finally body per distinct exit, and that copy's
//!   fall-through re-issues it
//! - at the procedure root, `return` and explicit throws go to EXIT;
//!   implicit throws are dropped

use tracing::trace;

use crate::features::flow_graph::domain::{BranchLabel, ControlFlowGraph, NodeId};

/// Dangling edge `(from, label)` waiting for its target
pub type Pending = (NodeId, BranchLabel);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Jump {
    /// `target` is the index of the claiming scope
    Break { target: usize },
    Continue { target: usize },
    Return,
    Throw {
        thrown: Option<String>,
        /// A may-throw node rather than a `throw` statement
        implicit: bool,
    },
}

impl Jump {
    /// Kind of exit a finally body continues with after being entered by `self`
    pub fn reissued(&self) -> Jump {
        match self {
            Jump::Throw { thrown, .. } => Jump::Throw {
                thrown: thrown.clone(),
                implicit: false,
            },
            other => other.clone(),
        }
    }
}

#[derive(Debug)]
pub enum ScopeKind {
    Loop {
        label: Option<String>,
        /// Known up front for while/for-each; `None` while the for-update or
        /// do-while condition is still to be built
        continue_target: Option<NodeId>,
    },
    Switch,
    Labeled {
        label: String,
    },
    Handlers {
        catch_types: Vec<Vec<String>>,
        /// Throw edges and the indices of the clauses they may enter
        throws: Vec<(Vec<Pending>, Vec<usize>)>,
    },
    Finally {
        entries: Vec<(Vec<Pending>, Jump)>,
    },
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub breaks: Vec<Pending>,
    pub continues: Vec<Pending>,
}

#[derive(Debug, Default)]
pub struct JumpScopes {
    stack: Vec<Scope>,
}

impl JumpScopes {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn push(&mut self, kind: ScopeKind) {
        self.stack.push(Scope {
            kind,
            breaks: Vec::new(),
            continues: Vec::new(),
        });
    }

    pub fn pop(&mut self) -> Option<Scope> {
        self.stack.pop()
    }

    /// Innermost loop or switch, or the loop/labeled statement named `label`
    pub fn find_break(&self, label: Option<&str>) -> Option<usize> {
        self.stack.iter().rposition(|scope| match (&scope.kind, label) {
            (ScopeKind::Loop { .. } | ScopeKind::Switch, None) => true,
            (ScopeKind::Loop { label: Some(l), .. }, Some(wanted)) => l == wanted,
            (ScopeKind::Labeled { label: l }, Some(wanted)) => l == wanted,
            _ => false,
        })
    }

    /// Innermost loop, or the loop named `label`. A label on a non-loop
    /// statement is not a valid `continue` target.
    pub fn find_continue(&self, label: Option<&str>) -> Option<usize> {
        match label {
            None => self
                .stack
                .iter()
                .rposition(|scope| matches!(scope.kind, ScopeKind::Loop { .. })),
            Some(wanted) => {
                let index = self.stack.iter().rposition(|scope| match &scope.kind {
                    ScopeKind::Loop { label: Some(l), .. } => l == wanted,
                    ScopeKind::Labeled { label } => label == wanted,
                    _ => false,
                })?;
                matches!(self.stack[index].kind, ScopeKind::Loop { .. }).then_some(index)
            }
        }
    }

    /// Walks scopes below `from` (innermost first) until one claims `jump`
    pub fn route(&mut self, cfg: &mut ControlFlowGraph, pending: Vec<Pending>, jump: Jump, from: usize) {
        if pending.is_empty() {
            return;
        }

        let mut index = from.min(self.stack.len());
        while index > 0 {
            index -= 1;
            let scope = &mut self.stack[index];
            match &mut scope.kind {
                ScopeKind::Finally { entries } => {
                    entries.push((pending, jump));
                    return;
                }
                ScopeKind::Handlers {
                    catch_types,
                    throws,
                } => {
                    if let Jump::Throw { thrown, .. } = &jump {
                        let (targets, handled) = catch_targets(catch_types, thrown.as_deref());
                        throws.push((pending.clone(), targets));
                        if handled {
                            return;
                        }
                    }
                }
                ScopeKind::Loop {
                    continue_target, ..
                } => match &jump {
                    Jump::Break { target } if *target == index => {
                        scope.breaks.extend(pending);
                        return;
                    }
                    Jump::Continue { target } if *target == index => {
                        match *continue_target {
                            Some(node) => connect(cfg, pending, node),
                            None => scope.continues.extend(pending),
                        }
                        return;
                    }
                    _ => {}
                },
                ScopeKind::Switch | ScopeKind::Labeled { .. } => {
                    if let Jump::Break { target } = &jump {
                        if *target == index {
                            scope.breaks.extend(pending);
                            return;
                        }
                    }
                }
            }
        }

        match jump {
            Jump::Return | Jump::Throw { implicit: false, .. } => {
                let exit = cfg.exit();
                connect(cfg, pending, exit);
            }
            Jump::Throw { implicit: true, .. } => {
                trace!(count = pending.len(), "implicit throw outside any handler dropped");
            }
            Jump::Break { .. } | Jump::Continue { .. } => {
                trace!("jump target left the scope stack before routing");
            }
        }
    }
}

pub fn connect(cfg: &mut ControlFlowGraph, pending: Vec<Pending>, target: NodeId) {
    for (from, label) in pending {
        cfg.add_edge(from, target, label);
    }
}

pub fn is_catch_all(types: &[String]) -> bool {
    types
        .iter()
        .any(|t| matches!(t.as_str(), "Throwable" | "Exception"))
}

/// Clauses a throw may enter, and whether the handlers stop it.
///
/// A known thrown type enters the first clause naming it (or the first
/// catch-all) and stops there. Anything else may enter every clause and
/// keeps propagating unless one of them is a catch-all.
pub fn catch_targets(catch_types: &[Vec<String>], thrown: Option<&str>) -> (Vec<usize>, bool) {
    if let Some(thrown) = thrown {
        let first = catch_types
            .iter()
            .position(|types| types.iter().any(|t| t == thrown) || is_catch_all(types));
        if let Some(index) = first {
            return (vec![index], true);
        }
    }
    let handled = catch_types.iter().any(|types| is_catch_all(types));
    ((0..catch_types.len()).collect(), handled)
}

/// Relabels plain fall-through edges as exceptional when a finally body
/// re-raises
pub fn relabel_for(pending: &[Pending], jump: &Jump) -> Vec<Pending> {
    pending
        .iter()
        .map(|(from, label)| match jump {
            Jump::Throw { .. } if label.is_unconditional() => (*from, BranchLabel::Exceptional),
            _ => (*from, label.clone()),
        })
        .collect()
}
