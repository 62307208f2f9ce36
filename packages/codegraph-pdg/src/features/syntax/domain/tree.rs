//! Language-neutral statement tree consumed by the CFG builder
//!
//! A syntax adapter lowers one procedure into a [`Procedure`] whose body is a
//! closed [`StmtKind`] tree. Expressions are not modelled structurally: each
//! evaluated expression is summarized as an [`Effect`] (what it reads, what it
//! writes, whether it may throw).

use serde::{Deserialize, Serialize};

use super::variable::{VarDef, Variable};
use crate::shared::models::Span;

/// Read/write summary of one evaluated expression
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub text: String,
    pub span: Span,
    pub defs: Vec<VarDef>,
    pub uses: Vec<Variable>,
    pub may_throw: bool,
    /// Simple name of the exception type for `throw new T(..)`
    pub thrown_type: Option<String>,
    /// Statically known truth value (`while (true)`)
    pub constant: Option<bool>,
}

impl Effect {
    pub fn new(text: impl Into<String>, span: Span) -> Self {
        Self {
            text: text.into(),
            span,
            ..Default::default()
        }
    }

    pub fn defines(mut self, var: Variable) -> Self {
        self.add_def(VarDef::strong(var));
        self
    }

    pub fn defines_weak(mut self, var: Variable) -> Self {
        self.add_def(VarDef::weak(var));
        self
    }

    pub fn uses(mut self, var: Variable) -> Self {
        self.add_use(var);
        self
    }

    pub fn throwing(mut self) -> Self {
        self.may_throw = true;
        self
    }

    pub fn with_thrown_type(mut self, ty: impl Into<String>) -> Self {
        self.thrown_type = Some(ty.into());
        self
    }

    pub fn with_constant(mut self, value: bool) -> Self {
        self.constant = Some(value);
        self
    }

    pub fn add_def(&mut self, def: VarDef) {
        if !self.defs.contains(&def) {
            self.defs.push(def);
        }
    }

    pub fn add_use(&mut self, var: Variable) {
        if !self.uses.contains(&var) {
            self.uses.push(var);
        }
    }

    /// Fold another effect's reads and writes into this one
    pub fn absorb(&mut self, other: Effect) {
        for def in other.defs {
            self.add_def(def);
        }
        for var in other.uses {
            self.add_use(var);
        }
        self.may_throw |= other.may_throw;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExprKind {
    Assignment,
    Call,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseLabel {
    Value(String),
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub labels: Vec<CaseLabel>,
    pub body: Vec<Stmt>,
    /// `case X ->` rules never fall through
    pub arrow: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchClause {
    /// Header text, e.g. `catch (IOException e)`
    pub text: String,
    /// Simple type names; several for multi-catch
    pub types: Vec<String>,
    /// Defines the exception parameter
    pub parameter: Effect,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StmtKind {
    Empty,
    Block(Vec<Stmt>),
    Expression {
        effect: Effect,
        kind: ExprKind,
    },
    Declaration(Effect),
    If {
        condition: Effect,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Effect,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        condition: Effect,
    },
    For {
        init: Vec<Stmt>,
        condition: Option<Effect>,
        update: Vec<Stmt>,
        body: Box<Stmt>,
    },
    /// Header defines the loop variable and reads the iterable
    ForEach {
        header: Effect,
        body: Box<Stmt>,
    },
    Switch {
        selector: Effect,
        cases: Vec<SwitchCase>,
    },
    Try {
        resources: Vec<Stmt>,
        body: Box<Stmt>,
        catches: Vec<CatchClause>,
        finally: Option<Box<Stmt>>,
    },
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Return(Option<Effect>),
    Throw(Effect),
    Assert(Effect),
    Synchronized {
        lock: Effect,
        body: Box<Stmt>,
    },
}

/// One statement; `text` is what the node label shows (header text for
/// compound statements)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub text: String,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }

    pub fn block(stmts: Vec<Stmt>) -> Self {
        let span = stmts
            .iter()
            .fold(Span::zero(), |acc, stmt| acc.merge(&stmt.span));
        Self::new(StmtKind::Block(stmts), "{ ... }", span)
    }

    pub fn empty() -> Self {
        Self::new(StmtKind::Empty, ";", Span::zero())
    }

    /// Expression statement; the kind is inferred from the effect
    pub fn expr(effect: Effect) -> Self {
        let kind = if !effect.defs.is_empty() {
            ExprKind::Assignment
        } else if effect.may_throw {
            ExprKind::Call
        } else {
            ExprKind::Other
        };
        let text = effect.text.clone();
        let span = effect.span;
        Self::new(StmtKind::Expression { effect, kind }, text, span)
    }

    pub fn declaration(effect: Effect) -> Self {
        let text = effect.text.clone();
        let span = effect.span;
        Self::new(StmtKind::Declaration(effect), text, span)
    }

    pub fn is_empty(&self) -> bool {
        match &self.kind {
            StmtKind::Empty => true,
            StmtKind::Block(stmts) => stmts.iter().all(Stmt::is_empty),
            _ => false,
        }
    }
}

/// One analyzable unit: method, constructor, or block-bodied lambda
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    /// Unique within a batch, e.g. `Account.deposit(int)`
    pub id: String,
    pub name: String,
    /// `name(T1, T2)`, shown on ENTRY/EXIT
    pub signature: String,
    pub span: Span,
    pub parameters: Vec<Variable>,
    /// Fields or enclosing locals read by the body; defined at ENTRY
    pub captured: Vec<Variable>,
    pub body: Stmt,
}

impl Procedure {
    pub fn new(id: impl Into<String>, name: impl Into<String>, body: Stmt) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            signature: format!("{}()", name),
            name,
            span: body.span,
            parameters: Vec::new(),
            captured: Vec::new(),
            body,
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<Variable>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_captured(mut self, captured: Vec<Variable>) -> Self {
        self.captured = captured;
        self
    }
}
