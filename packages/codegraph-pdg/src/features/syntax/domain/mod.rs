mod tree;
mod variable;

pub use tree::{
    CaseLabel, CatchClause, Effect, ExprKind, Procedure, Stmt, StmtKind, SwitchCase,
};
pub use variable::{bare_name, Binding, DeclId, VarDef, Variable};
