//! Syntax front end
//!
//! - domain/         : statement tree, effects, variable bindings
//! - ports/          : `SyntaxAdapter` trait
//! - infrastructure/ : tree-sitter Java adapter

pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use domain::{Binding, Effect, Procedure, Stmt, StmtKind, VarDef, Variable};
pub use infrastructure::JavaAdapter;
pub use ports::SyntaxAdapter;
