//! Statement-tree builders and proptest strategies

use codegraph_pdg::features::syntax::{Effect, Procedure, Stmt, StmtKind, Variable};
use codegraph_pdg::shared::models::Span;
use proptest::prelude::*;

const NAMES: [&str; 3] = ["a", "b", "c"];

pub fn var(index: u32) -> Variable {
    Variable::local(NAMES[index as usize % NAMES.len()], index)
}

/// `def = f(uses);` on one line
pub fn assign(line: u32, def: Variable, uses: &[Variable]) -> Stmt {
    let text = format!(
        "{} = f({});",
        def.name,
        uses.iter().map(|u| u.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    let mut effect = Effect::new(text, Span::line(line)).defines(def);
    for u in uses {
        effect.add_use(u.clone());
    }
    Stmt::expr(effect)
}

pub fn condition(read: Variable, constant: Option<bool>) -> Effect {
    let mut effect = Effect::new(format!("{} > 0", read.name), Span::line(0)).uses(read);
    effect.constant = constant;
    effect
}

pub fn if_stmt(condition: Effect, then_branch: Stmt, else_branch: Option<Stmt>) -> Stmt {
    let text = format!("if ({})", condition.text);
    Stmt::new(
        StmtKind::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        },
        text,
        Span::zero(),
    )
}

pub fn while_stmt(condition: Effect, body: Stmt) -> Stmt {
    let text = format!("while ({})", condition.text);
    Stmt::new(
        StmtKind::While {
            condition,
            body: Box::new(body),
        },
        text,
        Span::zero(),
    )
}

pub fn do_while(body: Stmt, condition: Effect) -> Stmt {
    let text = format!("while ({})", condition.text);
    Stmt::new(
        StmtKind::DoWhile {
            body: Box::new(body),
            condition,
        },
        text,
        Span::zero(),
    )
}

pub fn return_stmt() -> Stmt {
    Stmt::new(StmtKind::Return(None), "return;", Span::zero())
}

/// Procedure `Gen.m()` with `a`, `b`, `c` as parameters
pub fn procedure(body: Vec<Stmt>) -> Procedure {
    Procedure::new("Gen.m()", "m", Stmt::block(body))
        .with_signature("m(int, int, int)")
        .with_parameters((0..3).map(|i| Variable::parameter(NAMES[i as usize], i + 10)).collect())
}

// ═══════════════════════════════════════════════════════════════════
// Strategies
// ═══════════════════════════════════════════════════════════════════

fn arb_var() -> impl Strategy<Value = Variable> {
    (0u32..3).prop_map(var)
}

fn arb_assign() -> impl Strategy<Value = Stmt> {
    (1u32..50, arb_var(), prop::collection::vec(arb_var(), 0..3))
        .prop_map(|(line, def, uses)| assign(line, def, &uses))
}

fn arb_condition() -> impl Strategy<Value = Effect> {
    (arb_var(), prop::option::weighted(0.2, any::<bool>()))
        .prop_map(|(read, constant)| condition(read, constant))
}

/// Structured statements: assignments, returns, blocks, if, while, do-while
pub fn arb_stmt() -> impl Strategy<Value = Stmt> {
    let leaf = prop_oneof![
        6 => arb_assign(),
        1 => Just(return_stmt()),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Stmt::block),
            (arb_condition(), inner.clone(), prop::option::of(inner.clone()))
                .prop_map(|(c, t, e)| if_stmt(c, t, e)),
            (arb_condition(), inner.clone()).prop_map(|(c, b)| while_stmt(c, b)),
            (inner, arb_condition()).prop_map(|(b, c)| do_while(b, c)),
        ]
    })
}

pub fn arb_procedure() -> impl Strategy<Value = Procedure> {
    prop::collection::vec(arb_stmt(), 0..6).prop_map(procedure)
}
