//! Java syntax adapter
//!
//! Lowers Java source (tree-sitter-java) into procedures:
//! - methods and constructors with a body, including those of nested types
//! - block-bodied lambdas, as separate procedures `<method id>$lambda$<n>`
//!   whose captured locals are defined at their ENTRY
//! - methods of anonymous class bodies, as `<method id>$anon$<n>.<signature>`,
//!   captured the same way
//!
//! Name resolution is lexical: locals and parameters by block scope, then
//! enclosing procedures (captured), then fields of the enclosing classes.
//! Unknown capitalized names are taken as type qualifiers and ignored; any
//! other unknown name becomes an unresolved variable.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;
use tree_sitter::{Node as TSNode, Parser, Tree};

use crate::features::syntax::domain::{
    Binding, CaseLabel, CatchClause, DeclId, Effect, Procedure, Stmt, StmtKind, SwitchCase,
    VarDef, Variable,
};
use crate::features::syntax::ports::SyntaxAdapter;
use crate::shared::models::{PdgError, Result, Span};

/// Java syntax adapter
#[derive(Debug, Default, Clone, Copy)]
pub struct JavaAdapter;

impl JavaAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl SyntaxAdapter for JavaAdapter {
    fn language(&self) -> &'static str {
        "java"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn lower_source(&self, source: &str, path: &str) -> Result<Vec<Procedure>> {
        let tree = parse(source, path)?;
        let root = tree.root_node();
        if root.has_error() {
            let line = first_error(root).map_or(0, |n| n.start_position().row + 1);
            return Err(PdgError::parse(path, format!("syntax error near line {}", line)));
        }

        let mut lowering = Lowering::new(source);
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if is_type_declaration(child.kind()) {
                lowering.type_declaration(child, "");
            }
        }

        debug!(path, procedures = lowering.procedures.len(), "Java source lowered");
        Ok(lowering.procedures)
    }
}

fn parse(source: &str, path: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::language())
        .map_err(|e| PdgError::parse(path, e.to_string()))?;
    parser
        .parse(source, None)
        .ok_or_else(|| PdgError::parse(path, "parser produced no tree"))
}

fn first_error(node: TSNode) -> Option<TSNode> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<TSNode> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error)
}

fn span_of(node: TSNode) -> Span {
    Span::new(
        node.start_position().row as u32 + 1,
        node.start_position().column as u32,
        node.end_position().row as u32 + 1,
        node.end_position().column as u32,
    )
}

fn is_type_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration"
    )
}

fn is_type_node(kind: &str) -> bool {
    matches!(
        kind,
        "type_identifier"
            | "scoped_type_identifier"
            | "generic_type"
            | "array_type"
            | "integral_type"
            | "floating_point_type"
            | "boolean_type"
            | "void_type"
            | "type_arguments"
            | "dimensions"
            | "annotation"
            | "marker_annotation"
            | "modifiers"
            | "class_body"
            | "switch_label"
    )
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// `java.io.IOException` / `List<String>` -> `IOException` / `List`
fn simple_type_name(text: &str) -> String {
    let base = text.split('<').next().unwrap_or(text).trim();
    base.rsplit('.').next().unwrap_or(base).to_string()
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn named_children(node: TSNode) -> Vec<TSNode> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn field_children<'t>(node: TSNode<'t>, field: &str) -> Vec<TSNode<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

#[derive(Debug)]
struct ClassContext {
    name: String,
    fields: HashSet<String>,
}

/// Name resolution state of one procedure being lowered
#[derive(Debug)]
struct Frame {
    scopes: Vec<HashMap<String, Binding>>,
    /// (binding inside this procedure, variable as the enclosing one sees it)
    captured: Vec<(Variable, Variable)>,
    fields: BTreeSet<String>,
}

impl Frame {
    fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            captured: Vec::new(),
            fields: BTreeSet::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    /// Variables defined at ENTRY besides the parameters
    fn entry_variables(&self) -> Vec<Variable> {
        self.captured
            .iter()
            .map(|(inner, _)| inner.clone())
            .chain(self.fields.iter().map(Variable::field))
            .collect()
    }
}

struct Lowering<'s> {
    source: &'s str,
    classes: Vec<ClassContext>,
    frames: Vec<Frame>,
    next_decl: DeclId,
    method_id: String,
    lambda_count: usize,
    anonymous_count: usize,
    /// Lambdas and anonymous-class methods, emitted after their enclosing method
    pending_lambdas: Vec<Procedure>,
    procedures: Vec<Procedure>,
}

impl<'s> Lowering<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            classes: Vec::new(),
            frames: Vec::new(),
            next_decl: 0,
            method_id: String::new(),
            lambda_count: 0,
            anonymous_count: 0,
            pending_lambdas: Vec::new(),
            procedures: Vec::new(),
        }
    }

    fn text(&self, node: TSNode) -> &'s str {
        self.source.get(node.byte_range()).unwrap_or("")
    }

    /// Source text of a compound statement up to its body, e.g. `while (x > 0)`
    fn header(&self, node: TSNode, body: Option<TSNode>) -> String {
        let end = body.map_or(node.end_byte(), |b| b.start_byte());
        collapse(self.source.get(node.start_byte()..end).unwrap_or(""))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Declarations
    // ═══════════════════════════════════════════════════════════════════

    fn type_declaration(&mut self, node: TSNode, outer: &str) {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or_default();
        if name.is_empty() {
            return;
        }
        let qualified = if outer.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", outer, name)
        };
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };

        let members = members_of(body);
        let mut fields = HashSet::new();
        if let Some(components) = node.child_by_field_name("parameters") {
            for component in named_children(components) {
                if let Some(n) = component.child_by_field_name("name") {
                    fields.insert(self.text(n).to_string());
                }
            }
        }
        for member in &members {
            match member.kind() {
                "field_declaration" | "constant_declaration" => {
                    for declarator in field_children(*member, "declarator") {
                        if let Some(n) = declarator.child_by_field_name("name") {
                            fields.insert(self.text(n).to_string());
                        }
                    }
                }
                "enum_constant" => {
                    if let Some(n) = member.child_by_field_name("name") {
                        fields.insert(self.text(n).to_string());
                    }
                }
                _ => {}
            }
        }

        self.classes.push(ClassContext {
            name: qualified.clone(),
            fields,
        });
        for member in members {
            match member.kind() {
                "method_declaration" | "constructor_declaration" => self.method(member),
                kind if is_type_declaration(kind) => self.type_declaration(member, &qualified),
                _ => {}
            }
        }
        self.classes.pop();
    }

    fn method(&mut self, node: TSNode) {
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let class = self
            .classes
            .last()
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let name = if node.kind() == "constructor_declaration" {
            class.rsplit('.').next().unwrap_or(&class).to_string()
        } else {
            node.child_by_field_name("name")
                .map(|n| self.text(n).to_string())
                .unwrap_or_default()
        };

        self.next_decl = 0;
        self.lambda_count = 0;
        self.anonymous_count = 0;
        self.frames.push(Frame::new());

        let (parameters, types) = match node.child_by_field_name("parameters") {
            Some(params) => self.formal_parameters(params),
            None => (Vec::new(), Vec::new()),
        };
        let signature = format!("{}({})", name, types.join(", "));
        self.method_id = format!("{}.{}", class, signature);

        let body = self.stmt(body);
        let frame = self.frames.pop().unwrap_or_else(Frame::new);

        let mut procedure = Procedure::new(self.method_id.clone(), name, body)
            .with_signature(signature)
            .with_parameters(parameters)
            .with_captured(frame.entry_variables());
        procedure.span = span_of(node);

        self.procedures.push(procedure);
        self.procedures.append(&mut self.pending_lambdas);
    }

    fn formal_parameters(&mut self, node: TSNode) -> (Vec<Variable>, Vec<String>) {
        let mut variables = Vec::new();
        let mut types = Vec::new();
        for param in named_children(node) {
            let (name, ty) = match param.kind() {
                "formal_parameter" => (
                    param.child_by_field_name("name"),
                    param.child_by_field_name("type").map(|t| collapse(self.text(t))),
                ),
                "spread_parameter" => {
                    let children = named_children(param);
                    let ty = children
                        .iter()
                        .find(|c| is_type_node(c.kind()) && c.kind() != "modifiers")
                        .map(|t| format!("{}...", collapse(self.text(*t))));
                    let name = children
                        .iter()
                        .find(|c| c.kind() == "variable_declarator")
                        .and_then(|d| d.child_by_field_name("name"));
                    (name, ty)
                }
                // inferred lambda parameters
                "identifier" => (Some(param), None),
                _ => (None, None),
            };
            if let Some(name) = name {
                variables.push(self.declare(self.text(name), Binding::Parameter));
                if let Some(ty) = ty {
                    types.push(ty);
                }
            }
        }
        (variables, types)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Scopes and resolution
    // ═══════════════════════════════════════════════════════════════════

    fn push_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.push(HashMap::new());
        }
    }

    fn pop_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.pop();
        }
    }

    fn declare(&mut self, name: &str, binding: fn(DeclId) -> Binding) -> Variable {
        let decl = self.next_decl;
        self.next_decl += 1;
        let binding = binding(decl);
        if let Some(scope) = self.frames.last_mut().and_then(|f| f.scopes.last_mut()) {
            scope.insert(name.to_string(), binding);
        }
        Variable::new(name, binding)
    }

    fn declare_local(&mut self, name: &str) -> Variable {
        self.declare(name, Binding::Local)
    }

    fn resolve(&mut self, name: &str) -> Option<Variable> {
        let depth = self.frames.len();
        let found = self
            .frames
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, frame)| frame.lookup(name).map(|b| (index, b)));

        if let Some((index, binding)) = found {
            if index + 1 == depth {
                return Some(Variable::new(name, binding));
            }
            let decl = match binding {
                Binding::Local(d) | Binding::Parameter(d) | Binding::Captured(d) => d,
                other => return Some(Variable::new(name, other)),
            };
            let captured = Variable::captured(name, decl);
            let mut outer = Variable::new(name, binding);
            for frame in &mut self.frames[index + 1..] {
                if !frame.captured.iter().any(|(inner, _)| inner == &captured) {
                    frame.captured.push((captured.clone(), outer.clone()));
                }
                outer = captured.clone();
            }
            return Some(captured);
        }

        if self.classes.iter().rev().any(|c| c.fields.contains(name)) {
            return Some(self.field(name));
        }
        if starts_uppercase(name) {
            None
        } else {
            Some(Variable::unresolved(name))
        }
    }

    fn field(&mut self, name: &str) -> Variable {
        if let Some(frame) = self.frames.last_mut() {
            frame.fields.insert(name.to_string());
        }
        Variable::field(name)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════

    fn statements(&mut self, node: TSNode) -> Vec<Stmt> {
        named_children(node)
            .into_iter()
            .filter(|c| !matches!(c.kind(), "line_comment" | "block_comment"))
            .map(|c| self.stmt(c))
            .collect()
    }

    fn stmt(&mut self, node: TSNode) -> Stmt {
        let span = span_of(node);
        let text = self.text(node);
        match node.kind() {
            "block" | "constructor_body" => {
                self.push_scope();
                let stmts = self.statements(node);
                self.pop_scope();
                let mut block = Stmt::block(stmts);
                block.span = span;
                block
            }
            ";" => Stmt::empty(),
            "expression_statement" => match node.named_child(0) {
                Some(inner) if inner.kind() == "switch_expression" => self.switch(inner),
                Some(inner) => {
                    let mut effect = Effect::new(text, span);
                    self.expr(inner, &mut effect);
                    Stmt::expr(effect)
                }
                None => Stmt::empty(),
            },
            "local_variable_declaration" => Stmt::declaration(self.declaration(node)),
            "if_statement" => self.if_stmt(node),
            "while_statement" => {
                let body = node.child_by_field_name("body");
                let condition = self.condition(node.child_by_field_name("condition"), span);
                let body_stmt = self.body(body);
                Stmt::new(
                    StmtKind::While {
                        condition,
                        body: Box::new(body_stmt),
                    },
                    self.header(node, body),
                    span,
                )
            }
            "do_statement" => {
                let body_stmt = self.body(node.child_by_field_name("body"));
                let cond_node = node.child_by_field_name("condition");
                let condition = self.condition(cond_node, span);
                let text = format!("while {}", cond_node.map_or("", |c| self.text(c)));
                let span = cond_node.map_or(span, span_of);
                Stmt::new(
                    StmtKind::DoWhile {
                        body: Box::new(body_stmt),
                        condition,
                    },
                    collapse(&text),
                    span,
                )
            }
            "for_statement" => self.for_stmt(node),
            "enhanced_for_statement" => self.for_each(node),
            "labeled_statement" => {
                let children = named_children(node);
                let label = children
                    .first()
                    .map(|l| self.text(*l).to_string())
                    .unwrap_or_default();
                let body = children
                    .get(1)
                    .map(|b| self.stmt(*b))
                    .unwrap_or_else(Stmt::empty);
                Stmt::new(
                    StmtKind::Labeled {
                        label: label.clone(),
                        body: Box::new(body),
                    },
                    format!("{}:", label),
                    span,
                )
            }
            "break_statement" => {
                let label = node.named_child(0).map(|l| self.text(l).to_string());
                Stmt::new(StmtKind::Break(label), text, span)
            }
            "continue_statement" => {
                let label = node.named_child(0).map(|l| self.text(l).to_string());
                Stmt::new(StmtKind::Continue(label), text, span)
            }
            "return_statement" => {
                let value = node.named_child(0).map(|value| {
                    let mut effect = Effect::new(text, span);
                    self.expr(value, &mut effect);
                    effect
                });
                Stmt::new(StmtKind::Return(value), text, span)
            }
            "throw_statement" => {
                let mut effect = Effect::new(text, span).throwing();
                if let Some(value) = node.named_child(0) {
                    self.expr(value, &mut effect);
                    if value.kind() == "object_creation_expression" {
                        if let Some(ty) = value.child_by_field_name("type") {
                            effect.thrown_type = Some(simple_type_name(self.text(ty)));
                        }
                    }
                }
                Stmt::new(StmtKind::Throw(effect), text, span)
            }
            "assert_statement" => {
                let mut effect = Effect::new(text, span);
                for child in named_children(node) {
                    self.expr(child, &mut effect);
                }
                Stmt::new(StmtKind::Assert(effect), text, span)
            }
            "synchronized_statement" => {
                let body = node.child_by_field_name("body");
                let mut lock = Effect::new(text, span);
                for child in named_children(node) {
                    if Some(child) != body {
                        self.expr(child, &mut lock);
                    }
                }
                let body_stmt = self.body(body);
                Stmt::new(
                    StmtKind::Synchronized {
                        lock,
                        body: Box::new(body_stmt),
                    },
                    self.header(node, body),
                    span,
                )
            }
            "switch_expression" | "switch_statement" => self.switch(node),
            "try_statement" | "try_with_resources_statement" => self.try_stmt(node),
            kind if is_type_declaration(kind) || kind == "local_class_declaration" => Stmt::empty(),
            _ => {
                // yield, explicit constructor invocation, and anything newer
                let mut effect = Effect::new(text, span);
                self.expr(node, &mut effect);
                Stmt::expr(effect)
            }
        }
    }

    fn body(&mut self, node: Option<TSNode>) -> Stmt {
        match node {
            Some(node) => self.stmt(node),
            None => Stmt::empty(),
        }
    }

    /// Effect of a condition, with its truth value when it is a literal
    fn condition(&mut self, node: Option<TSNode>, fallback: Span) -> Effect {
        let Some(node) = node else {
            return Effect::new("", fallback);
        };
        let mut effect = Effect::new(self.text(node), span_of(node));
        self.expr(node, &mut effect);

        let mut inner = node;
        while inner.kind() == "parenthesized_expression" {
            match inner.named_child(0) {
                Some(child) => inner = child,
                None => break,
            }
        }
        match inner.kind() {
            "true" => effect.constant = Some(true),
            "false" => effect.constant = Some(false),
            _ => {}
        }
        effect
    }

    fn declaration(&mut self, node: TSNode) -> Effect {
        let mut effect = Effect::new(self.text(node), span_of(node));
        for declarator in field_children(node, "declarator") {
            let Some(name) = declarator.child_by_field_name("name") else {
                continue;
            };
            if let Some(value) = declarator.child_by_field_name("value") {
                self.expr(value, &mut effect);
                let var = self.declare_local(self.text(name));
                effect.add_def(VarDef::strong(var));
            } else {
                self.declare_local(self.text(name));
            }
        }
        effect
    }

    fn if_stmt(&mut self, node: TSNode) -> Stmt {
        let span = span_of(node);
        let consequence = node.child_by_field_name("consequence");
        let condition = self.condition(node.child_by_field_name("condition"), span);
        let then_branch = self.body(consequence);
        let else_branch = node
            .child_by_field_name("alternative")
            .map(|alt| Box::new(self.stmt(alt)));
        Stmt::new(
            StmtKind::If {
                condition,
                then_branch: Box::new(then_branch),
                else_branch,
            },
            self.header(node, consequence),
            span,
        )
    }

    fn for_stmt(&mut self, node: TSNode) -> Stmt {
        let span = span_of(node);
        let body = node.child_by_field_name("body");
        self.push_scope();

        let mut init = Vec::new();
        for child in field_children(node, "init") {
            if child.kind() == "local_variable_declaration" {
                init.push(Stmt::declaration(self.declaration(child)));
            } else {
                init.push(self.expression_stmt(child));
            }
        }
        let condition = node
            .child_by_field_name("condition")
            .map(|c| self.condition(Some(c), span));
        let update = field_children(node, "update")
            .into_iter()
            .map(|u| self.expression_stmt(u))
            .collect();
        let body_stmt = self.body(body);

        self.pop_scope();
        Stmt::new(
            StmtKind::For {
                init,
                condition,
                update,
                body: Box::new(body_stmt),
            },
            self.header(node, body),
            span,
        )
    }

    fn expression_stmt(&mut self, node: TSNode) -> Stmt {
        let mut effect = Effect::new(self.text(node), span_of(node));
        self.expr(node, &mut effect);
        Stmt::expr(effect)
    }

    fn for_each(&mut self, node: TSNode) -> Stmt {
        let span = span_of(node);
        let body = node.child_by_field_name("body");
        let mut header = Effect::new(self.header(node, body), span);
        if let Some(value) = node.child_by_field_name("value") {
            self.expr(value, &mut header);
        }

        self.push_scope();
        let name = node
            .child_by_field_name("name")
            .or_else(|| {
                named_children(node)
                    .into_iter()
                    .find(|c| c.kind() == "variable_declarator")
                    .and_then(|d| d.child_by_field_name("name"))
            });
        if let Some(name) = name {
            let var = self.declare_local(self.text(name));
            header.add_def(VarDef::strong(var));
        }
        let body_stmt = self.body(body);
        self.pop_scope();

        let text = header.text.clone();
        Stmt::new(
            StmtKind::ForEach {
                header,
                body: Box::new(body_stmt),
            },
            text,
            span,
        )
    }

    fn switch(&mut self, node: TSNode) -> Stmt {
        let span = span_of(node);
        let block = node.child_by_field_name("body");
        let mut selector = Effect::new(self.text(node), span);
        if let Some(condition) = node.child_by_field_name("condition") {
            selector.text = self.text(condition).to_string();
            self.expr(condition, &mut selector);
        }

        let mut cases = Vec::new();
        self.push_scope();
        for group in block.map(named_children).unwrap_or_default() {
            let arrow = match group.kind() {
                "switch_block_statement_group" => false,
                "switch_rule" => true,
                _ => continue,
            };
            let mut labels = Vec::new();
            let mut body = Vec::new();
            for child in named_children(group) {
                if child.kind() == "switch_label" {
                    labels.extend(self.case_labels(child));
                } else if !matches!(child.kind(), "line_comment" | "block_comment") {
                    body.push(self.stmt(child));
                }
            }
            cases.push(SwitchCase {
                labels,
                body,
                arrow,
                span: span_of(group),
            });
        }
        self.pop_scope();

        Stmt::new(
            StmtKind::Switch { selector, cases },
            self.header(node, block),
            span,
        )
    }

    fn case_labels(&self, label: TSNode) -> Vec<CaseLabel> {
        let text = self.text(label);
        if text.trim_start().starts_with("default") {
            return vec![CaseLabel::Default];
        }
        let mut labels: Vec<CaseLabel> = named_children(label)
            .into_iter()
            .map(|value| CaseLabel::Value(collapse(self.text(value))))
            .collect();
        // `case null, default`
        if text.split(',').any(|part| part.trim() == "default") {
            labels.push(CaseLabel::Default);
        }
        labels
    }

    fn try_stmt(&mut self, node: TSNode) -> Stmt {
        let span = span_of(node);
        let body = node.child_by_field_name("body");
        self.push_scope();

        let mut resources = Vec::new();
        if let Some(list) = node.child_by_field_name("resources") {
            for resource in named_children(list) {
                if resource.kind() != "resource" {
                    continue;
                }
                let mut effect = Effect::new(self.text(resource), span_of(resource)).throwing();
                match (
                    resource.child_by_field_name("name"),
                    resource.child_by_field_name("value"),
                ) {
                    (Some(name), Some(value)) => {
                        self.expr(value, &mut effect);
                        let var = self.declare_local(self.text(name));
                        effect.add_def(VarDef::strong(var));
                        resources.push(Stmt::declaration(effect));
                    }
                    _ => {
                        for child in named_children(resource) {
                            self.expr(child, &mut effect);
                        }
                        resources.push(Stmt::expr(effect));
                    }
                }
            }
        }
        let body_stmt = self.body(body);
        self.pop_scope();

        let mut catches = Vec::new();
        let mut finally = None;
        for child in named_children(node) {
            match child.kind() {
                "catch_clause" => catches.push(self.catch_clause(child)),
                "finally_clause" => {
                    let block = named_children(child)
                        .into_iter()
                        .find(|c| c.kind() == "block");
                    finally = Some(Box::new(self.body(block)));
                }
                _ => {}
            }
        }

        Stmt::new(
            StmtKind::Try {
                resources,
                body: Box::new(body_stmt),
                catches,
                finally,
            },
            self.header(node, body),
            span,
        )
    }

    fn catch_clause(&mut self, node: TSNode) -> CatchClause {
        let span = span_of(node);
        let body = node.child_by_field_name("body");
        let param = named_children(node)
            .into_iter()
            .find(|c| c.kind() == "catch_formal_parameter");

        self.push_scope();
        let mut types = Vec::new();
        let mut parameter = Effect::new("", span);
        if let Some(param) = param {
            parameter = Effect::new(self.text(param), span_of(param));
            for child in named_children(param) {
                if child.kind() == "catch_type" {
                    types.extend(
                        named_children(child)
                            .into_iter()
                            .map(|t| simple_type_name(self.text(t))),
                    );
                }
            }
            if let Some(name) = param.child_by_field_name("name") {
                let var = self.declare_local(self.text(name));
                parameter.add_def(VarDef::strong(var));
            }
        }
        let body_stmt = self.body(body);
        self.pop_scope();

        CatchClause {
            text: self.header(node, body),
            types,
            parameter,
            body: Box::new(body_stmt),
            span,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════

    fn expr(&mut self, node: TSNode, effect: &mut Effect) {
        match node.kind() {
            "identifier" => {
                let name = self.text(node);
                if let Some(var) = self.resolve(name) {
                    effect.add_use(var);
                }
            }
            "this" | "super" | "class_literal" => {}
            "field_access" => {
                let object = node.child_by_field_name("object");
                let field = node.child_by_field_name("field");
                match (object, field) {
                    (Some(object), Some(field)) if object.kind() == "this" => {
                        let var = self.field(self.text(field));
                        effect.add_use(var);
                    }
                    (Some(object), _) => self.qualifier(object, effect),
                    _ => {}
                }
            }
            "assignment_expression" => {
                let compound = node
                    .child_by_field_name("operator")
                    .is_some_and(|op| self.text(op) != "=");
                if let Some(right) = node.child_by_field_name("right") {
                    self.expr(right, effect);
                }
                if let Some(left) = node.child_by_field_name("left") {
                    self.assign_target(left, compound, effect);
                }
            }
            "update_expression" => {
                if let Some(operand) = node.named_child(0) {
                    self.assign_target(operand, true, effect);
                }
            }
            "method_invocation" => {
                effect.may_throw = true;
                if let Some(object) = node.child_by_field_name("object") {
                    self.qualifier(object, effect);
                }
                if let Some(arguments) = node.child_by_field_name("arguments") {
                    self.expr(arguments, effect);
                }
            }
            "object_creation_expression" => {
                effect.may_throw = true;
                if let Some(arguments) = node.child_by_field_name("arguments") {
                    self.expr(arguments, effect);
                }
                if let Some(body) = named_children(node).into_iter().find(|c| c.kind() == "class_body") {
                    self.anonymous_class(body, effect);
                }
            }
            "explicit_constructor_invocation" => {
                effect.may_throw = true;
                if let Some(arguments) = node.child_by_field_name("arguments") {
                    self.expr(arguments, effect);
                }
            }
            "method_reference" => {
                if let Some(object) = node.named_child(0) {
                    self.qualifier(object, effect);
                }
            }
            "cast_expression" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.expr(value, effect);
                }
            }
            "instanceof_expression" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.expr(left, effect);
                }
                if let Some(name) = node.child_by_field_name("name") {
                    let var = self.declare_local(self.text(name));
                    effect.add_def(VarDef::strong(var));
                }
            }
            "lambda_expression" => self.lambda(node, effect),
            kind if is_type_node(kind) => {}
            _ => {
                for child in named_children(node) {
                    self.expr(child, effect);
                }
            }
        }
    }

    /// Receiver of a call or field access; capitalized unknown names are types
    fn qualifier(&mut self, node: TSNode, effect: &mut Effect) {
        if node.kind() == "identifier" {
            let name = self.text(node);
            if let Some(var) = self.resolve(name) {
                effect.add_use(var);
            }
        } else {
            self.expr(node, effect);
        }
    }

    fn assign_target(&mut self, target: TSNode, also_use: bool, effect: &mut Effect) {
        match target.kind() {
            "identifier" => {
                if let Some(var) = self.resolve(self.text(target)) {
                    if also_use {
                        effect.add_use(var.clone());
                    }
                    effect.add_def(VarDef::strong(var));
                }
            }
            "field_access" => {
                let object = target.child_by_field_name("object");
                let field = target.child_by_field_name("field");
                match (object, field) {
                    (Some(object), Some(field)) if object.kind() == "this" => {
                        let var = self.field(self.text(field));
                        if also_use {
                            effect.add_use(var.clone());
                        }
                        effect.add_def(VarDef::strong(var));
                    }
                    (Some(object), _) => self.weak_target(object, effect),
                    _ => {}
                }
            }
            "array_access" => {
                if let Some(index) = target.child_by_field_name("index") {
                    self.expr(index, effect);
                }
                if let Some(array) = target.child_by_field_name("array") {
                    self.weak_target(array, effect);
                }
            }
            "parenthesized_expression" => {
                if let Some(inner) = target.named_child(0) {
                    self.assign_target(inner, also_use, effect);
                }
            }
            _ => self.expr(target, effect),
        }
    }

    /// `base.f = v` / `base[i] = v`: reads base, weakly redefines it
    fn weak_target(&mut self, base: TSNode, effect: &mut Effect) {
        match base.kind() {
            "identifier" => {
                if let Some(var) = self.resolve(self.text(base)) {
                    effect.add_use(var.clone());
                    effect.add_def(VarDef::weak(var));
                }
            }
            "field_access" => {
                let object = base.child_by_field_name("object");
                let field = base.child_by_field_name("field");
                if let (Some(object), Some(field)) = (object, field) {
                    if object.kind() == "this" {
                        let var = self.field(self.text(field));
                        effect.add_use(var.clone());
                        effect.add_def(VarDef::weak(var));
                        return;
                    }
                }
                self.expr(base, effect);
            }
            _ => self.expr(base, effect),
        }
    }

    fn lambda(&mut self, node: TSNode, effect: &mut Effect) {
        self.frames.push(Frame::new());
        let (parameters, types) = match node.child_by_field_name("parameters") {
            Some(params) if params.kind() == "identifier" => {
                (vec![self.declare(self.text(params), Binding::Parameter)], Vec::new())
            }
            Some(params) => self.formal_parameters(params),
            None => (Vec::new(), Vec::new()),
        };

        let body = node.child_by_field_name("body");
        match body {
            Some(body) if body.kind() == "block" => {
                let body_stmt = self.stmt(body);
                let frame = self.frames.pop().unwrap_or_else(Frame::new);
                self.read_through(&frame, effect);

                self.lambda_count += 1;
                let name = format!("lambda${}", self.lambda_count);
                let signature = format!("{}({})", name, types.join(", "));
                let mut procedure = Procedure::new(
                    format!("{}$lambda${}", self.method_id, self.lambda_count),
                    name,
                    body_stmt,
                )
                .with_signature(signature)
                .with_parameters(parameters)
                .with_captured(frame.entry_variables());
                procedure.span = span_of(node);
                self.pending_lambdas.push(procedure);
            }
            Some(body) => {
                let mut inner = Effect::default();
                self.expr(body, &mut inner);
                let frame = self.frames.pop().unwrap_or_else(Frame::new);
                self.read_through(&frame, effect);
                for var in inner.uses {
                    if matches!(var.binding, Binding::Unresolved) {
                        effect.add_use(var);
                    }
                }
                effect.may_throw |= inner.may_throw;
            }
            None => {
                self.frames.pop();
            }
        }
    }

    /// `new T(..) { .. }`: each method with a body becomes its own procedure.
    /// The creation expression reads whatever those methods capture.
    fn anonymous_class(&mut self, body: TSNode, effect: &mut Effect) {
        self.anonymous_count += 1;
        let class = format!("{}$anon${}", self.method_id, self.anonymous_count);
        let members = members_of(body);

        let mut own_fields = HashSet::new();
        for member in members.iter().filter(|m| m.kind() == "field_declaration") {
            for declarator in field_children(*member, "declarator") {
                if let Some(n) = declarator.child_by_field_name("name") {
                    own_fields.insert(self.text(n).to_string());
                }
            }
        }
        self.classes.push(ClassContext {
            name: class.clone(),
            fields: own_fields.clone(),
        });

        let enclosing = self.method_id.clone();
        for member in members.into_iter().filter(|m| m.kind() == "method_declaration") {
            let Some(method_body) = member.child_by_field_name("body") else {
                continue;
            };
            let name = member
                .child_by_field_name("name")
                .map(|n| self.text(n).to_string())
                .unwrap_or_default();

            self.frames.push(Frame::new());
            let (parameters, types) = match member.child_by_field_name("parameters") {
                Some(params) => self.formal_parameters(params),
                None => (Vec::new(), Vec::new()),
            };
            let signature = format!("{}({})", name, types.join(", "));
            let id = format!("{}.{}", class, signature);
            self.method_id = id.clone();

            let body_stmt = self.stmt(method_body);
            let frame = self.frames.pop().unwrap_or_else(Frame::new);
            for (_, outer) in &frame.captured {
                effect.add_use(outer.clone());
            }
            for field in frame.fields.iter().filter(|f| !own_fields.contains(*f)) {
                let var = self.field(field);
                effect.add_use(var);
            }

            let mut procedure = Procedure::new(id, name, body_stmt)
                .with_signature(signature)
                .with_parameters(parameters)
                .with_captured(frame.entry_variables());
            procedure.span = span_of(member);
            self.pending_lambdas.push(procedure);
        }

        self.method_id = enclosing;
        self.classes.pop();
    }

    /// A lambda reads what it captures at the point it is created
    fn read_through(&mut self, frame: &Frame, effect: &mut Effect) {
        for (_, outer) in &frame.captured {
            effect.add_use(outer.clone());
        }
        for name in &frame.fields {
            let var = self.field(name);
            effect.add_use(var);
        }
    }
}

fn members_of(body: TSNode) -> Vec<TSNode> {
    let mut members = Vec::new();
    for child in named_children(body) {
        if child.kind() == "enum_body_declarations" {
            members.extend(named_children(child));
        } else {
            members.push(child);
        }
    }
    members
}
