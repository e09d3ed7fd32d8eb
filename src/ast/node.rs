// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! AST node definitions for the script language

use serde::Serialize;
use std::sync::Arc;

/// Parsed script: the ordered top-level statements
#[derive(Debug, Clone, Default, Serialize)]
pub struct Program {
    pub body: Vec<Stmt>,
}

/// Source range of a statement
///
/// Offsets are byte offsets into the parsed buffer, lines are 1-based and
/// columns 0-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, StmtKind::Empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeclKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone, Serialize)]
pub struct Declarator {
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, Serialize)]
pub enum ForInit {
    Declaration {
        kind: DeclKind,
        declarators: Vec<Declarator>,
    },
    Expr(Expr),
}

/// Statement kinds
#[derive(Debug, Clone, Serialize)]
pub enum StmtKind {
    Empty,
    Expr(Expr),
    Declaration {
        kind: DeclKind,
        declarators: Vec<Declarator>,
    },
    Function(Arc<FunctionDef>),
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<ForInit>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForOf {
        kind: Option<DeclKind>,
        binding: String,
        iterable: Expr,
        body: Box<Stmt>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    Block(Vec<Stmt>),
    Break,
    Continue,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, Serialize)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl AssignOp {
    /// Binary operator applied by a compound assignment
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Mod => Some(BinaryOp::Mod),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum TemplatePart {
    Text(String),
    Expr(Expr),
}

/// Expression kinds
#[derive(Debug, Clone, Serialize)]
pub enum Expr {
    Number(f64),
    Str(String),
    Template(Vec<TemplatePart>),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Function(Arc<FunctionDef>),
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Update {
        increment: bool,
        target: Box<Expr>,
    },
    Sequence(Vec<Expr>),
}

impl Expr {
    /// Name of a plain identifier callee
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_assignable(&self) -> bool {
        matches!(self, Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. })
    }

    /// JSON value of a literal expression, or `None` when it is computed
    pub fn to_literal_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value as Json;
        match self {
            Expr::Number(n) => n.is_finite().then(|| super::value::number_to_json(*n)),
            Expr::Str(s) => Some(Json::String(s.clone())),
            Expr::Bool(b) => Some(Json::Bool(*b)),
            Expr::Null => Some(Json::Null),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => match operand.as_ref() {
                Expr::Number(n) => n.is_finite().then(|| super::value::number_to_json(-*n)),
                _ => None,
            },
            Expr::Array(items) => items
                .iter()
                .map(Expr::to_literal_json)
                .collect::<Option<Vec<_>>>()
                .map(Json::Array),
            Expr::Object(props) => props
                .iter()
                .map(|(k, v)| v.to_literal_json().map(|v| (k.clone(), v)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(Json::Object),
            _ => None,
        }
    }
}

/// Depth-first walk over every expression of a statement list
///
/// Function bodies are entered, so calls nested inside closures are visited.
pub fn walk_stmts<'a>(stmts: &'a [Stmt], visit: &mut dyn FnMut(&'a Expr)) {
    for stmt in stmts {
        walk_stmt(stmt, visit);
    }
}

pub fn walk_stmt<'a>(stmt: &'a Stmt, visit: &mut dyn FnMut(&'a Expr)) {
    match &stmt.kind {
        StmtKind::Empty | StmtKind::Break | StmtKind::Continue => {}
        StmtKind::Expr(expr) => walk_expr(expr, visit),
        StmtKind::Declaration { declarators, .. } => walk_declarators(declarators, visit),
        StmtKind::Function(def) => walk_function(def, visit),
        StmtKind::Return(expr) => {
            if let Some(expr) = expr {
                walk_expr(expr, visit);
            }
        }
        StmtKind::If {
            test,
            consequent,
            alternate,
        } => {
            walk_expr(test, visit);
            walk_stmt(consequent, visit);
            if let Some(alternate) = alternate {
                walk_stmt(alternate, visit);
            }
        }
        StmtKind::For {
            init,
            test,
            update,
            body,
        } => {
            match init.as_deref() {
                Some(ForInit::Declaration { declarators, .. }) => {
                    walk_declarators(declarators, visit)
                }
                Some(ForInit::Expr(expr)) => walk_expr(expr, visit),
                None => {}
            }
            for expr in test.iter().chain(update.iter()) {
                walk_expr(expr, visit);
            }
            walk_stmt(body, visit);
        }
        StmtKind::ForOf { iterable, body, .. } => {
            walk_expr(iterable, visit);
            walk_stmt(body, visit);
        }
        StmtKind::While { test, body } => {
            walk_expr(test, visit);
            walk_stmt(body, visit);
        }
        StmtKind::Block(body) => walk_stmts(body, visit),
    }
}

fn walk_declarators<'a>(declarators: &'a [Declarator], visit: &mut dyn FnMut(&'a Expr)) {
    for declarator in declarators {
        if let Some(init) = &declarator.init {
            walk_expr(init, visit);
        }
    }
}

fn walk_function<'a>(def: &'a FunctionDef, visit: &mut dyn FnMut(&'a Expr)) {
    match &def.body {
        FunctionBody::Block(body) => walk_stmts(body, visit),
        FunctionBody::Expr(expr) => walk_expr(expr, visit),
    }
}

pub fn walk_expr<'a>(expr: &'a Expr, visit: &mut dyn FnMut(&'a Expr)) {
    visit(expr);
    match expr {
        Expr::Number(_)
        | Expr::Str(_)
        | Expr::Bool(_)
        | Expr::Null
        | Expr::Undefined
        | Expr::Ident(_) => {}
        Expr::Template(parts) => {
            for part in parts {
                if let TemplatePart::Expr(inner) = part {
                    walk_expr(inner, visit);
                }
            }
        }
        Expr::Array(items) | Expr::Sequence(items) => {
            for item in items {
                walk_expr(item, visit);
            }
        }
        Expr::Object(props) => {
            for (_, value) in props {
                walk_expr(value, visit);
            }
        }
        Expr::Function(def) => walk_function(def, visit),
        Expr::Member { object, .. } => walk_expr(object, visit),
        Expr::Index { object, index } => {
            walk_expr(object, visit);
            walk_expr(index, visit);
        }
        Expr::Call { callee, args } => {
            walk_expr(callee, visit);
            for arg in args {
                walk_expr(arg, visit);
            }
        }
        Expr::Unary { operand, .. } => walk_expr(operand, visit),
        Expr::Binary { left, right, .. } => {
            walk_expr(left, visit);
            walk_expr(right, visit);
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            walk_expr(test, visit);
            walk_expr(consequent, visit);
            walk_expr(alternate, visit);
        }
        Expr::Assign { target, value, .. } => {
            walk_expr(target, visit);
            walk_expr(value, visit);
        }
        Expr::Update { target, .. } => walk_expr(target, visit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_json_rejects_computed_values() {
        let literal = Expr::Object(vec![
            ("width".into(), Expr::Number(1200.0)),
            ("tags".into(), Expr::Array(vec![Expr::Str("a".into())])),
            (
                "offset".into(),
                Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(Expr::Number(2.0)),
                },
            ),
        ]);
        let json = literal.to_literal_json();
        assert_eq!(
            json,
            Some(serde_json::json!({"width": 1200, "tags": ["a"], "offset": -2}))
        );

        let computed = Expr::Object(vec![("width".into(), Expr::Ident("w".into()))]);
        assert!(computed.to_literal_json().is_none());
    }

    #[test]
    fn test_walk_enters_nested_functions() {
        let call = Expr::Call {
            callee: Box::new(Expr::Ident("$load".into())),
            args: vec![Expr::Str("a.txt".into())],
        };
        let def = FunctionDef {
            name: None,
            params: vec![],
            body: FunctionBody::Expr(Box::new(call)),
        };
        let stmt = Stmt::new(StmtKind::Expr(Expr::Function(Arc::new(def))), Span::default());

        let mut callees = Vec::new();
        walk_stmt(&stmt, &mut |expr| {
            if let Expr::Call { callee, .. } = expr {
                callees.extend(callee.as_ident().map(str::to_string));
            }
        });
        assert_eq!(callees, vec!["$load".to_string()]);
    }
}
