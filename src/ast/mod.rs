// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Abstract Syntax Tree module
//!
//! Defines the script AST and the interpreter that evaluates it

mod evaluator;
mod node;
pub mod scope;
mod stdlib;
mod value;

pub use evaluator::{array_index, binary, Flow, Interpreter, MAX_ARRAY_LENGTH, MAX_CALL_DEPTH};
pub use node::{
    walk_expr, walk_stmt, walk_stmts, AssignOp, BinaryOp, DeclKind, Declarator, Expr, ForInit,
    FunctionBody, FunctionDef, Program, Span, Stmt, StmtKind, TemplatePart, UnaryOp,
};
pub use scope::{Scope, ScopeRef};
pub use value::{
    format_number, number_to_json, ArrayRef, Closure, HostObject, Native, NativeFn, ObjectRef,
    Value,
};
