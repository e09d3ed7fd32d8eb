// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Tree-walking interpreter
//!
//! Evaluates parsed programs against a scope chain rooted in one global scope
//! per run. Host modules live in the attached [`RunContext`].

use super::scope::{self, Scope, ScopeRef};
use super::value::{format_number, Closure, Value};
use super::{
    BinaryOp, DeclKind, Declarator, Expr, ForInit, FunctionBody, Program, Stmt,
    StmtKind, TemplatePart, UnaryOp,
};
use crate::error::{Result, ScriptError};
use crate::runner::RunContext;
use std::cmp::Ordering;
use std::sync::Arc;

/// Nesting limit for script function calls
pub const MAX_CALL_DEPTH: usize = 64;

/// Largest array a script may grow by index assignment
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// Array position for a numeric key; `None` for negative, fractional or out of range keys
pub fn array_index(n: f64) -> Option<usize> {
    (n >= 0.0 && n.fract() == 0.0 && n < MAX_ARRAY_LENGTH as f64).then_some(n as usize)
}

/// Control flow outcome of a statement
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

pub struct Interpreter {
    globals: ScopeRef,
    pub ctx: RunContext,
    depth: usize,
}

impl Interpreter {
    pub fn new(ctx: RunContext) -> Self {
        let interp = Self {
            globals: Scope::global(),
            ctx,
            depth: 0,
        };
        super::stdlib::install(&interp.globals);
        interp
    }

    pub fn globals(&self) -> &ScopeRef {
        &self.globals
    }

    pub fn define_global(&self, name: impl Into<String>, value: Value) {
        self.globals.write().declare(name, value, false);
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        scope::lookup(&self.globals, name)
    }

    /// Run a program in the global scope; yields the value of the last expression statement
    pub fn run_program(&mut self, program: &Program) -> Result<Value> {
        let globals = self.globals.clone();
        self.hoist(&program.body, &globals);
        let mut last = Value::Undefined;
        for stmt in &program.body {
            if let StmtKind::Expr(expr) = &stmt.kind {
                last = self.eval(expr, &globals)?;
                continue;
            }
            if let Flow::Return(value) = self.exec(stmt, &globals)? {
                return Ok(value);
            }
        }
        Ok(last)
    }

    /// Release every global binding, which also drops closure cycles
    pub fn shutdown(&mut self) {
        self.globals.write().clear();
    }

    /// Invoke a callable value
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value> {
        match callee {
            Value::Native(native) => (native.func)(self, args),
            Value::Function(closure) => self.call_closure(closure, args),
            other => Err(ScriptError::runtime(format!(
                "{} is not a function",
                other.to_display()
            ))),
        }
    }

    fn call_closure(&mut self, closure: &Arc<Closure>, args: Vec<Value>) -> Result<Value> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(ScriptError::runtime("Maximum call stack size exceeded"));
        }
        let scope = Scope::child(&closure.env, true);
        {
            let mut guard = scope.write();
            let mut args = args.into_iter();
            for param in &closure.def.params {
                guard.declare(param.as_str(), args.next().unwrap_or_default(), false);
            }
        }

        self.depth += 1;
        let result = match &closure.def.body {
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
            FunctionBody::Block(body) => self.exec_block(body, &scope).map(|flow| match flow {
                Flow::Return(value) => value,
                _ => Value::Undefined,
            }),
        };
        self.depth -= 1;
        result
    }

    fn hoist(&self, stmts: &[Stmt], scope: &ScopeRef) {
        for stmt in stmts {
            if let StmtKind::Function(def) = &stmt.kind {
                if let Some(name) = &def.name {
                    let closure = Closure {
                        def: def.clone(),
                        env: scope.clone(),
                    };
                    scope.write().declare(name.as_str(), Value::Function(Arc::new(closure)), false);
                }
            }
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt], scope: &ScopeRef) -> Result<Flow> {
        self.hoist(stmts, scope);
        for stmt in stmts {
            match self.exec(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn declare(&mut self, kind: DeclKind, declarators: &[Declarator], scope: &ScopeRef) -> Result<()> {
        for declarator in declarators {
            let value = match &declarator.init {
                Some(init) => self.eval(init, scope)?,
                None => Value::Undefined,
            };
            match kind {
                DeclKind::Var => scope::function_scope(scope)
                    .write()
                    .declare(declarator.name.as_str(), value, false),
                DeclKind::Let => scope.write().declare(declarator.name.as_str(), value, false),
                DeclKind::Const => scope.write().declare(declarator.name.as_str(), value, true),
            }
        }
        Ok(())
    }

    pub fn exec(&mut self, stmt: &Stmt, scope: &ScopeRef) -> Result<Flow> {
        match &stmt.kind {
            StmtKind::Empty => Ok(Flow::Normal),
            StmtKind::Expr(expr) => {
                self.eval(expr, scope)?;
                Ok(Flow::Normal)
            }
            StmtKind::Declaration { kind, declarators } => {
                self.declare(*kind, declarators, scope)?;
                Ok(Flow::Normal)
            }
            // already bound by hoisting
            StmtKind::Function(_) => Ok(Flow::Normal),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.exec(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::Block(body) => {
                let inner = Scope::child(scope, false);
                self.exec_block(body, &inner)
            }
            StmtKind::While { test, body } => {
                while self.eval(test, scope)?.truthy() {
                    match self.exec(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                let loop_scope = Scope::child(scope, false);
                match init.as_deref() {
                    Some(ForInit::Declaration { kind, declarators }) => {
                        self.declare(*kind, declarators, &loop_scope)?
                    }
                    Some(ForInit::Expr(expr)) => {
                        self.eval(expr, &loop_scope)?;
                    }
                    None => {}
                }
                loop {
                    if let Some(test) = test {
                        if !self.eval(test, &loop_scope)?.truthy() {
                            break;
                        }
                    }
                    match self.exec(body, &loop_scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, &loop_scope)?;
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::ForOf {
                kind,
                binding,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable, scope)?;
                let items = self.iterate(&iterable)?;
                for item in items {
                    let iteration = Scope::child(scope, false);
                    match kind {
                        Some(kind) => iteration.write().declare(
                            binding.as_str(),
                            item,
                            *kind == DeclKind::Const,
                        ),
                        None => scope::assign(&iteration, binding, item)?,
                    }
                    match self.exec(body, &iteration)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
        }
    }

    /// Elements produced by iterating a value with `for..of`
    pub fn iterate(&self, value: &Value) -> Result<Vec<Value>> {
        match value {
            Value::Array(items) => Ok(items.read().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
            Value::Host(host) => host.iter_values().ok_or_else(|| {
                ScriptError::runtime(format!("{} is not iterable", host.type_name()))
            }),
            other => Err(ScriptError::runtime(format!(
                "{} is not iterable",
                other.to_display()
            ))),
        }
    }

    pub fn eval(&mut self, expr: &Expr, scope: &ScopeRef) -> Result<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::from(s.as_str())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Expr(expr) => out.push_str(&self.eval(expr, scope)?.to_display()),
                    }
                }
                Ok(Value::from(out))
            }
            Expr::Ident(name) => Ok(self.lookup(name, scope)),
            Expr::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item, scope))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::array(values))
            }
            Expr::Object(props) => {
                let mut map = indexmap::IndexMap::with_capacity(props.len());
                for (key, value) in props {
                    map.insert(key.clone(), self.eval(value, scope)?);
                }
                Ok(Value::object(map))
            }
            Expr::Function(def) => Ok(Value::Function(Arc::new(Closure {
                def: def.clone(),
                env: scope.clone(),
            }))),
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let target = self.eval(object, scope)?;
                if *optional && target.is_nullish() {
                    return Ok(Value::Undefined);
                }
                self.get_member(&target, property)
            }
            Expr::Index { object, index } => {
                let target = self.eval(object, scope)?;
                let key = self.eval(index, scope)?;
                self.get_index(&target, &key)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, scope),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand, scope)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::from(value.type_of()),
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                match op {
                    BinaryOp::And if !left.truthy() => Ok(left),
                    BinaryOp::Or if left.truthy() => Ok(left),
                    BinaryOp::Nullish if !left.is_nullish() => Ok(left),
                    BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => self.eval(right, scope),
                    _ => {
                        let right = self.eval(right, scope)?;
                        Ok(binary(*op, &left, &right))
                    }
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Assign { op, target, value } => {
                let value = match op.binary() {
                    None => self.eval(value, scope)?,
                    Some(binary_op) => {
                        let current = self.eval(target, scope)?;
                        let rhs = self.eval(value, scope)?;
                        binary(binary_op, &current, &rhs)
                    }
                };
                self.assign(target, value.clone(), scope)?;
                Ok(value)
            }
            Expr::Update { increment, target } => {
                let old = self.eval(target, scope)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.assign(target, Value::Number(new), scope)?;
                Ok(Value::Number(old))
            }
            Expr::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval(expr, scope)?;
                }
                Ok(last)
            }
        }
    }

    fn lookup(&self, name: &str, scope: &ScopeRef) -> Value {
        scope::lookup(scope, name)
            .or_else(|| self.ctx.resolve_unbound(name))
            .unwrap_or_default()
    }

    fn assign(&mut self, target: &Expr, value: Value, scope: &ScopeRef) -> Result<()> {
        match target {
            Expr::Ident(name) => scope::assign(scope, name, value),
            Expr::Member { object, property, .. } => {
                let object = self.eval(object, scope)?;
                set_property(&object, property, value)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let key = self.eval(index, scope)?;
                match (&object, &key) {
                    (Value::Array(items), Value::Number(n)) => {
                        let index = array_index(*n)
                            .ok_or_else(|| ScriptError::runtime(format!("Invalid array index {}", key.to_display())))?;
                        let mut items = items.write();
                        if index >= items.len() {
                            items.resize(index + 1, Value::Undefined);
                        }
                        items[index] = value;
                        Ok(())
                    }
                    _ => set_property(&object, &key.to_display(), value),
                }
            }
            _ => Err(ScriptError::runtime("Invalid assignment target")),
        }
    }

    pub fn get_member(&mut self, target: &Value, key: &str) -> Result<Value> {
        match target {
            Value::Undefined | Value::Null => Err(ScriptError::runtime(format!(
                "Cannot read properties of {} (reading '{key}')",
                target.to_display()
            ))),
            Value::Str(s) if key == "length" => Ok(Value::Number(s.chars().count() as f64)),
            Value::Array(items) if key == "length" => Ok(Value::Number(items.read().len() as f64)),
            Value::Object(map) => Ok(map.read().get(key).cloned().unwrap_or_default()),
            Value::Host(host) => host.clone().get(self, key),
            Value::Function(closure) if key == "name" => Ok(Value::from(closure.name())),
            Value::Native(native) if key == "name" => Ok(Value::from(native.name)),
            _ => Ok(Value::Undefined),
        }
    }

    pub fn get_index(&mut self, target: &Value, key: &Value) -> Result<Value> {
        let position = match key {
            Value::Number(n) => array_index(*n),
            _ => None,
        };
        match (target, position) {
            (Value::Array(items), Some(i)) => Ok(items.read().get(i).cloned().unwrap_or_default()),
            (Value::Str(s), Some(i)) => Ok(s
                .chars()
                .nth(i)
                .map(|c| Value::from(c.to_string()))
                .unwrap_or_default()),
            (Value::Host(host), Some(i)) => host.clone().index(self, i),
            _ => self.get_member(target, &key.to_display()),
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], scope: &ScopeRef) -> Result<Value> {
        if let Expr::Member {
            object,
            property,
            optional,
        } = callee
        {
            let receiver = self.eval(object, scope)?;
            if *optional && receiver.is_nullish() {
                return Ok(Value::Undefined);
            }
            let args = self.eval_args(args, scope)?;
            return self.call_method(&receiver, property, args, || describe(callee));
        }

        let function = self.eval(callee, scope)?;
        if !function.is_callable() {
            return Err(ScriptError::runtime(format!("{} is not a function", describe(callee))));
        }
        let args = self.eval_args(args, scope)?;
        self.call(&function, args)
    }

    fn eval_args(&mut self, args: &[Expr], scope: &ScopeRef) -> Result<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg, scope)).collect()
    }

    /// Dispatch `receiver.name(args)`
    pub fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        describe: impl FnOnce() -> String,
    ) -> Result<Value> {
        match receiver {
            Value::Host(host) => host.clone().call_method(self, name, args),
            Value::Array(items) => super::stdlib::array_method(self, items, name, args)
                .unwrap_or_else(|| Err(not_a_function(describe()))),
            Value::Str(s) => super::stdlib::string_method(s, name, &args)
                .unwrap_or_else(|| Err(not_a_function(describe()))),
            Value::Number(n) => super::stdlib::number_method(*n, name, &args)
                .unwrap_or_else(|| Err(not_a_function(describe()))),
            Value::Undefined | Value::Null => Err(ScriptError::runtime(format!(
                "Cannot read properties of {} (reading '{name}')",
                receiver.to_display()
            ))),
            _ => {
                let function = self.get_member(receiver, name)?;
                if function.is_callable() {
                    self.call(&function, args)
                } else {
                    Err(not_a_function(describe()))
                }
            }
        }
    }
}

fn not_a_function(name: String) -> ScriptError {
    ScriptError::runtime(format!("{name} is not a function"))
}

fn set_property(object: &Value, key: &str, value: Value) -> Result<()> {
    match object {
        Value::Object(map) => {
            map.write().insert(key.to_string(), value);
            Ok(())
        }
        Value::Host(host) => host.set(key, value),
        other => Err(ScriptError::runtime(format!(
            "Cannot set properties of {} (setting '{key}')",
            other.to_display()
        ))),
    }
}

/// Source-like rendering of a callee for error messages
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member {
            object, property, ..
        } => format!("{}.{property}", describe(object)),
        Expr::Index { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        Expr::Str(s) => format!("\"{s}\""),
        Expr::Number(n) => format_number(*n),
        _ => "expression".into(),
    }
}

/// Strict binary operators; logical operators short-circuit in `eval`
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            let is_text = |v: &Value| {
                matches!(v, Value::Str(_) | Value::Array(_) | Value::Object(_) | Value::Host(_))
            };
            if is_text(left) || is_text(right) {
                Value::from(left.to_display() + &right.to_display())
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Mod => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::Ne => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_eq(right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            Value::Bool(match (op, ordering) {
                (_, None) => false,
                (BinaryOp::Lt, Some(o)) => o == Ordering::Less,
                (BinaryOp::Le, Some(o)) => o != Ordering::Greater,
                (BinaryOp::Gt, Some(o)) => o == Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            })
        }
        BinaryOp::And => {
            if left.truthy() { right.clone() } else { left.clone() }
        }
        BinaryOp::Or => {
            if left.truthy() { left.clone() } else { right.clone() }
        }
        BinaryOp::Nullish => {
            if left.is_nullish() { right.clone() } else { left.clone() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::parse_program;

    fn run(source: &str) -> Result<Value> {
        let program = parse_program(source).map_err(|e| ScriptError::runtime(e.to_string()))?;
        let mut interp = Interpreter::new(RunContext::detached());
        interp.run_program(&program)
    }

    fn number(source: &str) -> f64 {
        run(source).map(|v| v.to_number()).unwrap_or(f64::NAN)
    }

    #[test]
    fn test_arithmetic_and_strings() {
        assert_eq!(number("1 + 2 * 3 - 4 / 2"), 5.0);
        assert_eq!(number("7 % 4"), 3.0);
        let text = run("let w = 3; `w=${w * 2}` + '!'").map(|v| v.to_display()).unwrap_or_default();
        assert_eq!(text, "w=6!");
    }

    #[test]
    fn test_closures_capture_scope() {
        let source = "
            function counter() {
                let n = 0
                return () => { n += 1; return n }
            }
            const next = counter()
            next(); next(); next()
        ";
        assert_eq!(number(source), 3.0);
    }

    #[test]
    fn test_loops_and_arrays() {
        let source = "
            let total = 0
            for (let i = 0; i < 5; i++) { if (i == 3) continue; total += i }
            for (const v of [10, 20]) total += v
            let xs = [1, 2, 3].map(x => x * 2).filter(x => x > 2)
            total + xs.length + xs.reduce((a, b) => a + b, 0)
        ";
        assert_eq!(number(source), 7.0 + 30.0 + 2.0 + 10.0);
    }

    #[test]
    fn test_undeclared_identifier_is_undefined() {
        let value = run("typeof missing").map(|v| v.to_display()).unwrap_or_default();
        assert_eq!(value, "undefined");
    }

    #[test]
    fn test_calling_non_function_reports_name() {
        let err = match run("shape()") {
            Err(err) => err.to_string(),
            Ok(_) => String::new(),
        };
        assert_eq!(err, "shape is not a function");

        let err = match run("let o = {}; o.draw(1)") {
            Err(err) => err.to_string(),
            Ok(_) => String::new(),
        };
        assert_eq!(err, "o.draw is not a function");
    }

    #[test]
    fn test_array_index_bounds() {
        assert_eq!(array_index(3.0), Some(3));
        assert_eq!(array_index(-1.0), None);
        assert_eq!(array_index(1.5), None);
        assert_eq!(array_index(1e300), None);
        assert_eq!(array_index(f64::NAN), None);

        let result = run("let a = []; a[1e300] = 1");
        assert!(matches!(result, Err(ScriptError::Runtime(msg)) if msg.contains("Invalid array index")));
        assert!(run("let a = []; a[1e12] = 1").is_err());
        assert!(run("let a = []; a[-1] = 1").is_err());
        let read = run("let a = [1, 2]; typeof a[1e300]").map(|v| v.to_display()).unwrap_or_default();
        assert_eq!(read, "undefined");
        assert_eq!(number("let a = []; a[3] = 7; a.length + a[3]"), 11.0);
    }

    #[test]
    fn test_recursion_limit() {
        let result = run("function f(n) { return f(n + 1) } f(0)");
        assert!(matches!(result, Err(ScriptError::Runtime(msg)) if msg.contains("call stack")));
    }

    #[test]
    fn test_objects_and_optional_chaining() {
        let source = "
            const cfg = { size: { w: 2 }, 'label': 'a' }
            cfg.size.h = 4
            cfg['extra'] = 1;
            (cfg.missing?.deep ?? 10) + cfg.size.w * cfg.size.h + cfg.extra
        ";
        assert_eq!(number(source), 19.0);
    }
}
