// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script parser using pest
//!
//! Binary operators go through pest's Pratt parser; everything else is a
//! direct walk over the pair tree.

use crate::ast::{
    AssignOp, BinaryOp, DeclKind, Declarator, Expr, ForInit, FunctionBody, FunctionDef, Program,
    Span, Stmt, StmtKind, TemplatePart, UnaryOp,
};
use crate::error::SyntaxError;
use pest::error::LineColLocation;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::sync::{Arc, OnceLock};

#[derive(Parser)]
#[grammar = "io/script.pest"]
struct ScriptParser;

type Pair<'i> = pest::iterators::Pair<'i, Rule>;
type ParseResult<T> = std::result::Result<T, SyntaxError>;

fn pratt() -> &'static PrattParser<Rule> {
    static PRATT: OnceLock<PrattParser<Rule>> = OnceLock::new();
    PRATT.get_or_init(|| {
        PrattParser::new()
            .op(Op::infix(Rule::op_nullish, Assoc::Left))
            .op(Op::infix(Rule::op_or, Assoc::Left))
            .op(Op::infix(Rule::op_and, Assoc::Left))
            .op(Op::infix(Rule::op_seq, Assoc::Left)
                | Op::infix(Rule::op_sne, Assoc::Left)
                | Op::infix(Rule::op_eq, Assoc::Left)
                | Op::infix(Rule::op_ne, Assoc::Left))
            .op(Op::infix(Rule::op_lt, Assoc::Left)
                | Op::infix(Rule::op_le, Assoc::Left)
                | Op::infix(Rule::op_gt, Assoc::Left)
                | Op::infix(Rule::op_ge, Assoc::Left))
            .op(Op::infix(Rule::op_add, Assoc::Left) | Op::infix(Rule::op_sub, Assoc::Left))
            .op(Op::infix(Rule::op_mul, Assoc::Left)
                | Op::infix(Rule::op_div, Assoc::Left)
                | Op::infix(Rule::op_mod, Assoc::Left))
    })
}

/// Parse script source into a program
pub fn parse_program(source: &str) -> ParseResult<Program> {
    let mut pairs = ScriptParser::parse(Rule::program, source).map_err(from_pest)?;
    let builder = AstBuilder { source };

    let mut body = Vec::new();
    if let Some(program) = pairs.next() {
        for pair in program.into_inner() {
            if pair.as_rule() == Rule::statement {
                body.push(builder.statement(pair)?);
            }
        }
    }
    Ok(Program { body })
}

fn from_pest(err: pest::error::Error<Rule>) -> SyntaxError {
    let (line, column) = match err.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
    };
    SyntaxError {
        line,
        column: column.saturating_sub(1),
        message: err.variant.message().into_owned(),
    }
}

/// 1-based line and 0-based character column of a byte offset
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before.get(line_start..).map(|s| s.chars().count()).unwrap_or(0);
    (line, column)
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_function
            | Rule::kw_return
            | Rule::kw_if
            | Rule::kw_else
            | Rule::kw_for
            | Rule::kw_of
            | Rule::kw_while
            | Rule::kw_break
            | Rule::kw_continue
            | Rule::kw_new
    )
}

/// Inner pairs without keyword tokens
fn children(pair: Pair<'_>) -> Vec<Pair<'_>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule())).collect()
}

struct AstBuilder<'s> {
    source: &'s str,
}

impl<'s> AstBuilder<'s> {
    fn error(&self, pair: &Pair<'_>, message: impl Into<String>) -> SyntaxError {
        let (line, column) = line_col(self.source, pair.as_span().start());
        SyntaxError {
            line,
            column,
            message: message.into(),
        }
    }

    fn next<'i>(&self, parent: &Pair<'i>, iter: &mut impl Iterator<Item = Pair<'i>>) -> ParseResult<Pair<'i>> {
        iter.next()
            .ok_or_else(|| self.error(parent, format!("incomplete {:?}", parent.as_rule())))
    }

    fn span(&self, pair: &Pair<'_>) -> Span {
        let start = pair.as_span().start();
        let end = start + pair.as_str().trim_end().len();
        let (start_line, start_column) = line_col(self.source, start);
        let (end_line, end_column) = line_col(self.source, end);
        Span {
            start,
            end,
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    fn statement(&self, pair: Pair<'_>) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let inner = self.next(&pair, &mut pair.clone().into_inner())?;
        let kind = match inner.as_rule() {
            Rule::empty_stmt => StmtKind::Empty,
            Rule::block => StmtKind::Block(self.block(inner)?),
            Rule::var_decl => {
                let decl = self.next(&inner, &mut inner.clone().into_inner())?;
                let (kind, declarators) = self.declaration(decl)?;
                StmtKind::Declaration { kind, declarators }
            }
            Rule::function_decl => StmtKind::Function(Arc::new(self.function(inner)?)),
            Rule::return_stmt => {
                let value = children(inner).into_iter().next().map(|e| self.expression(e)).transpose()?;
                StmtKind::Return(value)
            }
            Rule::if_stmt => {
                let mut parts = children(inner.clone()).into_iter();
                let test = self.expression(self.next(&inner, &mut parts)?)?;
                let consequent = Box::new(self.statement(self.next(&inner, &mut parts)?)?);
                let alternate = parts.next().map(|p| self.statement(p)).transpose()?.map(Box::new);
                StmtKind::If {
                    test,
                    consequent,
                    alternate,
                }
            }
            Rule::for_stmt => self.for_statement(inner)?,
            Rule::while_stmt => {
                let mut parts = children(inner.clone()).into_iter();
                let test = self.expression(self.next(&inner, &mut parts)?)?;
                let body = Box::new(self.statement(self.next(&inner, &mut parts)?)?);
                StmtKind::While { test, body }
            }
            Rule::break_stmt => StmtKind::Break,
            Rule::continue_stmt => StmtKind::Continue,
            Rule::expr_stmt => {
                let mut exprs = inner
                    .into_inner()
                    .map(|e| self.expression(e))
                    .collect::<ParseResult<Vec<_>>>()?;
                if exprs.len() == 1 {
                    StmtKind::Expr(exprs.remove(0))
                } else {
                    StmtKind::Expr(Expr::Sequence(exprs))
                }
            }
            other => return Err(self.error(&inner, format!("unexpected {other:?}"))),
        };
        Ok(Stmt::new(kind, span))
    }

    fn block(&self, pair: Pair<'_>) -> ParseResult<Vec<Stmt>> {
        pair.into_inner().map(|p| self.statement(p)).collect()
    }

    fn decl_kind(&self, pair: &Pair<'_>) -> DeclKind {
        match pair.as_str() {
            "const" => DeclKind::Const,
            "var" => DeclKind::Var,
            _ => DeclKind::Let,
        }
    }

    fn declaration(&self, pair: Pair<'_>) -> ParseResult<(DeclKind, Vec<Declarator>)> {
        let mut parts = pair.clone().into_inner();
        let kind = self.decl_kind(&self.next(&pair, &mut parts)?);
        let mut declarators = Vec::new();
        for declarator in parts {
            let mut inner = declarator.clone().into_inner();
            let name = self.next(&declarator, &mut inner)?.as_str().to_string();
            let init = inner.next().map(|e| self.expression(e)).transpose()?;
            declarators.push(Declarator { name, init });
        }
        Ok((kind, declarators))
    }

    fn for_statement(&self, pair: Pair<'_>) -> ParseResult<StmtKind> {
        let mut parts = children(pair.clone()).into_iter();
        let head = self.next(&pair, &mut parts)?;
        let body = Box::new(self.statement(self.next(&pair, &mut parts)?)?);

        if head.as_rule() == Rule::for_of {
            let mut kind = None;
            let mut binding = String::new();
            let mut iterable = None;
            for part in children(head.clone()) {
                match part.as_rule() {
                    Rule::decl_kind => kind = Some(self.decl_kind(&part)),
                    Rule::ident => binding = part.as_str().to_string(),
                    _ => iterable = Some(self.expression(part)?),
                }
            }
            let iterable = iterable.ok_or_else(|| self.error(&head, "for..of needs an iterable"))?;
            return Ok(StmtKind::ForOf {
                kind,
                binding,
                iterable,
                body,
            });
        }

        let (mut init, mut test, mut update) = (None, None, None);
        for part in head.into_inner() {
            match part.as_rule() {
                Rule::for_init => {
                    let inner = self.next(&part, &mut part.clone().into_inner())?;
                    init = Some(Box::new(if inner.as_rule() == Rule::declaration {
                        let (kind, declarators) = self.declaration(inner)?;
                        ForInit::Declaration { kind, declarators }
                    } else {
                        ForInit::Expr(self.expression(inner)?)
                    }));
                }
                Rule::for_test => test = Some(self.wrapped_expression(part)?),
                Rule::for_update => update = Some(self.wrapped_expression(part)?),
                _ => {}
            }
        }
        Ok(StmtKind::For {
            init,
            test,
            update,
            body,
        })
    }

    fn function(&self, pair: Pair<'_>) -> ParseResult<FunctionDef> {
        let mut name = None;
        let mut params = Vec::new();
        let mut body = Vec::new();
        for part in children(pair) {
            match part.as_rule() {
                Rule::ident => name = Some(part.as_str().to_string()),
                Rule::param_list => params = part.into_inner().map(|p| p.as_str().to_string()).collect(),
                Rule::block => body = self.block(part)?,
                _ => {}
            }
        }
        Ok(FunctionDef {
            name,
            params,
            body: FunctionBody::Block(body),
        })
    }

    /// Rules that wrap a single expression pair
    fn wrapped_expression(&self, pair: Pair<'_>) -> ParseResult<Expr> {
        let inner = self.next(&pair, &mut pair.clone().into_inner())?;
        self.expression(inner)
    }

    fn expression(&self, pair: Pair<'_>) -> ParseResult<Expr> {
        match pair.as_rule() {
            Rule::expression => self.wrapped_expression(pair),
            Rule::assignment => self.assignment(pair),
            _ => Err(self.error(&pair, format!("expected expression, found {:?}", pair.as_rule()))),
        }
    }

    fn assignment(&self, pair: Pair<'_>) -> ParseResult<Expr> {
        let mut parts = pair.clone().into_inner();
        let first = self.next(&pair, &mut parts)?;
        if first.as_rule() == Rule::arrow_fn {
            return self.arrow(first);
        }
        let target = self.conditional(first.clone())?;
        let Some(op) = parts.next() else {
            return Ok(target);
        };
        if !target.is_assignable() {
            return Err(self.error(&first, "invalid assignment target"));
        }
        let value = self.assignment(self.next(&pair, &mut parts)?)?;
        let op = match op.as_str() {
            "+=" => AssignOp::Add,
            "-=" => AssignOp::Sub,
            "*=" => AssignOp::Mul,
            "/=" => AssignOp::Div,
            "%=" => AssignOp::Mod,
            _ => AssignOp::Assign,
        };
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn arrow(&self, pair: Pair<'_>) -> ParseResult<Expr> {
        let mut parts = pair.clone().into_inner();
        let params = self
            .next(&pair, &mut parts)?
            .into_inner()
            .map(|p| p.as_str().to_string())
            .collect();
        let body_pair = self.next(&pair, &mut parts)?;
        let body = if body_pair.as_rule() == Rule::block {
            FunctionBody::Block(self.block(body_pair)?)
        } else {
            FunctionBody::Expr(Box::new(self.assignment(body_pair)?))
        };
        Ok(Expr::Function(Arc::new(FunctionDef {
            name: None,
            params,
            body,
        })))
    }

    fn conditional(&self, pair: Pair<'_>) -> ParseResult<Expr> {
        let mut parts = pair.clone().into_inner();
        let test = self.binary(self.next(&pair, &mut parts)?)?;
        if parts.next().is_none() {
            return Ok(test);
        }
        let consequent = self.assignment(self.next(&pair, &mut parts)?)?;
        let alternate = self.assignment(self.next(&pair, &mut parts)?)?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary(&self, pair: Pair<'_>) -> ParseResult<Expr> {
        pratt()
            .map_primary(|primary| self.unary(primary))
            .map_infix(|left, op, right| {
                let op = match op.as_rule() {
                    Rule::op_nullish => BinaryOp::Nullish,
                    Rule::op_or => BinaryOp::Or,
                    Rule::op_and => BinaryOp::And,
                    Rule::op_seq => BinaryOp::StrictEq,
                    Rule::op_sne => BinaryOp::StrictNe,
                    Rule::op_eq => BinaryOp::Eq,
                    Rule::op_ne => BinaryOp::Ne,
                    Rule::op_le => BinaryOp::Le,
                    Rule::op_ge => BinaryOp::Ge,
                    Rule::op_lt => BinaryOp::Lt,
                    Rule::op_gt => BinaryOp::Gt,
                    Rule::op_add => BinaryOp::Add,
                    Rule::op_sub => BinaryOp::Sub,
                    Rule::op_mul => BinaryOp::Mul,
                    Rule::op_div => BinaryOp::Div,
                    _ => BinaryOp::Mod,
                };
                Ok(Expr::Binary {
                    op,
                    left: Box::new(left?),
                    right: Box::new(right?),
                })
            })
            .parse(pair.into_inner())
    }

    fn unary(&self, pair: Pair<'_>) -> ParseResult<Expr> {
        let mut ops = Vec::new();
        let mut operand = None;
        for part in pair.clone().into_inner() {
            match part.as_rule() {
                Rule::prefix_op => ops.push(match part.as_str() {
                    "!" => UnaryOp::Not,
                    "-" => UnaryOp::Neg,
                    "+" => UnaryOp::Plus,
                    _ => UnaryOp::TypeOf,
                }),
                _ => operand = Some(self.postfix(part)?),
            }
        }
        let mut expr = operand.ok_or_else(|| self.error(&pair, "missing operand"))?;
        for op in ops.into_iter().rev() {
            expr = Expr::Unary {
                op,
                operand: Box::new(expr),
            };
        }
        Ok(expr)
    }

    fn postfix(&self, pair: Pair<'_>) -> ParseResult<Expr> {
        let mut parts = children(pair.clone()).into_iter();
        let mut expr = self.primary(self.next(&pair, &mut parts)?)?;
        for part in parts {
            expr = match part.as_rule() {
                Rule::call_args => Expr::Call {
                    callee: Box::new(expr),
                    args: part
                        .into_inner()
                        .map(|a| self.expression(a))
                        .collect::<ParseResult<_>>()?,
                },
                Rule::member => {
                    let optional = part.as_str().starts_with("?.");
                    let property = self.wrapped_text(&part)?;
                    Expr::Member {
                        object: Box::new(expr),
                        property,
                        optional,
                    }
                }
                Rule::index => Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(self.wrapped_expression(part)?),
                },
                Rule::update_op => {
                    if !expr.is_assignable() {
                        return Err(self.error(&part, "invalid update target"));
                    }
                    Expr::Update {
                        increment: part.as_str() == "++",
                        target: Box::new(expr),
                    }
                }
                other => return Err(self.error(&part, format!("unexpected {other:?}"))),
            };
        }
        Ok(expr)
    }

    fn wrapped_text(&self, pair: &Pair<'_>) -> ParseResult<String> {
        let inner = self.next(pair, &mut pair.clone().into_inner())?;
        Ok(inner.as_str().to_string())
    }

    fn primary(&self, pair: Pair<'_>) -> ParseResult<Expr> {
        Ok(match pair.as_rule() {
            Rule::number => Expr::Number(self.number(&pair)?),
            Rule::string => Expr::Str(unescape(&self.wrapped_text(&pair)?)),
            Rule::template => Expr::Template(
                pair.into_inner()
                    .map(|part| match part.as_rule() {
                        Rule::template_subst => self.wrapped_expression(part).map(TemplatePart::Expr),
                        _ => Ok(TemplatePart::Text(unescape(part.as_str()))),
                    })
                    .collect::<ParseResult<_>>()?,
            ),
            Rule::array_lit => Expr::Array(
                pair.into_inner()
                    .map(|e| self.expression(e))
                    .collect::<ParseResult<_>>()?,
            ),
            Rule::object_lit => {
                let mut props = Vec::new();
                for property in pair.into_inner() {
                    let mut inner = property.clone().into_inner();
                    let key = self.next(&property, &mut inner)?;
                    if key.as_rule() == Rule::ident {
                        let name = key.as_str().to_string();
                        props.push((name.clone(), Expr::Ident(name)));
                        continue;
                    }
                    let key_token = self.next(&key, &mut key.clone().into_inner())?;
                    let name = match key_token.as_rule() {
                        Rule::string => unescape(&self.wrapped_text(&key_token)?),
                        _ => key_token.as_str().to_string(),
                    };
                    let value = self.expression(self.next(&property, &mut inner)?)?;
                    props.push((name, value));
                }
                Expr::Object(props)
            }
            Rule::function_expr => Expr::Function(Arc::new(self.function(pair)?)),
            Rule::boolean => Expr::Bool(pair.as_str() == "true"),
            Rule::null_lit => Expr::Null,
            Rule::undefined_lit => Expr::Undefined,
            Rule::ident => Expr::Ident(pair.as_str().to_string()),
            Rule::paren_expr => self.wrapped_expression(pair)?,
            other => return Err(self.error(&pair, format!("unexpected {other:?}"))),
        })
    }

    fn number(&self, pair: &Pair<'_>) -> ParseResult<f64> {
        let text = pair.as_str();
        let parsed = match text.strip_prefix("0x") {
            Some(hex) => i64::from_str_radix(hex, 16).map(|v| v as f64).ok(),
            None => text.parse::<f64>().ok(),
        };
        parsed.ok_or_else(|| self.error(pair, format!("invalid number literal '{text}'")))
    }
}

/// Resolve backslash escapes of a string or template chunk
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let code: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|c| *c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                match u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&code);
                    }
                }
            }
            Some('\n') => {}
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        match parse_program(source) {
            Ok(program) => program,
            Err(err) => panic!("parse failed: {err}"),
        }
    }

    #[test]
    fn test_statement_spans() {
        let source = "let a = 1;\n  b = box(1, 2, 3)\nprint(`w=${a}`)";
        let program = parse(source);
        assert_eq!(program.body.len(), 3);

        let second = program.body[1].span;
        assert_eq!(second.start_line, 2);
        assert_eq!(second.start_column, 2);
        assert_eq!(&source[second.start..second.end], "b = box(1, 2, 3)");
    }

    #[test]
    fn test_operator_precedence() {
        let program = parse("x = 1 + 2 * 3 > 6 && true");
        let StmtKind::Expr(Expr::Assign { value, .. }) = &program.body[0].kind else {
            panic!("expected assignment");
        };
        let Expr::Binary { op, left, .. } = value.as_ref() else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::And);
        assert!(matches!(left.as_ref(), Expr::Binary { op: BinaryOp::Gt, .. }));
    }

    #[test]
    fn test_arrow_functions_and_chains() {
        let program = parse("shapes.forEach((s, i) => s.move(i * 10, 0, 0)).color?.name");
        assert_eq!(program.body.len(), 1);
        let program = parse("const f = x => { return x + 1 }\nf(2)");
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn test_keywords_are_not_identifiers() {
        assert!(parse_program("let return = 1").is_err());
        let program = parse("let letter = 1; const newValue = letter");
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn test_syntax_error_location() {
        let err = match parse_program("a = 1\nb = (2 + ") {
            Err(err) => err,
            Ok(_) => panic!("expected syntax error"),
        };
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\nbA\u{1F600}\\"), "a\nbA\u{1F600}\\");
    }

    #[test]
    fn test_for_loops() {
        let program = parse("for (let i = 0; i < 3; i++) { total += i }\nfor (const s of list) s.hide()");
        assert!(matches!(program.body[0].kind, StmtKind::For { .. }));
        assert!(matches!(program.body[1].kind, StmtKind::ForOf { .. }));
    }
}
