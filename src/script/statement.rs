// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Statement splitting
//!
//! Scripts are cut into top-level statements that can be replayed one by one
//! in a shared global scope.

use crate::ast::{AssignOp, Expr, Program, StmtKind};
use crate::error::{Result, ScriptError};
use crate::io::parse_program;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Statements whose code contains one of these are dropped
pub const DEFAULT_EXCLUSIONS: &[&str] = &["Geom()"];

const DECLARATION_KEYWORDS: &[&str] = &["let", "var", "const"];

/// One top-level unit of a script
///
/// Offsets are byte offsets into the source the statement was parsed from;
/// `code` is a working copy that preload may rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub start_offset: usize,
    pub end_offset: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub start_column: usize,
    pub end_column: usize,
    pub code: String,
}

impl Statement {
    /// Statement covering a whole piece of code
    pub fn from_code(code: impl Into<String>) -> Self {
        let code = code.into();
        let lines = code.lines().count().max(1);
        Self {
            start_offset: 0,
            end_offset: code.len(),
            start_line: 1,
            end_line: lines,
            start_column: 0,
            end_column: code.lines().last().map(|l| l.chars().count()).unwrap_or(0),
            code,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatementParser {
    exclusions: Vec<String>,
}

impl Default for StatementParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser {
    pub fn new() -> Self {
        Self {
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_exclusions(exclusions: Vec<String>) -> Self {
        Self { exclusions }
    }

    pub fn is_excluded(&self, code: &str) -> bool {
        self.exclusions.iter().any(|pattern| code.contains(pattern.as_str()))
    }

    /// Parse `source` into replayable statements
    ///
    /// A syntax error fails the whole parse; no partial list is returned.
    pub fn parse(&self, script: &str, source: &str) -> Result<Vec<Statement>> {
        let program = parse_program(source).map_err(|source| ScriptError::ScriptParse {
            script: script.to_string(),
            source,
        })?;

        let statements: Vec<Statement> = program
            .body
            .iter()
            .filter(|stmt| !stmt.is_empty())
            .filter_map(|stmt| {
                let span = stmt.span;
                let code = source.get(span.start..span.end)?;
                if self.is_excluded(code) {
                    return None;
                }
                Some(Statement {
                    start_offset: span.start,
                    end_offset: span.end,
                    start_line: span.start_line,
                    end_line: span.end_line,
                    start_column: span.start_column,
                    end_column: span.end_column,
                    code: strip_declaration(code),
                })
            })
            .collect();

        debug!(script, statements = statements.len(), "parsed statements");
        Ok(statements)
    }
}

/// Remove a leading `let`, `var` or `const` keyword
///
/// Only a whole word at the start of the trimmed code is removed, so names such
/// as `letter` stay intact.
pub fn strip_declaration(code: &str) -> String {
    let trimmed = code.trim_start();
    for keyword in DECLARATION_KEYWORDS {
        if let Some(rest) = trimmed.strip_prefix(keyword) {
            if rest.starts_with(|c: char| c.is_whitespace()) {
                return rest.trim_start().to_string();
            }
        }
    }
    trimmed.to_string()
}

/// Undeclared name assigned by each top-level statement of a component body
///
/// A top-level `x = ...` whose `x` is not declared earlier in the same body
/// would alias a binding of the importing scope. The first such assignment of
/// each name is reported; later ones reuse the new local binding.
pub fn undeclared_assignments(program: &Program) -> Vec<Option<String>> {
    let mut locals: Vec<String> = Vec::new();
    program
        .body
        .iter()
        .map(|stmt| match &stmt.kind {
            StmtKind::Declaration { declarators, .. } => {
                locals.extend(declarators.iter().map(|d| d.name.clone()));
                None
            }
            StmtKind::Function(def) => {
                locals.extend(def.name.clone());
                None
            }
            StmtKind::Expr(Expr::Assign {
                op: AssignOp::Assign,
                target,
                ..
            }) => match target.as_ident() {
                Some(name) if !locals.iter().any(|l| l == name) => {
                    locals.push(name.to_string());
                    Some(name.to_string())
                }
                _ => None,
            },
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyntaxError;

    #[test]
    fn test_parse_strips_declarations_and_filters() -> Result<()> {
        let source = "const geom = new Geom();\nlet width = 100;;\nvar b = box(width, 10, 10);\nletter = 'a'";
        let statements = StatementParser::new().parse("test", source)?;

        let codes: Vec<&str> = statements.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec!["width = 100;", "b = box(width, 10, 10);", "letter = 'a'"]);

        let b = &statements[1];
        assert_eq!(b.start_line, 3);
        assert_eq!(b.start_column, 0);
        assert_eq!(&source[b.start_offset..b.end_offset], "var b = box(width, 10, 10);");
        Ok(())
    }

    #[test]
    fn test_parse_error_fails_whole_script() {
        let err = StatementParser::new().parse("broken", "a = 1\nb = (");
        match err {
            Err(ScriptError::ScriptParse { script, source }) => {
                assert_eq!(script, "broken");
                assert_eq!(source.line, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_strip_declaration_word_boundary() {
        assert_eq!(strip_declaration("  let a = 1"), "a = 1");
        assert_eq!(strip_declaration("constant = 2"), "constant = 2");
        assert_eq!(strip_declaration("var\tx"), "x");
    }

    #[test]
    fn test_undeclared_assignments() -> std::result::Result<(), SyntaxError> {
        let code = "let w = 10\nw = 20\nframe = box(w, w, w)\nframe = frame.move(1, 0, 0)\nfunction f() {}\nf = 2";
        let program = parse_program(code)?;
        assert_eq!(
            undeclared_assignments(&program),
            vec![None, None, Some("frame".to_string()), None, None, None]
        );
        Ok(())
    }
}
