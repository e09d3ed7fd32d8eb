// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Directive discovery
//!
//! `$import`, `$load` and `$component` calls are found by walking the parsed
//! statement rather than by matching source text, so nested objects and
//! strings in the argument list are handled like any other expression.

use crate::ast::{walk_stmts, Expr, Program};
use crate::error::{Result, ScriptError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const IMPORT: &str = "$import";
pub const LOAD: &str = "$load";
pub const COMPONENT: &str = "$component";

/// Fallback bound by the body of a spliced import whose own nested import failed
pub const INERT_IMPORT: &str = "$importUnresolved";

pub const LATEST_TAG: &str = "latest";

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '@')
}

/// Registry address `owner/name[:tag]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptAddress {
    pub owner: String,
    pub name: String,
    pub tag: Option<String>,
}

impl ScriptAddress {
    pub fn parse(raw: &str) -> Result<Self> {
        let (path, tag) = match raw.split_once(':') {
            Some((path, tag)) => (path, Some(tag.trim())),
            None => (raw, None),
        };
        let (owner, name) = path
            .split_once('/')
            .ok_or_else(|| ScriptError::directive(raw, "expected '<owner>/<name>[:<tag>]'"))?;
        let (owner, name) = (owner.trim(), name.trim());
        if owner.is_empty() || name.is_empty() {
            return Err(ScriptError::directive(raw, "owner and name must be non-empty"));
        }
        if !owner.chars().chain(name.chars()).all(is_name_char) {
            return Err(ScriptError::directive(raw, "owner and name may only hold letters, digits, '_', '-', '.' and '@'"));
        }
        if tag.is_some_and(str::is_empty) {
            return Err(ScriptError::directive(raw, "empty version tag"));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            tag: tag.map(str::to_string),
        })
    }

    /// Whether `raw` looks like a registry address rather than a plain name
    pub fn is_address(raw: &str) -> bool {
        Self::parse(raw).is_ok()
    }

    pub fn tag_or_latest(&self) -> &str {
        self.tag.as_deref().unwrap_or(LATEST_TAG)
    }

    /// Cache key; an omitted tag and `latest` share one entry
    pub fn cache_key(&self) -> String {
        format!("{}/{}:{}", self.owner, self.name, self.tag_or_latest())
    }
}

impl fmt::Display for ScriptAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Import {
        address: ScriptAddress,
        params: IndexMap<String, serde_json::Value>,
        /// Set when the parameter object could not be read and was dropped
        params_warning: Option<String>,
    },
    Load {
        source: String,
    },
    Component {
        target: String,
    },
}

impl Directive {
    pub fn is_import(&self) -> bool {
        matches!(self, Directive::Import { .. })
    }
}

/// Every directive call in a program, in source order
///
/// Calls whose arguments cannot be read statically come back as
/// `DirectiveParse` errors so the caller can report them.
pub fn find_directives(program: &Program) -> Vec<Result<Directive>> {
    let mut found = Vec::new();
    walk_stmts(&program.body, &mut |expr| {
        if let Expr::Call { callee, args } = expr {
            match callee.as_ident() {
                Some(IMPORT) => found.push(import_directive(args)),
                Some(LOAD) => found.push(string_arg(LOAD, args).map(|source| Directive::Load { source })),
                Some(COMPONENT) => {
                    found.push(string_arg(COMPONENT, args).map(|target| Directive::Component { target }))
                }
                _ => {}
            }
        }
    });
    found
}

fn string_arg(directive: &str, args: &[Expr]) -> Result<String> {
    match args.first() {
        Some(Expr::Str(value)) => Ok(value.clone()),
        Some(_) => Err(ScriptError::directive(directive, "first argument must be a string literal")),
        None => Err(ScriptError::directive(directive, "missing argument")),
    }
}

fn import_directive(args: &[Expr]) -> Result<Directive> {
    let raw = string_arg(IMPORT, args)?;
    let address = ScriptAddress::parse(&raw).map_err(|e| match e {
        ScriptError::DirectiveParse { message, .. } => {
            ScriptError::directive(IMPORT, format!("'{raw}': {message}"))
        }
        other => other,
    })?;
    let (params, params_warning) = match args.get(1) {
        None | Some(Expr::Undefined) | Some(Expr::Null) => (IndexMap::new(), None),
        Some(expr) => match expr.to_literal_json() {
            Some(serde_json::Value::Object(map)) => (map.into_iter().collect(), None),
            _ => (
                IndexMap::new(),
                Some(format!(
                    "parameters of import '{address}' are not a literal object; importing with defaults"
                )),
            ),
        },
    };
    Ok(Directive::Import {
        address,
        params,
        params_warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::parse_program;

    fn directives(source: &str) -> Vec<Result<Directive>> {
        match parse_program(source) {
            Ok(program) => find_directives(&program),
            Err(err) => panic!("parse failed: {err}"),
        }
    }

    #[test]
    fn test_address_parsing() -> Result<()> {
        let address = ScriptAddress::parse("polyframe/Frame:v2")?;
        assert_eq!(address.owner, "polyframe");
        assert_eq!(address.tag_or_latest(), "v2");
        assert_eq!(address.to_string(), "polyframe/Frame:v2");

        let latest = ScriptAddress::parse("polyframe/Frame")?;
        assert_eq!(latest.cache_key(), "polyframe/Frame:latest");

        assert!(ScriptAddress::parse("Frame").is_err());
        assert!(ScriptAddress::parse("/Frame").is_err());
        assert!(ScriptAddress::parse("a/b:").is_err());
        assert!(ScriptAddress::parse("a = 1/2").is_err());
        assert!(ScriptAddress::parse("acme/Frame/extra").is_err());
        Ok(())
    }

    #[test]
    fn test_import_with_nested_literal_params() {
        let found = directives("frame = $import(\"acme/Frame\", { width: 1200, label: 'a,b}', size: { h: 3 } })");
        match found.as_slice() {
            [Ok(Directive::Import { address, params, params_warning })] => {
                assert_eq!(address.name, "Frame");
                assert_eq!(params.get("label"), Some(&serde_json::json!("a,b}")));
                assert_eq!(params.get("size"), Some(&serde_json::json!({"h": 3})));
                assert!(params_warning.is_none());
            }
            other => panic!("unexpected directives: {other:?}"),
        }
    }

    #[test]
    fn test_computed_params_degrade_to_empty() {
        let found = directives("$import('acme/Frame', { width: w * 2 })");
        match found.as_slice() {
            [Ok(Directive::Import { params, params_warning, .. })] => {
                assert!(params.is_empty());
                assert!(params_warning.is_some());
            }
            other => panic!("unexpected directives: {other:?}"),
        }
    }

    #[test]
    fn test_load_and_component_discovery() {
        let found = directives(
            "const data = $load('https://example.com/a.csv')\nfunction f() { return $component('Frame').model() }\n$load(path)",
        );
        assert_eq!(found.len(), 3);
        assert!(matches!(&found[0], Ok(Directive::Load { source }) if source == "https://example.com/a.csv"));
        assert!(matches!(&found[1], Ok(Directive::Component { target }) if target == "Frame"));
        assert!(matches!(&found[2], Err(ScriptError::DirectiveParse { .. })));
    }
}
