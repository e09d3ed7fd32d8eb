// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Lexical scopes

use super::Value;
use crate::error::{Result, ScriptError};
use ahash::AHashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

pub type ScopeRef = Arc<RwLock<Scope>>;

#[derive(Clone)]
struct Binding {
    value: Value,
    constant: bool,
}

/// One level of variable bindings
///
/// Function scopes are boundaries: `var` declarations hoist to the nearest
/// one, and the global scope is always a boundary.
pub struct Scope {
    vars: AHashMap<String, Binding>,
    parent: Option<ScopeRef>,
    function_boundary: bool,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("vars", &self.vars.len())
            .field("function_boundary", &self.function_boundary)
            .finish()
    }
}

impl Scope {
    pub fn global() -> ScopeRef {
        Arc::new(RwLock::new(Self {
            vars: AHashMap::new(),
            parent: None,
            function_boundary: true,
        }))
    }

    pub fn child(parent: &ScopeRef, function_boundary: bool) -> ScopeRef {
        Arc::new(RwLock::new(Self {
            vars: AHashMap::new(),
            parent: Some(parent.clone()),
            function_boundary,
        }))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Bind `name` in this scope, replacing any previous binding here
    pub fn declare(&mut self, name: impl Into<String>, value: Value, constant: bool) {
        self.vars.insert(name.into(), Binding { value, constant });
    }

    /// Drop every binding; breaks closure reference cycles at the end of a run
    pub fn clear(&mut self) {
        self.vars.clear();
    }
}

/// Resolve a name through the scope chain
pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
    let mut current = scope.clone();
    loop {
        let next = {
            let guard = current.read();
            if let Some(binding) = guard.vars.get(name) {
                return Some(binding.value.clone());
            }
            guard.parent.clone()
        };
        current = next?;
    }
}

/// Assign to an existing binding; undeclared names become globals
pub fn assign(scope: &ScopeRef, name: &str, value: Value) -> Result<()> {
    let mut current = scope.clone();
    loop {
        let next = {
            let mut guard = current.write();
            if let Some(binding) = guard.vars.get_mut(name) {
                if binding.constant {
                    return Err(ScriptError::runtime(format!(
                        "Assignment to constant variable '{name}'"
                    )));
                }
                binding.value = value;
                return Ok(());
            }
            match guard.parent.clone() {
                Some(parent) => parent,
                None => {
                    guard.declare(name, value, false);
                    return Ok(());
                }
            }
        };
        current = next;
    }
}

/// Nearest enclosing function scope, used for `var`
pub fn function_scope(scope: &ScopeRef) -> ScopeRef {
    let mut current = scope.clone();
    loop {
        let next = {
            let guard = current.read();
            if guard.function_boundary {
                None
            } else {
                guard.parent.clone()
            }
        };
        match next {
            Some(parent) => current = parent,
            None => return current,
        }
    }
}
