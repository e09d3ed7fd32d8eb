// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Per-run state threaded through the interpreter
//!
//! Built-ins are plain function pointers; everything they touch lives here
//! and is reached through `interp.ctx`.

use super::Runner;
use crate::ast::Value;
use crate::geometry::{Geom, GeometryKernel, MeshKernel};
use crate::params::{ParamManager, ParamManagerRef};
use indexmap::IndexMap;
use serde_json::Value as Json;
use std::sync::Arc;
use tracing::warn;

/// Tables, docs and metrics created by the running pipeline
#[derive(Debug, Clone, Default)]
pub struct EntityOutputs {
    pub metrics: IndexMap<String, Json>,
    pub tables: IndexMap<String, Json>,
    pub docs: IndexMap<String, Json>,
}

#[derive(Debug)]
pub struct RunContext {
    pub geom: Geom,
    pub params: ParamManagerRef,
    /// Output of `print` and `console.*`, in call order
    pub messages: Vec<String>,
    pub warnings: Vec<String>,
    pub entities: EntityOutputs,
    /// Named pipelines declared with `pipeline(name, fn)`
    pub pipelines: IndexMap<String, Value>,
    /// Owning runner; `None` for detached interpreters
    pub runner: Option<Runner>,
    /// Component nesting level, 0 for a top-level run
    pub depth: usize,
    pub component: Option<String>,
}

impl RunContext {
    pub fn new(kernel: Arc<dyn GeometryKernel>, params: ParamManager) -> Self {
        Self {
            geom: Geom::new(kernel),
            params: params.into_ref(),
            messages: Vec::new(),
            warnings: Vec::new(),
            entities: EntityOutputs::default(),
            pipelines: IndexMap::new(),
            runner: None,
            depth: 0,
            component: None,
        }
    }

    /// Context without a runner: no components, no preloaded assets
    pub fn detached() -> Self {
        Self::new(Arc::new(MeshKernel::new()), ParamManager::default())
    }

    pub fn with_runner(mut self, runner: Runner, depth: usize, component: Option<String>) -> Self {
        self.runner = Some(runner);
        self.depth = depth;
        self.component = component;
        self
    }

    /// Fallback for identifiers with no binding in scope
    ///
    /// `$NAME` reads the current value of parameter `NAME`.
    pub fn resolve_unbound(&self, name: &str) -> Option<Value> {
        self.params.read().binding(name).map(|json| Value::from_json(&json))
    }

    pub fn message(&mut self, text: impl Into<String>) {
        self.messages.push(text.into());
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        let text = text.into();
        warn!(component = ?self.component, "{text}");
        self.warnings.push(text);
    }
}
