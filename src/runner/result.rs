// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Execution results

use crate::error::ScriptError;
use crate::geometry::{BoundingBox, ObjTree};
use crate::output::{Category, PipelineMeta, ScriptMeta, ScriptOutput};
use crate::params::ManagedParams;
use crate::script::ImportStatement;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as Json;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Success,
    Error,
}

/// A fatal-class error with the statement it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunError {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl RunError {
    pub fn new(error: &ScriptError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
            line: None,
            code: None,
        }
    }

    pub fn at(mut self, line: usize, code: &str) -> Self {
        self.line = Some(line);
        self.code = Some(code.to_string());
        self
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Raw outputs of one pipeline
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineResult {
    pub model: ObjTree,
    pub metrics: IndexMap<String, Json>,
    pub tables: IndexMap<String, Json>,
    pub docs: IndexMap<String, Json>,
}

impl PipelineResult {
    pub fn entities(&self, category: Category) -> Option<&IndexMap<String, Json>> {
        match category {
            Category::Model => None,
            Category::Metrics => Some(&self.metrics),
            Category::Tables => Some(&self.tables),
            Category::Docs => Some(&self.docs),
        }
    }

    pub fn entity(&self, category: Category, name: &str) -> Option<&Json> {
        self.entities(category).and_then(|e| e.get(name))
    }

    /// Entity names, as used for wildcard resolution
    pub fn meta(&self) -> PipelineMeta {
        let names = |m: &IndexMap<String, Json>| m.keys().cloned().collect();
        PipelineMeta {
            metrics: names(&self.metrics),
            tables: names(&self.tables),
            docs: names(&self.docs),
        }
    }
}

/// Summary of the main scene
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunInfo {
    pub shape_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub errors: Vec<RunError>,
    pub warnings: Vec<String>,
    /// Output of `print` and `console.*`, in call order
    pub messages: Vec<String>,
    pub duration_ms: u64,
    pub meta: ScriptMeta,
    #[serde(skip)]
    pub pipelines: IndexMap<String, PipelineResult>,
    pub outputs: Vec<ScriptOutput>,
    pub managed_params: ManagedParams,
    pub info: RunInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<ImportStatement>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn push_error(&mut self, error: RunError) {
        self.status = ExecutionStatus::Error;
        self.errors.push(error);
    }

    /// Payload produced for a resolved output path
    pub fn output(&self, path: &str) -> Option<&ScriptOutput> {
        self.outputs.iter().find(|o| o.path == path)
    }
}
