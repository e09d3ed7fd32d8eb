// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Execution requests

use crate::params::Param;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// How the statements of a script are driven
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One program per statement; runtime errors are recorded and skipped
    #[default]
    Statements,
    /// The whole script as one program; the first error ends the run
    Script,
}

/// One script execution attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,
    #[serde(default = "default_script_name")]
    pub script_name: String,
    /// Parameter values by name
    #[serde(default)]
    pub params: IndexMap<String, Json>,
    /// Parameter schema the values are checked against
    #[serde(default)]
    pub param_definitions: Vec<Param>,
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Target component when this is a nested run
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub mode: ExecutionMode,
}

fn default_script_name() -> String {
    "main".to_string()
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            script_name: default_script_name(),
            params: IndexMap::new(),
            param_definitions: Vec::new(),
            outputs: Vec::new(),
            component: None,
            mode: ExecutionMode::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.script_name = name.into();
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_params(mut self, params: IndexMap<String, Json>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Json>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_param_definitions(mut self, definitions: Vec<Param>) -> Self {
        self.param_definitions = definitions;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn for_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}
