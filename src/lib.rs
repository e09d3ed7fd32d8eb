// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe script runner
//!
//! Runs parametric CAD scripts: splits them into statements, resolves
//! `$import`, `$load` and `$component` directives, executes the result
//! against a mesh geometry kernel and routes what the script produced to
//! output paths such as `default/model/glb` or `default/tables/*/json`.

pub mod ast;
pub mod cli;
pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod output;
pub mod params;
pub mod runner;
pub mod script;

pub use config::RunnerConfig;
pub use error::{Result, ScriptError};
pub use output::{ScriptMeta, ScriptOutputManager, ScriptOutputPath};
pub use runner::{ExecutionMode, ExecutionRequest, ExecutionResult, ExecutionStatus, Runner};
pub use script::{Statement, StatementParser};

/// Run `code` once with the default configuration and collaborators
pub async fn run_script<I, S>(code: &str, outputs: I) -> ExecutionResult
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Runner::new(RunnerConfig::new())
        .execute(ExecutionRequest::new(code).with_outputs(outputs))
        .await
}
