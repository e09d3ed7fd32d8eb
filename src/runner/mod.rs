// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script execution: runner, run context, host bindings and components

pub mod bindings;
pub mod builtins;
mod component;
mod context;
mod executor;
mod request;
mod result;

pub use component::{
    component_outputs, primary_pipeline, ComponentBuilder, ComponentPipeline, ImportComponentResult,
    DEFAULT_COMPONENT_OUTPUT,
};
pub use context::{EntityOutputs, RunContext};
pub use executor::{Runner, RunnerBuilder};
pub use request::{ExecutionMode, ExecutionRequest};
pub use result::{ExecutionResult, ExecutionStatus, PipelineResult, RunError, RunInfo};

/// Pipeline that always runs
pub const DEFAULT_PIPELINE: &str = "default";
