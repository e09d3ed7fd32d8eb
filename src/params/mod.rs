// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script parameters

mod manager;
mod operator;
mod param;

pub use manager::{ManagedParams, ParamManager, ParamManagerRef, ParamOperation, PARAM_SIGNIFIER};
pub use operator::{ParamOperator, ParamsObject};
pub use param::{Param, ParamType};
