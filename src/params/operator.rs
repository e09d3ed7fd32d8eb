// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script-facing parameter objects
//!
//! `$PARAMS` is a [`ParamsObject`]; `$PARAMS.NAME` yields a [`ParamOperator`]
//! bound to one parameter of the run's [`ParamManager`](super::ParamManager).

use super::{Param, ParamManagerRef, ParamType, PARAM_SIGNIFIER};
use crate::ast::{HostObject, Interpreter, Value};
use crate::error::{Result, ScriptError};
use serde_json::Value as Json;
use std::any::Any;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ParamsObject {
    manager: ParamManagerRef,
}

impl ParamsObject {
    pub fn new(manager: ParamManagerRef) -> Self {
        Self { manager }
    }
}

impl HostObject for ParamsObject {
    fn type_name(&self) -> &'static str {
        "ParamManager"
    }

    fn get(&self, _interp: &mut Interpreter, key: &str) -> Result<Value> {
        let name = key.trim_start_matches(PARAM_SIGNIFIER);
        if self.manager.read().get(name).is_none() {
            return Ok(Value::Undefined);
        }
        Ok(Value::host(ParamOperator {
            manager: self.manager.clone(),
            name: name.to_uppercase(),
        }))
    }

    fn call_method(self: Arc<Self>, _interp: &mut Interpreter, name: &str, args: Vec<Value>) -> Result<Value> {
        match name {
            "define" | "addParam" => {
                let json = args.first().map(Value::to_json).unwrap_or(Json::Null);
                let param: Param = serde_json::from_value(json).map_err(|e| {
                    ScriptError::runtime(format!(
                        "ParamManager: invalid param definition ({e}); expected {{ name, type, ?default }}"
                    ))
                })?;
                if param.name.is_empty() {
                    return Err(ScriptError::runtime("ParamManager: param definition needs a name"));
                }
                let operation = self.manager.write().define(param);
                Ok(operation
                    .and_then(|op| serde_json::to_value(op).ok())
                    .map(|op| Value::from_json(&op))
                    .unwrap_or(Value::Null))
            }
            "delete" => {
                let target = args.first().map(Value::to_display).unwrap_or_default();
                Ok(Value::Bool(self.manager.write().delete(&target)))
            }
            "names" => Ok(Value::array(
                self.manager.read().params().map(|p| Value::from(p.name.as_str())).collect(),
            )),
            _ => Err(ScriptError::runtime(format!("$PARAMS.{name} is not a function"))),
        }
    }

    fn to_json(&self) -> Json {
        Json::Object(
            self.manager
                .read()
                .params()
                .map(|p| (p.name.clone(), p.current().clone()))
                .collect(),
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Operator on a single parameter
#[derive(Debug, Clone)]
pub struct ParamOperator {
    manager: ParamManagerRef,
    name: String,
}

impl ParamOperator {
    fn param(&self) -> Result<Param> {
        self.manager
            .read()
            .get(&self.name)
            .cloned()
            .ok_or_else(|| ScriptError::runtime(format!("ParamManager: param '{}' was deleted", self.name)))
    }

    fn update(&self, f: impl FnOnce(&mut Param) -> Result<()>) -> Result<()> {
        self.manager.write().update(&self.name, f)
    }
}

fn flag(args: &[Value]) -> bool {
    args.first().map(Value::truthy).unwrap_or(false)
}

impl HostObject for ParamOperator {
    fn type_name(&self) -> &'static str {
        "ParamManagerOperator"
    }

    fn get(&self, _interp: &mut Interpreter, key: &str) -> Result<Value> {
        let param = self.param()?;
        Ok(match key {
            "value" => Value::from_json(param.current()),
            "name" => Value::from(param.name.as_str()),
            "type" => Value::from(param.param_type.to_string()),
            "default" => Value::from_json(&param.default),
            "visible" => Value::Bool(param.visible),
            "enabled" => Value::Bool(param.enabled),
            "start" | "min" => param.start.map(Value::Number).unwrap_or_default(),
            "end" | "max" => param.end.map(Value::Number).unwrap_or_default(),
            "step" => param.step.map(Value::Number).unwrap_or_default(),
            "options" => Value::array(param.options.iter().map(Value::from_json).collect()),
            _ => Value::Undefined,
        })
    }

    fn call_method(self: Arc<Self>, _interp: &mut Interpreter, name: &str, args: Vec<Value>) -> Result<Value> {
        let arg = args.first().cloned().unwrap_or_default();
        match name {
            "set" => {
                let value = arg.to_json();
                self.update(|p| {
                    if !p.accepts(&value) {
                        return Err(ScriptError::runtime(format!(
                            "ParamManager: value {value} does not fit param '{}' of type {}",
                            p.name, p.param_type
                        )));
                    }
                    p.value = value.clone();
                    Ok(())
                })?;
                Ok(arg)
            }
            "push" => {
                let value = arg.to_json();
                self.update(|p| {
                    if p.param_type != ParamType::List {
                        return Err(ScriptError::runtime(format!(
                            "ParamManager: param '{}' is not a list",
                            p.name
                        )));
                    }
                    if let Some(elem) = &p.list_elem {
                        if !elem.accepts(&value) {
                            return Err(ScriptError::runtime(format!(
                                "ParamManager: {value} is not a valid {} list element",
                                elem.param_type
                            )));
                        }
                    }
                    let mut items = p.current().as_array().cloned().unwrap_or_default();
                    if items.last() != Some(&value) {
                        items.push(value.clone());
                    }
                    p.value = Json::Array(items);
                    Ok(())
                })?;
                Ok(arg)
            }
            "visible" | "hide" | "visibleIf" => {
                let visible = match name {
                    "visible" => true,
                    "hide" => false,
                    _ => flag(&args),
                };
                self.update(|p| {
                    p.visible = visible;
                    Ok(())
                })?;
                Ok(Value::Host(self))
            }
            "enable" | "disable" | "enableIf" => {
                let enabled = match name {
                    "enable" => true,
                    "disable" => false,
                    _ => flag(&args),
                };
                info!(param = %self.name, enabled, "param enabled state changed");
                self.update(|p| {
                    p.enabled = enabled;
                    Ok(())
                })?;
                Ok(Value::Host(self))
            }
            _ => Err(ScriptError::runtime(format!(
                "$PARAMS.{}.{name} is not a function",
                self.name
            ))),
        }
    }

    fn to_json(&self) -> Json {
        self.param()
            .ok()
            .and_then(|p| serde_json::to_value(p).ok())
            .unwrap_or(Json::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
