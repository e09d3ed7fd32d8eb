// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Host modules installed into every run's global scope

use super::bindings::{CollectionObject, GeomModule};
use super::component::ComponentBuilder;
use super::DEFAULT_PIPELINE;
use crate::ast::{HostObject, Interpreter, Value};
use crate::error::{Result, ScriptError};
use crate::geometry::ShapeCollection;
use crate::params::ParamsObject;
use crate::script::{COMPONENT, IMPORT, INERT_IMPORT, LOAD};
use indexmap::IndexMap;
use serde_json::Value as Json;
use std::sync::Arc;
use tracing::debug;

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn module(entries: Vec<(&str, Value)>) -> Value {
    Value::object(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

/// Join `print` arguments the way a browser console does
fn format_message(args: &[Value]) -> String {
    args.iter().map(Value::inspect).collect::<Vec<_>>().join(" ")
}

fn print(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    interp.ctx.message(format_message(&args));
    Ok(Value::Undefined)
}

fn geom_call(interp: &mut Interpreter, method: &str, args: Vec<Value>) -> Result<Value> {
    Arc::new(GeomModule).call_method(interp, method, args)
}

fn entity_name(args: &[Value], what: &str) -> Result<String> {
    match arg(args, 0) {
        Value::Str(name) if !name.is_empty() => Ok(name.to_string()),
        other => Err(ScriptError::runtime(format!(
            "{what}: expected a name as first argument, got {}",
            other.inspect()
        ))),
    }
}

fn store(entities: &mut IndexMap<String, Json>, name: String, value: &Value) -> Value {
    entities.insert(name, value.to_json());
    value.clone()
}

fn calc() -> Value {
    module(vec![
        ("table", Value::native("table", |interp, args| {
            let name = entity_name(&args, "calc.table")?;
            Ok(store(&mut interp.ctx.entities.tables, name, &arg(&args, 1)))
        })),
        ("metric", Value::native("metric", |interp, args| {
            let name = entity_name(&args, "calc.metric")?;
            Ok(store(&mut interp.ctx.entities.metrics, name, &arg(&args, 1)))
        })),
    ])
}

fn doc() -> Value {
    module(vec![("create", Value::native("create", |interp, args| {
        let name = entity_name(&args, "doc.create")?;
        Ok(store(&mut interp.ctx.entities.docs, name, &arg(&args, 1)))
    }))])
}

/// Text of a preloaded asset; `undefined` with a warning when missing
fn load(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let source = arg(&args, 0).to_display();
    let asset = interp.ctx.runner.as_ref().and_then(|r| r.resolver().asset(&source));
    match asset {
        Some(Ok(text)) => Ok(Value::from(text.as_str())),
        Some(Err(e)) => {
            interp.ctx.warn(format!("{LOAD}: {e}"));
            Ok(Value::Undefined)
        }
        None => {
            interp.ctx.warn(format!("{LOAD}: asset '{source}' was not preloaded"));
            Ok(Value::Undefined)
        }
    }
}

fn console() -> Value {
    module(vec![
        ("log", Value::native("log", print)),
        ("info", Value::native("info", print)),
        ("warn", Value::native("warn", |interp, args| {
            interp.ctx.message(format!("warning: {}", format_message(&args)));
            Ok(Value::Undefined)
        })),
        ("error", Value::native("error", |interp, args| {
            interp.ctx.message(format!("error: {}", format_message(&args)));
            Ok(Value::Undefined)
        })),
    ])
}

/// `pipeline(name, fn)`: the default pipeline runs in place, others on request
fn pipeline(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let name = entity_name(&args, "pipeline")?;
    let body = arg(&args, 1);
    if !body.is_callable() {
        return Err(ScriptError::runtime(format!("pipeline '{name}': expected a function")));
    }
    if name == DEFAULT_PIPELINE {
        return interp.call(&body, Vec::new());
    }
    debug!(pipeline = %name, "declared pipeline");
    interp.ctx.pipelines.insert(name, body);
    Ok(Value::Undefined)
}

fn component(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let target = match arg(&args, 0) {
        Value::Str(target) => target.to_string(),
        other => {
            return Err(ScriptError::directive(
                COMPONENT,
                format!("expected a component name, got {}", other.inspect()),
            ))
        }
    };
    let params = match arg(&args, 1).to_json() {
        Json::Object(map) => map.into_iter().collect(),
        Json::Null => IndexMap::new(),
        other => {
            return Err(ScriptError::directive(
                COMPONENT,
                format!("parameters must be an object, got {other}"),
            ))
        }
    };
    Ok(Value::host(ComponentBuilder::new(target, params)))
}

/// Stand-in for an import that could not be resolved
fn inert_import(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value> {
    let target = args.first().map(Value::to_display).unwrap_or_default();
    interp.ctx.warn(format!("{IMPORT}('{target}') is unresolved and produced no shapes"));
    Ok(CollectionObject::value(ShapeCollection::new()))
}

/// Install the host modules into the interpreter's global scope
pub fn install(interp: &Interpreter) {
    interp.define_global("geom", Value::host(GeomModule));
    interp.define_global("box", Value::native("box", |i, a| geom_call(i, "box", a)));
    interp.define_global("sphere", Value::native("sphere", |i, a| geom_call(i, "sphere", a)));
    interp.define_global("cylinder", Value::native("cylinder", |i, a| geom_call(i, "cylinder", a)));
    interp.define_global("all", Value::native("all", |i, a| geom_call(i, "all", a)));

    interp.define_global("calc", calc());
    interp.define_global("doc", doc());
    interp.define_global("io", module(vec![("load", Value::native("load", load))]));
    interp.define_global("console", console());
    interp.define_global("print", Value::native("print", print));
    interp.define_global("log", Value::native("log", print));
    interp.define_global("pipeline", Value::native("pipeline", pipeline));

    interp.define_global(COMPONENT, Value::native("$component", component));
    interp.define_global(IMPORT, Value::native("$import", inert_import));
    interp.define_global(INERT_IMPORT, Value::native("$importUnresolved", inert_import));
    interp.define_global(LOAD, Value::native("$load", load));
    interp.define_global("$PARAMS", Value::host(ParamsObject::new(interp.ctx.params.clone())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::parse_program;
    use crate::runner::RunContext;

    fn run(source: &str) -> Result<(Value, Interpreter)> {
        let program = parse_program(source).map_err(|e| ScriptError::runtime(e.to_string()))?;
        let mut interp = Interpreter::new(RunContext::detached());
        install(&interp);
        let value = interp.run_program(&program)?;
        Ok((value, interp))
    }

    #[test]
    fn test_print_and_console_go_to_messages_in_order() -> Result<()> {
        let (_, interp) = run("print('a', 1); console.log({x: 2}); console.warn('careful'); log([1, 2])")?;
        assert_eq!(
            interp.ctx.messages,
            vec!["a 1", "{\"x\":2}", "warning: careful", "[1,2]"]
        );
        Ok(())
    }

    #[test]
    fn test_calc_and_doc_record_entities() -> Result<()> {
        let (_, interp) = run(
            "calc.table('parts', [{part: 'wall', qty: 1}]); calc.metric('area', 12.5); doc.create('datasheet', {title: 'x'})",
        )?;
        let entities = &interp.ctx.entities;
        assert_eq!(entities.tables["parts"][0]["qty"], 1);
        assert_eq!(entities.metrics["area"], 12.5);
        assert_eq!(entities.docs["datasheet"]["title"], "x");
        assert!(run("calc.table(5, [])").is_err());
        Ok(())
    }

    #[test]
    fn test_default_pipeline_runs_in_place_and_named_is_deferred() -> Result<()> {
        let (_, interp) = run("pipeline('default', () => box(1, 1, 1)); pipeline('cnc', () => box(2, 2, 2))")?;
        assert_eq!(interp.ctx.geom.all_shapes().len(), 1);
        assert!(interp.ctx.pipelines.contains_key("cnc"));
        assert!(run("pipeline('x', 5)").is_err());
        Ok(())
    }

    #[test]
    fn test_inert_import_warns_and_yields_empty_collection() -> Result<()> {
        let (value, interp) = run("$import('acme/bracket').length")?;
        assert_eq!(value.to_number(), 0.0);
        assert_eq!(interp.ctx.warnings.len(), 1);
        Ok(())
    }

    #[test]
    fn test_load_without_runner_is_undefined() -> Result<()> {
        let (value, interp) = run("$load('data.csv') === undefined")?;
        assert!(value.truthy());
        assert!(interp.ctx.warnings[0].contains("data.csv"));
        Ok(())
    }

    #[test]
    fn test_component_needs_a_runner() {
        let err = run("$component('Frame').model()");
        assert!(matches!(err, Err(ScriptError::ComponentExecution { .. })));
        assert!(matches!(run("$component(42)"), Err(ScriptError::DirectiveParse { .. })));
    }
}
