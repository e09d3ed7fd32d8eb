// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! `$component(name, params)` builders and their results
//!
//! A builder runs the component script as a nested run of the same runner
//! each time `get`, `model` or `all` is called. The nested run exchanges live
//! data through `internal` outputs; its model trees are rebuilt inside the
//! caller's scene with shapes re-owned by the caller's geometry context.

use super::bindings::{BboxObject, CollectionObject, SceneObject};
use super::request::ExecutionRequest;
use super::result::ExecutionResult;
use super::DEFAULT_PIPELINE;
use crate::ast::{HostObject, Interpreter, Value};
use crate::error::{Result, ScriptError};
use crate::geometry::{BoundingBox, Geom, ObjRef, ShapeCollection, ShapeRef};
use crate::output::{Category, OutputData, ScriptOutputPath};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{json, Value as Json};
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, info};

/// Output requested when a component call names none
pub const DEFAULT_COMPONENT_OUTPUT: &str = "default/model/internal";

/// Object literal argument as parameter values
fn param_values(value: &Value) -> Result<IndexMap<String, Json>> {
    match value.to_json() {
        Json::Object(map) => Ok(map.into_iter().collect()),
        Json::Null => Ok(IndexMap::new()),
        other => Err(ScriptError::runtime(format!(
            "$component: parameters must be an object, got {other}"
        ))),
    }
}

/// Expand the short forms a component `get` accepts
///
/// `model` and `tables` name a category of the default pipeline,
/// `tables/parts` a category and entity of it, and `cnc/model` a pipeline
/// and category. A leading category name wins over a pipeline of that name.
fn expand_component_path(raw: &str) -> String {
    let raw = raw.trim();
    let is_category = |segment: &str| segment.parse::<Category>().ok();
    let segments: Vec<&str> = raw.split('/').collect();
    match segments.as_slice() {
        [single] => match is_category(single) {
            Some(Category::Model) => format!("{DEFAULT_PIPELINE}/model/internal"),
            Some(category) => format!("{DEFAULT_PIPELINE}/{category}/*/internal"),
            None => raw.to_string(),
        },
        [first, entity] => match is_category(first) {
            Some(category) => format!("{DEFAULT_PIPELINE}/{category}/{entity}/internal"),
            None if *entity == "*" => raw.to_string(),
            None => format!("{raw}/internal"),
        },
        _ => raw.to_string(),
    }
}

/// Internalized output paths for a component request
///
/// Short forms are expanded first since the format is forced anyway.
/// Invalid paths are skipped with a warning.
pub fn component_outputs(requested: &[String], warnings: &mut Vec<String>) -> Vec<String> {
    let mut outputs = Vec::new();
    for raw in requested {
        let mut path = ScriptOutputPath::parse(&expand_component_path(raw));
        if !path.valid {
            warnings.push(format!(
                "$component: invalid output path '{raw}': {}. Skipped!",
                path.error().unwrap_or("unknown error")
            ));
            continue;
        }
        outputs.push(path.internalize().to_string());
    }
    if outputs.is_empty() {
        outputs.push(DEFAULT_COMPONENT_OUTPUT.to_string());
    }
    outputs
}

/// Pipeline a component result exposes at top level
///
/// The only pipeline when there is one, otherwise the one named `default`.
pub fn primary_pipeline<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let names: Vec<&str> = names.into_iter().collect();
    match names.as_slice() {
        [only] => Some(only),
        _ => names.into_iter().find(|n| *n == DEFAULT_PIPELINE),
    }
}

/// Builder returned by `$component`
#[derive(Debug)]
pub struct ComponentBuilder {
    target: String,
    params: RwLock<IndexMap<String, Json>>,
}

impl ComponentBuilder {
    pub fn new(target: impl Into<String>, params: IndexMap<String, Json>) -> Self {
        Self {
            target: target.into(),
            params: RwLock::new(params),
        }
    }

    /// Run the component as a nested run and rehost what it produced
    pub fn execute(&self, interp: &mut Interpreter, requested: &[String]) -> Result<Value> {
        let fail = |errors: Vec<String>| ScriptError::ComponentExecution {
            component: self.target.clone(),
            errors,
        };
        let runner = interp
            .ctx
            .runner
            .clone()
            .ok_or_else(|| fail(vec!["components are not available in a detached interpreter".into()]))?;

        let depth = interp.ctx.depth + 1;
        let limit = runner.config().max_component_depth;
        if depth > limit {
            return Err(fail(vec![format!("maximum component depth of {limit} exceeded")]));
        }

        let script = runner
            .resolver()
            .component_script(&self.target)
            .map_err(|e| fail(vec![e.to_string()]))?;
        let name = script.display_name().to_string();

        let mut warnings = Vec::new();
        let outputs = component_outputs(requested, &mut warnings);
        for warning in warnings {
            interp.ctx.warn(warning);
        }

        let request = ExecutionRequest::new(script.code.clone())
            .named(name.clone())
            .with_param_definitions(script.param_list())
            .with_params(self.params.read().clone())
            .with_outputs(outputs)
            .for_component(self.target.clone());
        info!(component = %name, depth, "running component");
        let result = runner.execute_nested(request, depth);

        for message in &result.messages {
            interp.ctx.message(message.clone());
        }
        for warning in &result.warnings {
            interp.ctx.warn(format!("component '{name}': {warning}"));
        }
        if !result.is_success() {
            return Err(ScriptError::ComponentExecution {
                component: name,
                errors: result.error_messages(),
            });
        }
        let imported = ImportComponentResult::from_result(&result, &mut interp.ctx.geom, &name);
        Ok(Value::host(imported))
    }
}

impl HostObject for ComponentBuilder {
    fn type_name(&self) -> &'static str {
        "ComponentBuilder"
    }

    fn get(&self, _interp: &mut Interpreter, key: &str) -> Result<Value> {
        Ok(match key {
            "name" => Value::from(self.target.as_str()),
            _ => Value::Undefined,
        })
    }

    fn call_method(self: Arc<Self>, interp: &mut Interpreter, name: &str, args: Vec<Value>) -> Result<Value> {
        match name {
            "params" => {
                let values = param_values(&args.first().cloned().unwrap_or_default())?;
                self.params.write().extend(values);
                Ok(Value::Host(self))
            }
            "get" => {
                let requested = match args.first() {
                    Some(Value::Array(items)) => items.read().iter().map(Value::to_display).collect(),
                    Some(Value::Undefined) | None => Vec::new(),
                    Some(other) => vec![other.to_display()],
                };
                self.execute(interp, &requested)
            }
            "model" => self.execute(interp, &[DEFAULT_COMPONENT_OUTPUT.to_string()]),
            "all" => self.execute(interp, &[format!("{DEFAULT_PIPELINE}/*")]),
            _ => Err(ScriptError::runtime(format!("$component(...).{name} is not a function"))),
        }
    }

    fn to_json(&self) -> Json {
        json!({ "component": self.target, "params": *self.params.read() })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Outputs of one pipeline of a component run, rehosted in the caller
#[derive(Debug, Clone, Default)]
pub struct ComponentPipeline {
    pub model: Option<ObjRef>,
    pub metrics: IndexMap<String, Json>,
    pub tables: IndexMap<String, Json>,
    pub docs: IndexMap<String, Json>,
}

impl ComponentPipeline {
    fn entities_value(entities: &IndexMap<String, Json>) -> Value {
        Value::from_json(&Json::Object(
            entities.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        ))
    }

    fn property(&self, key: &str) -> Value {
        match key {
            "model" => self.model.clone().map(SceneObject::value).unwrap_or_default(),
            "metrics" => Self::entities_value(&self.metrics),
            "tables" => Self::entities_value(&self.tables),
            "docs" => Self::entities_value(&self.docs),
            _ => Value::Undefined,
        }
    }

    fn to_value(&self) -> Value {
        Value::object(
            ["model", "metrics", "tables", "docs"]
                .into_iter()
                .map(|k| (k.to_string(), self.property(k)))
                .collect(),
        )
    }

    fn shapes(&self) -> Vec<ShapeRef> {
        self.model.as_ref().map(|m| m.read().all_shapes()).unwrap_or_default()
    }
}

/// What `$component(...).get()` returns to the script
#[derive(Debug, Clone, Default)]
pub struct ImportComponentResult {
    pub name: String,
    pub success: bool,
    pub errors: Vec<String>,
    pub pipelines: IndexMap<String, ComponentPipeline>,
    pub primary: Option<String>,
}

impl ImportComponentResult {
    /// Reshape a nested result and rehost its models into `geom`
    pub fn from_result(result: &ExecutionResult, geom: &mut Geom, name: &str) -> Self {
        let mut pipelines: IndexMap<String, ComponentPipeline> = IndexMap::new();
        for output in &result.outputs {
            let path = ScriptOutputPath::parse(&output.path);
            let (Some(pipeline), Some(category)) = (path.pipeline_name(), path.category()) else {
                continue;
            };
            let entry = pipelines.entry(pipeline.to_string()).or_default();
            match (category, &output.data, path.entity_name()) {
                (Category::Model, OutputData::Model(tree), _) => {
                    entry.model = Some(geom.rehost(tree, Some(name)));
                }
                (Category::Metrics, OutputData::Json(value), Some(entity)) => {
                    entry.metrics.insert(entity.to_string(), value.clone());
                }
                (Category::Tables, OutputData::Json(value), Some(entity)) => {
                    entry.tables.insert(entity.to_string(), value.clone());
                }
                (Category::Docs, OutputData::Json(value), Some(entity)) => {
                    entry.docs.insert(entity.to_string(), value.clone());
                }
                _ => debug!(output = %output.path, "ignoring non-internal component output"),
            }
        }
        let primary = primary_pipeline(pipelines.keys().map(String::as_str)).map(str::to_string);
        Self {
            name: name.to_string(),
            success: result.is_success(),
            errors: result.error_messages(),
            pipelines,
            primary,
        }
    }

    pub fn primary(&self) -> Option<&ComponentPipeline> {
        self.primary.as_ref().and_then(|p| self.pipelines.get(p))
    }

    /// Shapes of the primary model
    pub fn shapes(&self) -> Vec<ShapeRef> {
        self.primary().map(ComponentPipeline::shapes).unwrap_or_default()
    }

    fn bbox(&self) -> BoundingBox {
        self.shapes()
            .iter()
            .fold(BoundingBox::empty(), |acc, s| acc.union(&s.read().bbox()))
    }
}

impl HostObject for ImportComponentResult {
    fn type_name(&self) -> &'static str {
        "ImportComponentResult"
    }

    fn get(&self, _interp: &mut Interpreter, key: &str) -> Result<Value> {
        Ok(match key {
            "name" => Value::from(self.name.as_str()),
            "status" => Value::from(if self.success { "success" } else { "error" }),
            "errors" => Value::array(self.errors.iter().map(|e| Value::from(e.as_str())).collect()),
            "pipelines" => Value::array(self.pipelines.keys().map(|k| Value::from(k.as_str())).collect()),
            "model" | "metrics" | "tables" | "docs" => self
                .primary()
                .map(|p| p.property(key))
                .unwrap_or_default(),
            pipeline => self
                .pipelines
                .get(pipeline)
                .map(ComponentPipeline::to_value)
                .unwrap_or_default(),
        })
    }

    fn call_method(self: Arc<Self>, _interp: &mut Interpreter, name: &str, _args: Vec<Value>) -> Result<Value> {
        match name {
            "bbox" => Ok(Value::host(BboxObject { bbox: self.bbox() })),
            "shapes" | "allShapesCollection" => {
                Ok(CollectionObject::value(ShapeCollection::from_shapes(self.shapes())))
            }
            _ => Err(ScriptError::runtime(format!("{}.{name} is not a function", self.name))),
        }
    }

    fn iter_values(&self) -> Option<Vec<Value>> {
        Some(
            self.shapes()
                .into_iter()
                .map(super::bindings::ShapeObject::value)
                .collect(),
        )
    }

    fn to_json(&self) -> Json {
        json!({
            "name": self.name,
            "status": if self.success { "success" } else { "error" },
            "pipelines": self.pipelines.keys().collect::<Vec<_>>(),
            "primary": self.primary,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MeshKernel;
    use crate::output::ScriptOutput;

    fn internal_model(geom: &mut Geom, pipeline: &str) -> Result<ScriptOutput> {
        geom.make_box(1.0, 1.0, 1.0)?;
        Ok(ScriptOutput {
            path: format!("{pipeline}/model/internal"),
            data: OutputData::Model(geom.scene_tree()),
        })
    }

    #[test]
    fn test_primary_pipeline_rule() {
        assert_eq!(primary_pipeline(["cnc"]), Some("cnc"));
        assert_eq!(primary_pipeline(["cnc", "default"]), Some("default"));
        assert_eq!(primary_pipeline(["a", "b"]), None);
        assert_eq!(primary_pipeline([]), None);
    }

    #[test]
    fn test_component_outputs_are_internalized() {
        let mut warnings = Vec::new();
        let outputs = component_outputs(
            &["default/model".into(), "cnc/model/glb?data=false".into(), "bad".into()],
            &mut warnings,
        );
        assert_eq!(outputs, vec!["default/model/internal", "cnc/model/internal"]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(component_outputs(&[], &mut warnings), vec![DEFAULT_COMPONENT_OUTPUT]);
    }

    #[test]
    fn test_component_category_shorthand() {
        let mut warnings = Vec::new();
        let outputs = component_outputs(
            &[
                "model".into(),
                "tables".into(),
                "docs/datasheet".into(),
                "metrics/*".into(),
                "cnc/tables".into(),
                "cnc/*".into(),
            ],
            &mut warnings,
        );
        assert_eq!(
            outputs,
            vec![
                "default/model/internal",
                "default/tables/*/internal",
                "default/docs/*/internal",
                "default/metrics/*/internal",
                "cnc/tables/*/internal",
                "cnc/*/*/internal",
            ]
        );
        assert!(warnings.is_empty(), "{warnings:?}");

        component_outputs(&["model/extra".into()], &mut warnings);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_without_default_pipeline_model_is_undefined() -> Result<()> {
        let mut source = Geom::new(Arc::new(MeshKernel::new()));
        let mut result = ExecutionResult::default();
        result.outputs.push(internal_model(&mut source, "a")?);
        result.outputs.push(internal_model(&mut source, "b")?);

        let mut caller = Geom::new(Arc::new(MeshKernel::new()));
        let imported = ImportComponentResult::from_result(&result, &mut caller, "Pair");
        assert!(imported.primary().is_none());
        assert!(imported.pipelines["a"].model.is_some());
        assert!(imported.pipelines["b"].model.is_some());
        assert!(imported.shapes().is_empty());
        Ok(())
    }

    #[test]
    fn test_default_pipeline_is_primary_and_rehosted() -> Result<()> {
        let mut source = Geom::new(Arc::new(MeshKernel::new()));
        let mut result = ExecutionResult::default();
        result.outputs.push(internal_model(&mut source, "default")?);
        result.outputs.push(internal_model(&mut source, "cnc")?);
        result.outputs.push(ScriptOutput {
            path: "default/tables/parts/internal".into(),
            data: OutputData::Json(json!([{"qty": 2}])),
        });

        let mut caller = Geom::new(Arc::new(MeshKernel::new()));
        let imported = ImportComponentResult::from_result(&result, &mut caller, "Frame");
        let primary = imported.primary().map(|p| p.tables.len());
        assert_eq!(primary, Some(1));
        assert_eq!(imported.primary.as_deref(), Some("default"));
        for shape in imported.shapes() {
            assert_eq!(shape.read().owner(), caller.id());
        }
        assert_eq!(caller.scene().read().children().len(), 2);
        Ok(())
    }
}
