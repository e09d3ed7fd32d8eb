// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Format converters
//!
//! A converter turns one category of a pipeline result into one format. The
//! registry expands `*` formats and reports formats nobody converts.

use super::data::OutputData;
use super::path::{Category, ScriptOutputPath, INTERNAL_FORMAT};
use crate::error::{Result, ScriptError};
use crate::io::{to_glb, to_gltf, to_stl, MeshNode};
use crate::runner::PipelineResult;
use indexmap::IndexMap;
use serde_json::{json, Value as Json};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, warn};

pub trait OutputConverter: Send + Sync + Debug {
    fn format(&self) -> &'static str;

    fn categories(&self) -> &'static [Category];

    fn convert(&self, path: &ScriptOutputPath, pipeline: &PipelineResult) -> Result<OutputData>;
}

const MODEL: &[Category] = &[Category::Model];
const ENTITIES: &[Category] = &[Category::Metrics, Category::Tables, Category::Docs];

/// Entity value named by a resolved path
fn entity<'a>(path: &ScriptOutputPath, pipeline: &'a PipelineResult) -> Result<&'a Json> {
    let category = path
        .category()
        .ok_or_else(|| ScriptError::runtime(format!("output '{path}' has no concrete category")))?;
    let name = path
        .entity_name()
        .ok_or_else(|| ScriptError::runtime(format!("output '{path}' has no concrete entity")))?;
    pipeline
        .entity(category, name)
        .ok_or_else(|| ScriptError::runtime(format!("pipeline has no {category} named '{name}'")))
}

/// Encode the visible shapes of a pipeline model through `encode`
fn encode_model<T>(
    path: &ScriptOutputPath,
    pipeline: &PipelineResult,
    encode: impl FnOnce(&[MeshNode<'_>]) -> Result<T>,
) -> Result<T> {
    let shapes = pipeline.model.all_shapes();
    let guards: Vec<_> = shapes.iter().map(|s| s.read()).collect();
    let visible: Vec<_> = guards.iter().filter(|s| s.visible).collect();
    let names: Vec<String> = visible
        .iter()
        .enumerate()
        .map(|(i, s)| s.name.clone().unwrap_or_else(|| format!("shape_{i}")))
        .collect();
    let extras: Vec<Json> = visible
        .iter()
        .map(|s| json!({ "id": s.id(), "name": s.name, "color": s.color }))
        .collect();
    let with_data = path.option_flag("data", true);

    let nodes: Vec<MeshNode<'_>> = visible
        .iter()
        .zip(&names)
        .zip(&extras)
        .map(|((shape, name), extras)| MeshNode {
            name,
            mesh: &shape.mesh,
            extras: with_data.then_some(extras),
        })
        .collect();
    encode(&nodes)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GlbConverter;

impl OutputConverter for GlbConverter {
    fn format(&self) -> &'static str {
        "glb"
    }

    fn categories(&self) -> &'static [Category] {
        MODEL
    }

    fn convert(&self, path: &ScriptOutputPath, pipeline: &PipelineResult) -> Result<OutputData> {
        encode_model(path, pipeline, to_glb).map(OutputData::Bytes)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GltfConverter;

impl OutputConverter for GltfConverter {
    fn format(&self) -> &'static str {
        "gltf"
    }

    fn categories(&self) -> &'static [Category] {
        MODEL
    }

    fn convert(&self, path: &ScriptOutputPath, pipeline: &PipelineResult) -> Result<OutputData> {
        encode_model(path, pipeline, to_gltf).map(OutputData::Json)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StlConverter;

impl OutputConverter for StlConverter {
    fn format(&self) -> &'static str {
        "stl"
    }

    fn categories(&self) -> &'static [Category] {
        MODEL
    }

    fn convert(&self, path: &ScriptOutputPath, pipeline: &PipelineResult) -> Result<OutputData> {
        encode_model(path, pipeline, |nodes| to_stl(nodes.iter().map(|n| n.mesh))).map(OutputData::Bytes)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl OutputConverter for JsonConverter {
    fn format(&self) -> &'static str {
        "json"
    }

    fn categories(&self) -> &'static [Category] {
        ENTITIES
    }

    fn convert(&self, path: &ScriptOutputPath, pipeline: &PipelineResult) -> Result<OutputData> {
        entity(path, pipeline).map(|value| OutputData::Json(value.clone()))
    }
}

/// Live data for component runs
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalConverter;

impl OutputConverter for InternalConverter {
    fn format(&self) -> &'static str {
        INTERNAL_FORMAT
    }

    fn categories(&self) -> &'static [Category] {
        &Category::ALL
    }

    fn convert(&self, path: &ScriptOutputPath, pipeline: &PipelineResult) -> Result<OutputData> {
        match path.category() {
            Some(Category::Model) => Ok(OutputData::Model(pipeline.model.clone())),
            _ => entity(path, pipeline).map(|value| OutputData::Json(value.clone())),
        }
    }
}

/// Converters by category and format
#[derive(Debug, Clone)]
pub struct ConverterRegistry {
    converters: Vec<Arc<dyn OutputConverter>>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterRegistry {
    /// Registry with the built-in converters
    pub fn new() -> Self {
        Self {
            converters: vec![
                Arc::new(GlbConverter),
                Arc::new(GltfConverter),
                Arc::new(StlConverter),
                Arc::new(JsonConverter),
                Arc::new(InternalConverter),
            ],
        }
    }

    /// Add a converter; it takes precedence over earlier ones for the same format
    pub fn register(&mut self, converter: Arc<dyn OutputConverter>) {
        self.converters.insert(0, converter);
    }

    pub fn find(&self, category: Category, format: &str) -> Option<&Arc<dyn OutputConverter>> {
        self.converters
            .iter()
            .find(|c| c.format() == format && c.categories().contains(&category))
    }

    /// Serialization formats a `*` format expands to
    pub fn formats_for(&self, category: Category) -> Vec<&'static str> {
        let mut formats: Vec<&'static str> = Vec::new();
        for converter in &self.converters {
            let format = converter.format();
            if format != INTERNAL_FORMAT
                && converter.categories().contains(&category)
                && !formats.contains(&format)
            {
                formats.push(format);
            }
        }
        formats
    }

    /// Convert one resolved path into one or more outputs
    ///
    /// Failures and unsupported formats become warnings.
    pub fn export(
        &self,
        path: &ScriptOutputPath,
        pipelines: &IndexMap<String, PipelineResult>,
        warnings: &mut Vec<String>,
    ) -> Vec<ScriptOutputPath> {
        let (Some(pipeline_name), Some(category)) = (path.pipeline_name(), path.category()) else {
            warnings.push(format!("Output path '{path}' is not resolved. Skipped!"));
            return Vec::new();
        };
        let Some(pipeline) = pipelines.get(pipeline_name) else {
            warnings.push(format!("Output path '{path}': pipeline '{pipeline_name}' did not run. Skipped!"));
            return Vec::new();
        };

        let concrete: Vec<ScriptOutputPath> = match path.format_name() {
            Some(_) => vec![path.clone()],
            None => self.formats_for(category).into_iter().map(|f| path.with_format(f)).collect(),
        };

        let mut out = Vec::with_capacity(concrete.len());
        for mut target in concrete {
            let format = target.format_name().unwrap_or_default().to_string();
            let Some(converter) = self.find(category, &format) else {
                warnings.push(format!(
                    "Output format '{format}' is not supported for {category}. Skipped '{target}'!"
                ));
                continue;
            };
            match converter.convert(&target, pipeline) {
                Ok(data) => {
                    debug!(output = %target, "converted output");
                    target.set_output_data(data);
                    out.push(target);
                }
                Err(e) => {
                    warn!(output = %target, error = %e, "output conversion failed");
                    warnings.push(format!("Output '{target}' failed: {e}"));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geom, MeshKernel};

    fn pipelines() -> crate::error::Result<IndexMap<String, PipelineResult>> {
        let mut geom = Geom::new(Arc::new(MeshKernel::new()));
        geom.make_box(10.0, 10.0, 10.0)?;
        let mut pipeline = PipelineResult {
            model: geom.scene_tree(),
            ..PipelineResult::default()
        };
        pipeline.tables.insert("parts".into(), json!([{"part": "wall", "qty": 1}]));
        let mut map = IndexMap::new();
        map.insert("default".to_string(), pipeline);
        Ok(map)
    }

    fn export(raw: &str) -> crate::error::Result<(Vec<ScriptOutputPath>, Vec<String>)> {
        let mut warnings = Vec::new();
        let outputs = ConverterRegistry::new().export(&ScriptOutputPath::parse(raw), &pipelines()?, &mut warnings);
        Ok((outputs, warnings))
    }

    #[test]
    fn test_glb_and_data_option() -> crate::error::Result<()> {
        let (outputs, warnings) = export("default/model/glb")?;
        assert!(warnings.is_empty());
        let with_data = outputs[0].output().and_then(OutputData::as_bytes).map(<[u8]>::len);

        let (outputs, _) = export("default/model/glb?data=false")?;
        let without = outputs[0].output().and_then(OutputData::as_bytes).map(<[u8]>::len);
        assert!(with_data > without);
        assert!(without.is_some_and(|n| n > 0));
        Ok(())
    }

    #[test]
    fn test_wildcard_format_expands_per_category() -> crate::error::Result<()> {
        let (outputs, warnings) = export("default/model/*")?;
        let formats: Vec<_> = outputs.iter().filter_map(|p| p.format_name()).collect();
        assert_eq!(formats, vec!["glb", "gltf", "stl"]);
        assert!(warnings.is_empty());

        let (outputs, _) = export("default/tables/parts/*")?;
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].output().and_then(OutputData::as_json), Some(&json!([{"part": "wall", "qty": 1}])));
        Ok(())
    }

    #[test]
    fn test_unsupported_format_warns() -> crate::error::Result<()> {
        let (outputs, warnings) = export("default/model/step")?;
        assert!(outputs.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("step"));

        let (outputs, warnings) = export("default/tables/missing/json")?;
        assert!(outputs.is_empty());
        assert!(warnings[0].contains("missing"));
        Ok(())
    }

    #[test]
    fn test_internal_model_is_live_tree() -> crate::error::Result<()> {
        let (outputs, _) = export("default/model/internal")?;
        let tree = outputs[0].output().and_then(OutputData::as_model);
        assert_eq!(tree.map(|t| t.shape_count()), Some(1));
        Ok(())
    }
}
