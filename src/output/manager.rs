// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Requested and produced output paths of one run

use super::data::OutputData;
use super::meta::ScriptMeta;
use super::path::{Category, ScriptOutputPath};
use crate::runner::ExecutionResult;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct ScriptOutputManager {
    paths: Vec<ScriptOutputPath>,
}

impl ScriptOutputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> &[ScriptOutputPath] {
        &self.paths
    }

    pub fn into_paths(self) -> Vec<ScriptOutputPath> {
        self.paths
    }

    /// Validate and optionally resolve requested output paths
    ///
    /// Resolution uses the metadata of `result` when given, or a bare default
    /// pipeline otherwise. Invalid or unmatched paths are dropped with a
    /// warning; warnings are appended to `result` and also returned.
    pub fn load_request(
        &mut self,
        outputs: &[String],
        result: Option<&mut ExecutionResult>,
        resolve: bool,
    ) -> Vec<String> {
        let mut warnings = Vec::new();
        if outputs.is_empty() {
            warnings.push("No output paths requested".to_string());
        }

        let fallback = ScriptMeta::default_pipeline();
        let meta = result.as_ref().map_or(&fallback, |r| &r.meta);
        let mut paths = Vec::new();
        for raw in outputs {
            let path = ScriptOutputPath::parse(raw);
            if resolve {
                let resolution = path.resolve_verbose(meta);
                paths.extend(resolution.resolved);
                warnings.extend(resolution.warnings);
            } else if let Some(error) = path.error() {
                warnings.push(format!("Invalid output path '{raw}': {error}. Skipped!"));
            } else {
                paths.push(path);
            }
        }
        self.paths = paths;

        match result {
            Some(result) => result.warnings.extend(warnings.iter().cloned()),
            None => {
                for warning in &warnings {
                    warn!(%warning, "output request");
                }
            }
        }
        warnings
    }

    /// Rebuild the path list from a finished result, payloads included
    pub fn from_result(result: &ExecutionResult) -> Self {
        let paths = result
            .outputs
            .iter()
            .map(|output| {
                let mut path = ScriptOutputPath::parse(&output.path);
                path.set_output_data(output.data.clone());
                path
            })
            .collect();
        Self { paths }
    }

    /// Attach a payload to every path whose serialized form is `path`
    pub fn set_output_data(&mut self, path: &str, data: OutputData) -> bool {
        let mut found = false;
        for candidate in self.paths.iter_mut().filter(|p| p.to_string() == path) {
            candidate.set_output_data(data.clone());
            found = true;
        }
        found
    }

    /// Distinct pipeline names in request order
    pub fn pipelines(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.paths.iter().filter_map(ScriptOutputPath::pipeline_name) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn outputs_by_pipeline(&self, pipeline: &str) -> Vec<&ScriptOutputPath> {
        self.paths
            .iter()
            .filter(|p| p.pipeline_name() == Some(pipeline))
            .collect()
    }

    pub fn outputs_by_pipeline_category(&self, pipeline: &str, category: Category) -> Vec<&ScriptOutputPath> {
        self.paths
            .iter()
            .filter(|p| p.pipeline_name() == Some(pipeline) && p.category() == Some(category))
            .collect()
    }

    /// Outputs of one entity (or the model) limited to `formats`
    pub fn outputs_by_pipeline_entity_formats(
        &self,
        pipeline: &str,
        category: Category,
        entity: Option<&str>,
        formats: &[&str],
    ) -> Vec<&ScriptOutputPath> {
        self.outputs_by_pipeline_category(pipeline, category)
            .into_iter()
            .filter(|p| p.entity_name() == entity)
            .filter(|p| p.format_name().is_some_and(|f| formats.contains(&f)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{PipelineMeta, ScriptOutput};

    fn result() -> ExecutionResult {
        let mut result = ExecutionResult::default();
        result.meta.add_pipeline(
            "default",
            PipelineMeta {
                tables: vec!["parts".into(), "bom".into()],
                ..PipelineMeta::default()
            },
        );
        result.meta.add_pipeline("cnc", PipelineMeta::default());
        result
    }

    fn request(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_invalid_path_is_dropped_with_warning() {
        let mut result = result();
        let mut manager = ScriptOutputManager::new();
        let warnings = manager.load_request(
            &request(&["default/tables/parts/xlsx", "not-a-valid-path"]),
            Some(&mut result),
            true,
        );
        assert_eq!(manager.paths().len(), 1);
        assert!(!warnings.is_empty());
        assert_eq!(result.warnings, warnings);
    }

    #[test]
    fn test_without_result_uses_default_pipeline() {
        let mut manager = ScriptOutputManager::new();
        let warnings = manager.load_request(&request(&["default/model/glb", "cnc/model/glb"]), None, true);
        assert_eq!(manager.pipelines(), vec!["default"]);
        assert_eq!(warnings.len(), 1);

        let warnings = manager.load_request(&[], None, true);
        assert!(manager.paths().is_empty());
        assert_eq!(warnings, vec!["No output paths requested".to_string()]);
    }

    #[test]
    fn test_unresolved_load_keeps_wildcards() {
        let mut manager = ScriptOutputManager::new();
        manager.load_request(&request(&["*", "x"]), None, false);
        assert_eq!(manager.paths().len(), 1);
        assert!(manager.paths()[0].has_wildcard());
    }

    #[test]
    fn test_query_helpers() {
        let mut result = result();
        let mut manager = ScriptOutputManager::new();
        manager.load_request(
            &request(&["default/tables/*/json", "default/tables/parts/xlsx", "default/model/glb", "cnc/model/stl"]),
            Some(&mut result),
            true,
        );
        assert_eq!(manager.pipelines(), vec!["default", "cnc"]);
        assert_eq!(manager.outputs_by_pipeline("default").len(), 4);
        assert_eq!(manager.outputs_by_pipeline_category("default", Category::Tables).len(), 3);
        let parts = manager.outputs_by_pipeline_entity_formats("default", Category::Tables, Some("parts"), &["json", "xlsx"]);
        assert_eq!(parts.len(), 2);
        let model = manager.outputs_by_pipeline_entity_formats("cnc", Category::Model, None, &["stl"]);
        assert_eq!(model.len(), 1);
        assert!(manager.set_output_data("cnc/model/stl", OutputData::Bytes(vec![0])));
        assert!(!manager.set_output_data("cnc/model/glb", OutputData::Bytes(vec![0])));
    }

    #[test]
    fn test_from_result_attaches_payloads() {
        let mut result = result();
        result.outputs.push(ScriptOutput {
            path: "default/tables/parts/json".into(),
            data: OutputData::Json(serde_json::json!([1, 2])),
        });
        let manager = ScriptOutputManager::from_result(&result);
        assert_eq!(manager.paths().len(), 1);
        assert!(manager.paths()[0].output().and_then(OutputData::as_json).is_some());
    }
}
