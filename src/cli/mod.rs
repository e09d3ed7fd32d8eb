// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CLI subsystem: argument helpers, output writing and reporting

pub mod reporter;

pub use reporter::Reporter;

use crate::output::{CachePathPart, PipelineMeta, ScriptMeta, ScriptOutputManager};
use crate::runner::ExecutionResult;
use anyhow::{bail, Context, Result};
use serde_json::Value as Json;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parse a `NAME=value` parameter argument
///
/// The value is read as JSON when it parses, as a plain string otherwise, so
/// `-p width=1000` is a number and `-p label=north` a string.
pub fn parse_param(arg: &str) -> Result<(String, Json)> {
    let Some((name, raw)) = arg.split_once('=') else {
        bail!("parameter '{arg}' must look like NAME=value");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("parameter '{arg}' has an empty name");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Json::String(raw.to_string()));
    Ok((name.to_string(), value))
}

/// Write every byte or JSON payload of `result` below `out_dir`
///
/// Files are laid out by cache file path, e.g.
/// `default/model/result.glb` or `default/tables/parts/result.json`.
pub fn write_outputs(result: &ExecutionResult, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let manager = ScriptOutputManager::from_result(result);
    let mut written = Vec::new();
    for path in manager.paths() {
        let (Some(relative), Some(contents)) = (
            path.to_cache_file_path(CachePathPart::Full),
            path.output().and_then(|data| data.file_contents()),
        ) else {
            debug!(output = %path, "nothing to write");
            continue;
        };
        let target = out_dir.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory {parent:?}"))?;
        }
        std::fs::write(&target, contents).with_context(|| format!("Failed to write {target:?}"))?;
        written.push(target);
    }
    Ok(written)
}

/// Metadata for offline path resolution from comma-separated name lists
///
/// Entity lists apply to every pipeline; `default` is always present.
pub fn meta_from_lists(pipelines: &[String], metrics: &[String], tables: &[String], docs: &[String]) -> ScriptMeta {
    let entities = PipelineMeta {
        metrics: metrics.to_vec(),
        tables: tables.to_vec(),
        docs: docs.to_vec(),
    };
    let mut meta = ScriptMeta::default();
    meta.add_pipeline(crate::runner::DEFAULT_PIPELINE, entities.clone());
    for name in pipelines {
        if !meta.has_pipeline(name) {
            meta.add_pipeline(name.as_str(), entities.clone());
        }
    }
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutputData, ScriptOutput};

    #[test]
    fn test_parse_param_reads_json_or_text() {
        assert_eq!(parse_param("width=1000").ok(), Some(("width".into(), Json::from(1000))));
        assert_eq!(parse_param("label=north").ok(), Some(("label".into(), Json::from("north"))));
        assert_eq!(
            parse_param("sizes=[1,2]").ok().map(|(_, v)| v),
            Some(serde_json::json!([1, 2]))
        );
        assert!(parse_param("nonsense").is_err());
        assert!(parse_param("=5").is_err());
    }

    #[test]
    fn test_write_outputs_uses_cache_layout() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut result = ExecutionResult::default();
        result.outputs.push(ScriptOutput {
            path: "default/model/stl".into(),
            data: OutputData::Bytes(vec![1, 2, 3]),
        });
        result.outputs.push(ScriptOutput {
            path: "default/tables/parts/json".into(),
            data: OutputData::Json(serde_json::json!([{"qty": 1}])),
        });
        let written = write_outputs(&result, dir.path())?;
        assert_eq!(written.len(), 2);
        assert_eq!(std::fs::read(dir.path().join("default/model/result.stl"))?, vec![1, 2, 3]);
        assert!(dir.path().join("default/tables/parts/result.json").exists());
        Ok(())
    }

    #[test]
    fn test_meta_from_lists_always_has_default() {
        let meta = meta_from_lists(&["cnc".into()], &[], &["parts".into()], &[]);
        assert_eq!(meta.pipeline_names().collect::<Vec<_>>(), vec!["default", "cnc"]);
        assert_eq!(meta.entities("cnc", crate::output::Category::Tables), ["parts".to_string()]);
    }
}
