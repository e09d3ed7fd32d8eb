// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! What a script can produce, per pipeline

use super::path::Category;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Entity names produced by one pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineMeta {
    pub metrics: Vec<String>,
    pub tables: Vec<String>,
    pub docs: Vec<String>,
}

impl PipelineMeta {
    pub fn entities(&self, category: Category) -> &[String] {
        match category {
            Category::Model => &[],
            Category::Metrics => &self.metrics,
            Category::Tables => &self.tables,
            Category::Docs => &self.docs,
        }
    }
}

/// Pipelines of a script in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptMeta {
    pub pipelines: IndexMap<String, PipelineMeta>,
}

impl ScriptMeta {
    /// Metadata of a script that only has an empty `default` pipeline
    pub fn default_pipeline() -> Self {
        let mut meta = Self::default();
        meta.add_pipeline(crate::runner::DEFAULT_PIPELINE, PipelineMeta::default());
        meta
    }

    pub fn add_pipeline(&mut self, name: impl Into<String>, meta: PipelineMeta) -> &mut Self {
        self.pipelines.insert(name.into(), meta);
        self
    }

    pub fn pipeline_names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    pub fn has_pipeline(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }

    /// Entity names of one category; empty for unknown pipelines
    pub fn entities(&self, pipeline: &str, category: Category) -> &[String] {
        self.pipelines
            .get(pipeline)
            .map(|p| p.entities(category))
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entities_lookup() {
        let mut meta = ScriptMeta::default_pipeline();
        meta.add_pipeline(
            "cnc",
            PipelineMeta {
                docs: vec!["datasheet".into()],
                ..PipelineMeta::default()
            },
        );
        assert_eq!(meta.pipeline_names().collect::<Vec<_>>(), vec!["default", "cnc"]);
        assert_eq!(meta.entities("cnc", Category::Docs), ["datasheet".to_string()]);
        assert!(meta.entities("cnc", Category::Model).is_empty());
        assert!(meta.entities("nightly", Category::Tables).is_empty());
    }

    #[test]
    fn test_meta_from_json() -> anyhow::Result<()> {
        let meta: ScriptMeta = serde_json::from_str(
            r#"{"pipelines": {"default": {"tables": ["parts", "bom"]}, "cnc": {}}}"#,
        )?;
        assert_eq!(meta.entities("default", Category::Tables).len(), 2);
        assert!(meta.has_pipeline("cnc"));
        Ok(())
    }
}
