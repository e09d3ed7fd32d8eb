// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Output path mini-language
//!
//! `pipeline/category[/entity]/format[?k=v&flag]`, for example
//! `default/model/glb?data=false` or `default/tables/*/xlsx`. `*` selects
//! everything in a segment; `*` alone and `<pipeline>/*` are shorthand for
//! all categories, entities and formats.

use super::data::OutputData;
use super::meta::ScriptMeta;
use crate::ast::number_to_json;
use crate::error::{Result, ScriptError};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const WILDCARD: &str = "*";

/// Format token for live in-process data
pub const INTERNAL_FORMAT: &str = "internal";

/// Either every available value or one concrete value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector<T> {
    Any,
    Exact(T),
}

impl<T> Selector<T> {
    pub fn is_any(&self) -> bool {
        matches!(self, Selector::Any)
    }

    pub fn exact(&self) -> Option<&T> {
        match self {
            Selector::Any => None,
            Selector::Exact(value) => Some(value),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Selector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Any => f.write_str(WILDCARD),
            Selector::Exact(value) => value.fmt(f),
        }
    }
}

impl<T: fmt::Display> Serialize for Selector<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Kind of artifact a pipeline produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Model,
    Metrics,
    Tables,
    Docs,
}

impl Category {
    pub const ALL: [Category; 4] = [Category::Model, Category::Metrics, Category::Tables, Category::Docs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Model => "model",
            Category::Metrics => "metrics",
            Category::Tables => "tables",
            Category::Docs => "docs",
        }
    }

    /// Categories addressed by entity name; the model is not
    pub fn has_entities(&self) -> bool {
        !matches!(self, Category::Model)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ScriptError::InvalidOutputPath {
                path: s.to_string(),
                message: "category must be one of model, metrics, tables, docs".into(),
            })
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Which part of a cache file path to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePathPart {
    Full,
    Dir,
    FileName,
}

/// One requested or produced output
#[derive(Debug, Clone)]
pub struct ScriptOutputPath {
    pub requested_path: String,
    pub resolved_path: Option<String>,
    pub valid: bool,
    /// No wildcard left in pipeline, category or entity
    pub resolved: bool,
    pub pipeline: Selector<String>,
    pub category: Selector<Category>,
    /// `None` for the model; `Any` or a name for entity categories
    pub entity: Option<Selector<String>>,
    pub format: Selector<String>,
    pub format_options: BTreeMap<String, Json>,
    error: Option<String>,
    output: Option<OutputData>,
}

impl PartialEq for ScriptOutputPath {
    fn eq(&self, other: &Self) -> bool {
        self.pipeline == other.pipeline
            && self.category == other.category
            && self.entity == other.entity
            && self.format == other.format
            && self.format_options == other.format_options
    }
}

/// Outcome of wildcard expansion
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub resolved: Vec<ScriptOutputPath>,
    pub warnings: Vec<String>,
}

fn segment(raw: &str) -> std::result::Result<Selector<String>, String> {
    match raw {
        "" => Err("empty segment".into()),
        WILDCARD => Ok(Selector::Any),
        s if s.contains('*') => Err(format!("partial wildcard '{s}' is not supported")),
        s if s.chars().any(char::is_whitespace) => Err(format!("segment '{s}' contains whitespace")),
        s => Ok(Selector::Exact(s.to_string())),
    }
}

/// Parse `k=v&flag` into options; a bare key is `true`
pub fn parse_format_options(raw: &str) -> BTreeMap<String, Json> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = match pair.split_once('=') {
                Some((key, value)) => (key, Some(value)),
                None => (pair, None),
            };
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.map_or(Json::Bool(true), convert_option_value)))
        })
        .collect()
}

fn convert_option_value(raw: &str) -> Json {
    match raw {
        "true" => Json::Bool(true),
        "false" => Json::Bool(false),
        _ => match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => number_to_json(n),
            _ => Json::String(raw.to_string()),
        },
    }
}

fn format_options_query(options: &BTreeMap<String, Json>) -> String {
    options
        .iter()
        .map(|(key, value)| match value {
            Json::String(s) => format!("{key}={s}"),
            other => format!("{key}={other}"),
        })
        .collect::<Vec<_>>()
        .join("&")
}

impl ScriptOutputPath {
    /// Parse a raw path; an invalid path is flagged, never rejected
    pub fn parse(raw: &str) -> Self {
        let mut path = Self {
            requested_path: raw.to_string(),
            resolved_path: None,
            valid: false,
            resolved: false,
            pipeline: Selector::Any,
            category: Selector::Any,
            entity: None,
            format: Selector::Any,
            format_options: BTreeMap::new(),
            error: None,
            output: None,
        };
        match path.fill(raw.trim()) {
            Ok(()) => {
                path.valid = true;
                path.resolved = path.is_concrete();
                if path.resolved {
                    path.resolved_path = Some(path.to_string());
                }
            }
            Err(message) => path.error = Some(message),
        }
        path
    }

    fn fill(&mut self, raw: &str) -> std::result::Result<(), String> {
        let (route, options) = match raw.split_once('?') {
            Some((route, options)) => (route, Some(options)),
            None => (raw, None),
        };
        let segments: Vec<&str> = route.split('/').collect();
        let (pipeline, category, entity, format) = match segments.as_slice() {
            [WILDCARD] => (WILDCARD, WILDCARD, Some(WILDCARD), WILDCARD),
            [pipeline, WILDCARD] => (*pipeline, WILDCARD, Some(WILDCARD), WILDCARD),
            [pipeline, category, format] => (*pipeline, *category, None, *format),
            [pipeline, category, entity, format] => (*pipeline, *category, Some(*entity), *format),
            _ => return Err("expected 'pipeline/category[/entity]/format'".into()),
        };

        self.pipeline = segment(pipeline)?;
        self.category = match segment(category)? {
            Selector::Any => Selector::Any,
            Selector::Exact(name) => Selector::Exact(name.parse::<Category>().map_err(|_| {
                format!("unknown category '{name}'; expected model, metrics, tables or docs")
            })?),
        };
        self.entity = match (&self.category, entity) {
            (Selector::Exact(Category::Model), Some(_)) => {
                return Err("the model category takes no entity".into())
            }
            (Selector::Exact(Category::Model), None) => None,
            (_, Some(entity)) => Some(segment(entity)?),
            // an omitted entity selects all of them
            (_, None) => Some(Selector::Any),
        };
        self.format = segment(format)?;
        self.format_options = options.map(parse_format_options).unwrap_or_default();
        Ok(())
    }

    /// Parse and reject invalid paths with an error
    pub fn parse_valid(raw: &str) -> Result<Self> {
        let path = Self::parse(raw);
        match path.error {
            None => Ok(path),
            Some(message) => Err(ScriptError::InvalidOutputPath {
                path: raw.to_string(),
                message,
            }),
        }
    }

    /// Why the path is invalid
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn is_concrete(&self) -> bool {
        !self.pipeline.is_any()
            && !self.category.is_any()
            && !self.entity.as_ref().is_some_and(Selector::is_any)
    }

    pub fn has_wildcard(&self) -> bool {
        self.valid && (!self.is_concrete() || self.format.is_any())
    }

    /// Segments holding a wildcard, by name
    pub fn wildcards_at(&self) -> Vec<&'static str> {
        let mut at = Vec::new();
        if self.pipeline.is_any() {
            at.push("pipeline");
        }
        if self.category.is_any() {
            at.push("category");
        }
        if self.entity.as_ref().is_some_and(Selector::is_any) {
            at.push("entity");
        }
        if self.format.is_any() {
            at.push("format");
        }
        at
    }

    pub fn pipeline_name(&self) -> Option<&str> {
        self.pipeline.exact().map(String::as_str)
    }

    pub fn category(&self) -> Option<Category> {
        self.category.exact().copied()
    }

    pub fn entity_name(&self) -> Option<&str> {
        self.entity.as_ref().and_then(Selector::exact).map(String::as_str)
    }

    pub fn format_name(&self) -> Option<&str> {
        self.format.exact().map(String::as_str)
    }

    pub fn is_internal(&self) -> bool {
        self.format_name() == Some(INTERNAL_FORMAT)
    }

    /// Boolean format option, `default` when absent
    pub fn option_flag(&self, key: &str, default: bool) -> bool {
        match self.format_options.get(key) {
            Some(Json::Bool(b)) => *b,
            Some(Json::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Json::String(s)) => !s.is_empty(),
            Some(_) => default,
            None => default,
        }
    }

    /// Force the live data format; entity categories select all entities
    pub fn internalize(&mut self) -> &mut Self {
        self.entity = match self.category {
            Selector::Exact(Category::Model) => None,
            _ => Some(Selector::Any),
        };
        self.format = Selector::Exact(INTERNAL_FORMAT.to_string());
        self.format_options.clear();
        self.resolved = self.is_concrete();
        self.resolved_path = Some(self.to_string());
        self
    }

    fn concrete(&self, pipeline: &str, category: Category, entity: Option<&str>) -> Self {
        let mut path = self.clone();
        path.pipeline = Selector::Exact(pipeline.to_string());
        path.category = Selector::Exact(category);
        path.entity = entity.map(|e| Selector::Exact(e.to_string()));
        path.resolved = true;
        path.resolved_path = Some(path.to_string());
        path.output = None;
        path
    }

    /// Copy with the format wildcard replaced by a concrete format
    pub fn with_format(&self, format: &str) -> Self {
        let mut path = self.clone();
        path.format = Selector::Exact(format.to_string());
        if path.resolved {
            path.resolved_path = Some(path.to_string());
        }
        path.output = None;
        path
    }

    /// Expand pipeline, category and entity wildcards against `meta`
    ///
    /// Unmatched names and empty expansions become warnings. A `*` format is
    /// left in place for the converters to expand.
    pub fn resolve_verbose(&self, meta: &ScriptMeta) -> Resolution {
        let mut out = Resolution::default();
        if let Some(error) = &self.error {
            out.warnings
                .push(format!("Invalid output path '{}': {error}. Skipped!", self.requested_path));
            return out;
        }

        let pipelines: Vec<String> = match &self.pipeline {
            Selector::Any => {
                let names: Vec<String> = meta.pipeline_names().map(str::to_string).collect();
                if names.is_empty() {
                    out.warnings.push(format!(
                        "Output path '{}': script has no pipelines. Skipped!",
                        self.requested_path
                    ));
                }
                names
            }
            Selector::Exact(name) if meta.has_pipeline(name) => vec![name.clone()],
            Selector::Exact(name) => {
                out.warnings.push(format!(
                    "Output path '{}': unknown pipeline '{name}'. Skipped! Available: {}",
                    self.requested_path,
                    meta.pipeline_names().collect::<Vec<_>>().join(", ")
                ));
                return out;
            }
        };

        let categories: Vec<Category> = match self.category {
            Selector::Any => Category::ALL.to_vec(),
            Selector::Exact(category) => vec![category],
        };
        let lenient = self.category.is_any() || self.is_internal();

        for pipeline in &pipelines {
            for &category in &categories {
                if !category.has_entities() {
                    out.resolved.push(self.concrete(pipeline, category, None));
                    continue;
                }
                let available = meta.entities(pipeline, category);
                match self.entity.as_ref().unwrap_or(&Selector::Any) {
                    Selector::Any => {
                        if available.is_empty() && !lenient {
                            out.warnings.push(format!(
                                "Output path '{}': pipeline '{pipeline}' has no {category}. Skipped!",
                                self.requested_path
                            ));
                        }
                        for entity in available {
                            out.resolved.push(self.concrete(pipeline, category, Some(entity.as_str())));
                        }
                    }
                    Selector::Exact(entity) if available.contains(entity) => {
                        out.resolved.push(self.concrete(pipeline, category, Some(entity.as_str())));
                    }
                    Selector::Exact(entity) => {
                        if !self.category.is_any() {
                            out.warnings.push(format!(
                                "Output path '{}': invalid entity name '{entity}' for {category} of pipeline '{pipeline}'. Skipped! Available: {}",
                                self.requested_path,
                                available.join(", ")
                            ));
                        }
                    }
                }
            }
        }

        if out.resolved.is_empty() && out.warnings.is_empty() && self.category.is_any() {
            out.warnings.push(format!(
                "Output path '{}' matched no outputs",
                self.requested_path
            ));
        }
        out
    }

    pub fn set_output_data(&mut self, data: OutputData) -> &mut Self {
        self.output = Some(data);
        self
    }

    pub fn output(&self) -> Option<&OutputData> {
        self.output.as_ref()
    }

    pub fn take_output(&mut self) -> Option<OutputData> {
        self.output.take()
    }

    /// Location used when storing this output in a cache directory
    ///
    /// `{pipeline}/{category}/{entity?}/result[?options].{format}`; only
    /// resolved paths with a concrete format have one.
    pub fn to_cache_file_path(&self, part: CachePathPart) -> Option<String> {
        if !self.valid || !self.resolved {
            return None;
        }
        let format = self.format_name()?;
        let dir = match self.entity_name() {
            Some(entity) => format!("{}/{}/{entity}/", self.pipeline, self.category),
            None => format!("{}/{}/", self.pipeline, self.category),
        };
        let query = format_options_query(&self.format_options);
        let file = if query.is_empty() {
            format!("result.{format}")
        } else {
            format!("result?{query}.{format}")
        };
        Some(match part {
            CachePathPart::Full => format!("{dir}{file}"),
            CachePathPart::Dir => dir,
            CachePathPart::FileName => file,
        })
    }

    /// Rebuild a path from a cache file location
    pub fn from_cache_file_path(file_path: &str) -> Self {
        let invalid = || {
            let mut path = Self::parse("");
            path.requested_path = file_path.to_string();
            path.error = Some(format!("invalid cache file path '{file_path}'"));
            path
        };
        let Some((dir, file)) = file_path.rsplit_once('/') else {
            return invalid();
        };
        let Some(rest) = file.strip_prefix("result") else {
            return invalid();
        };
        let Some((options, format)) = rest.rsplit_once('.') else {
            return invalid();
        };
        let options = match options {
            "" => String::new(),
            o => match o.strip_prefix('?') {
                Some(query) => format!("?{query}"),
                None => return invalid(),
            },
        };
        let path = Self::parse(&format!("{dir}/{format}{options}"));
        if path.valid && path.resolved {
            path
        } else {
            invalid()
        }
    }
}

impl fmt::Display for ScriptOutputPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return f.write_str(&self.requested_path);
        }
        write!(f, "{}/{}", self.pipeline, self.category)?;
        if let Some(entity) = &self.entity {
            write!(f, "/{entity}")?;
        }
        write!(f, "/{}", self.format)?;
        let query = format_options_query(&self.format_options);
        if !query.is_empty() {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

impl FromStr for ScriptOutputPath {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_valid(s)
    }
}

impl Serialize for ScriptOutputPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ScriptOutputPath", 8)?;
        state.serialize_field("requestedPath", &self.requested_path)?;
        state.serialize_field("resolvedPath", &self.resolved_path)?;
        state.serialize_field("pipeline", &self.pipeline)?;
        state.serialize_field("category", &self.category)?;
        state.serialize_field("entityName", &self.entity)?;
        state.serialize_field("format", &self.format)?;
        state.serialize_field("formatOptions", &self.format_options)?;
        state.serialize_field("valid", &self.valid)?;
        state.end()
    }
}
