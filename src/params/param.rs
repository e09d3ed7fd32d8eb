// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script parameter definitions

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    Number,
    Boolean,
    Text,
    Options,
    List,
    Object,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Text => "text",
            ParamType::Options => "options",
            ParamType::List => "list",
            ParamType::Object => "object",
        };
        f.write_str(name)
    }
}

/// One script parameter
///
/// Component modules write number bounds as `min`/`max`; both spellings are
/// accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub default: Json,
    #[serde(skip_serializing_if = "Json::is_null")]
    pub value: Json,
    #[serde(alias = "min", skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(alias = "max", skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub schema: IndexMap<String, Param>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_elem: Option<Box<Param>>,
    pub visible: bool,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for Param {
    fn default() -> Self {
        Self {
            name: String::new(),
            param_type: ParamType::Number,
            default: Json::Null,
            value: Json::Null,
            start: None,
            end: None,
            step: None,
            options: Vec::new(),
            length: None,
            schema: IndexMap::new(),
            list_elem: None,
            visible: true,
            enabled: true,
            description: None,
        }
    }
}

impl Param {
    pub fn new(name: &str, param_type: ParamType) -> Self {
        Self {
            name: name.to_uppercase(),
            param_type,
            ..Self::default()
        }
        .validated()
    }

    pub fn number(name: &str, start: f64, end: f64, default: f64) -> Self {
        Self {
            name: name.to_uppercase(),
            start: Some(start),
            end: Some(end),
            default: json!(default),
            ..Self::default()
        }
        .validated()
    }

    pub fn with_default(mut self, default: Json) -> Self {
        self.default = default;
        self
    }

    /// Upper-case the name and fill a missing default for the type
    pub fn validated(mut self) -> Self {
        self.name = self.name.to_uppercase();
        if self.default.is_null() {
            self.default = match self.param_type {
                ParamType::Number => json!(self.start.unwrap_or(0.0)),
                ParamType::Boolean => json!(false),
                ParamType::Text => json!(""),
                ParamType::Options => self.options.first().cloned().unwrap_or(Json::Null),
                ParamType::List => json!([]),
                ParamType::Object => json!({}),
            };
        }
        self
    }

    /// Current value, falling back to the default
    pub fn current(&self) -> &Json {
        if self.value.is_null() {
            &self.default
        } else {
            &self.value
        }
    }

    /// Whether `value` fits this definition
    pub fn accepts(&self, value: &Json) -> bool {
        match self.param_type {
            ParamType::Number => value.as_f64().is_some_and(|n| {
                self.start.map_or(true, |start| n >= start) && self.end.map_or(true, |end| n <= end)
            }),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Text => value
                .as_str()
                .is_some_and(|s| self.length.map_or(true, |max| s.chars().count() <= max)),
            ParamType::Options => self.options.is_empty() || self.options.contains(value),
            ParamType::List => match value.as_array() {
                Some(items) => match &self.list_elem {
                    Some(elem) => items.iter().all(|item| elem.accepts(item)),
                    None => true,
                },
                None => false,
            },
            ParamType::Object => match value.as_object() {
                Some(map) => self
                    .schema
                    .iter()
                    .all(|(key, field)| map.get(key).map_or(true, |v| field.accepts(v))),
                None => false,
            },
        }
    }
}
