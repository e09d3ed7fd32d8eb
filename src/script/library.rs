// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Importable scripts and the local component library

use super::directive::ScriptAddress;
use crate::error::FetchError;
use crate::params::Param;
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

/// Module file extensions searched in a component directory
pub const MODULE_EXTENSIONS: &[&str] = &["json", "toml"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishedInfo {
    pub version: Option<String>,
}

/// Source and metadata of an importable or component script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptVersion {
    pub id: Option<String>,
    #[serde(alias = "fileName")]
    pub file_name: String,
    pub name: Option<String>,
    #[serde(alias = "user_name")]
    pub author: Option<String>,
    #[serde(alias = "shared_version_tag")]
    pub version: Option<String>,
    /// Parameter schema; registry scripts send a list, modules a map by name
    #[serde(deserialize_with = "params_list_or_map")]
    pub params: IndexMap<String, Param>,
    pub code: String,
    pub published: Option<PublishedInfo>,
}

impl ScriptVersion {
    pub fn new(file_name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            code: code.into(),
            ..Self::default()
        }
    }

    /// Script whose code was written inline in a `$component` call
    pub fn inline(code: &str) -> Self {
        let mut script = Self::new("", code);
        script.file_name = format!("inline-{}", &script.checksum()[..12]);
        script
    }

    /// Unwrap the `data` field of a registry response
    pub fn from_registry_envelope(target: &str, body: serde_json::Value) -> Result<Self, FetchError> {
        let data = match body {
            serde_json::Value::Object(mut map) => map
                .remove("data")
                .ok_or_else(|| FetchError::new(target, "response has no 'data' field"))?,
            _ => return Err(FetchError::new(target, "response is not a JSON object")),
        };
        let script: ScriptVersion = serde_json::from_value(data)
            .map_err(|e| FetchError::new(target, format!("invalid script payload: {e}")))?;
        if script.code.trim().is_empty() {
            return Err(FetchError::new(target, "script has no code"));
        }
        Ok(script)
    }

    pub fn version_tag(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or_else(|| self.published.as_ref().and_then(|p| p.version.as_deref()))
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.file_name)
    }

    /// Hex SHA-256 of the code
    pub fn checksum(&self) -> String {
        let digest = Sha256::digest(self.code.as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn param_list(&self) -> Vec<Param> {
        self.params.values().cloned().collect()
    }
}

fn params_list_or_map<'de, D>(deserializer: D) -> Result<IndexMap<String, Param>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Params {
        List(Vec<Param>),
        Map(IndexMap<String, Param>),
        None(()),
    }

    let params = match Params::deserialize(deserializer)? {
        Params::List(list) => list,
        Params::Map(map) => map
            .into_iter()
            .map(|(name, mut param)| {
                if param.name.is_empty() {
                    param.name = name;
                }
                param
            })
            .collect(),
        Params::None(()) => Vec::new(),
    };
    Ok(params
        .into_iter()
        .map(|p| {
            let p = p.validated();
            (p.name.clone(), p)
        })
        .collect())
}

/// Whether a `$component` argument is code rather than a name
pub fn is_inline_source(target: &str) -> bool {
    target
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, ';' | '(' | '='))
}

/// Components registered in memory or stored as module files
#[derive(Debug, Default)]
pub struct ComponentLibrary {
    registered: DashMap<String, Arc<ScriptVersion>>,
    dir: Option<PathBuf>,
}

impl ComponentLibrary {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            registered: DashMap::new(),
            dir,
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn register(&self, name: &str, script: ScriptVersion) {
        self.registered.insert(name.to_string(), Arc::new(script));
    }

    pub fn registered(&self, name: &str) -> Option<Arc<ScriptVersion>> {
        self.registered.get(name).map(|s| s.value().clone())
    }

    /// Module file for a component name or address, if one exists on disk
    ///
    /// `acme/Frame:1.0` matches `acme/Frame.json` first, then `Frame.json`
    /// anywhere below the directory.
    pub fn find_module(&self, target: &str) -> Option<PathBuf> {
        let dir = self.dir.as_deref()?;
        let (relative, stem) = match ScriptAddress::parse(target) {
            Ok(address) => (format!("{}/{}", address.owner, address.name), address.name),
            Err(_) => (target.to_string(), target.to_string()),
        };

        for ext in MODULE_EXTENSIONS {
            let direct = dir.join(format!("{relative}.{ext}"));
            if direct.is_file() {
                return Some(direct);
            }
        }

        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .find(|path| {
                path.file_stem().is_some_and(|s| s == stem.as_str())
                    && path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| MODULE_EXTENSIONS.contains(&e))
            })
    }

    /// Names of every module below the component directory
    pub fn list(&self) -> Vec<String> {
        let Some(dir) = self.dir.as_deref() else {
            return Vec::new();
        };
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_file()
                    && e.path()
                        .extension()
                        .and_then(|x| x.to_str())
                        .is_some_and(|x| MODULE_EXTENSIONS.contains(&x))
            })
            .filter_map(|e| e.path().file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect()
    }
}

/// Read a component module from disk
pub async fn load_module(path: &Path) -> Result<ScriptVersion, FetchError> {
    let target = path.display().to_string();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| FetchError::new(&target, e.to_string()))?;
    let mut script: ScriptVersion = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|e| FetchError::new(&target, e.to_string()))?,
        _ => serde_json::from_str(&content).map_err(|e| FetchError::new(&target, e.to_string()))?,
    };
    if script.file_name.is_empty() {
        script.file_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
    }
    debug!(module = %target, params = script.params.len(), "loaded component module");
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamType;
    use serde_json::json;

    #[test]
    fn test_module_shape_with_param_map() -> serde_json::Result<()> {
        let script: ScriptVersion = serde_json::from_value(json!({
            "id": "c1",
            "name": "Frame",
            "author": "acme",
            "params": { "width": { "type": "number", "default": 1000, "min": 100, "max": 3000 } },
            "code": "frame = box($WIDTH, 50, 50)",
            "published": { "version": "1.2" }
        }))?;
        let width = &script.params["WIDTH"];
        assert_eq!(width.param_type, ParamType::Number);
        assert_eq!(width.end, Some(3000.0));
        assert_eq!(script.version_tag(), Some("1.2"));
        assert_eq!(script.display_name(), "Frame");
        Ok(())
    }

    #[test]
    fn test_registry_envelope() {
        let body = json!({"data": {"file_name": "frame", "code": "b = box(1,1,1)", "params": [{"name": "w", "type": "number"}]}});
        let script = ScriptVersion::from_registry_envelope("acme/frame", body);
        assert!(matches!(&script, Ok(s) if s.file_name == "frame" && s.params.contains_key("W")));

        let empty = ScriptVersion::from_registry_envelope("acme/frame", json!({"data": {"file_name": "x"}}));
        assert!(empty.is_err());
        assert!(ScriptVersion::from_registry_envelope("x", json!([1])).is_err());
    }

    #[test]
    fn test_inline_detection() {
        assert!(is_inline_source("b = box(1, 2, 3)"));
        assert!(!is_inline_source("Frame"));
        assert!(!is_inline_source("acme/Frame:1.0"));
        let inline = ScriptVersion::inline("b = box(1, 2, 3)");
        assert!(inline.file_name.starts_with("inline-"));
        assert_eq!(inline.checksum().len(), 64);
    }

    #[tokio::test]
    async fn test_find_and_load_module() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join("acme"))?;
        std::fs::write(
            dir.path().join("acme").join("Frame.toml"),
            "name = \"Frame\"\ncode = \"frame = box(10, 10, 10)\"\n",
        )?;
        let library = ComponentLibrary::new(Some(dir.path().to_path_buf()));

        let by_address = library.find_module("acme/Frame:2.0");
        let by_name = library.find_module("Frame");
        assert_eq!(by_address, by_name);
        assert!(library.find_module("Missing").is_none());

        let path = by_name.ok_or_else(|| anyhow::anyhow!("module not found"))?;
        let script = load_module(&path).await?;
        assert_eq!(script.file_name, "Frame");
        assert_eq!(library.list(), vec!["Frame".to_string()]);
        Ok(())
    }
}
